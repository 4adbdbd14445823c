//! Shared data model, error taxonomy, configuration and port traits for the
//! Resonance ingestion-and-retrieval orchestration engine.

pub mod config;
pub mod error;
pub mod model;
pub mod ports;

pub use config::ResonanceConfig;
pub use error::{ResonanceError, Result};
