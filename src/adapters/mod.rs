//! Concrete implementations of the ports spec §1 calls "out of scope" —
//! the downloader, ASR engine, embedding model, vector store, keyword
//! index, LLM client, re-ranker and alert sink. None of these model a real
//! production backend; they are the minimal, swappable default this binary
//! needs to run the orchestration engine end to end on a single host.

pub mod alert;
pub mod asr;
pub mod downloader;
pub mod embedding;
pub mod llm;
pub mod memory_index;
pub mod reranker;
