//! The Job Store (spec §4.1): durable submission records plus append-only
//! query/feedback/pipeline-job/alert tables, built around an atomic
//! claim/complete/fail shape applied to submissions.

pub mod manager;
pub mod sqlite;
pub mod traits;

pub use manager::{ManagerConfig, StoreManager};
pub use sqlite::SqliteJobStore;
pub use traits::{ArtifactRefs, JobStore, StoreStats};

/// Open a SQLite-backed Job Store at `path`, running migrations.
pub async fn open(path: &str) -> anyhow::Result<SqliteJobStore> {
    SqliteJobStore::open(path).await
}

/// In-memory `JobStore` fixture, exposed to other crates' test suites
/// behind the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
