//! Immutable, process-wide configuration (spec §9: "Global configuration
//! object" design note). Loaded once at startup and passed by `Arc` into
//! every component; never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-stage concurrency limits for the Scheduler's worker pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub download: usize,
    pub transcribe: usize,
    pub chunk: usize,
    pub embed: usize,
    pub global_ceiling: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            download: 2,
            transcribe: 1,
            chunk: 4,
            embed: 4,
            global_ceiling: 16,
        }
    }
}

/// Sensor polling intervals (spec §4.4's table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorIntervals {
    pub url_sensor_secs: u64,
    pub audio_file_sensor_secs: u64,
    pub health_sensor_secs: u64,
    pub cleanup_sensor_secs: u64,
    pub alert_dispatch_sensor_secs: u64,
}

impl Default for SensorIntervals {
    fn default() -> Self {
        Self {
            url_sensor_secs: 30,
            audio_file_sensor_secs: 60,
            health_sensor_secs: 5 * 60,
            cleanup_sensor_secs: 60 * 60,
            alert_dispatch_sensor_secs: 2 * 60,
        }
    }
}

/// Retry policy shared by every stage worker (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub max_attempts: i32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff_secs: 2,
            max_backoff_secs: 300,
            max_attempts: 3,
        }
    }
}

impl RetryConfig {
    pub fn as_backoff_policy(&self) -> crate::error::BackoffPolicy {
        crate::error::BackoffPolicy {
            base: Duration::from_secs(self.base_backoff_secs),
            max: Duration::from_secs(self.max_backoff_secs),
            max_attempts: self.max_attempts,
        }
    }
}

/// Chunker window configuration (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub window_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_size: 300,
            overlap: 75,
        }
    }
}

/// Embedder batching configuration (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            timeout_secs: 30,
        }
    }
}

/// Retrieval variant weights and defaults (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    pub rerank_pool_multiplier: usize,
    pub rewrite_variants: usize,
    pub rrf_k: f32,
    pub default_top_k: u32,
    pub llm_timeout_secs: u64,
    /// Per-candidate reranker call timeout (spec §9: re-rank waits run as
    /// parallel tasks with a join barrier and a per-task timeout).
    pub rerank_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            lexical_weight: 0.3,
            rerank_pool_multiplier: 4,
            rewrite_variants: 3,
            rrf_k: 60.0,
            default_top_k: 5,
            llm_timeout_secs: 60,
            rerank_timeout_secs: 30,
        }
    }
}

/// Alert thresholds monitored by the health sensor (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub failure_rate_window_mins: i64,
    pub failure_rate_threshold: f64,
    pub backlog_threshold: i64,
    pub lease_expirations_per_hour: i64,
    pub storage_cap_bytes: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            failure_rate_window_mins: 15,
            failure_rate_threshold: 0.10,
            backlog_threshold: 500,
            lease_expirations_per_hour: 3,
            storage_cap_bytes: 50 * 1024 * 1024 * 1024,
        }
    }
}

/// Top-level, immutable configuration handed by `Arc` to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceConfig {
    pub data_root: PathBuf,
    pub concurrency: ConcurrencyConfig,
    pub sensors: SensorIntervals,
    pub retry: RetryConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub alerts: AlertThresholds,
    pub claim_lease_secs: u64,
    pub dedup_window_hours: i64,
    pub backpressure_high_water_mark: i64,
    pub tick_interval_ms: u64,
    pub progress_poll_secs: u64,
    /// ASR call timeout (spec §5: default 60s); counts as `transient-network`
    /// on expiry.
    pub asr_timeout_secs: u64,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            concurrency: ConcurrencyConfig::default(),
            sensors: SensorIntervals::default(),
            retry: RetryConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            alerts: AlertThresholds::default(),
            claim_lease_secs: 10 * 60,
            dedup_window_hours: 24,
            backpressure_high_water_mark: 1000,
            tick_interval_ms: 1000,
            progress_poll_secs: 3,
            asr_timeout_secs: 60,
        }
    }
}

impl ResonanceConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any unset field (serde's `#[serde(default)]` is intentionally not
    /// used here so a missing file is the only fallback path; a malformed
    /// file is always an error).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    pub fn load_with_fallback(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to parse config, using defaults");
                }
            }
        }
        Self::default()
    }

    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn jobstore_path(&self) -> PathBuf {
        self.data_root.join("jobstore.db")
    }

    pub fn vectorstore_dir(&self) -> PathBuf {
        self.data_root.join("vectorstore")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.data_root.join("audio")
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_root.join("transcripts")
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.data_root.join("chunks")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_root.join("logs")
    }

    /// Overrides `data_root` from `DATA_ROOT` if set, leaving every other
    /// field as loaded from file/defaults. Called once at startup, after
    /// `load_with_fallback`.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(env::DATA_ROOT) {
            self.data_root = PathBuf::from(root);
        }
        self
    }
}

/// Environment variables recognized by the engine (spec §6). Centralized
/// here so every crate reads the same names.
pub mod env {
    pub const LLM_API_KEY: &str = "LLM_API_KEY";
    pub const BOT_TOKEN: &str = "BOT_TOKEN";
    pub const ADMIN_CHAT_ID: &str = "ADMIN_CHAT_ID";
    pub const DATA_ROOT: &str = "DATA_ROOT";
    pub const ASR_MODEL: &str = "ASR_MODEL";
    pub const EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
    pub const DEVICE: &str = "DEVICE";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}
