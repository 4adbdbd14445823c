//! Logging and tracing initialization.

use resonance_core::config::{env, ResonanceConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes structured logging for the process. `LOG_LEVEL` (spec §6)
/// overrides the default filter; `RUST_LOG` still wins if set, matching
/// `tracing_subscriber`'s usual precedence.
pub fn init_logging(config: &ResonanceConfig) {
    let level = std::env::var(env::LOG_LEVEL).unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("resonance={level},{level}")));

    let log_dir = config.logs_dir();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        if let Ok(file) = std::fs::File::create(log_dir.join("resonance.log")) {
            let file_layer = fmt::layer().with_writer(file).with_ansi(false).json();
            let stdout_layer = fmt::layer().with_target(false).compact();
            tracing_subscriber::registry().with(env_filter).with(stdout_layer).with(file_layer).init();
            return;
        }
    }

    let stdout_layer = fmt::layer().with_target(false).compact();
    tracing_subscriber::registry().with(env_filter).with(stdout_layer).init();
}
