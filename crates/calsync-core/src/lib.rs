pub mod config;
pub mod error;

pub use config::{
    AccountConfig, CalendarConfig, ConfigValidationError, StorageConfig, SyncConfig,
    ValidationResult, DEFAULT_FEED,
};
pub use error::{AppError, ConfigError, DatabaseError, RusqliteErrorExt};

use anyhow::Result;

/// Initialize logging for a calsync binary.
///
/// Library crates only emit `tracing` events; installing the subscriber is
/// left to the executable.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("calsync core initialized");
    Ok(())
}
