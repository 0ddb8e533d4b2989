pub mod loader;

pub use loader::{
    EvaluationConfig, ObservabilityConfig, PublicationConfig, RegistryConfig, RetryConfig,
    RowgateConfig, RuntimeSection, SinkConfig, SlotConfig, SourceConfig,
};

use std::path::Path;

use crate::error::RowgateError;

/// Load configuration from a TOML file with environment-variable overrides.
///
/// Resolution order:
/// 1. `config/default.toml`: base configuration
/// 2. `config/{env}.toml`: environment overlay (development, testing, production)
/// 3. Environment variables with prefix `ROWGATE_` (double underscore for nesting)
///
/// # Example
///
/// `ROWGATE_SOURCE__CONNECTION_STRING=postgres://...` overrides
/// `source.connection_string`.
pub fn load_config(config_dir: &Path, env: &str) -> anyhow::Result<RowgateConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from(config_dir.join("default.toml")).required(true))
        .add_source(config::File::from(config_dir.join(format!("{}.toml", env))).required(false))
        .add_source(
            config::Environment::with_prefix("ROWGATE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| RowgateError::ConfigLoadFailed(Box::new(e)))?;

    let cfg: RowgateConfig = settings
        .try_deserialize()
        .map_err(|e| RowgateError::ConfigLoadFailed(Box::new(e)))?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Reject values that deserialize fine but cannot drive the daemon.
pub fn validate(cfg: &RowgateConfig) -> Result<(), RowgateError> {
    if cfg.slot.name.is_empty() {
        return Err(invalid("slot.name", "must not be empty"));
    }
    if cfg.slot.poll_batch_size <= 0 {
        return Err(invalid("slot.poll_batch_size", "must be positive"));
    }
    if cfg.slot.ack_min_interval_ms > cfg.slot.ack_max_interval_ms {
        return Err(invalid(
            "slot.ack_min_interval_ms",
            "must not exceed slot.ack_max_interval_ms",
        ));
    }
    if cfg.evaluation.max_record_bytes == 0 {
        return Err(invalid("evaluation.max_record_bytes", "must be positive"));
    }
    if cfg.evaluation.max_concurrent_checks == 0 {
        return Err(invalid("evaluation.max_concurrent_checks", "must be positive"));
    }
    if cfg.sink.kind != "stdout" {
        return Err(invalid("sink.kind", "only 'stdout' is supported"));
    }
    Ok(())
}

fn invalid(key: &str, reason: &str) -> RowgateError {
    RowgateError::ConfigInvalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
