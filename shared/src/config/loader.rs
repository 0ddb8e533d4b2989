use serde::Deserialize;

use crate::event::TableId;

/// Root configuration for the rowgate daemon.
///
/// Loaded from TOML files via the `config` crate with environment-variable
/// overrides (prefix: `ROWGATE_`).
#[derive(Debug, Clone, Deserialize)]
pub struct RowgateConfig {
    /// Source database connection settings.
    pub source: SourceConfig,
    /// Logical replication slot settings.
    pub slot: SlotConfig,
    /// Publication whose tables are streamed.
    pub publication: PublicationConfig,
    /// Where subscriptions are registered.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Per-event evaluation limits.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Retry policy for transient oracle failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Output sink.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Tokio runtime sizing.
    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// Source database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// PostgreSQL connection string.
    pub connection_string: String,
    /// Application name shown in `pg_stat_activity`.
    #[serde(default = "default_app_name")]
    pub application_name: String,
}

/// Replication slot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotConfig {
    /// Replication slot name.
    pub name: String,
    /// Whether to create the slot (with the `wal2json` plugin) if it does
    /// not exist.
    #[serde(default = "default_true")]
    pub auto_create: bool,
    /// Maximum number of changes peeked per poll.
    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: i32,
    /// Sleep between polls that returned nothing, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Minimum time between two slot advances, in milliseconds.
    #[serde(default = "default_ack_min_interval_ms")]
    pub ack_min_interval_ms: u64,
    /// Maximum time an acknowledged LSN may wait before the slot is
    /// advanced, in milliseconds.
    #[serde(default = "default_ack_max_interval_ms")]
    pub ack_max_interval_ms: u64,
}

/// Publication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicationConfig {
    /// Publication name.
    #[serde(default = "default_publication")]
    pub name: String,
}

/// Location of the subscription registry table.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_schema")]
    pub schema: String,
    #[serde(default = "default_registry_table")]
    pub table: String,
}

impl RegistryConfig {
    /// The registry table as a [`TableId`].
    pub fn table_id(&self) -> TableId {
        TableId::new(self.schema.clone(), self.table.clone())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            schema: default_registry_schema(),
            table: default_registry_table(),
        }
    }
}

/// Evaluation limits.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Largest serialized record forwarded as-is; bigger ones are emptied
    /// and reported as 413.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    /// Per-call timeout for the authorization oracle.
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,
    /// Upper bound on concurrent oracle calls within one event, and the
    /// number of oracle connections opened per session.
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    /// Lifetime of cached column grants and RLS flags.
    #[serde(default = "default_grant_cache_ttl_ms")]
    pub grant_cache_ttl_ms: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_record_bytes: default_max_record_bytes(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            max_concurrent_checks: default_max_concurrent_checks(),
            grant_cache_ttl_ms: default_grant_cache_ttl_ms(),
        }
    }
}

/// Exponential backoff for retryable faults.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Attempts after the first one; 0 disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Output sink selection.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Only `stdout` is built into the daemon.
    #[serde(default = "default_sink_kind")]
    pub kind: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: default_sink_kind(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (e.g. `info`, `debug`, `trace`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Tokio runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// Worker threads; 0 uses one per available core.
    #[serde(default)]
    pub worker_threads: usize,
    /// Delay before the worker is restarted after a failure.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

// ── Default value functions ─────────────────────────────────────────

fn default_app_name() -> String {
    "rowgate".to_string()
}
fn default_true() -> bool {
    true
}
fn default_poll_batch_size() -> i32 {
    1000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_ack_min_interval_ms() -> u64 {
    100
}
fn default_ack_max_interval_ms() -> u64 {
    1000
}
fn default_publication() -> String {
    "supabase_realtime".to_string()
}
fn default_registry_schema() -> String {
    "realtime".to_string()
}
fn default_registry_table() -> String {
    "subscription".to_string()
}
fn default_max_record_bytes() -> usize {
    1_048_576
} // 1 MiB
fn default_oracle_timeout_ms() -> u64 {
    5_000
}
fn default_max_concurrent_checks() -> usize {
    8
}
fn default_grant_cache_ttl_ms() -> u64 {
    1_000
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    5_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_sink_kind() -> String {
    "stdout".to_string()
}
fn default_restart_delay_ms() -> u64 {
    5_000
}
fn default_log_level() -> String {
    "info".to_string()
}
