/// Connection configuration for the PostgreSQL source database.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// PostgreSQL connection string.
    pub connection_string: String,
    /// Application name visible in `pg_stat_activity`.
    pub application_name: String,
}

impl ConnectorConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            application_name: "rowgate".to_string(),
        }
    }

    /// Build from the shared RowgateConfig, tagging the connection with
    /// `role` so each adapter shows up separately in `pg_stat_activity`.
    pub fn from_rowgate_config(cfg: &shared::config::RowgateConfig, role: &str) -> Self {
        Self {
            connection_string: cfg.source.connection_string.clone(),
            application_name: format!("{}-{}", cfg.source.application_name, role),
        }
    }
}
