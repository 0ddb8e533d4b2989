use super::config::ConnectorConfig;
use shared::error::RowgateError;
use shared::event::TableId;
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

/// A connection to the source PostgreSQL database.
///
/// Each adapter (slot poller, authorization oracle, registry loader)
/// holds its own client so that the oracle's role-switching transactions
/// never interleave with polling.
pub struct PgClient {
  client: Client,
  config: ConnectorConfig,
}

impl PgClient {
  /// Connect and drive the connection on a background task.
  pub async fn connect(config: ConnectorConfig) -> Result<Self, RowgateError> {
    let mut pg_config: tokio_postgres::Config = config
      .connection_string
      .parse()
      .map_err(|e| RowgateError::ConnectFailed(Box::new(e)))?;
    pg_config.application_name(&config.application_name);

    let (client, connection) = pg_config
      .connect(NoTls)
      .await
      .map_err(|e| RowgateError::ConnectFailed(Box::new(e)))?;

    let app_name = config.application_name.clone();
    tokio::spawn(async move {
      if let Err(e) = connection.await {
        error!(app_name = %app_name, error = %e, "PostgreSQL connection closed with error");
      }
    });

    info!(app_name = %config.application_name, "connected to PostgreSQL source");

    Ok(Self { client, config })
  }

  /// Returns a reference to the underlying tokio-postgres client.
  pub fn inner(&self) -> &Client {
    &self.client
  }

  /// Mutable access, needed to open transactions.
  pub fn inner_mut(&mut self) -> &mut Client {
    &mut self.client
  }

  /// Returns the connector configuration.
  pub fn config(&self) -> &ConnectorConfig {
    &self.config
  }

  pub fn is_closed(&self) -> bool {
    self.client.is_closed()
  }

  /// Check if the replication slot exists.
  pub async fn slot_exists(&self, slot_name: &str) -> anyhow::Result<bool> {
    let row = self
      .client
      .query_one(
        "SELECT COUNT(*) FROM pg_replication_slots WHERE slot_name = $1",
        &[&slot_name],
      )
      .await?;
    let count: i64 = row.get(0);
    Ok(count > 0)
  }

  /// Check if the publication exists.
  pub async fn publication_exists(&self, pub_name: &str) -> anyhow::Result<bool> {
    let row = self
      .client
      .query_one(
        "SELECT COUNT(*) FROM pg_publication WHERE pubname = $1",
        &[&pub_name],
      )
      .await?;
    let count: i64 = row.get(0);
    Ok(count > 0)
  }

  /// List tables currently in the publication. A `FOR ALL TABLES`
  /// publication lists every user table.
  pub async fn publication_tables(&self, pub_name: &str) -> anyhow::Result<Vec<TableId>> {
    let rows = self
      .client
      .query(
        "SELECT schemaname::text, tablename::text
                 FROM pg_publication_tables WHERE pubname = $1
                 ORDER BY schemaname, tablename",
        &[&pub_name],
      )
      .await?;
    Ok(
      rows
        .iter()
        .map(|r| TableId::new(r.get::<_, String>(0), r.get::<_, String>(1)))
        .collect(),
    )
  }
}

/// Quote an SQL identifier the way `quote_ident` does when a quote is
/// needed: wrap in double quotes, doubling embedded ones.
pub fn quote_ident(ident: &str) -> String {
  format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn quote_table(table: &TableId) -> String {
  format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.table))
}
