use shared::lsn::Lsn;
use tracing::info;

use crate::connector::PgClient;

/// Creates and advances the logical replication slot.
pub struct SlotManager {
  slot_name: String,
  auto_create: bool,
}

impl SlotManager {
  pub fn new(slot_name: &str, auto_create: bool) -> Self {
    Self {
      slot_name: slot_name.to_string(),
      auto_create,
    }
  }

  /// Create the slot with the `wal2json` plugin if it doesn't exist.
  ///
  /// Returns the consistent point LSN if a new slot was created.
  pub async fn ensure_slot(&self, client: &PgClient) -> anyhow::Result<Option<Lsn>> {
    if client.slot_exists(&self.slot_name).await? {
      info!(slot = %self.slot_name, "replication slot already exists");
      return Ok(None);
    }

    if !self.auto_create {
      return Err(shared::error::RowgateError::SlotNotFound(self.slot_name.clone()).into());
    }

    let row = client
      .inner()
      .query_one(
        "SELECT lsn::text FROM pg_create_logical_replication_slot($1, 'wal2json')",
        &[&self.slot_name],
      )
      .await?;
    let lsn_str: &str = row.get(0);
    let lsn = Lsn::from_pg_str(lsn_str)
      .map_err(|e| anyhow::anyhow!("failed to parse slot LSN: {}", e))?;

    info!(
        slot = %self.slot_name,
        lsn = %lsn,
        "created new replication slot"
    );

    Ok(Some(lsn))
  }

  /// Move the slot's confirmed position to `lsn`.
  pub async fn advance(&self, client: &PgClient, lsn: Lsn) -> anyhow::Result<()> {
    client
      .inner()
      .execute(
        "SELECT pg_replication_slot_advance($1, $2::text::pg_lsn)",
        &[&self.slot_name, &lsn.to_pg_string()],
      )
      .await?;
    Ok(())
  }

  pub fn slot_name(&self) -> &str {
    &self.slot_name
  }
}
