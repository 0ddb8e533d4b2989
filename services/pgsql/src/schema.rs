//! Primary-key catalog loading.

use rowgate_core::KeyCatalog;
use shared::event::TableId;
use tracing::{info, warn};

use crate::connector::{quote_table, PgClient};

/// Primary-key columns of `table`, in key order. Empty when the table has
/// no primary key.
pub async fn primary_key(client: &PgClient, table: &TableId) -> anyhow::Result<Vec<String>> {
  let rows = client
    .inner()
    .query(
      "SELECT a.attname::text
               FROM pg_index i
               JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
               WHERE i.indrelid = $1::text::regclass AND i.indisprimary
               ORDER BY array_position(i.indkey::int2[], a.attnum)",
      &[&quote_table(table)],
    )
    .await?;
  Ok(rows.iter().map(|r| r.get(0)).collect())
}

/// Load the primary key of every table into `catalog`. Returns the number
/// of tables with a key.
pub async fn load_primary_keys(
  client: &PgClient,
  tables: &[TableId],
  catalog: &KeyCatalog,
) -> anyhow::Result<usize> {
  let mut count = 0;
  for table in tables {
    let key = primary_key(client, table).await?;
    if key.is_empty() {
      warn!(table = %table, "table has no primary key; its changes will be rejected");
      continue;
    }
    catalog.upsert(table.clone(), key);
    count += 1;
  }
  info!(count, tables = tables.len(), "loaded primary keys");
  Ok(count)
}
