//! Publication enumeration and wal2json table selection.

use shared::event::TableId;
use tracing::{info, warn};

use crate::connector::PgClient;

/// Escape a table for wal2json's `add-tables` option: every character
/// of both name parts is prefixed with `\`, and the parts are joined with
/// an unescaped `.`.
///
/// `public.note` becomes `\p\u\b\l\i\c.\n\o\t\e`.
pub fn quote_wal2json(entity: &TableId) -> String {
  let mut out = String::with_capacity(2 * (entity.schema.len() + entity.table.len()) + 1);
  escape_into(&mut out, &entity.schema);
  out.push('.');
  escape_into(&mut out, &entity.table);
  out
}

fn escape_into(out: &mut String, part: &str) {
  for ch in part.chars() {
    out.push('\\');
    out.push(ch);
  }
}

/// Value of the `add-tables` option for `tables`, or `None` when there
/// is nothing to restrict to.
pub fn add_tables_option(tables: &[TableId]) -> Option<String> {
  if tables.is_empty() {
    return None;
  }
  Some(
    tables
      .iter()
      .map(quote_wal2json)
      .collect::<Vec<_>>()
      .join(","),
  )
}

/// Tables the slot should decode: the publication's tables plus the
/// subscription registry, whose changes maintain the subscription set.
pub async fn decoded_tables(
  client: &PgClient,
  publication: &str,
  registry: &TableId,
) -> anyhow::Result<Vec<TableId>> {
  if !client.publication_exists(publication).await? {
    warn!(publication = %publication, "publication does not exist; no tables will be decoded");
  }
  let mut tables = client.publication_tables(publication).await?;
  if !tables.contains(registry) {
    tables.push(registry.clone());
  }
  info!(publication = %publication, tables = tables.len(), "publication tables enumerated");
  Ok(tables)
}
