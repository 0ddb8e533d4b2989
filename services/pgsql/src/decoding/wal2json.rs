//! Decoder for wal2json `format-version` 2 output.
//!
//! One line per change:
//!
//! ```text
//! {"action":"U","timestamp":"2022-07-07 14:52:58.092695+00","schema":"public","table":"note",
//!  "columns":[{"name":"id","type":"bigint","typeoid":20,"value":1}, ...],
//!  "identity":[{"name":"id","type":"bigint","typeoid":20,"value":1}],
//!  "pk":[{"name":"id","type":"bigint","typeoid":20}]}
//! ```

use serde::Deserialize;
use serde_json::Value;
use shared::error::{Result, RowgateError};
use shared::event::{timestamp, Action, ChangeEvent, ColumnDesc, RowData, TableId};
use shared::lsn::Lsn;

#[derive(Debug, Deserialize)]
struct RawChange {
  action: String,
  #[serde(default)]
  timestamp: Option<String>,
  #[serde(default)]
  schema: Option<String>,
  #[serde(default)]
  table: Option<String>,
  #[serde(default)]
  columns: Vec<RawColumn>,
  #[serde(default)]
  identity: Vec<RawColumn>,
  #[serde(default)]
  pk: Vec<RawKey>,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
  name: String,
  #[serde(rename = "type")]
  type_name: String,
  #[serde(default)]
  typeoid: Option<u32>,
  #[serde(default)]
  value: Value,
}

#[derive(Debug, Deserialize)]
struct RawKey {
  name: String,
}

/// What one wal2json line turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
  Change(ChangeEvent),
  Begin,
  Commit,
  /// Logical decoding message (`M`); carries nothing rowgate uses.
  Message,
}

/// Decode one wal2json line emitted at `lsn`.
pub fn decode(lsn: Lsn, data: &str) -> Result<Decoded> {
  let raw: RawChange = serde_json::from_str(data)
    .map_err(|e| RowgateError::malformed(format!("invalid wal2json record: {}", e)))?;

  let action = match raw.action.as_str() {
    "B" => return Ok(Decoded::Begin),
    "C" => return Ok(Decoded::Commit),
    "M" => return Ok(Decoded::Message),
    tag => Action::from_str_tag(tag)
      .ok_or_else(|| RowgateError::malformed(format!("unknown action '{}'", tag)))?,
  };

  let schema = non_empty(raw.schema, "schema")?;
  let table = non_empty(raw.table, "table")?;
  let ts = raw
    .timestamp
    .ok_or_else(|| RowgateError::malformed("missing timestamp"))?;
  let commit_timestamp = timestamp::parse(&ts)
    .map_err(|e| RowgateError::malformed(format!("invalid timestamp '{}': {}", ts, e)))?;

  // Deletes carry no `columns`; their shape is the identity's.
  let shape = if raw.columns.is_empty() {
    &raw.identity
  } else {
    &raw.columns
  };
  let columns = shape
    .iter()
    .map(|c| ColumnDesc {
      name: c.name.clone(),
      type_name: c.type_name.clone(),
      type_oid: c.typeoid,
    })
    .collect();

  let record = match action {
    Action::Insert | Action::Update => to_row(&raw.columns),
    Action::Delete | Action::Truncate => RowData::new(),
  };
  let old_record = match action {
    Action::Update | Action::Delete if !raw.identity.is_empty() => Some(to_row(&raw.identity)),
    _ => None,
  };

  Ok(Decoded::Change(ChangeEvent {
    lsn: lsn.get(),
    action,
    table: TableId::new(schema, table),
    columns,
    primary_key: raw.pk.into_iter().map(|k| k.name).collect(),
    record,
    old_record,
    commit_timestamp,
  }))
}

fn non_empty(value: Option<String>, field: &str) -> Result<String> {
  match value {
    Some(v) if !v.is_empty() => Ok(v),
    _ => Err(RowgateError::malformed(format!("missing {}", field))),
  }
}

fn to_row(columns: &[RawColumn]) -> RowData {
  let mut row = RowData::new();
  for c in columns {
    row.insert(c.name.clone(), c.value.clone());
  }
  row
}
