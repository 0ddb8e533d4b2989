//! Column redaction and the serialized-size guard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::event::{timestamp, Action, ChangeEvent, ColumnDesc, RowData};
use std::io;

use crate::aggregate::EvaluationError;
use crate::identity;

/// An event as one principal may see it. This is the `wal` object of the
/// evaluation output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactedEvent {
  pub schema: String,
  pub table: String,
  #[serde(rename = "type")]
  pub action: Action,
  #[serde(with = "timestamp")]
  pub commit_timestamp: DateTime<Utc>,
  pub columns: Vec<ColumnDesc>,
  pub record: RowData,
  pub old_record: Option<RowData>,
}

impl RedactedEvent {
  /// The row filters are evaluated against: the new row for inserts and
  /// updates, the old row for deletes.
  pub fn filter_source(&self) -> &RowData {
    match (self.action, &self.old_record) {
      (Action::Delete, Some(old)) => old,
      _ => &self.record,
    }
  }
}

/// Restrict `event` to `visible_columns`, keeping the event's column
/// order. Update `old_record`s are reduced to the primary key first.
pub fn project(event: &ChangeEvent, primary_key: &[String], visible_columns: &[String]) -> RedactedEvent {
  let visible = |name: &str| visible_columns.iter().any(|c| c == name);

  let columns = event
    .columns
    .iter()
    .filter(|c| visible(&c.name))
    .cloned()
    .collect();

  let mut record = event.record.clone();
  record.retain(visible);

  let old_record = identity::old_identity(event, primary_key).map(|mut old| {
    old.retain(visible);
    old
  });

  RedactedEvent {
    schema: event.table.schema.clone(),
    table: event.table.table.clone(),
    action: event.action,
    commit_timestamp: event.commit_timestamp,
    columns,
    record,
    old_record,
  }
}

/// Empty `record` and `old_record` when the serialized event exceeds
/// `max_bytes`. Column metadata is kept.
pub fn enforce_size(event: &mut RedactedEvent, max_bytes: usize) -> Option<EvaluationError> {
  if serialized_len_within(event, max_bytes) {
    return None;
  }
  event.record = RowData::new();
  event.old_record = Some(RowData::new());
  Some(EvaluationError::PayloadTooLarge)
}

/// [`project`] followed by [`enforce_size`].
pub fn redact(
  event: &ChangeEvent,
  primary_key: &[String],
  visible_columns: &[String],
  max_bytes: usize,
) -> (RedactedEvent, Option<EvaluationError>) {
  let mut redacted = project(event, primary_key, visible_columns);
  let error = enforce_size(&mut redacted, max_bytes);
  (redacted, error)
}

/// Serialize into a counter that refuses bytes past `limit`, so an
/// oversized record is detected without building its JSON.
fn serialized_len_within<T: Serialize>(value: &T, limit: usize) -> bool {
  let mut counter = ByteCounter { written: 0, limit };
  serde_json::to_writer(&mut counter, value).is_ok()
}

struct ByteCounter {
  written: usize,
  limit: usize,
}

impl io::Write for ByteCounter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.written += buf.len();
    if self.written > self.limit {
      return Err(io::Error::new(io::ErrorKind::Other, "size limit exceeded"));
    }
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
