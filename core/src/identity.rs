//! Row identity: the primary-key columns of a change.

use shared::event::{Action, ChangeEvent, RowData};

/// Primary-key columns of the row affected by `event`, in key order.
///
/// Drawn from `record` for inserts and updates and from `old_record`
/// otherwise. Returns an empty row when no key is known or when any key
/// column is missing or NULL; an incomplete key cannot identify a row.
pub fn identity(event: &ChangeEvent, primary_key: &[String]) -> RowData {
  let source = match event.identity_source() {
    Some(row) => row,
    None => return RowData::new(),
  };

  let mut id = RowData::new();
  for column in primary_key {
    match source.get(column) {
      Some(value) if !value.is_null() => id.insert(column.clone(), value.clone()),
      _ => return RowData::new(),
    }
  }
  id
}

/// The old row as it may be forwarded.
///
/// Updates only ever forward the previous key, even when the table's
/// replica identity delivers the full previous row. Deletes forward the
/// old row as decoded. Inserts and truncates have none.
pub fn old_identity(event: &ChangeEvent, primary_key: &[String]) -> Option<RowData> {
  let old = event.old_record.as_ref()?;
  match event.action {
    Action::Update => {
      let mut keyed = RowData::new();
      for column in primary_key {
        if let Some(value) = old.get(column) {
          keyed.insert(column.clone(), value.clone());
        }
      }
      Some(keyed)
    }
    Action::Delete => Some(old.clone()),
    Action::Insert | Action::Truncate => None,
  }
}
