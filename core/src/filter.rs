//! Subscription filter evaluation.

use shared::event::{ColumnDesc, RowData};
use shared::subscription::Filter;
use tracing::warn;

use crate::compare;

/// Whether `record` satisfies every filter.
///
/// An empty filter list always matches. Evaluation stops at the first
/// failing filter. A filter on a column that is absent from `columns` or
/// `record`, holds NULL, or cannot be compared does not match.
pub fn matches(filters: &[Filter], columns: &[ColumnDesc], record: &RowData) -> bool {
  filters.iter().all(|f| filter_matches(f, columns, record))
}

fn filter_matches(filter: &Filter, columns: &[ColumnDesc], record: &RowData) -> bool {
  let column = match columns.iter().find(|c| c.name == filter.column) {
    Some(c) => c,
    None => return false,
  };
  let value = match record.get_text(&filter.column) {
    Some(v) => v,
    None => return false,
  };

  match compare::compare(filter.op, &column.type_name, &value, &filter.value) {
    Ok(matched) => matched,
    Err(e) => {
      warn!(
        column = %filter.column,
        op = %filter.op,
        error = %e,
        "filter not applicable; treating as non-matching"
      );
      false
    }
  }
}
