use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Action, ColumnDesc, RowData, TableId};
use crate::lsn::Lsn;

/// A fully-decoded row change from the logical replication stream.
///
/// Produced once per WAL record by the decoder and consumed exactly once
/// by the aggregator. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Position of this change in the WAL; used for acknowledgement.
    pub lsn: u64,

    pub action: Action,

    /// The table that was modified.
    pub table: TableId,

    /// Shape of `record` / `old_record`, in table column order.
    pub columns: Vec<ColumnDesc>,

    /// Primary key column names reported by the decoder. Empty when the
    /// decoder did not report any; the key catalog is consulted then.
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// The new row state (insert and update). Empty otherwise.
    #[serde(default)]
    pub record: RowData,

    /// The old row state (update and delete). May contain more than the
    /// key columns when the table uses `REPLICA IDENTITY FULL`; updates
    /// forward only the key columns.
    #[serde(default)]
    pub old_record: Option<RowData>,

    #[serde(with = "super::timestamp")]
    pub commit_timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Returns the LSN as a typed value.
    #[inline]
    pub fn lsn(&self) -> Lsn {
        Lsn::new(self.lsn)
    }

    /// The row that carries the identity for this action.
    pub fn identity_source(&self) -> Option<&RowData> {
        if self.action.reads_new_row() {
            Some(&self.record)
        } else {
            self.old_record.as_ref()
        }
    }

    /// Returns `true` if this is a truncate event.
    #[inline]
    pub fn is_truncate(&self) -> bool {
        matches!(self.action, Action::Truncate)
    }
}
