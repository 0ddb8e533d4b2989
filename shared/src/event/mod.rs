pub mod envelope;
pub mod timestamp;
pub mod types;

pub use envelope::ChangeEvent;
pub use types::{Action, ColumnDesc, ColumnValue, RowData, TableId};
