pub mod types;

pub use types::{Lsn, LsnParseError};
