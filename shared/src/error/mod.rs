pub mod types;

pub use types::RowgateError;

/// Shorthand Result type used throughout rowgate.
pub type Result<T> = std::result::Result<T, RowgateError>;
