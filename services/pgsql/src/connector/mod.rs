pub mod client;
pub mod config;

pub use client::{quote_ident, quote_table, PgClient};
pub use config::ConnectorConfig;
