pub mod grants;
pub mod oracle;
pub mod pool;

pub use grants::{GrantCache, TableGrant};
pub use oracle::PgAuthorizationOracle;
pub use pool::ConnectionPool;
