//! PostgreSQL adapters for rowgate: the wal2json slot poller, the
//! subscription registry loader, and the authorization oracle.

pub mod authz;
pub mod connector;
pub mod decoding;
pub mod publication;
pub mod registry;
pub mod replication;
pub mod schema;

pub use authz::{GrantCache, PgAuthorizationOracle};
pub use connector::{ConnectorConfig, PgClient};
pub use registry::PgSubscriptionSource;
pub use replication::{PollerOptions, SlotManager, SlotPoller};
