pub mod source;
pub mod worker;

pub use source::{ChangeSource, SourceRecord, SubscriptionSource};
pub use worker::{Worker, WorkerStats};
