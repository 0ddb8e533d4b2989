//! The rowgate evaluation pipeline.
//!
//! One decoded change plus the subscriptions on its table become one
//! [`aggregate::EvaluationOutput`]: which subscriptions may see the
//! change, in what redacted shape, and which errors apply.

pub mod aggregate;
pub mod authz;
pub mod catalog;
pub mod compare;
pub mod daemon;
pub mod filter;
pub mod identity;
pub mod metrics;
pub mod pipeline;
pub mod redact;
pub mod retry;
pub mod sink;
pub mod subscription;

pub use aggregate::{Aggregator, EvaluationError, EvaluationLimits, EvaluationOutput};
pub use catalog::KeyCatalog;
pub use subscription::SubscriptionSet;
