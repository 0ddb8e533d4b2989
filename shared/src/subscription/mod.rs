pub mod types;

pub use types::{Filter, FilterOp, Principal, Subscription};
