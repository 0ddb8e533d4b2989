//! Types shared by every rowgate crate: the decoded change event, the
//! subscription model, the error taxonomy, LSNs, and configuration.

pub mod config;
pub mod error;
pub mod event;
pub mod lsn;
pub mod metrics;
pub mod subscription;
