//! Delegated authorization.
//!
//! Whether a principal may read a table, which of its columns, and whether
//! a particular row passes its row-level policies is decided by the
//! database. The [`AuthorizationOracle`] trait is that seam; the
//! [`EvaluationScope`] asks it once per distinct principal per event.

pub mod oracle;
pub mod resolver;

pub use oracle::{AuthorizationOracle, OracleVerdict, RowProbe};
pub use resolver::{AuthorizationDecision, EvaluationScope, Resolution};
