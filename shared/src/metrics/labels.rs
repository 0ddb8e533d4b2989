// Prometheus metric label constants.
//
// Centralizing label names prevents typo-induced cardinality explosions
// and makes grep-able dashboards easier to build.

/// Label for the operation type (insert, update, delete, truncate).
pub const LABEL_OP: &str = "op";

/// Label for the fully-qualified table name.
pub const LABEL_TABLE: &str = "table";

/// Label for the user-visible error code (400, 401, 413).
pub const LABEL_CODE: &str = "code";

/// Label for the pipeline stage (decode, evaluate, emit, ack).
pub const LABEL_STAGE: &str = "stage";

/// Label for the oracle call outcome (ok, error, timeout).
pub const LABEL_OUTCOME: &str = "outcome";
