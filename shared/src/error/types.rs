use thiserror::Error;

/// Top-level infrastructure error type for rowgate.
///
/// These are faults of the surrounding machinery (database, decoder,
/// oracle, sink). The user-visible 400/401/413 classifications are not
/// errors in this sense: they are reported inside the evaluation output
/// and never travel through this type.
#[derive(Debug, Error)]
pub enum RowgateError {
    // ── Connector ──────────────────────────────────────────────
    #[error("connector: failed to connect to source database")]
    ConnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("connector: replication slot '{0}' does not exist")]
    SlotNotFound(String),

    #[error("connector: change source terminated unexpectedly")]
    SourceClosed,

    // ── Decoding ───────────────────────────────────────────────
    #[error("decoding: malformed change event: {reason}")]
    MalformedEvent { reason: String },

    // ── Authorization ──────────────────────────────────────────
    #[error("authorization: oracle unavailable for principal '{principal}'")]
    OracleUnavailable {
        principal: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("authorization: oracle check for principal '{principal}' timed out after {timeout_ms} ms")]
    OracleTimeout { principal: String, timeout_ms: u64 },

    /// The oracle's database session is gone. Retrying on the same
    /// session cannot succeed; the pipeline has to reconnect.
    #[error("authorization: oracle connection closed while checking principal '{principal}'")]
    OracleDisconnected { principal: String },

    // ── Subscriptions ──────────────────────────────────────────
    #[error("subscriptions: failed to load subscription records")]
    SubscriptionLoadFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("subscriptions: invalid subscription record {key}: {reason}")]
    InvalidSubscription { key: String, reason: String },

    // ── Sink ───────────────────────────────────────────────────
    #[error("sink: failed to hand off evaluation output")]
    SinkFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    // ── Acknowledgement ────────────────────────────────────────
    #[error("ack: attempted to acknowledge LSN {attempted} which is behind {current}")]
    AckRegression { attempted: String, current: String },

    // ── Config ─────────────────────────────────────────────────
    #[error("config: failed to load configuration")]
    ConfigLoadFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("config: invalid value for '{key}': {reason}")]
    ConfigInvalid { key: String, reason: String },

    // ── Generic ────────────────────────────────────────────────
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RowgateError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }

    /// Whether the failure is transient and the same work may be retried.
    ///
    /// Only infrastructure faults qualify; a malformed event stays
    /// malformed no matter how often it is decoded.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OracleUnavailable { .. } | Self::OracleTimeout { .. } | Self::ConnectFailed(_)
        )
    }
}
