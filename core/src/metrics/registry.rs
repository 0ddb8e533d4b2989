use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use shared::metrics::labels::{LABEL_CODE, LABEL_OUTCOME, LABEL_STAGE};

/// Central Prometheus metrics registry for the rowgate daemon.
pub struct MetricsRegistry {
  pub registry: Registry,
  // Source metrics
  pub events_received: IntCounter,
  pub events_skipped: IntCounter,
  pub events_dropped: IntCounterVec,
  // Evaluation metrics
  pub events_emitted: IntCounter,
  pub evaluation_errors: IntCounterVec,
  pub evaluation_latency: Histogram,
  // Authorization metrics
  pub oracle_calls: IntCounterVec,
  // Subscription metrics
  pub subscriptions: IntGauge,
  // Acknowledgement metrics
  pub last_acked_lsn: IntGauge,
}

impl MetricsRegistry {
  pub fn new() -> anyhow::Result<Self> {
    let registry = Registry::new();

    let events_received = IntCounter::new(
      "rowgate_events_received_total",
      "Total change events received from the source",
    )?;
    let events_skipped = IntCounter::new(
      "rowgate_events_skipped_total",
      "Total events with no subscription on their table",
    )?;
    let events_dropped = IntCounterVec::new(
      Opts::new(
        "rowgate_events_dropped_total",
        "Total events dropped after an unrecoverable failure",
      ),
      &[LABEL_STAGE],
    )?;

    let events_emitted = IntCounter::new(
      "rowgate_events_emitted_total",
      "Total evaluation outputs handed to the sink",
    )?;
    let evaluation_errors = IntCounterVec::new(
      Opts::new(
        "rowgate_evaluation_errors_total",
        "User-visible evaluation errors by code",
      ),
      &[LABEL_CODE],
    )?;
    let evaluation_latency = Histogram::with_opts(
      HistogramOpts::new(
        "rowgate_evaluation_latency_seconds",
        "Time to evaluate one event against its subscriptions",
      )
      .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
    )?;

    let oracle_calls = IntCounterVec::new(
      Opts::new(
        "rowgate_oracle_calls_total",
        "Authorization oracle calls by outcome",
      ),
      &[LABEL_OUTCOME],
    )?;

    let subscriptions = IntGauge::new(
      "rowgate_subscriptions",
      "Number of subscriptions currently loaded",
    )?;
    let last_acked_lsn = IntGauge::new(
      "rowgate_last_acked_lsn",
      "Most recent LSN acknowledged to the source",
    )?;

    // Register all metrics
    registry.register(Box::new(events_received.clone()))?;
    registry.register(Box::new(events_skipped.clone()))?;
    registry.register(Box::new(events_dropped.clone()))?;
    registry.register(Box::new(events_emitted.clone()))?;
    registry.register(Box::new(evaluation_errors.clone()))?;
    registry.register(Box::new(evaluation_latency.clone()))?;
    registry.register(Box::new(oracle_calls.clone()))?;
    registry.register(Box::new(subscriptions.clone()))?;
    registry.register(Box::new(last_acked_lsn.clone()))?;

    Ok(Self {
      registry,
      events_received,
      events_skipped,
      events_dropped,
      events_emitted,
      evaluation_errors,
      evaluation_latency,
      oracle_calls,
      subscriptions,
      last_acked_lsn,
    })
  }

  /// Encode all metrics in Prometheus text format.
  pub fn encode(&self) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = self.registry.gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf).unwrap_or_default();
    String::from_utf8(buf).unwrap_or_default()
  }
}
