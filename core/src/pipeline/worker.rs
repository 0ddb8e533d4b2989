use shared::error::Result;
use shared::event::ChangeEvent;
use shared::lsn::Lsn;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::source::{ChangeSource, SourceRecord, SubscriptionSource};
use crate::aggregate::Aggregator;
use crate::metrics::MetricsRegistry;
use crate::retry::RetryPolicy;
use crate::sink::OutputSink;
use crate::subscription::{RegistryChange, SubscriptionSet};

/// Counters of one worker run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
  pub received: u64,
  pub emitted: u64,
  pub skipped: u64,
  pub dropped: u64,
}

/// The single ordered consumer of the change stream.
///
/// For each record: registry maintenance, evaluation (with retries for
/// transient oracle failures), hand-off to the sink, then acknowledgement.
/// Nothing is acknowledged before the sink accepted it. Errors that are
/// not retryable, such as a lost oracle session, end the run with the
/// current record unacknowledged.
pub struct Worker<S: ChangeSource> {
  source: S,
  registry: Arc<dyn SubscriptionSource>,
  subscriptions: SubscriptionSet,
  aggregator: Aggregator,
  sink: Arc<dyn OutputSink>,
  retry: RetryPolicy,
  metrics: Arc<MetricsRegistry>,
  last_acked: Option<Lsn>,
  stats: WorkerStats,
}

enum Evaluated {
  Emitted,
  Skipped,
  Dropped,
  Shutdown,
}

impl<S: ChangeSource> Worker<S> {
  pub fn new(
    source: S,
    registry: Arc<dyn SubscriptionSource>,
    subscriptions: SubscriptionSet,
    aggregator: Aggregator,
    sink: Arc<dyn OutputSink>,
    metrics: Arc<MetricsRegistry>,
  ) -> Self {
    Self {
      source,
      registry,
      subscriptions,
      aggregator,
      sink,
      retry: RetryPolicy::default(),
      metrics,
      last_acked: None,
      stats: WorkerStats::default(),
    }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Run until the source is exhausted or `shutdown` flips to `true`.
  pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<WorkerStats> {
    let initial = self.registry.load_all().await?;
    self.subscriptions.load(initial);
    self.metrics.subscriptions.set(self.subscriptions.len() as i64);

    loop {
      if *shutdown.borrow() {
        break;
      }
      let record = tokio::select! {
        biased;
        _ = shutdown.changed() => break,
        record = self.source.next() => record?,
      };
      let Some(record) = record else {
        info!("change source exhausted");
        break;
      };
      if let Evaluated::Shutdown = self.handle(record, &mut shutdown).await? {
        break;
      }
    }

    info!(
      received = self.stats.received,
      emitted = self.stats.emitted,
      skipped = self.stats.skipped,
      dropped = self.stats.dropped,
      "worker stopped"
    );
    Ok(self.stats)
  }

  async fn handle(
    &mut self,
    record: SourceRecord,
    shutdown: &mut watch::Receiver<bool>,
  ) -> Result<Evaluated> {
    let lsn = record.lsn;
    if self.last_acked.is_some_and(|acked| acked.is_ahead_of(lsn)) {
      debug!(lsn = %lsn, "skipping already processed change");
      return Ok(Evaluated::Skipped);
    }

    self.stats.received += 1;
    self.metrics.events_received.inc();

    let outcome = match record.decoded {
      Ok(event) => {
        self.maintain_registry(&event).await?;
        self.evaluate(&event, shutdown).await?
      }
      Err(e) => {
        error!(lsn = %lsn, error = %e, "dropping undecodable change");
        self.metrics.events_dropped.with_label_values(&["decode"]).inc();
        Evaluated::Dropped
      }
    };

    match outcome {
      Evaluated::Shutdown => return Ok(Evaluated::Shutdown),
      Evaluated::Emitted => self.stats.emitted += 1,
      Evaluated::Skipped => self.stats.skipped += 1,
      Evaluated::Dropped => self.stats.dropped += 1,
    }

    self.source.ack(lsn).await?;
    self.last_acked = Some(lsn);
    self.metrics.last_acked_lsn.set(lsn.get() as i64);
    Ok(outcome)
  }

  async fn maintain_registry(&mut self, event: &ChangeEvent) -> Result<()> {
    match self.subscriptions.apply_registry_change(event) {
      RegistryChange::Reload(key) => match self.registry.load_one(key).await? {
        Some(sub) => self.subscriptions.upsert(sub),
        None => {
          self.subscriptions.remove(key);
        }
      },
      RegistryChange::Unrelated | RegistryChange::Ignored => return Ok(()),
      RegistryChange::Removed(_) | RegistryChange::Cleared => {}
    }
    self.metrics.subscriptions.set(self.subscriptions.len() as i64);
    Ok(())
  }

  async fn evaluate(
    &mut self,
    event: &ChangeEvent,
    shutdown: &mut watch::Receiver<bool>,
  ) -> Result<Evaluated> {
    let candidates = self.subscriptions.for_entity(&event.table);
    let mut attempt = 0;

    let output = loop {
      match self.aggregator.process(event, candidates).await {
        Ok(output) => break output,
        Err(e) if e.is_retryable() => match self.retry.delay_for(attempt) {
          Some(delay) => {
            warn!(
              table = %event.table,
              lsn = %event.lsn(),
              attempt = attempt + 1,
              delay_ms = delay.as_millis() as u64,
              error = %e,
              "evaluation failed; retrying"
            );
            attempt += 1;
            tokio::select! {
              _ = tokio::time::sleep(delay) => {}
              _ = shutdown.changed() => return Ok(Evaluated::Shutdown),
            }
          }
          None => {
            error!(
              table = %event.table,
              lsn = %event.lsn(),
              attempts = attempt + 1,
              error = %e,
              "evaluation failed; dropping change"
            );
            self.metrics.events_dropped.with_label_values(&["evaluate"]).inc();
            return Ok(Evaluated::Dropped);
          }
        },
        Err(e) => return Err(e),
      }
    };

    let Some(output) = output else {
      self.metrics.events_skipped.inc();
      return Ok(Evaluated::Skipped);
    };

    self.sink.emit(&output).await?;
    self.metrics.events_emitted.inc();
    Ok(Evaluated::Emitted)
  }

  /// Counters so far.
  pub fn stats(&self) -> WorkerStats {
    self.stats
  }
}
