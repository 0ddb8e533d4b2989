use rowgate_core::daemon::{Lifecycle, LifecycleState, RuntimeConfig};
use rowgate_core::metrics::MetricsRegistry;
use rowgate_core::pipeline::{Worker, WorkerStats};
use rowgate_core::retry::RetryPolicy;
use rowgate_core::sink::{OutputSink, StdoutSink};
use rowgate_core::{Aggregator, EvaluationLimits, KeyCatalog, SubscriptionSet};
use rowgate_pgsql::{
  publication, schema, ConnectorConfig, GrantCache, PgAuthorizationOracle, PgClient,
  PgSubscriptionSource, PollerOptions, SlotManager, SlotPoller,
};
use shared::config::{self, RowgateConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
  let env = std::env::var("ROWGATE_ENV").unwrap_or_else(|_| "development".to_string());
  let config_dir = Path::new("config");
  let cfg = config::load_config(config_dir, &env)?;

  init_logging(&cfg.observability.log_level);
  info!(env = %env, slot = %cfg.slot.name, "rowgate starting");

  let rt = RuntimeConfig::from(&cfg.runtime).build_runtime()?;

  rt.block_on(async move { run_daemon(Arc::new(cfg)).await })
}

/// State that outlives a single run of the pipeline.
struct Shared {
  metrics: Arc<MetricsRegistry>,
  keys: Arc<KeyCatalog>,
  grants: Arc<GrantCache>,
  sink: Arc<dyn OutputSink>,
}

async fn run_daemon(cfg: Arc<RowgateConfig>) -> anyhow::Result<()> {
  let mut lifecycle = Lifecycle::new();
  lifecycle.transition(LifecycleState::Initializing);

  let shared = Arc::new(Shared {
    metrics: Arc::new(MetricsRegistry::new()?),
    keys: Arc::new(KeyCatalog::new()),
    grants: Arc::new(GrantCache::new(Duration::from_millis(
      cfg.evaluation.grant_cache_ttl_ms,
    ))),
    sink: Arc::new(StdoutSink),
  });
  let restart_delay = Duration::from_millis(cfg.runtime.restart_delay_ms);

  let signal = Lifecycle::wait_for_shutdown();
  tokio::pin!(signal);

  loop {
    let mut session = tokio::spawn(run_session(
      cfg.clone(),
      shared.clone(),
      lifecycle.shutdown_signal(),
    ));
    lifecycle.transition(LifecycleState::Running);

    let outcome = tokio::select! {
      joined = &mut session => joined,
      _ = &mut signal => {
        lifecycle.request_shutdown();
        session.await
      }
    };

    match outcome {
      Ok(Ok(stats)) if lifecycle.shutdown_requested() => {
        log_stats(&stats);
        break;
      }
      Ok(Ok(stats)) => {
        log_stats(&stats);
        warn!("change source ended");
      }
      Ok(Err(e)) => error!(error = %e, "pipeline failed"),
      Err(e) => error!(error = %e, "pipeline task aborted"),
    }
    if lifecycle.shutdown_requested() {
      break;
    }

    lifecycle.transition(LifecycleState::Restarting);
    info!(
      delay_ms = restart_delay.as_millis() as u64,
      restarts = lifecycle.restarts(),
      "restarting pipeline"
    );
    tokio::select! {
      _ = tokio::time::sleep(restart_delay) => {}
      _ = &mut signal => {
        lifecycle.request_shutdown();
        break;
      }
    }
  }

  lifecycle.transition(LifecycleState::Stopped);
  info!("rowgate stopped");
  Ok(())
}

/// Connect, prepare the slot and catalogs, then run the worker until the
/// source fails or shutdown is requested.
async fn run_session(
  cfg: Arc<RowgateConfig>,
  shared: Arc<Shared>,
  shutdown: watch::Receiver<bool>,
) -> anyhow::Result<WorkerStats> {
  let subscriptions = SubscriptionSet::from_config(&cfg.registry);
  let registry_table = subscriptions.registry_table().clone();

  let poller_client = PgClient::connect(ConnectorConfig::from_rowgate_config(&cfg, "poller")).await?;
  // one connection per concurrent check
  let mut oracle_clients = Vec::with_capacity(cfg.evaluation.max_concurrent_checks);
  for _ in 0..cfg.evaluation.max_concurrent_checks {
    oracle_clients.push(PgClient::connect(ConnectorConfig::from_rowgate_config(&cfg, "oracle")).await?);
  }
  let registry_client =
    PgClient::connect(ConnectorConfig::from_rowgate_config(&cfg, "registry")).await?;

  let slot = SlotManager::new(&cfg.slot.name, cfg.slot.auto_create);
  slot.ensure_slot(&poller_client).await?;

  let tables =
    publication::decoded_tables(&poller_client, &cfg.publication.name, &registry_table).await?;
  shared.keys.clear();
  schema::load_primary_keys(&registry_client, &tables, &shared.keys).await?;
  shared.grants.clear();

  let oracle = Arc::new(PgAuthorizationOracle::new(oracle_clients, shared.grants.clone()));
  let aggregator = Aggregator::new(
    oracle,
    shared.keys.clone(),
    EvaluationLimits::from(&cfg.evaluation),
  )
  .with_metrics(shared.metrics.clone());

  let registry = Arc::new(PgSubscriptionSource::new(
    Arc::new(registry_client),
    &registry_table,
  ));
  let poller = SlotPoller::new(
    poller_client,
    slot,
    &tables,
    PollerOptions::from(&cfg.slot),
  );

  let worker = Worker::new(
    poller,
    registry,
    subscriptions,
    aggregator,
    shared.sink.clone(),
    shared.metrics.clone(),
  )
  .with_retry(RetryPolicy::from_config(&cfg.retry));

  Ok(worker.run(shutdown).await?)
}

fn log_stats(stats: &WorkerStats) {
  info!(
    received = stats.received,
    emitted = stats.emitted,
    skipped = stats.skipped,
    dropped = stats.dropped,
    "pipeline run finished"
  );
}

fn init_logging(default_level: &str) {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_thread_ids(true)
    .with_writer(std::io::stderr)
    .init();
}
