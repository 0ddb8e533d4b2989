#![cfg(test)]
use async_trait::async_trait;
use rowgate_core::authz::{AuthorizationOracle, OracleVerdict, RowProbe};
use rowgate_core::metrics::MetricsRegistry;
use rowgate_core::pipeline::{ChangeSource, SourceRecord, SubscriptionSource, Worker, WorkerStats};
use rowgate_core::retry::RetryPolicy;
use rowgate_core::sink::ChannelSink;
use rowgate_core::{Aggregator, EvaluationLimits, EvaluationOutput, KeyCatalog, SubscriptionSet};
use rowgate_pgsql::decoding::{self, Decoded};
use serde_json::Value;
use shared::error::Result;
use shared::event::TableId;
use shared::lsn::Lsn;
use shared::subscription::{Principal, Subscription};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub fn note() -> TableId {
  TableId::new("public", "note")
}

pub fn registry_table() -> TableId {
  TableId::new("realtime", "subscription")
}

/// wal2json lines keyed by LSN; lines that are not changes are skipped.
pub struct ScriptedSource {
  records: VecDeque<SourceRecord>,
  pub acked: Arc<Mutex<Vec<Lsn>>>,
}

impl ScriptedSource {
  pub fn new(lines: Vec<(u64, String)>) -> Self {
    let records = lines
      .into_iter()
      .filter_map(|(lsn, line)| {
        let lsn = Lsn::new(lsn);
        match decoding::decode(lsn, &line) {
          Ok(Decoded::Change(event)) => Some(SourceRecord::change(event)),
          Ok(_) => None,
          Err(e) => Some(SourceRecord {
            lsn,
            decoded: Err(e),
          }),
        }
      })
      .collect();
    Self {
      records,
      acked: Arc::new(Mutex::new(Vec::new())),
    }
  }
}

#[async_trait]
impl ChangeSource for ScriptedSource {
  async fn next(&mut self) -> Result<Option<SourceRecord>> {
    Ok(self.records.pop_front())
  }

  async fn ack(&mut self, lsn: Lsn) -> Result<()> {
    self.acked.lock().unwrap().push(lsn);
    Ok(())
  }
}

/// Registry rows held in memory. Rows added with [`MemoryRegistry::late`]
/// are invisible to `load_all`, as if inserted after startup.
#[derive(Default)]
pub struct MemoryRegistry {
  rows: Vec<Subscription>,
  late: Vec<Subscription>,
}

impl MemoryRegistry {
  pub fn new(rows: Vec<Subscription>) -> Self {
    Self {
      rows,
      late: Vec::new(),
    }
  }

  pub fn late(mut self, sub: Subscription) -> Self {
    self.late.push(sub);
    self
  }
}

#[async_trait]
impl SubscriptionSource for MemoryRegistry {
  async fn load_all(&self) -> Result<Vec<Subscription>> {
    Ok(self.rows.clone())
  }

  async fn load_one(&self, key: i64) -> Result<Option<Subscription>> {
    Ok(self.rows.iter().chain(&self.late).find(|s| s.key == key).cloned())
  }
}

/// What one role may see of one table.
#[derive(Debug, Clone)]
pub struct Policy {
  pub columns: Vec<String>,
  pub rls_enabled: bool,
  /// With RLS on, the `id` values whose rows the role can read.
  pub visible_ids: Vec<Value>,
}

impl Policy {
  pub fn columns(columns: &[&str]) -> Self {
    Self {
      columns: columns.iter().map(|c| c.to_string()).collect(),
      rls_enabled: false,
      visible_ids: Vec::new(),
    }
  }

  pub fn with_rls(mut self, visible_ids: Vec<Value>) -> Self {
    self.rls_enabled = true;
    self.visible_ids = visible_ids;
    self
  }
}

/// Authorization decided by a table of per-role policies. Roles without
/// a policy are denied.
#[derive(Default)]
pub struct PolicyOracle {
  policies: HashMap<(String, TableId), Policy>,
}

impl PolicyOracle {
  pub fn grant(mut self, role: &str, table: TableId, policy: Policy) -> Self {
    self.policies.insert((role.to_string(), table), policy);
    self
  }
}

#[async_trait]
impl AuthorizationOracle for PolicyOracle {
  async fn check(
    &self,
    principal: &Principal,
    entity: &TableId,
    probe: &RowProbe,
  ) -> Result<OracleVerdict> {
    let Some(policy) = self.policies.get(&(principal.role.clone(), entity.clone())) else {
      return Ok(OracleVerdict::denied());
    };
    let row_visible = if policy.rls_enabled && probe.needs_row_check() {
      probe
        .identity
        .get("id")
        .map(|id| policy.visible_ids.contains(id))
        .unwrap_or(false)
    } else {
      true
    };
    Ok(OracleVerdict {
      table_readable: true,
      rls_enabled: policy.rls_enabled,
      visible_columns: policy.columns.clone(),
      row_visible,
    })
  }
}

pub struct Run {
  pub stats: WorkerStats,
  pub outputs: Vec<EvaluationOutput>,
  pub acked: Vec<Lsn>,
}

/// Drive a worker over `source` until it is exhausted.
pub async fn run_pipeline(
  source: ScriptedSource,
  registry: Arc<MemoryRegistry>,
  oracle: PolicyOracle,
  max_record_bytes: usize,
) -> Run {
  let acked = source.acked.clone();
  let metrics = Arc::new(MetricsRegistry::new().unwrap());
  let limits = EvaluationLimits {
    max_record_bytes,
    oracle_timeout: Duration::from_secs(1),
    max_concurrent_checks: 4,
  };
  let aggregator = Aggregator::new(Arc::new(oracle), Arc::new(KeyCatalog::new()), limits)
    .with_metrics(metrics.clone());
  let (sink, mut rx) = ChannelSink::new(64);
  let worker = Worker::new(
    source,
    registry,
    SubscriptionSet::new(registry_table()),
    aggregator,
    Arc::new(sink),
    metrics,
  )
  .with_retry(RetryPolicy::none());

  let (_tx, shutdown) = watch::channel(false);
  let stats = worker.run(shutdown).await.unwrap();

  let mut outputs = Vec::new();
  while let Ok(output) = rx.try_recv() {
    outputs.push(output);
  }
  let acked = acked.lock().unwrap().clone();
  Run {
    stats,
    outputs,
    acked,
  }
}
