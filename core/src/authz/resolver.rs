use futures::stream::{self, StreamExt, TryStreamExt};
use shared::error::{Result, RowgateError};
use shared::event::TableId;
use shared::subscription::Principal;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::oracle::{AuthorizationOracle, RowProbe};
use crate::metrics::MetricsRegistry;

/// What one principal may see of the event under evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
  pub row_visible: bool,
  pub rls_enabled: bool,
  /// Selectable columns, in grant order. Never empty.
  pub visible_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Authorized(AuthorizationDecision),
  /// No read access to the table at all.
  Unauthorized,
}

impl Resolution {
  pub fn decision(&self) -> Option<&AuthorizationDecision> {
    match self {
      Resolution::Authorized(d) => Some(d),
      Resolution::Unauthorized => None,
    }
  }
}

/// Authorization state for the evaluation of a single event.
///
/// Decisions are memoized per principal for the lifetime of the scope and
/// discarded with it; nothing is shared between events.
pub struct EvaluationScope<'a> {
  oracle: &'a dyn AuthorizationOracle,
  entity: &'a TableId,
  probe: RowProbe,
  timeout: Duration,
  metrics: Option<&'a MetricsRegistry>,
  memo: HashMap<String, Resolution>,
}

impl<'a> EvaluationScope<'a> {
  pub fn new(
    oracle: &'a dyn AuthorizationOracle,
    entity: &'a TableId,
    probe: RowProbe,
    timeout: Duration,
  ) -> Self {
    Self {
      oracle,
      entity,
      probe,
      timeout,
      metrics: None,
      memo: HashMap::new(),
    }
  }

  pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Resolve one principal, asking the oracle only on first sight.
  pub async fn resolve(&mut self, principal: &Principal) -> Result<Resolution> {
    let key = self.memo_key(principal);
    if let Some(hit) = self.memo.get(&key) {
      return Ok(hit.clone());
    }
    let resolution = self.ask(principal).await?;
    self.memo.insert(key, resolution.clone());
    Ok(resolution)
  }

  /// Resolve every principal, returning results in input order.
  ///
  /// Principals not yet memoized are checked concurrently, at most
  /// `max_concurrent` at a time. The first failure aborts the whole call.
  pub async fn resolve_all(
    &mut self,
    principals: &[&Principal],
    max_concurrent: usize,
  ) -> Result<Vec<Resolution>> {
    let mut pending: Vec<(String, &Principal)> = Vec::new();
    for &principal in principals {
      let key = self.memo_key(principal);
      if !self.memo.contains_key(&key) && !pending.iter().any(|(k, _)| *k == key) {
        pending.push((key, principal));
      }
    }

    let this = &*self;
    let asks: Vec<_> = pending
      .into_iter()
      .map(|(key, principal)| async move { this.ask(principal).await.map(|r| (key, r)) })
      .collect();
    let resolved: Vec<(String, Resolution)> = stream::iter(asks)
      .buffered(max_concurrent.max(1))
      .try_collect()
      .await?;
    self.memo.extend(resolved);

    principals
      .iter()
      .map(|principal| {
        self
          .memo
          .get(&self.memo_key(principal))
          .cloned()
          .ok_or_else(|| {
            RowgateError::from(anyhow::anyhow!("principal '{}' missing from scope", principal))
          })
      })
      .collect()
  }

  /// Number of distinct principals resolved so far.
  pub fn resolved(&self) -> usize {
    self.memo.len()
  }

  fn memo_key(&self, principal: &Principal) -> String {
    format!("{}|{}", self.entity, principal.fingerprint())
  }

  async fn ask(&self, principal: &Principal) -> Result<Resolution> {
    let call = self.oracle.check(principal, self.entity, &self.probe);
    let verdict = match tokio::time::timeout(self.timeout, call).await {
      Ok(Ok(verdict)) => {
        self.record("ok");
        verdict
      }
      Ok(Err(e)) => {
        self.record("error");
        return Err(e);
      }
      Err(_) => {
        self.record("timeout");
        return Err(RowgateError::OracleTimeout {
          principal: principal.to_string(),
          timeout_ms: self.timeout.as_millis() as u64,
        });
      }
    };

    if !verdict.table_readable || verdict.visible_columns.is_empty() {
      debug!(
        principal = %principal,
        table = %self.entity,
        "principal cannot read table"
      );
      return Ok(Resolution::Unauthorized);
    }

    Ok(Resolution::Authorized(AuthorizationDecision {
      row_visible: verdict.row_visible,
      rls_enabled: verdict.rls_enabled,
      visible_columns: verdict.visible_columns,
    }))
  }

  fn record(&self, outcome: &str) {
    if let Some(metrics) = self.metrics {
      metrics.oracle_calls.with_label_values(&[outcome]).inc();
    }
  }
}
