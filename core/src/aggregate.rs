//! Per-event orchestration: one change plus its candidate subscriptions
//! become one evaluation output.

use serde::{Serialize, Serializer};
use shared::config::EvaluationConfig;
use shared::error::Result;
use shared::event::ChangeEvent;
use shared::subscription::{Principal, Subscription};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::authz::{AuthorizationOracle, EvaluationScope, Resolution, RowProbe};
use crate::catalog::KeyCatalog;
use crate::filter;
use crate::identity;
use crate::metrics::MetricsRegistry;
use crate::redact::{self, RedactedEvent};

/// A classified, user-visible failure reported in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvaluationError {
  #[error("Error 400: Bad Request, no primary key")]
  NoPrimaryKey,

  #[error("Error 401: Unauthorized")]
  Unauthorized,

  #[error("Error 413: Payload Too Large")]
  PayloadTooLarge,
}

impl EvaluationError {
  pub fn code(&self) -> u16 {
    match self {
      EvaluationError::NoPrimaryKey => 400,
      EvaluationError::Unauthorized => 401,
      EvaluationError::PayloadTooLarge => 413,
    }
  }
}

impl Serialize for EvaluationError {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// The record handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutput {
  pub wal: Option<RedactedEvent>,
  pub is_rls_enabled: Option<bool>,
  pub subscription_ids: Vec<Uuid>,
  pub errors: Vec<EvaluationError>,
}

impl EvaluationOutput {
  /// An output that carries no event, only the error and every
  /// candidate subscription.
  fn rejected(subscription_ids: Vec<Uuid>, error: EvaluationError) -> Self {
    Self {
      wal: None,
      is_rls_enabled: None,
      subscription_ids,
      errors: vec![error],
    }
  }
}

/// Limits applied while evaluating one event.
#[derive(Debug, Clone)]
pub struct EvaluationLimits {
  pub max_record_bytes: usize,
  pub oracle_timeout: Duration,
  pub max_concurrent_checks: usize,
}

impl Default for EvaluationLimits {
  fn default() -> Self {
    Self::from(&EvaluationConfig::default())
  }
}

impl From<&EvaluationConfig> for EvaluationLimits {
  fn from(cfg: &EvaluationConfig) -> Self {
    Self {
      max_record_bytes: cfg.max_record_bytes,
      oracle_timeout: Duration::from_millis(cfg.oracle_timeout_ms),
      max_concurrent_checks: cfg.max_concurrent_checks,
    }
  }
}

/// Drives identity, authorization, redaction, and filtering for each
/// event.
///
/// Stateless between events apart from the injected key catalog; the
/// worker owns ordering and retries.
pub struct Aggregator {
  oracle: Arc<dyn AuthorizationOracle>,
  keys: Arc<KeyCatalog>,
  limits: EvaluationLimits,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl Aggregator {
  pub fn new(
    oracle: Arc<dyn AuthorizationOracle>,
    keys: Arc<KeyCatalog>,
    limits: EvaluationLimits,
  ) -> Self {
    Self {
      oracle,
      keys,
      limits,
      metrics: None,
    }
  }

  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub fn limits(&self) -> &EvaluationLimits {
    &self.limits
  }

  /// Evaluate `event` against `subscriptions`.
  ///
  /// Only subscriptions on the event's table are considered. Returns
  /// `Ok(None)` when there are none. Oracle failures are returned as
  /// errors; 400/401/413 are part of the output.
  pub async fn process(
    &self,
    event: &ChangeEvent,
    subscriptions: &[Subscription],
  ) -> Result<Option<EvaluationOutput>> {
    let started = Instant::now();
    let output = self.evaluate(event, subscriptions).await?;

    if let Some(metrics) = &self.metrics {
      metrics
        .evaluation_latency
        .observe(started.elapsed().as_secs_f64());
      if let Some(out) = &output {
        for error in &out.errors {
          metrics
            .evaluation_errors
            .with_label_values(&[&error.code().to_string()])
            .inc();
        }
      }
    }
    Ok(output)
  }

  async fn evaluate(
    &self,
    event: &ChangeEvent,
    subscriptions: &[Subscription],
  ) -> Result<Option<EvaluationOutput>> {
    let candidates: Vec<&Subscription> = subscriptions
      .iter()
      .filter(|s| s.watches(&event.table))
      .collect();
    if candidates.is_empty() {
      return Ok(None);
    }
    let candidate_ids = dedup_ids(candidates.iter().map(|s| s.id));

    let primary_key = self.keys.key_for(&event.table, &event.primary_key);
    let identity = identity::identity(event, &primary_key);
    if identity.is_empty() && event.action.requires_identity() {
      warn!(
        table = %event.table,
        action = %event.action,
        lsn = %event.lsn(),
        "change has no primary key"
      );
      return Ok(Some(EvaluationOutput::rejected(
        candidate_ids,
        EvaluationError::NoPrimaryKey,
      )));
    }

    // Distinct principals in first-appearance order; `owner[i]` is the
    // principal of `candidates[i]`.
    let mut principals: Vec<&Principal> = Vec::new();
    let mut owner: Vec<usize> = Vec::with_capacity(candidates.len());
    for sub in &candidates {
      let fp = sub.principal.fingerprint();
      let idx = match principals.iter().position(|p| p.fingerprint() == fp) {
        Some(idx) => idx,
        None => {
          principals.push(&sub.principal);
          principals.len() - 1
        }
      };
      owner.push(idx);
    }

    let mut scope = EvaluationScope::new(
      self.oracle.as_ref(),
      &event.table,
      RowProbe::new(event.action, identity),
      self.limits.oracle_timeout,
    );
    if let Some(metrics) = &self.metrics {
      scope = scope.with_metrics(metrics);
    }
    let resolutions = scope
      .resolve_all(&principals, self.limits.max_concurrent_checks)
      .await?;

    let mut decisions = Vec::with_capacity(resolutions.len());
    for (principal, resolution) in principals.iter().zip(&resolutions) {
      match resolution {
        Resolution::Authorized(decision) => decisions.push(decision),
        Resolution::Unauthorized => {
          debug!(
            table = %event.table,
            principal = %principal,
            "unauthorized principal rejects event"
          );
          return Ok(Some(EvaluationOutput::rejected(
            candidate_ids,
            EvaluationError::Unauthorized,
          )));
        }
      }
    }

    let mut views: Vec<RedactedEvent> = decisions
      .iter()
      .map(|d| redact::project(event, &primary_key, &d.visible_columns))
      .collect();

    let mut matched: Vec<Uuid> = Vec::new();
    let mut matches_per_view = vec![0usize; views.len()];
    for (sub, &idx) in candidates.iter().zip(&owner) {
      let view = &views[idx];
      if decisions[idx].row_visible
        && filter::matches(&sub.filters, &view.columns, view.filter_source())
      {
        matches_per_view[idx] += 1;
        if !matched.contains(&sub.id) {
          matched.push(sub.id);
        }
      }
    }

    // Only the emitted view is size-checked, so 413 always describes the
    // record that goes out.
    let canonical = matches_per_view.iter().position(|&n| n > 0).unwrap_or(0);
    let rls_enabled = decisions[canonical].rls_enabled;
    let mut wal = views.swap_remove(canonical);
    let errors = match redact::enforce_size(&mut wal, self.limits.max_record_bytes) {
      Some(error) => {
        warn!(
          table = %event.table,
          limit = self.limits.max_record_bytes,
          "record exceeds size limit"
        );
        vec![error]
      }
      None => Vec::new(),
    };

    debug!(
      table = %event.table,
      action = %event.action,
      candidates = candidates.len(),
      principals = principals.len(),
      matched = matched.len(),
      "event evaluated"
    );

    Ok(Some(EvaluationOutput {
      wal: Some(wal),
      is_rls_enabled: Some(rls_enabled),
      subscription_ids: matched,
      errors,
    }))
  }
}

fn dedup_ids(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
  let mut out: Vec<Uuid> = Vec::new();
  for id in ids {
    if !out.contains(&id) {
      out.push(id);
    }
  }
  out
}
