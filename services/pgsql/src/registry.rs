//! Subscription registry loader.

use async_trait::async_trait;
use rowgate_core::pipeline::SubscriptionSource;
use shared::error::{Result, RowgateError};
use shared::event::TableId;
use shared::subscription::{Filter, Principal, Subscription};
use std::sync::Arc;
use tokio_postgres::Row;
use tracing::{info, warn};
use uuid::Uuid;

use crate::connector::{quote_table, PgClient};

/// Reads subscriptions from the registry table (`realtime.subscription`
/// by default).
///
/// Expected columns: `id bigint`, `subscription_id uuid`, `entity regclass`,
/// `filters` (array of `(column_name, op, value)`), `claims jsonb`.
pub struct PgSubscriptionSource {
  client: Arc<PgClient>,
  select: String,
}

impl PgSubscriptionSource {
  pub fn new(client: Arc<PgClient>, registry: &TableId) -> Self {
    let select = format!(
      "SELECT s.id, s.subscription_id, n.nspname::text, c.relname::text,
              s.claims::text, COALESCE(to_jsonb(s.filters), '[]'::jsonb)::text
         FROM {} s
         JOIN pg_class c ON c.oid = s.entity
         JOIN pg_namespace n ON n.oid = c.relnamespace",
      quote_table(registry)
    );
    Self { client, select }
  }

  fn load_failed(e: tokio_postgres::Error) -> RowgateError {
    RowgateError::SubscriptionLoadFailed(Box::new(e))
  }
}

/// Turn one registry row into a subscription.
fn parse_row(row: &Row) -> Result<Subscription> {
  let key: i64 = row.get(0);
  let id: Uuid = row.get(1);
  let schema: String = row.get(2);
  let table: String = row.get(3);
  let claims: String = row.get(4);
  let filters: String = row.get(5);
  parse_parts(key, id, TableId::new(schema, table), &claims, &filters)
}

fn parse_parts(
  key: i64,
  id: Uuid,
  entity: TableId,
  claims: &str,
  filters: &str,
) -> Result<Subscription> {
  let invalid = |reason: String| RowgateError::InvalidSubscription {
    key: key.to_string(),
    reason,
  };

  let claims: serde_json::Value =
    serde_json::from_str(claims).map_err(|e| invalid(format!("claims: {}", e)))?;
  let principal =
    Principal::from_claims(&claims).ok_or_else(|| invalid("claims carry no role".to_string()))?;
  let filters: Vec<Filter> =
    serde_json::from_str(filters).map_err(|e| invalid(format!("filters: {}", e)))?;

  Ok(Subscription {
    id,
    key,
    entity,
    principal,
    filters,
  })
}

#[async_trait]
impl SubscriptionSource for PgSubscriptionSource {
  async fn load_all(&self) -> Result<Vec<Subscription>> {
    let query = format!("{} ORDER BY s.id", self.select);
    let rows = self
      .client
      .inner()
      .query(query.as_str(), &[])
      .await
      .map_err(Self::load_failed)?;

    let mut subscriptions = Vec::with_capacity(rows.len());
    for row in &rows {
      match parse_row(row) {
        Ok(sub) => subscriptions.push(sub),
        Err(e) => warn!(error = %e, "skipping subscription"),
      }
    }
    info!(count = subscriptions.len(), rows = rows.len(), "subscription registry loaded");
    Ok(subscriptions)
  }

  async fn load_one(&self, key: i64) -> Result<Option<Subscription>> {
    let query = format!("{} WHERE s.id = $1", self.select);
    let row = self
      .client
      .inner()
      .query_opt(query.as_str(), &[&key])
      .await
      .map_err(Self::load_failed)?;

    match row.as_ref().map(parse_row) {
      Some(Ok(sub)) => Ok(Some(sub)),
      Some(Err(e)) => {
        warn!(key, error = %e, "registry row does not yield a subscription");
        Ok(None)
      }
      None => Ok(None),
    }
  }
}
