use async_trait::async_trait;
use rowgate_core::authz::{AuthorizationOracle, OracleVerdict, RowProbe};
use shared::error::{Result, RowgateError};
use shared::event::TableId;
use shared::subscription::Principal;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tracing::{debug, warn};

use super::grants::{GrantCache, TableGrant};
use super::pool::ConnectionPool;
use crate::connector::{quote_ident, quote_table, PgClient};

/// Asks PostgreSQL itself what a principal may see.
///
/// Table grants come from the privilege functions and are cached in the
/// [`GrantCache`]. Row visibility is checked by running an `EXISTS` query
/// on the changed row as the principal's role, with its claims set as
/// `request.jwt.claims`, inside a transaction that is always rolled back.
///
/// Each check holds one pooled connection for its duration, so the pool
/// size is the number of checks that run in parallel.
pub struct PgAuthorizationOracle {
  clients: ConnectionPool<PgClient>,
  grants: Arc<GrantCache>,
}

impl PgAuthorizationOracle {
  pub fn new(clients: Vec<PgClient>, grants: Arc<GrantCache>) -> Self {
    Self {
      clients: ConnectionPool::new(clients),
      grants,
    }
  }

  async fn load_grant(
    &self,
    client: &PgClient,
    role: &str,
    entity: &TableId,
  ) -> std::result::Result<TableGrant, tokio_postgres::Error> {
    let table = client
      .inner()
      .query_opt(
        "SELECT c.oid, c.relrowsecurity, has_any_column_privilege($1::text::name, c.oid, 'SELECT')
                 FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace
                 WHERE n.nspname = $2 AND c.relname = $3",
        &[&role, &entity.schema, &entity.table],
      )
      .await?;

    let Some(table) = table else {
      debug!(table = %entity, "table not found; treating as unreadable");
      return Ok(TableGrant {
        readable: false,
        rls_enabled: false,
        columns: Vec::new(),
      });
    };
    let oid: u32 = table.get(0);
    let rls_enabled: bool = table.get(1);
    let readable: bool = table.get(2);
    if !readable {
      return Ok(TableGrant {
        readable,
        rls_enabled,
        columns: Vec::new(),
      });
    }

    let rows = client
      .inner()
      .query(
        "SELECT a.attname::text FROM pg_attribute a
                 WHERE a.attrelid = $1 AND a.attnum > 0 AND NOT a.attisdropped
                   AND has_column_privilege($2::text::name, $1, a.attnum, 'SELECT')
                 ORDER BY a.attnum",
        &[&oid, &role],
      )
      .await?;

    Ok(TableGrant {
      readable,
      rls_enabled,
      columns: rows.iter().map(|r| r.get(0)).collect(),
    })
  }

  async fn row_visible(
    &self,
    client: &mut PgClient,
    principal: &Principal,
    entity: &TableId,
    probe: &RowProbe,
  ) -> std::result::Result<bool, tokio_postgres::Error> {
    let key: Vec<(&str, String)> = probe
      .identity
      .names()
      .filter_map(|name| probe.identity.get_text(name).map(|v| (name, v.into_owned())))
      .collect();
    let predicate = key
      .iter()
      .enumerate()
      .map(|(i, (name, _))| format!("{}::text = ${}", quote_ident(name), i + 1))
      .collect::<Vec<_>>()
      .join(" AND ");
    let query = format!(
      "SELECT EXISTS (SELECT 1 FROM {} WHERE {})",
      quote_table(entity),
      predicate
    );
    let params: Vec<&(dyn ToSql + Sync)> = key
      .iter()
      .map(|(_, value)| value as &(dyn ToSql + Sync))
      .collect();
    let claims = principal.claims_json().to_string();

    let tx = client.inner_mut().transaction().await?;
    tx.execute(
      "SELECT set_config('role', $1, true), set_config('request.jwt.claims', $2, true)",
      &[&principal.role, &claims],
    )
    .await?;
    let visible: bool = tx.query_one(query.as_str(), &params).await?.get(0);
    tx.rollback().await?;
    Ok(visible)
  }

  fn unavailable(principal: &Principal, e: tokio_postgres::Error) -> RowgateError {
    if e.is_closed() {
      return Self::disconnected(principal);
    }
    RowgateError::OracleUnavailable {
      principal: principal.to_string(),
      source: Box::new(e),
    }
  }

  fn disconnected(principal: &Principal) -> RowgateError {
    warn!(principal = %principal, "oracle connection closed");
    RowgateError::OracleDisconnected {
      principal: principal.to_string(),
    }
  }
}

#[async_trait]
impl AuthorizationOracle for PgAuthorizationOracle {
  async fn check(
    &self,
    principal: &Principal,
    entity: &TableId,
    probe: &RowProbe,
  ) -> Result<OracleVerdict> {
    let Some(mut client) = self.clients.checkout().await else {
      return Err(Self::disconnected(principal));
    };
    if client.is_closed() {
      return Err(Self::disconnected(principal));
    }

    let grant = match self.grants.get(&principal.role, entity) {
      Some(grant) => grant,
      None => {
        let grant = self
          .load_grant(&client, &principal.role, entity)
          .await
          .map_err(|e| Self::unavailable(principal, e))?;
        self.grants.insert(&principal.role, entity, grant.clone());
        grant
      }
    };

    if !grant.readable || grant.columns.is_empty() {
      return Ok(OracleVerdict::denied());
    }

    let row_visible = if grant.rls_enabled && probe.needs_row_check() {
      self
        .row_visible(&mut client, principal, entity, probe)
        .await
        .map_err(|e| Self::unavailable(principal, e))?
    } else {
      true
    };

    debug!(
      principal = %principal,
      table = %entity,
      columns = grant.columns.len(),
      rls = grant.rls_enabled,
      row_visible,
      "authorization checked"
    );

    Ok(OracleVerdict {
      table_readable: true,
      rls_enabled: grant.rls_enabled,
      visible_columns: grant.columns,
      row_visible,
    })
  }
}
