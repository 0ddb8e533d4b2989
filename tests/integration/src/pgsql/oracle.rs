#![cfg(test)]
use super::schema::{apply_fixtures, connect, load_test_config};
use rowgate_core::authz::{AuthorizationOracle, RowProbe};
use rowgate_pgsql::{GrantCache, PgAuthorizationOracle};
use serde_json::json;
use shared::error::RowgateError;
use shared::event::{Action, RowData, TableId};
use shared::subscription::Principal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn grants_and_policies_decide_visibility() {
  let cfg = load_test_config();
  let setup = connect(&cfg, "oracle-setup").await;
  apply_fixtures(setup.inner()).await;

  let owner = Uuid::new_v4();
  let row = setup
    .inner()
    .query_one(
      "INSERT INTO public.note (user_id, body, dummy) VALUES ($1, 'bbb', 'x') RETURNING id",
      &[&owner],
    )
    .await
    .unwrap();
  let id: i64 = row.get(0);

  let grants = Arc::new(GrantCache::new(Duration::from_secs(60)));
  let oracle = PgAuthorizationOracle::new(
    vec![
      connect(&cfg, "oracle-test").await,
      connect(&cfg, "oracle-test").await,
    ],
    grants.clone(),
  );
  let note = TableId::new("public", "note");
  let probe = RowProbe::new(Action::Insert, RowData::new().with("id", json!(id)));

  let owner_principal = Principal::new("authenticated").with_claim("sub", json!(owner.to_string()));
  let verdict = oracle.check(&owner_principal, &note, &probe).await.unwrap();
  assert!(verdict.table_readable);
  assert!(verdict.rls_enabled);
  assert!(verdict.row_visible);
  assert_eq!(verdict.visible_columns, vec!["id", "user_id", "body"]);
  assert_eq!(grants.len(), 1);

  let stranger = Principal::new("authenticated").with_claim("sub", json!(Uuid::new_v4().to_string()));
  let verdict = oracle.check(&stranger, &note, &probe).await.unwrap();
  assert!(verdict.table_readable);
  assert!(!verdict.row_visible);

  let anon = oracle
    .check(&Principal::new("anon"), &note, &probe)
    .await
    .unwrap();
  assert!(!anon.table_readable);
  assert!(anon.visible_columns.is_empty());
}

#[tokio::test]
#[ignore]
async fn terminated_session_is_reported_as_disconnected() {
  let cfg = load_test_config();
  let setup = connect(&cfg, "oracle-setup").await;
  apply_fixtures(setup.inner()).await;

  let victim = connect(&cfg, "oracle-terminated").await;
  let app_name = victim.config().application_name.clone();
  let oracle = PgAuthorizationOracle::new(
    vec![victim],
    Arc::new(GrantCache::new(Duration::from_secs(60))),
  );

  setup
    .inner()
    .execute(
      "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE application_name = $1",
      &[&app_name],
    )
    .await
    .unwrap();
  tokio::time::sleep(Duration::from_millis(200)).await;

  let probe = RowProbe::new(Action::Insert, RowData::new().with("id", json!(1)));
  let err = oracle
    .check(
      &Principal::new("authenticated"),
      &TableId::new("public", "note"),
      &probe,
    )
    .await
    .unwrap_err();
  assert!(matches!(err, RowgateError::OracleDisconnected { .. }));
  assert!(!err.is_retryable());
}
