#![cfg(test)]
use super::schema::{apply_fixtures, connect, load_test_config};
use rowgate_core::pipeline::SubscriptionSource;
use rowgate_pgsql::PgSubscriptionSource;
use shared::event::TableId;
use shared::subscription::{Filter, FilterOp};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn registry_rows_load_as_subscriptions() {
  let cfg = load_test_config();
  let client = connect(&cfg, "registry-test").await;
  apply_fixtures(client.inner()).await;

  let subscription_id = Uuid::new_v4();
  let row = client
    .inner()
    .query_one(
      "INSERT INTO realtime.subscription (subscription_id, entity, filters, claims)
       VALUES ($1, 'public.note'::regclass,
               ARRAY[ROW('body', 'eq', 'bbb')::realtime.user_defined_filter],
               jsonb_build_object('role', 'authenticated', 'sub', gen_random_uuid()))
       RETURNING id",
      &[&subscription_id],
    )
    .await
    .unwrap();
  let key: i64 = row.get(0);

  let source = PgSubscriptionSource::new(Arc::new(client), &cfg.registry.table_id());

  let one = source.load_one(key).await.unwrap().unwrap();
  assert_eq!(one.id, subscription_id);
  assert_eq!(one.entity, TableId::new("public", "note"));
  assert_eq!(one.principal.role, "authenticated");
  assert_eq!(one.filters, vec![Filter::new("body", FilterOp::Eq, "bbb")]);

  let all = source.load_all().await.unwrap();
  assert!(all.iter().any(|s| s.key == key));

  assert!(source.load_one(-1).await.unwrap().is_none());
}
