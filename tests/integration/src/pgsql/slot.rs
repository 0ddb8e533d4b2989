#![cfg(test)]
use super::schema::{connect, drop_slot, load_test_config};
use rowgate_pgsql::SlotManager;

#[tokio::test]
#[ignore]
async fn slot_is_created_once_and_advanced() {
  let cfg = load_test_config();
  let client = connect(&cfg, "slot-test").await;
  let slot_name = format!("{}_lifecycle", cfg.slot.name);
  drop_slot(client.inner(), &slot_name).await;

  let slot = SlotManager::new(&slot_name, true);
  let created = slot.ensure_slot(&client).await.unwrap();
  assert!(created.is_some());
  assert!(client.slot_exists(&slot_name).await.unwrap());

  // Already there: nothing created.
  assert_eq!(slot.ensure_slot(&client).await.unwrap(), None);

  let row = client
    .inner()
    .query_one("SELECT pg_current_wal_lsn()::text", &[])
    .await
    .unwrap();
  let current = shared::lsn::Lsn::from_pg_str(row.get::<_, &str>(0)).unwrap();
  slot.advance(&client, current).await.unwrap();

  drop_slot(client.inner(), &slot_name).await;
}

#[tokio::test]
#[ignore]
async fn missing_slot_without_auto_create_fails() {
  let cfg = load_test_config();
  let client = connect(&cfg, "slot-test").await;
  let slot_name = format!("{}_absent", cfg.slot.name);
  drop_slot(client.inner(), &slot_name).await;

  let slot = SlotManager::new(&slot_name, false);
  assert!(slot.ensure_slot(&client).await.is_err());
  assert!(!client.slot_exists(&slot_name).await.unwrap());
}
