#![cfg(test)]
use super::schema::{apply_fixtures, connect, drop_slot, load_test_config};
use rowgate_core::pipeline::ChangeSource;
use rowgate_pgsql::{PollerOptions, SlotManager, SlotPoller};
use serde_json::json;
use shared::event::{Action, TableId};
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn poller_delivers_committed_changes_with_commit_lsn() {
  let cfg = load_test_config();
  let setup = connect(&cfg, "poller-setup").await;
  apply_fixtures(setup.inner()).await;

  let slot_name = format!("{}_poller", cfg.slot.name);
  drop_slot(setup.inner(), &slot_name).await;

  let poller_client = connect(&cfg, "poller-test").await;
  let slot = SlotManager::new(&slot_name, true);
  slot.ensure_slot(&poller_client).await.unwrap();

  let note = TableId::new("public", "note");
  let mut options = PollerOptions::from(&cfg.slot);
  options.poll_interval = Duration::from_millis(10);
  let mut poller = SlotPoller::new(poller_client, slot, &[note.clone()], options);

  setup
    .inner()
    .batch_execute(&format!(
      "BEGIN;
       INSERT INTO public.note (user_id, body) VALUES ('{0}', 'first');
       INSERT INTO public.note (user_id, body) VALUES ('{0}', 'second');
       COMMIT;",
      Uuid::new_v4()
    ))
    .await
    .unwrap();

  let first = tokio::time::timeout(Duration::from_secs(10), poller.next())
    .await
    .expect("no change within 10s")
    .unwrap()
    .unwrap();
  let second = poller.next().await.unwrap().unwrap();

  // Both changes carry the transaction's commit LSN.
  assert_eq!(first.lsn, second.lsn);
  let event = first.decoded.as_ref().unwrap();
  assert_eq!(event.action, Action::Insert);
  assert_eq!(event.table, note);
  assert_eq!(event.primary_key, vec!["id"]);
  assert_eq!(event.record.get("body"), Some(&json!("first")));

  poller.ack(first.lsn).await.unwrap();
  poller.ack(second.lsn).await.unwrap();

  drop_slot(setup.inner(), &slot_name).await;
}
