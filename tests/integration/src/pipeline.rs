#![cfg(test)]
use crate::fixtures::{note, run_pipeline, MemoryRegistry, Policy, PolicyOracle, ScriptedSource};
use rowgate_core::EvaluationError;
use serde_json::{json, Value};
use shared::event::Action;
use shared::lsn::Lsn;
use shared::subscription::{Filter, FilterOp, Principal, Subscription};
use std::sync::Arc;
use uuid::Uuid;

const TS: &str = "2022-07-07 14:52:58.092695+00";

fn note_columns() -> Value {
  json!([
    {"name": "id", "type": "bigint", "typeoid": 20},
    {"name": "user_id", "type": "uuid", "typeoid": 2950},
    {"name": "body", "type": "text", "typeoid": 25},
    {"name": "dummy", "type": "text", "typeoid": 25},
  ])
}

fn with_values(shape: Value, values: &[Value]) -> Value {
  let mut columns = shape;
  if let Some(cols) = columns.as_array_mut() {
    for (col, value) in cols.iter_mut().zip(values) {
      col["value"] = value.clone();
    }
  }
  columns
}

fn insert_note(id: i64, body: &str) -> String {
  json!({
    "action": "I",
    "timestamp": TS,
    "schema": "public",
    "table": "note",
    "columns": with_values(note_columns(), &[json!(id), json!("8b6e1c7a-9f51-4c0e-b5a7-2d8e0e1f4a11"), json!(body), json!("secret")]),
    "pk": [{"name": "id", "type": "bigint", "typeoid": 20}],
  })
  .to_string()
}

fn delete_note(id: i64) -> String {
  json!({
    "action": "D",
    "timestamp": TS,
    "schema": "public",
    "table": "note",
    "identity": [{"name": "id", "type": "bigint", "typeoid": 20, "value": id}],
    "pk": [{"name": "id", "type": "bigint", "typeoid": 20}],
  })
  .to_string()
}

fn insert_registry_row(id: i64) -> String {
  json!({
    "action": "I",
    "timestamp": TS,
    "schema": "realtime",
    "table": "subscription",
    "columns": [
      {"name": "id", "type": "bigint", "typeoid": 20, "value": id},
      {"name": "subscription_id", "type": "uuid", "typeoid": 2950, "value": Uuid::from_u128(id as u128).to_string()},
    ],
    "pk": [{"name": "id", "type": "bigint", "typeoid": 20}],
  })
  .to_string()
}

fn authenticated() -> Principal {
  Principal::new("authenticated").with_claim("sub", json!("8b6e1c7a-9f51-4c0e-b5a7-2d8e0e1f4a11"))
}

fn full_access() -> PolicyOracle {
  PolicyOracle::default().grant(
    "authenticated",
    note(),
    Policy::columns(&["id", "user_id", "body", "dummy"]),
  )
}

fn sub(n: u128) -> Subscription {
  Subscription::new(Uuid::from_u128(n), note(), authenticated()).with_key(n as i64)
}

#[tokio::test]
async fn filters_select_matching_subscriptions() {
  let registry = Arc::new(MemoryRegistry::new(vec![
    sub(1).with_filter(Filter::new("body", FilterOp::Eq, "bbb")),
    sub(2).with_filter(Filter::new("body", FilterOp::Lt, "aa")),
    sub(3).with_filter(Filter::new("body", FilterOp::Gte, "bbb")),
  ]));
  let source = ScriptedSource::new(vec![(100, insert_note(1, "bbb"))]);

  let run = run_pipeline(source, registry, full_access(), 1024 * 1024).await;

  assert_eq!(run.outputs.len(), 1);
  let output = &run.outputs[0];
  assert_eq!(
    output.subscription_ids,
    vec![Uuid::from_u128(1), Uuid::from_u128(3)]
  );
  assert!(output.errors.is_empty());
  assert_eq!(output.is_rls_enabled, Some(false));
  let wal = output.wal.as_ref().unwrap();
  assert_eq!(wal.action, Action::Insert);
  assert_eq!(wal.record.get("body"), Some(&json!("bbb")));
  assert_eq!(run.acked, vec![Lsn::new(100)]);
}

#[tokio::test]
async fn ungranted_columns_never_reach_the_output() {
  let oracle = PolicyOracle::default().grant(
    "authenticated",
    note(),
    Policy::columns(&["id", "user_id", "body"]),
  );
  let registry = Arc::new(MemoryRegistry::new(vec![sub(1)]));
  let source = ScriptedSource::new(vec![(100, insert_note(1, "bbb"))]);

  let run = run_pipeline(source, registry, oracle, 1024 * 1024).await;

  let output = &run.outputs[0];
  let wal = output.wal.as_ref().unwrap();
  let names: Vec<&str> = wal.columns.iter().map(|c| c.name.as_str()).collect();
  assert_eq!(names, vec!["id", "user_id", "body"]);
  assert!(!wal.record.contains("dummy"));

  let json = serde_json::to_string(output).unwrap();
  assert!(!json.contains("dummy"));
  assert!(!json.contains("secret"));
}

#[tokio::test]
async fn one_unauthorized_principal_rejects_the_event() {
  let registry = Arc::new(MemoryRegistry::new(vec![
    sub(1),
    Subscription::new(Uuid::from_u128(2), note(), Principal::new("anon")).with_key(2),
  ]));
  let source = ScriptedSource::new(vec![(100, insert_note(1, "bbb"))]);

  let run = run_pipeline(source, registry, full_access(), 1024 * 1024).await;

  let output = &run.outputs[0];
  assert!(output.wal.is_none());
  assert_eq!(output.is_rls_enabled, None);
  assert_eq!(output.errors, vec![EvaluationError::Unauthorized]);
  assert_eq!(
    output.subscription_ids,
    vec![Uuid::from_u128(1), Uuid::from_u128(2)]
  );

  let json: Value = serde_json::to_value(output).unwrap();
  assert_eq!(json["errors"], json!(["Error 401: Unauthorized"]));
}

#[tokio::test]
async fn row_level_security_hides_other_rows() {
  let oracle = PolicyOracle::default().grant(
    "authenticated",
    note(),
    Policy::columns(&["id", "body"]).with_rls(vec![json!(1)]),
  );
  let registry = Arc::new(MemoryRegistry::new(vec![sub(1)]));
  let source = ScriptedSource::new(vec![
    (100, insert_note(1, "mine")),
    (200, insert_note(2, "theirs")),
  ]);

  let run = run_pipeline(source, registry, oracle, 1024 * 1024).await;

  assert_eq!(run.outputs.len(), 2);
  assert_eq!(run.outputs[0].subscription_ids, vec![Uuid::from_u128(1)]);
  assert_eq!(run.outputs[0].is_rls_enabled, Some(true));
  assert!(run.outputs[1].subscription_ids.is_empty());
  assert!(run.outputs[1].errors.is_empty());
}

#[tokio::test]
async fn delete_without_key_is_a_bad_request() {
  let line = json!({
    "action": "D",
    "timestamp": TS,
    "schema": "public",
    "table": "note",
    "identity": [{"name": "body", "type": "text", "value": "bbb"}],
  })
  .to_string();
  let registry = Arc::new(MemoryRegistry::new(vec![sub(1)]));
  let source = ScriptedSource::new(vec![(100, line)]);

  let run = run_pipeline(source, registry, full_access(), 1024 * 1024).await;

  let output = &run.outputs[0];
  assert!(output.wal.is_none());
  assert_eq!(output.errors, vec![EvaluationError::NoPrimaryKey]);
  assert_eq!(output.subscription_ids, vec![Uuid::from_u128(1)]);
}

#[tokio::test]
async fn delete_carries_the_old_key() {
  let registry = Arc::new(MemoryRegistry::new(vec![sub(1)]));
  let source = ScriptedSource::new(vec![(100, delete_note(7))]);

  let run = run_pipeline(source, registry, full_access(), 1024 * 1024).await;

  let wal = run.outputs[0].wal.as_ref().unwrap();
  assert_eq!(wal.action, Action::Delete);
  assert!(wal.record.is_empty());
  assert_eq!(wal.old_record.as_ref().unwrap().get("id"), Some(&json!(7)));
  assert_eq!(run.outputs[0].subscription_ids, vec![Uuid::from_u128(1)]);
}

#[tokio::test]
async fn oversized_records_are_emptied_but_still_delivered() {
  let registry = Arc::new(MemoryRegistry::new(vec![
    sub(1).with_filter(Filter::new("body", FilterOp::Eq, "x".repeat(400))),
  ]));
  let source = ScriptedSource::new(vec![(100, insert_note(1, &"x".repeat(400)))]);

  let run = run_pipeline(source, registry, full_access(), 256).await;

  let output = &run.outputs[0];
  assert_eq!(output.errors, vec![EvaluationError::PayloadTooLarge]);
  assert_eq!(output.subscription_ids, vec![Uuid::from_u128(1)]);
  let wal = output.wal.as_ref().unwrap();
  assert!(wal.record.is_empty());
  assert_eq!(wal.columns.len(), 4);
}

#[tokio::test]
async fn registry_inserts_take_effect_for_later_changes() {
  let registry = Arc::new(MemoryRegistry::new(Vec::new()).late(sub(5)));
  let source = ScriptedSource::new(vec![
    (50, insert_note(1, "before")),
    (100, insert_registry_row(5)),
    (200, insert_note(2, "after")),
  ]);
  let run = run_pipeline(source, registry, full_access(), 1024 * 1024).await;

  assert_eq!(run.outputs.len(), 1);
  assert_eq!(run.outputs[0].subscription_ids, vec![Uuid::from_u128(5)]);
  let wal = run.outputs[0].wal.as_ref().unwrap();
  assert_eq!(wal.record.get("body"), Some(&json!("after")));
  assert_eq!(run.stats.skipped, 2);
  assert_eq!(
    run.acked,
    vec![Lsn::new(50), Lsn::new(100), Lsn::new(200)]
  );
}

#[tokio::test]
async fn unwatched_tables_produce_nothing() {
  let registry = Arc::new(MemoryRegistry::new(vec![sub(1)]));
  let line = insert_note(1, "bbb").replace("\"note\"", "\"todo\"");
  let source = ScriptedSource::new(vec![(100, line)]);

  let run = run_pipeline(source, registry, full_access(), 1024 * 1024).await;

  assert!(run.outputs.is_empty());
  assert_eq!(run.stats.skipped, 1);
  assert_eq!(run.acked, vec![Lsn::new(100)]);
}

#[tokio::test]
async fn malformed_lines_are_dropped_and_acknowledged() {
  let registry = Arc::new(MemoryRegistry::new(vec![sub(1)]));
  let source = ScriptedSource::new(vec![
    (100, "{\"action\":\"I\",\"schema\":\"public\"".to_string()),
    (200, insert_note(1, "bbb")),
  ]);

  let run = run_pipeline(source, registry, full_access(), 1024 * 1024).await;

  assert_eq!(run.stats.dropped, 1);
  assert_eq!(run.stats.emitted, 1);
  assert_eq!(run.acked, vec![Lsn::new(100), Lsn::new(200)]);
}

