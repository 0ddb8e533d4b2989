use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rowgate_core::authz::{AuthorizationOracle, OracleVerdict, RowProbe};
use rowgate_core::{Aggregator, EvaluationLimits, KeyCatalog};
use serde_json::json;
use shared::error::Result;
use shared::event::{timestamp, Action, ChangeEvent, ColumnDesc, RowData, TableId};
use shared::subscription::{Filter, FilterOp, Principal, Subscription};
use std::sync::Arc;
use uuid::Uuid;

/// Grants every role the same columns without a round trip.
struct StaticOracle;

#[async_trait]
impl AuthorizationOracle for StaticOracle {
  async fn check(&self, _: &Principal, _: &TableId, _: &RowProbe) -> Result<OracleVerdict> {
    Ok(OracleVerdict {
      table_readable: true,
      rls_enabled: true,
      visible_columns: vec!["id".into(), "user_id".into(), "body".into()],
      row_visible: true,
    })
  }
}

fn event() -> ChangeEvent {
  ChangeEvent {
    lsn: 1,
    action: Action::Insert,
    table: TableId::new("public", "note"),
    columns: vec![
      ColumnDesc::new("id", "bigint"),
      ColumnDesc::new("user_id", "uuid"),
      ColumnDesc::new("body", "text"),
      ColumnDesc::new("dummy", "text"),
    ],
    primary_key: vec!["id".into()],
    record: RowData::new()
      .with("id", json!(1))
      .with("user_id", json!("8b6e1c7a-9f51-4c0e-b5a7-2d8e0e1f4a11"))
      .with("body", json!("bbb"))
      .with("dummy", json!("x")),
    old_record: None,
    commit_timestamp: timestamp::parse("2022-07-07 14:52:58+00").unwrap(),
  }
}

/// `n` subscriptions spread over `n / 4` principals.
fn subscriptions(n: usize) -> Vec<Subscription> {
  (0..n)
    .map(|i| {
      let principal = Principal::new("authenticated").with_claim("sub", json!(i / 4));
      Subscription::new(Uuid::from_u128(i as u128), TableId::new("public", "note"), principal)
        .with_key(i as i64)
        .with_filter(Filter::new("body", FilterOp::Eq, "bbb"))
    })
    .collect()
}

fn benchmark_process(c: &mut Criterion) {
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap();
  let aggregator = Aggregator::new(
    Arc::new(StaticOracle),
    Arc::new(KeyCatalog::new()),
    EvaluationLimits::default(),
  );
  let event = event();

  let mut group = c.benchmark_group("aggregate");
  group.throughput(Throughput::Elements(1));
  for n in [1usize, 16, 256] {
    let subs = subscriptions(n);
    group.bench_with_input(BenchmarkId::new("process", n), &subs, |b, subs| {
      b.iter(|| rt.block_on(aggregator.process(&event, subs)).unwrap())
    });
  }
  group.finish();
}

criterion_group!(benches, benchmark_process);
criterion_main!(benches);
