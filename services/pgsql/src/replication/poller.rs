use async_trait::async_trait;
use rowgate_core::pipeline::{ChangeSource, SourceRecord};
use shared::config::SlotConfig;
use shared::error::{Result, RowgateError};
use shared::event::{ChangeEvent, TableId};
use shared::lsn::Lsn;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

use super::ack::AckManager;
use super::slot::SlotManager;
use crate::connector::PgClient;
use crate::decoding::{self, Decoded};
use crate::publication;

/// Poller settings, usually built from [`SlotConfig`].
#[derive(Debug, Clone)]
pub struct PollerOptions {
  pub batch_size: i32,
  pub poll_interval: Duration,
  pub ack_min_interval: Duration,
  pub ack_max_interval: Duration,
}

impl From<&SlotConfig> for PollerOptions {
  fn from(cfg: &SlotConfig) -> Self {
    Self {
      batch_size: cfg.poll_batch_size,
      poll_interval: Duration::from_millis(cfg.poll_interval_ms),
      ack_min_interval: Duration::from_millis(cfg.ack_min_interval_ms),
      ack_max_interval: Duration::from_millis(cfg.ack_max_interval_ms),
    }
  }
}

/// wal2json options passed to `pg_logical_slot_peek_changes`.
pub fn wal2json_options(tables: &[TableId]) -> Vec<String> {
  let mut options: Vec<String> = [
    ("format-version", "2"),
    ("include-pk", "1"),
    ("include-type-oids", "1"),
    ("include-timestamp", "1"),
    ("include-transaction", "1"),
    ("actions", "insert,update,delete,truncate"),
  ]
  .iter()
  .flat_map(|(k, v)| [k.to_string(), v.to_string()])
  .collect();
  if let Some(add_tables) = publication::add_tables_option(tables) {
    options.push("add-tables".to_string());
    options.push(add_tables);
  }
  options
}

/// Transactions cut out of one peek, in commit order.
#[derive(Debug)]
struct PeekedTransaction {
  commit_lsn: Lsn,
  records: Vec<SourceRecord>,
}

/// Group peeked `(lsn, data)` rows into transactions.
///
/// Only transactions committed after `after` are returned. Each change is
/// tagged with its transaction's commit LSN, which is where the slot may
/// be advanced to once the whole transaction is processed.
fn split_transactions(rows: Vec<(Lsn, String)>, after: Lsn) -> Vec<PeekedTransaction> {
  let mut done = Vec::new();
  let mut pending: Vec<Result<ChangeEvent>> = Vec::new();

  for (lsn, data) in rows {
    match decoding::decode(lsn, &data) {
      Ok(Decoded::Begin) => pending.clear(),
      Ok(Decoded::Commit) => {
        let changes = std::mem::take(&mut pending);
        if !lsn.is_ahead_of(after) {
          continue;
        }
        let records = changes
          .into_iter()
          .map(|decoded| SourceRecord { lsn, decoded })
          .collect();
        done.push(PeekedTransaction {
          commit_lsn: lsn,
          records,
        });
      }
      Ok(Decoded::Message) => {}
      Ok(Decoded::Change(event)) => pending.push(Ok(event)),
      Err(e) => pending.push(Err(e)),
    }
  }
  if !pending.is_empty() {
    warn!(changes = pending.len(), "peek ended inside a transaction");
  }
  done
}

/// Polls the logical slot with `pg_logical_slot_peek_changes`.
///
/// Peeking does not consume; the slot is advanced with
/// `pg_replication_slot_advance` once changes are acknowledged, and
/// transactions seen by an earlier peek are skipped by commit LSN.
pub struct SlotPoller {
  client: PgClient,
  slot: SlotManager,
  options: PollerOptions,
  wal2json_options: Vec<String>,
  buffer: VecDeque<SourceRecord>,
  last_enqueued: Lsn,
  acks: AckManager,
}

impl SlotPoller {
  pub fn new(client: PgClient, slot: SlotManager, tables: &[TableId], options: PollerOptions) -> Self {
    let acks = AckManager::new(options.ack_min_interval, options.ack_max_interval);
    Self {
      client,
      slot,
      wal2json_options: wal2json_options(tables),
      options,
      buffer: VecDeque::new(),
      last_enqueued: Lsn::ZERO,
      acks,
    }
  }

  async fn peek(&self) -> Result<Vec<(Lsn, String)>> {
    if self.client.is_closed() {
      return Err(RowgateError::SourceClosed);
    }
    let rows = self
      .client
      .inner()
      .query(
        "SELECT lsn::text, data FROM pg_logical_slot_peek_changes($1, NULL, $2, VARIADIC $3::text[])",
        &[
          &self.slot.slot_name(),
          &self.options.batch_size,
          &self.wal2json_options,
        ],
      )
      .await
      .map_err(|e| RowgateError::ConnectFailed(Box::new(e)))?;

    rows
      .iter()
      .map(|row| {
        let lsn: &str = row.get(0);
        let lsn = Lsn::from_pg_str(lsn).map_err(|e| RowgateError::malformed(e.to_string()))?;
        Ok((lsn, row.get::<_, String>(1)))
      })
      .collect()
  }

  /// Peek once and buffer the new transactions. Returns the number of
  /// buffered records.
  async fn poll(&mut self) -> Result<usize> {
    let rows = self.peek().await?;
    let mut buffered = 0;
    for txn in split_transactions(rows, self.last_enqueued) {
      self.acks.enqueue(txn.commit_lsn, txn.records.len());
      self.last_enqueued = txn.commit_lsn;
      buffered += txn.records.len();
      self.buffer.extend(txn.records);
    }
    if buffered > 0 {
      debug!(records = buffered, upto = %self.last_enqueued, "buffered changes from slot");
    }
    Ok(buffered)
  }

  async fn maybe_advance(&mut self, idle: bool) -> Result<()> {
    if !self.acks.should_advance(idle) {
      return Ok(());
    }
    if let Some(lsn) = self.acks.take_advance() {
      self
        .slot
        .advance(&self.client, lsn)
        .await
        .map_err(RowgateError::Internal)?;
    }
    Ok(())
  }
}

#[async_trait]
impl ChangeSource for SlotPoller {
  async fn next(&mut self) -> Result<Option<SourceRecord>> {
    loop {
      if let Some(record) = self.buffer.pop_front() {
        return Ok(Some(record));
      }
      if self.poll().await? == 0 {
        self.maybe_advance(true).await?;
        tokio::time::sleep(self.options.poll_interval).await;
      }
    }
  }

  async fn ack(&mut self, lsn: Lsn) -> Result<()> {
    self.acks.ack(lsn)?;
    self.maybe_advance(false).await
  }
}
