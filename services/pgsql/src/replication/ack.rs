use shared::error::RowgateError;
use shared::lsn::Lsn;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Decides when the slot may be advanced, and how far.
///
/// Changes are handed out per transaction. A transaction is confirmed
/// once every change of it has been acknowledged; the slot may then be
/// advanced to its commit LSN. Advances are batched:
/// - while changes keep flowing, at most one advance per `max_interval`
/// - when the poller is idle, as soon as `min_interval` has passed
pub struct AckManager {
  /// Enqueued transactions not yet fully acknowledged:
  /// `(commit_lsn, changes still unacknowledged)`.
  open: VecDeque<(Lsn, usize)>,
  /// Highest commit LSN whose transaction is fully acknowledged.
  confirmed_lsn: Lsn,
  /// Highest LSN the slot was advanced to.
  advanced_lsn: Lsn,
  min_interval: Duration,
  max_interval: Duration,
  last_advance: Instant,
}

impl AckManager {
  pub fn new(min_interval: Duration, max_interval: Duration) -> Self {
    Self {
      open: VecDeque::new(),
      confirmed_lsn: Lsn::ZERO,
      advanced_lsn: Lsn::ZERO,
      min_interval,
      max_interval,
      last_advance: Instant::now(),
    }
  }

  /// Register a transaction handed to the consumer with `changes`
  /// records. Empty transactions are confirmed immediately.
  pub fn enqueue(&mut self, commit_lsn: Lsn, changes: usize) {
    if changes == 0 && self.open.is_empty() {
      self.confirm(commit_lsn);
    } else {
      self.open.push_back((commit_lsn, changes));
      self.settle();
    }
  }

  /// Acknowledge one change of the oldest open transaction.
  pub fn ack(&mut self, commit_lsn: Lsn) -> Result<(), RowgateError> {
    let front = match self.open.front_mut() {
      Some(front) if front.0 == commit_lsn && front.1 > 0 => front,
      Some(front) => {
        return Err(RowgateError::AckRegression {
          attempted: commit_lsn.to_string(),
          current: front.0.to_string(),
        })
      }
      None => {
        return Err(RowgateError::AckRegression {
          attempted: commit_lsn.to_string(),
          current: self.confirmed_lsn.to_string(),
        })
      }
    };
    front.1 -= 1;
    self.settle();
    Ok(())
  }

  /// Pop fully acknowledged transactions off the front.
  fn settle(&mut self) {
    while let Some(&(lsn, 0)) = self.open.front() {
      self.open.pop_front();
      self.confirm(lsn);
    }
  }

  fn confirm(&mut self, lsn: Lsn) {
    if lsn.is_ahead_of(self.confirmed_lsn) {
      self.confirmed_lsn = lsn;
    }
  }

  /// Check if the slot should be advanced now.
  pub fn should_advance(&self, idle: bool) -> bool {
    if !self.confirmed_lsn.is_ahead_of(self.advanced_lsn) {
      return false;
    }
    let elapsed = self.last_advance.elapsed();
    elapsed >= self.max_interval || (idle && elapsed >= self.min_interval)
  }

  /// Take the LSN to advance to and mark it as advanced.
  pub fn take_advance(&mut self) -> Option<Lsn> {
    if !self.confirmed_lsn.is_ahead_of(self.advanced_lsn) {
      return None;
    }
    self.advanced_lsn = self.confirmed_lsn;
    self.last_advance = Instant::now();
    debug!(lsn = %self.advanced_lsn, "advancing replication slot");
    Some(self.advanced_lsn)
  }

  /// Returns the highest fully acknowledged commit LSN.
  pub fn confirmed_lsn(&self) -> Lsn {
    self.confirmed_lsn
  }

  /// Number of transactions still awaiting acknowledgement.
  pub fn open_transactions(&self) -> usize {
    self.open.len()
  }
}
