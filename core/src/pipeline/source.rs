use async_trait::async_trait;
use shared::error::Result;
use shared::event::ChangeEvent;
use shared::lsn::Lsn;
use shared::subscription::Subscription;

/// One position of the change stream.
#[derive(Debug)]
pub struct SourceRecord {
  /// Acknowledgement position. Non-decreasing along the stream; changes
  /// of one transaction may share it.
  pub lsn: Lsn,
  /// The decoded change, or why it could not be decoded. Undecodable
  /// records are still acknowledged.
  pub decoded: Result<ChangeEvent>,
}

impl SourceRecord {
  pub fn change(event: ChangeEvent) -> Self {
    Self {
      lsn: event.lsn(),
      decoded: Ok(event),
    }
  }
}

/// Ordered stream of decoded changes.
#[async_trait]
pub trait ChangeSource: Send {
  /// Next record in commit order. `None` when the source is exhausted.
  async fn next(&mut self) -> Result<Option<SourceRecord>>;

  /// Mark everything up to and including `lsn` as processed.
  async fn ack(&mut self, lsn: Lsn) -> Result<()>;
}

/// Where subscriptions are registered.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
  async fn load_all(&self) -> Result<Vec<Subscription>>;

  /// Re-read one registry row. `None` when the row no longer yields a
  /// subscription.
  async fn load_one(&self, key: i64) -> Result<Option<Subscription>>;
}
