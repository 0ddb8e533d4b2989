use std::ops::{Deref, DerefMut};
use tokio::sync::{Mutex, MutexGuard, Semaphore, SemaphorePermit};

/// Fixed set of connections, each used by one caller at a time.
///
/// There is one permit per connection, so a caller holding a permit
/// always finds an unlocked slot.
pub struct ConnectionPool<T> {
  slots: Vec<Mutex<T>>,
  permits: Semaphore,
}

impl<T> ConnectionPool<T> {
  pub fn new(connections: Vec<T>) -> Self {
    let permits = Semaphore::new(connections.len());
    Self {
      slots: connections.into_iter().map(Mutex::new).collect(),
      permits,
    }
  }

  /// Wait for an idle connection. `None` only for an empty pool.
  pub async fn checkout(&self) -> Option<Pooled<'_, T>> {
    if self.slots.is_empty() {
      return None;
    }
    let permit = self.permits.acquire().await.ok()?;
    let conn = self.slots.iter().find_map(|slot| slot.try_lock().ok())?;
    Some(Pooled {
      conn,
      _permit: permit,
    })
  }
}

/// A checked-out connection. The slot unlocks before the permit is
/// returned.
pub struct Pooled<'a, T> {
  conn: MutexGuard<'a, T>,
  _permit: SemaphorePermit<'a>,
}

impl<T> Deref for Pooled<'_, T> {
  type Target = T;

  fn deref(&self) -> &T {
    &self.conn
  }
}

impl<T> DerefMut for Pooled<'_, T> {
  fn deref_mut(&mut self) -> &mut T {
    &mut self.conn
  }
}
