use dashmap::DashMap;
use shared::event::TableId;
use std::time::{Duration, Instant};
use tracing::debug;

/// Table-level access facts for one role. Independent of any row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableGrant {
  /// `false` when the table does not exist or the role has no SELECT
  /// privilege on any of its columns.
  pub readable: bool,
  pub rls_enabled: bool,
  /// Selectable columns in `attnum` order.
  pub columns: Vec<String>,
}

struct CachedGrant {
  grant: TableGrant,
  loaded_at: Instant,
}

/// Process-wide cache of [`TableGrant`]s keyed by `(role, table)`.
///
/// Entries expire after `ttl` and can be dropped early per table or all
/// at once. Row visibility is never cached here.
pub struct GrantCache {
  entries: DashMap<(String, TableId), CachedGrant>,
  ttl: Duration,
}

impl GrantCache {
  pub fn new(ttl: Duration) -> Self {
    Self {
      entries: DashMap::new(),
      ttl,
    }
  }

  pub fn get(&self, role: &str, entity: &TableId) -> Option<TableGrant> {
    let key = (role.to_string(), entity.clone());
    let fresh = self
      .entries
      .get(&key)
      .filter(|e| e.loaded_at.elapsed() < self.ttl)
      .map(|e| e.grant.clone());
    if fresh.is_none() {
      self.entries.remove(&key);
    }
    fresh
  }

  pub fn insert(&self, role: &str, entity: &TableId, grant: TableGrant) {
    self.entries.insert(
      (role.to_string(), entity.clone()),
      CachedGrant {
        grant,
        loaded_at: Instant::now(),
      },
    );
  }

  /// Forget every role's grant on `entity`.
  pub fn invalidate(&self, entity: &TableId) {
    self.entries.retain(|(_, table), _| table != entity);
    debug!(table = %entity, "grant cache invalidated");
  }

  pub fn clear(&self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
