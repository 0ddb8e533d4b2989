use dashmap::DashMap;
use shared::event::TableId;
use tracing::{debug, info};

/// Process-wide primary-key lookup, consulted when the decoder does not
/// report the key of a change.
///
/// Populated by the database adapter at startup and kept until an entry
/// is invalidated.
#[derive(Debug, Default)]
pub struct KeyCatalog {
  keys: DashMap<TableId, Vec<String>>,
}

impl KeyCatalog {
  pub fn new() -> Self {
    Self {
      keys: DashMap::new(),
    }
  }

  /// Register or replace the primary key of a table.
  pub fn upsert(&self, entity: TableId, columns: Vec<String>) {
    match self.keys.insert(entity.clone(), columns.clone()) {
      Some(old) if old != columns => {
        info!(table = %entity, old = ?old, new = ?columns, "primary key changed");
      }
      Some(_) => {}
      None => {
        debug!(table = %entity, key = ?columns, "registered primary key");
      }
    }
  }

  pub fn get(&self, entity: &TableId) -> Option<Vec<String>> {
    self.keys.get(entity).map(|r| r.clone())
  }

  /// The key reported by the decoder when present, else the catalog's.
  pub fn key_for(&self, entity: &TableId, reported: &[String]) -> Vec<String> {
    if !reported.is_empty() {
      return reported.to_vec();
    }
    self.get(entity).unwrap_or_default()
  }

  pub fn invalidate(&self, entity: &TableId) {
    if self.keys.remove(entity).is_some() {
      debug!(table = %entity, "primary key invalidated");
    }
  }

  pub fn clear(&self) {
    self.keys.clear();
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }
}
