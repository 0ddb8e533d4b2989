//! In-memory subscription set and registry-table maintenance.

use serde_json::Value;
use shared::config::RegistryConfig;
use shared::event::{Action, ChangeEvent, RowData, TableId};
use shared::subscription::Subscription;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What a change to the registry table means for the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryChange {
  /// The event is not about the registry table.
  Unrelated,
  /// Row `key` was inserted or updated; re-read it from the registry.
  Reload(i64),
  /// Row `key` was deleted and its subscription removed.
  Removed(i64),
  /// The registry was truncated and the set emptied.
  Cleared,
  /// A registry change without a usable row key.
  Ignored,
}

/// Subscriptions grouped by the table they watch.
///
/// Within a table, subscriptions keep their registration order, which is
/// the order matched ids are reported in. Registry row keys are unique.
pub struct SubscriptionSet {
  registry: TableId,
  by_entity: HashMap<TableId, Vec<Subscription>>,
  entity_of: HashMap<i64, TableId>,
}

impl SubscriptionSet {
  pub fn new(registry: TableId) -> Self {
    Self {
      registry,
      by_entity: HashMap::new(),
      entity_of: HashMap::new(),
    }
  }

  pub fn from_config(cfg: &RegistryConfig) -> Self {
    Self::new(cfg.table_id())
  }

  /// Replace the whole set.
  pub fn load(&mut self, subscriptions: Vec<Subscription>) {
    self.clear();
    for sub in subscriptions {
      self.upsert(sub);
    }
    info!(count = self.len(), "subscriptions loaded");
  }

  pub fn for_entity(&self, entity: &TableId) -> &[Subscription] {
    self
      .by_entity
      .get(entity)
      .map(|subs| subs.as_slice())
      .unwrap_or(&[])
  }

  /// Insert a subscription, replacing the one registered under the same
  /// key. A replacement on the same table keeps its position.
  pub fn upsert(&mut self, sub: Subscription) {
    if let Some(previous) = self.entity_of.get(&sub.key) {
      if *previous == sub.entity {
        if let Some(slot) = self
          .by_entity
          .get_mut(previous)
          .and_then(|subs| subs.iter_mut().find(|s| s.key == sub.key))
        {
          *slot = sub;
          return;
        }
      }
      self.remove(sub.key);
    }
    debug!(key = sub.key, id = %sub.id, table = %sub.entity, "subscription added");
    self.entity_of.insert(sub.key, sub.entity.clone());
    self.by_entity.entry(sub.entity.clone()).or_default().push(sub);
  }

  pub fn remove(&mut self, key: i64) -> Option<Subscription> {
    let entity = self.entity_of.remove(&key)?;
    let subs = self.by_entity.get_mut(&entity)?;
    let pos = subs.iter().position(|s| s.key == key)?;
    let removed = subs.remove(pos);
    if subs.is_empty() {
      self.by_entity.remove(&entity);
    }
    debug!(key, table = %entity, "subscription removed");
    Some(removed)
  }

  pub fn clear(&mut self) {
    self.by_entity.clear();
    self.entity_of.clear();
  }

  pub fn len(&self) -> usize {
    self.entity_of.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entity_of.is_empty()
  }

  pub fn registry_table(&self) -> &TableId {
    &self.registry
  }

  /// Apply a change to the registry table.
  ///
  /// Truncates and deletes are applied directly. Inserts and updates
  /// only name the row to reload, since the decoded row does not carry
  /// the resolved entity and principal.
  pub fn apply_registry_change(&mut self, event: &ChangeEvent) -> RegistryChange {
    if event.table != self.registry {
      return RegistryChange::Unrelated;
    }

    match event.action {
      Action::Truncate => {
        self.clear();
        info!("subscription registry truncated");
        RegistryChange::Cleared
      }
      Action::Delete => match event.old_record.as_ref().and_then(row_key) {
        Some(key) => {
          self.remove(key);
          RegistryChange::Removed(key)
        }
        None => {
          warn!(lsn = %event.lsn(), "registry delete without id");
          RegistryChange::Ignored
        }
      },
      Action::Insert | Action::Update => match row_key(&event.record) {
        Some(key) => RegistryChange::Reload(key),
        None => {
          warn!(lsn = %event.lsn(), "registry change without id");
          RegistryChange::Ignored
        }
      },
    }
  }
}

fn row_key(row: &RowData) -> Option<i64> {
  match row.get("id")? {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => s.parse().ok(),
    _ => None,
  }
}
