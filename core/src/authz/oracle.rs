use async_trait::async_trait;
use shared::error::Result;
use shared::event::{Action, RowData, TableId};
use shared::subscription::Principal;

/// The row a visibility check is about.
#[derive(Debug, Clone, PartialEq)]
pub struct RowProbe {
  pub action: Action,
  /// Primary-key columns of the changed row. Empty for truncates.
  pub identity: RowData,
}

impl RowProbe {
  pub fn new(action: Action, identity: RowData) -> Self {
    Self { action, identity }
  }

  /// Row policies can only be evaluated against a row that still
  /// exists after the change.
  pub fn needs_row_check(&self) -> bool {
    self.action.reads_new_row() && !self.identity.is_empty()
  }
}

/// Answer of one oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleVerdict {
  /// The principal holds some read privilege on the table.
  pub table_readable: bool,
  pub rls_enabled: bool,
  /// Columns the principal may select, in grant order.
  pub visible_columns: Vec<String>,
  /// The probed row passes the principal's row policies. `true` when no
  /// row check applies.
  pub row_visible: bool,
}

impl OracleVerdict {
  pub fn denied() -> Self {
    Self {
      table_readable: false,
      rls_enabled: false,
      visible_columns: Vec::new(),
      row_visible: false,
    }
  }
}

/// Source of authorization decisions.
///
/// Implementations map transient transport failures to
/// `RowgateError::OracleUnavailable` and a lost session to
/// `RowgateError::OracleDisconnected`, which ends the worker run.
#[async_trait]
pub trait AuthorizationOracle: Send + Sync {
  async fn check(
    &self,
    principal: &Principal,
    entity: &TableId,
    probe: &RowProbe,
  ) -> Result<OracleVerdict>;
}
