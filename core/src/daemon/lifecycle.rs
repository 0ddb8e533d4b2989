use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// Manages the daemon lifecycle: startup → running → graceful shutdown,
/// with restarts of the running phase after failures.
pub struct Lifecycle {
  state: LifecycleState,
  restarts: u32,
  shutdown_tx: watch::Sender<bool>,
}

/// Current lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  /// Loading config, connecting, loading subscriptions.
  Initializing,
  /// Evaluating the change stream.
  Running,
  /// Waiting out the delay after a failed run.
  Restarting,
  /// Finishing the in-flight event.
  ShuttingDown,
  Stopped,
}

impl Lifecycle {
  pub fn new() -> Self {
    let (shutdown_tx, _) = watch::channel(false);
    Self {
      state: LifecycleState::Initializing,
      restarts: 0,
      shutdown_tx,
    }
  }

  /// Transition to the next state.
  pub fn transition(&mut self, new_state: LifecycleState) {
    info!(
        from = ?self.state,
        to = ?new_state,
        "lifecycle state transition"
    );
    if new_state == LifecycleState::Restarting {
      self.restarts += 1;
    }
    self.state = new_state;
  }

  /// Current state.
  pub fn state(&self) -> LifecycleState {
    self.state
  }

  /// Number of times the running phase was restarted.
  pub fn restarts(&self) -> u32 {
    self.restarts
  }

  /// A receiver that flips to `true` once shutdown was requested.
  pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
    self.shutdown_tx.subscribe()
  }

  /// Ask every holder of a shutdown signal to stop.
  pub fn request_shutdown(&mut self) {
    self.shutdown_tx.send_replace(true);
    self.transition(LifecycleState::ShuttingDown);
  }

  pub fn shutdown_requested(&self) -> bool {
    *self.shutdown_tx.borrow()
  }

  /// Wait for a shutdown signal (SIGINT or SIGTERM).
  pub async fn wait_for_shutdown() {
    let ctrl_c = async {
      if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
      }
    };

    #[cfg(unix)]
    let terminate = async {
      match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
          sigterm.recv().await;
        }
        Err(e) => {
          warn!(error = %e, "failed to install SIGTERM handler");
          std::future::pending::<()>().await;
        }
      }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
  }
}

impl Default for Lifecycle {
  fn default() -> Self {
    Self::new()
  }
}
