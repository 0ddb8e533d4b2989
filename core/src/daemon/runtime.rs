use shared::config::RuntimeSection;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::{Builder, Runtime};
use tracing::info;

/// Shape of the daemon's multi-threaded Tokio runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
  /// Always at least one.
  pub worker_threads: usize,
  /// Worker threads are named `<prefix>-<n>`.
  pub thread_prefix: String,
}

impl From<&RuntimeSection> for RuntimeConfig {
  /// `worker_threads = 0` means one per available core.
  fn from(section: &RuntimeSection) -> Self {
    let worker_threads = match section.worker_threads {
      0 => available_cores(),
      n => n,
    };
    Self {
      worker_threads,
      thread_prefix: "rowgate-worker".to_string(),
    }
  }
}

impl RuntimeConfig {
  pub fn build_runtime(&self) -> anyhow::Result<Runtime> {
    let prefix = self.thread_prefix.clone();
    let next = AtomicUsize::new(0);
    let rt = Builder::new_multi_thread()
      .worker_threads(self.worker_threads)
      .thread_name_fn(move || format!("{}-{}", prefix, next.fetch_add(1, Ordering::Relaxed)))
      .enable_all()
      .build()?;

    info!(workers = self.worker_threads, prefix = %self.thread_prefix, "runtime ready");
    Ok(rt)
  }
}

fn available_cores() -> usize {
  std::thread::available_parallelism().map_or(1, |n| n.get())
}
