//! Backoff for transient authorization failures.

use shared::config::RetryConfig;
use std::time::Duration;

/// How the worker waits before re-evaluating an event whose oracle call
/// failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
  /// Give up after the first failure.
  None,

  /// Retry at a fixed interval.
  Fixed {
    interval: Duration,
    /// Retries after the first attempt.
    max_attempts: u32,
  },

  /// Retry with exponential backoff.
  Exponential {
    initial: Duration,
    /// Cap on a single delay.
    max: Duration,
    /// Retries after the first attempt.
    max_attempts: u32,
  },
}

impl RetryPolicy {
  pub fn none() -> Self {
    Self::None
  }

  pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
    Self::Fixed {
      interval,
      max_attempts,
    }
  }

  pub fn exponential(initial: Duration, max: Duration, max_attempts: u32) -> Self {
    Self::Exponential {
      initial,
      max,
      max_attempts,
    }
  }

  pub fn from_config(cfg: &RetryConfig) -> Self {
    if cfg.max_attempts == 0 {
      return Self::None;
    }
    Self::exponential(
      Duration::from_millis(cfg.initial_backoff_ms),
      Duration::from_millis(cfg.max_backoff_ms),
      cfg.max_attempts,
    )
  }

  /// Delay before retry number `attempt` (0-based), or `None` when the
  /// budget is spent. Retries are always bounded.
  pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
    match self {
      Self::None => None,
      Self::Fixed {
        interval,
        max_attempts,
      } => (attempt < *max_attempts).then_some(*interval),
      Self::Exponential {
        initial,
        max,
        max_attempts,
      } => {
        if attempt >= *max_attempts {
          return None;
        }
        let delay = initial.saturating_mul(2u32.saturating_pow(attempt));
        Some(delay.min(*max))
      }
    }
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::from_config(&RetryConfig::default())
  }
}
