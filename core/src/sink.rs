//! Where evaluation outputs go.

use async_trait::async_trait;
use shared::error::{Result, RowgateError};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::aggregate::EvaluationOutput;

/// Consumer of evaluation outputs. `emit` returning `Ok` means the output
/// was accepted and the event may be acknowledged.
#[async_trait]
pub trait OutputSink: Send + Sync {
  async fn emit(&self, output: &EvaluationOutput) -> Result<()>;
}

/// Writes each output as one JSON line to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl OutputSink for StdoutSink {
  async fn emit(&self, output: &EvaluationOutput) -> Result<()> {
    let mut line = serde_json::to_vec(output).map_err(|e| RowgateError::SinkFailed(Box::new(e)))?;
    line.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout
      .write_all(&line)
      .await
      .map_err(|e| RowgateError::SinkFailed(Box::new(e)))?;
    stdout
      .flush()
      .await
      .map_err(|e| RowgateError::SinkFailed(Box::new(e)))
  }
}

/// Hands outputs to an in-process consumer over a bounded channel. A
/// full channel makes `emit` wait.
#[derive(Debug, Clone)]
pub struct ChannelSink {
  tx: mpsc::Sender<EvaluationOutput>,
}

impl ChannelSink {
  pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EvaluationOutput>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self { tx }, rx)
  }
}

#[async_trait]
impl OutputSink for ChannelSink {
  async fn emit(&self, output: &EvaluationOutput) -> Result<()> {
    self
      .tx
      .send(output.clone())
      .await
      .map_err(|e| RowgateError::SinkFailed(Box::new(e)))
  }
}
