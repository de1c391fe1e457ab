// External process execution
//
// - command: argument-vector builder shared by every tool
// - lines: output line splitting and reassembly
// - runner: tokio implementation of ProcessRunner

pub mod command;
pub mod lines;
pub mod runner;

use async_trait::async_trait;
use std::ffi::OsStr;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use command::ToolCommand;
pub use runner::TokioProcessRunner;

use crate::config::RunnerConfig;
use crate::error::{Result, RigError};
use crate::progress::ProgressMonitor;

/// Lifecycle of one process job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Where a job delivers its output: one channel of text lines and one of
/// completion values in [0, 100]. Either may be absent. A receiver that goes
/// away never fails the job.
#[derive(Debug, Clone, Default)]
pub struct JobObserver {
    lines: Option<mpsc::UnboundedSender<String>>,
    progress: Option<mpsc::UnboundedSender<f64>>,
}

impl JobObserver {
    /// Discard all output
    pub fn silent() -> Self {
        Self::default()
    }

    /// Observer wired to fresh line and progress channels
    pub fn channels() -> (Self, mpsc::UnboundedReceiver<String>, mpsc::UnboundedReceiver<f64>) {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let observer = Self::silent().with_lines(line_tx).with_progress(progress_tx);
        (observer, line_rx, progress_rx)
    }

    pub fn with_lines(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.lines = Some(tx);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<f64>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub(crate) fn line(&self, line: String) {
        if let Some(tx) = &self.lines {
            let _ = tx.send(line);
        }
    }

    pub(crate) fn progress(&self, value: f64) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(value);
        }
    }
}

/// Everything a one-shot invocation printed, collected after exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Launches external tools
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a tool to completion, streaming each output line to `observer` and
    /// feeding it to `monitor`. Resolves once the process exits or as soon as
    /// `cancel` fires, whichever comes first.
    async fn run(
        &self,
        command: ToolCommand,
        monitor: ProgressMonitor,
        observer: JobObserver,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Run a tool and collect its complete output. The exit code is reported,
    /// not interpreted.
    async fn capture(&self, command: ToolCommand) -> Result<CapturedOutput>;
}

/// Factory for creating process runner instances
pub struct ProcessRunnerFactory;

impl ProcessRunnerFactory {
    /// Create the default runner implementation (tokio child processes)
    pub fn create_default(config: RunnerConfig) -> Arc<dyn ProcessRunner> {
        Arc::new(TokioProcessRunner::new(config))
    }
}

/// Resolve `job` unless `cancel` fires first. One-shot jobs spawn with
/// `kill_on_drop`, so dropping them here also kills the tool.
pub async fn until_cancelled<F: Future>(cancel: &CancellationToken, job: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RigError::Cancelled),
        output = job => Ok(output),
    }
}

pub(crate) fn command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    configure_for_background(&mut cmd);
    cmd
}

#[cfg(windows)]
fn configure_for_background(cmd: &mut tokio::process::Command) {
    // Keep tool consoles from flashing up while jobs run.
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn configure_for_background(_cmd: &mut tokio::process::Command) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_observer_channels() {
        let (observer, mut lines, mut progress) = JobObserver::channels();
        observer.line("hello".to_string());
        observer.progress(42.0);
        drop(observer);

        assert_eq!(lines.recv().await.as_deref(), Some("hello"));
        assert_eq!(lines.recv().await, None);
        assert_eq!(progress.recv().await, Some(42.0));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (observer, lines, progress) = JobObserver::channels();
        drop(lines);
        drop(progress);
        observer.line("nobody listening".to_string());
        observer.progress(1.0);
    }

    #[tokio::test]
    async fn test_until_cancelled() {
        let cancel = CancellationToken::new();
        assert_eq!(until_cancelled(&cancel, async { 7 }).await.unwrap(), 7);

        cancel.cancel();
        let pending = until_cancelled(&cancel, std::future::pending::<()>()).await;
        assert!(matches!(pending, Err(RigError::Cancelled)));
    }

    #[test]
    fn test_captured_success() {
        let ok = CapturedOutput { code: Some(0), ..Default::default() };
        let failed = CapturedOutput { code: Some(1), ..Default::default() };
        let killed = CapturedOutput::default();
        assert!(ok.success());
        assert!(!failed.success());
        assert!(!killed.success());
    }
}
