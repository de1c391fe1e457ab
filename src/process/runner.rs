use async_trait::async_trait;
use futures::StreamExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::lines::output_lines;
use super::{command, CapturedOutput, JobObserver, JobState, ProcessRunner, ToolCommand};
use crate::config::RunnerConfig;
use crate::error::{Result, RigError};
use crate::progress::ProgressMonitor;

/// Runs tools as tokio child processes.
pub struct TokioProcessRunner {
    config: RunnerConfig,
}

impl TokioProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.config.kill_grace_ms)
    }

    fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.config.drain_grace_ms)
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        command: ToolCommand,
        monitor: ProgressMonitor,
        observer: JobObserver,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut job = ProcessJob::new(command, monitor, observer);
        let span = info_span!("job", id = %job.id, tool = %job.command.program_name());
        let result = job.execute(self, cancel).instrument(span.clone()).await;
        span.in_scope(|| debug!(state = ?job.state, "Job ended"));
        result
    }

    async fn capture(&self, tool: ToolCommand) -> Result<CapturedOutput> {
        debug!("Capturing output of: {}", tool.display_line());

        let output = command(&tool.program)
            .args(&tool.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RigError::SpawnFailure {
                program: tool.program.clone(),
                source,
            })?;

        Ok(CapturedOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// State of one in-flight invocation. Owned by a single `run` call and
/// mutated only from it.
struct ProcessJob {
    id: Uuid,
    command: ToolCommand,
    monitor: ProgressMonitor,
    observer: JobObserver,
    state: JobState,
    lines_seen: u64,
}

impl ProcessJob {
    fn new(command: ToolCommand, monitor: ProgressMonitor, observer: JobObserver) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            monitor,
            observer,
            state: JobState::Running,
            lines_seen: 0,
        }
    }

    async fn execute(&mut self, runner: &TokioProcessRunner, cancel: CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            self.state = JobState::Cancelled;
            return Err(RigError::Cancelled);
        }

        info!("Starting {}", self.command.description);
        debug!("Executing: {}", self.command.display_line());

        let mut child = command(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                self.state = JobState::Failed;
                RigError::SpawnFailure {
                    program: self.command.program.clone(),
                    source,
                }
            })?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        let mut readers = JoinSet::new();
        if let Some(stdout) = child.stdout.take() {
            readers.spawn(pump(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.spawn(pump(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let status = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.terminate(&mut child, runner.kill_grace()).await;
                    readers.abort_all();
                    return Err(RigError::Cancelled);
                }
                Some(line) = line_rx.recv() => self.deliver(line),
                status = child.wait() => break status,
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                self.state = JobState::Failed;
                return Err(RigError::Io(e));
            }
        };

        // Lines still buffered in the pipes belong to this job.
        let drain = async {
            while let Some(line) = line_rx.recv().await {
                self.deliver(line);
            }
        };
        if timeout(runner.drain_grace(), drain).await.is_err() {
            debug!("Output still open after exit, dropping the rest");
            readers.abort_all();
        }

        self.finish(status)
    }

    fn deliver(&mut self, line: String) {
        self.lines_seen += 1;
        let progress = self.monitor.observe(&line);
        self.observer.line(line);
        if let Some(value) = progress {
            self.observer.progress(value);
        }
    }

    async fn terminate(&mut self, child: &mut Child, grace: Duration) {
        self.state = JobState::Cancelled;
        info!("Cancelling {} (pid {:?})", self.command.description, child.id());

        if let Err(e) = child.start_kill() {
            debug!("Kill request failed: {}", e);
        }

        if timeout(grace, child.wait()).await.is_err() {
            warn!(
                "{} did not exit within {:?} of being killed; abandoning it",
                self.command.program_name(),
                grace
            );
        }
    }

    fn finish(&mut self, status: ExitStatus) -> Result<()> {
        if status.success() {
            self.state = JobState::Succeeded;
            info!("{} finished ({} output lines)", self.command.description, self.lines_seen);
            return Ok(());
        }

        self.state = JobState::Failed;
        warn!("{} failed: {}", self.command.description, status);
        Err(RigError::NonZeroExit {
            program: self.command.program_name(),
            code: status.code(),
        })
    }
}

async fn pump<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let lines = output_lines(reader);
    tokio::pin!(lines);
    while let Some(line) = lines.next().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}
