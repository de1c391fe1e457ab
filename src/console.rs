use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::process::JobObserver;

const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {prefix} {wide_msg}";
const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {prefix} [{bar:40.cyan/blue}] {pos:>3}% {wide_msg}";

/// Terminal rendering of one job: a spinner that becomes a percentage bar once
/// the job reports progress. The latest tool line is shown as the bar message;
/// with `echo_lines`, every line is also printed above the bar.
pub struct JobDisplay {
    bar: ProgressBar,
    pump: JoinHandle<()>,
}

impl JobDisplay {
    pub fn start(label: &str, echo_lines: bool) -> (JobObserver, Self) {
        let (observer, lines, progress) = JobObserver::channels();

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
            bar.set_style(style);
        }
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        let pump = tokio::spawn(render(bar.clone(), lines, progress, echo_lines));
        (observer, Self { bar, pump })
    }

    /// Wait for the job's output to be rendered, then clear the bar.
    pub async fn finish(self) {
        // The pump ends once the runner drops its observer.
        let _ = self.pump.await;
        self.bar.finish_and_clear();
    }
}

async fn render(
    bar: ProgressBar,
    mut lines: UnboundedReceiver<String>,
    mut progress: UnboundedReceiver<f64>,
    echo_lines: bool,
) {
    let mut determinate = false;
    let mut lines_open = true;
    let mut progress_open = true;

    while lines_open || progress_open {
        tokio::select! {
            line = lines.recv(), if lines_open => match line {
                Some(line) => {
                    if echo_lines {
                        bar.println(format!("{} {}", Local::now().format("%H:%M:%S"), line));
                    }
                    bar.set_message(line);
                }
                None => lines_open = false,
            },
            value = progress.recv(), if progress_open => match value {
                Some(value) => {
                    if !determinate {
                        determinate = true;
                        bar.set_length(100);
                        if let Ok(style) = ProgressStyle::default_bar()
                            .template(BAR_TEMPLATE)
                            .map(|style| style.progress_chars("#>-"))
                        {
                            bar.set_style(style);
                        }
                    }
                    bar.set_position(value.round() as u64);
                }
                None => progress_open = false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finish_after_observer_dropped() {
        let (observer, display) = JobDisplay::start("test", false);
        observer.line("hello".to_string());
        observer.progress(50.0);
        drop(observer);

        tokio::time::timeout(Duration::from_secs(5), display.finish())
            .await
            .unwrap();
    }
}
