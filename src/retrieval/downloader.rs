use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::Result;
use crate::process::{JobObserver, ProcessRunner};
use crate::progress::ProgressMonitor;
use crate::tools::{ToolKind, ToolLocator};

use super::commands::{transcoder_dir, DownloadCommandBuilder};
use super::thumbnail::ThumbnailFetcher;
use super::{parse_probe_line, RemoteMetadata, RetrievalRequest};

/// Drives the downloader for media retrieval and metadata probes.
pub struct Retriever {
    locator: ToolLocator,
    runner: Arc<dyn ProcessRunner>,
    config: DownloadConfig,
    thumbnails: ThumbnailFetcher,
}

impl Retriever {
    pub fn new(
        locator: ToolLocator,
        runner: Arc<dyn ProcessRunner>,
        config: DownloadConfig,
    ) -> Result<Self> {
        Ok(Self {
            locator,
            runner,
            config,
            thumbnails: ThumbnailFetcher::new()?,
        })
    }

    pub fn is_available(&self) -> bool {
        self.locator.is_available(ToolKind::Downloader)
    }

    fn builder(&self) -> Result<DownloadCommandBuilder> {
        let program = self.locator.require(ToolKind::Downloader)?;
        let mut builder = DownloadCommandBuilder::new(program, self.config.clone());

        // Without a located transcoder the downloader searches on its own.
        let located = self.locator.require(ToolKind::Transcoder).ok();
        if let Some(dir) = located.as_deref().and_then(transcoder_dir) {
            builder = builder.with_transcoder_dir(dir);
        }

        Ok(builder)
    }

    /// Download into `request.output_dir`. A cancelled or failed download
    /// leaves its partial file in place.
    pub async fn download(
        &self,
        request: &RetrievalRequest,
        observer: JobObserver,
        cancel: CancellationToken,
    ) -> Result<()> {
        let command = self.builder()?.download(request);

        if !request.output_dir.exists() {
            tokio::fs::create_dir_all(&request.output_dir).await?;
        }

        info!("Downloading {} as {}", request.url, request.format);
        self.runner
            .run(command, ProgressMonitor::percentage(), observer, cancel)
            .await
    }

    /// One-shot metadata query. `None` when `url` does not parse, the
    /// downloader is missing or fails, or it prints something other than the
    /// expected line.
    pub async fn probe(&self, url: &str) -> Option<RemoteMetadata> {
        let parsed = match Url::parse(url.trim()) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Probe skipped, invalid URL '{}': {}", url, e);
                return None;
            }
        };

        let command = match self.builder() {
            Ok(builder) => builder.probe(&parsed),
            Err(e) => {
                debug!("Probe skipped: {}", e);
                return None;
            }
        };

        let output = match self.runner.capture(command).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Probe of {} failed to run: {}", url, e);
                return None;
            }
        };

        if !output.success() {
            debug!("Probe of {} exited with {:?}", url, output.code);
            return None;
        }

        let line = output.stdout.lines().map(str::trim).find(|line| !line.is_empty())?;
        match parse_probe_line(line) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!("Probe of {} returned {}", url, e);
                None
            }
        }
    }

    /// Best-effort thumbnail download for probe results.
    pub async fn fetch_thumbnail(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let written = self.thumbnails.fetch(url, dest).await?;
        debug!("Saved {} byte thumbnail to {}", written, dest.display());
        Ok(dest.to_path_buf())
    }
}
