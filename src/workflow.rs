use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::console::JobDisplay;
use crate::error::{Result, RigError};
use crate::media::{is_media_file, ConversionRequest, Converter};
use crate::process::{JobObserver, ProcessRunnerFactory};
use crate::retrieval::Retriever;
use crate::tags::TagReader;
use crate::tools::ToolLocator;

/// The orchestrators wired to one configuration and one process runner.
pub struct Workflow {
    locator: ToolLocator,
    converter: Converter,
    retriever: Retriever,
    tag_reader: TagReader,
    echo_lines: bool,
}

/// Outcome of a batch conversion.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub converted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl Workflow {
    pub fn new(config: Config, echo_lines: bool) -> Result<Self> {
        let locator = ToolLocator::new(config.tools.clone());
        let runner = ProcessRunnerFactory::create_default(config.runner.clone());

        Ok(Self {
            converter: Converter::new(locator.clone(), runner.clone(), config.convert.clone()),
            retriever: Retriever::new(locator.clone(), runner.clone(), config.download.clone())?,
            tag_reader: TagReader::new(locator.clone(), runner),
            locator,
            echo_lines,
        })
    }

    pub fn locator(&self) -> &ToolLocator {
        &self.locator
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn tag_reader(&self) -> &TagReader {
        &self.tag_reader
    }

    /// Progress display for a job about to start
    pub fn display(&self, label: &str) -> (JobObserver, JobDisplay) {
        JobDisplay::start(label, self.echo_lines)
    }

    /// Convert one file with a progress display.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        cancel: CancellationToken,
    ) -> Result<PathBuf> {
        let label = request
            .source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let (observer, display) = self.display(&label);
        let result = self.converter.convert(request, observer, cancel).await;
        display.finish().await;
        result
    }

    /// Convert every media file under `input_dir` one after another. A file
    /// that fails is logged and skipped; cancellation stops the batch.
    pub async fn batch_convert(
        &self,
        input_dir: &Path,
        format: &str,
        output_dir: Option<&Path>,
        still_image: Option<&Path>,
        cancel: CancellationToken,
    ) -> Result<BatchSummary> {
        if !input_dir.is_dir() {
            return Err(RigError::FileNotFound(input_dir.display().to_string()));
        }

        let sources = find_media_files(input_dir);
        info!("Found {} media files to convert", sources.len());

        let (requests, mut failed) = plan_batch(sources, format, output_dir, still_image);
        for (source, reason) in &failed {
            warn!("Skipping {}: {}", source.display(), reason);
        }

        let mut summary = BatchSummary::default();
        for request in requests {
            match self.convert(&request, cancel.clone()).await {
                Ok(output) => {
                    info!("Converted: {}", output.display());
                    summary.converted.push(output);
                }
                Err(RigError::Cancelled) => return Err(RigError::Cancelled),
                Err(e) if e.is_tool_missing() => return Err(e),
                Err(e) => {
                    warn!("Failed to convert {}: {}", request.source.display(), e);
                    summary.failed.push((request.source, e.to_string()));
                }
            }
        }

        summary.failed.append(&mut failed);
        Ok(summary)
    }
}

/// One request per source. A source whose output path was already claimed by
/// an earlier source is reported instead of being converted over it.
fn plan_batch(
    sources: Vec<PathBuf>,
    format: &str,
    output_dir: Option<&Path>,
    still_image: Option<&Path>,
) -> (Vec<ConversionRequest>, Vec<(PathBuf, String)>) {
    let mut claimed = HashSet::new();
    let mut requests = Vec::new();
    let mut skipped = Vec::new();

    for source in sources {
        let dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| source.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let mut request = ConversionRequest::new(&source, format, dir);
        if let Some(image) = still_image {
            request = request.with_still_image(image);
        }

        let output = request.output_path();
        if claimed.insert(output.clone()) {
            requests.push(request);
        } else {
            skipped.push((
                source,
                format!("output {} is produced by another file", output.display()),
            ));
        }
    }

    (requests, skipped)
}

/// Media files under `dir`, in a stable order
pub fn find_media_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_media_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}
