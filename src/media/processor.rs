use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::error::{Result, RigError};
use crate::process::{JobObserver, ProcessRunner};
use crate::progress::ProgressMonitor;
use crate::tags::{MediaTags, TagField};
use crate::tools::{ToolKind, ToolLocator};

use super::commands::{probe_command, TranscodeCommandBuilder};
use super::{CompositionMode, ConversionRequest, Resolution};

/// Drives the transcoder and prober for conversions and tag maintenance.
pub struct Converter {
    locator: ToolLocator,
    runner: Arc<dyn ProcessRunner>,
    config: ConvertConfig,
}

impl Converter {
    pub fn new(locator: ToolLocator, runner: Arc<dyn ProcessRunner>, config: ConvertConfig) -> Self {
        Self {
            locator,
            runner,
            config,
        }
    }

    pub fn is_available(&self) -> bool {
        self.locator.is_available(ToolKind::Transcoder)
    }

    fn builder(&self) -> Result<TranscodeCommandBuilder> {
        let program = self.locator.require(ToolKind::Transcoder)?;
        Ok(TranscodeCommandBuilder::new(program, self.config.clone()))
    }

    /// Convert one file and return the output path. Any existing file at that
    /// path is overwritten; partial output is left behind on failure.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        observer: JobObserver,
        cancel: CancellationToken,
    ) -> Result<PathBuf> {
        let builder = self.builder()?;
        require_file(&request.source)?;

        let output = request.output_path();
        if output == request.source {
            return Err(RigError::InvalidRequest(format!(
                "{} is already in {} format",
                request.source.display(),
                request.format()
            )));
        }

        let command = match request.composition() {
            CompositionMode::StillImage(image) => {
                require_file(image)?;
                let resolution = request.resolution.as_deref().and_then(parse_resolution);
                builder.still_image_video(image, request.source.as_path(), resolution, output.as_path())
            }
            CompositionMode::Direct => builder.direct(&request.source, &request.format(), &output),
        };

        info!(
            "Converting {} -> {}",
            request.source.display(),
            output.display()
        );
        self.runner
            .run(command, ProgressMonitor::time_ratio(), observer, cancel)
            .await?;

        Ok(output)
    }

    /// Title, artist, album, year and genre as the transcoder reports them.
    pub async fn inspect_tags(&self, path: &Path) -> Result<MediaTags> {
        let command = self.builder()?.inspect(path);
        require_file(path)?;

        // Exits non-zero without an output file; only the diagnostics matter.
        let output = self.runner.capture(command).await?;
        Ok(tags_from_diagnostics(&output.stderr))
    }

    /// Format, stream and chapter dump from the prober.
    pub async fn probe_data(&self, path: &Path) -> Result<serde_json::Value> {
        let prober = self.locator.require(ToolKind::Prober)?;
        require_file(path)?;

        let output = self.runner.capture(probe_command(prober, path)).await?;
        if !output.success() {
            return Err(RigError::NonZeroExit {
                program: ToolKind::Prober.to_string(),
                code: output.code,
            });
        }

        serde_json::from_str(&output.stdout)
            .map_err(|e| RigError::MalformedOutput(format!("prober output is not JSON: {}", e)))
    }

    pub async fn extract_cover_art(
        &self,
        input: &Path,
        output: &Path,
        observer: JobObserver,
        cancel: CancellationToken,
    ) -> Result<()> {
        let command = self.builder()?.cover_art(input, output);
        require_file(input)?;

        info!("Extracting cover art from {}", input.display());
        self.runner
            .run(command, ProgressMonitor::Silent, observer, cancel)
            .await
    }

    /// Rewrite the tags of `input` in place. The new file is written next to
    /// the input and only replaces it once the transcoder succeeds.
    pub async fn write_tags(
        &self,
        input: &Path,
        tags: &MediaTags,
        cover: Option<&Path>,
        observer: JobObserver,
        cancel: CancellationToken,
    ) -> Result<()> {
        let builder = self.builder()?;
        require_file(input)?;
        if let Some(cover) = cover {
            require_file(cover)?;
        }

        let dir = input
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let suffix = input
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix("temp_")
            .suffix(&suffix)
            .tempfile_in(dir)?
            .into_temp_path();

        let command = builder.write_tags(input, tags, cover, &*temp);
        info!("Writing tags to {}", input.display());
        self.runner
            .run(command, ProgressMonitor::Silent, observer, cancel)
            .await?;

        // The temp file is created owner-only; carry the input's mode over.
        let permissions = tokio::fs::metadata(input).await?.permissions();
        tokio::fs::set_permissions(&*temp, permissions).await?;
        temp.persist(input).map_err(|e| RigError::Io(e.error))?;
        debug!("Replaced {}", input.display());
        Ok(())
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RigError::FileNotFound(path.display().to_string()))
    }
}

fn parse_resolution(value: &str) -> Option<Resolution> {
    match value.parse() {
        Ok(resolution) => Some(resolution),
        Err(e) => {
            warn!("{}; using the source image size", e);
            None
        }
    }
}

/// Pull tags out of the transcoder's `-i` diagnostics. Matches on the trimmed
/// line prefix, case-insensitively, and takes everything after the first colon.
pub fn tags_from_diagnostics(text: &str) -> MediaTags {
    let find = |name: &str| {
        text.lines()
            .map(str::trim)
            .filter(|line| {
                line.get(..name.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(name))
            })
            .find_map(|line| line.split_once(':'))
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let mut tags = MediaTags::default();
    tags.set(TagField::Title, find("title"));
    tags.set(TagField::Artist, find("artist"));
    tags.set(TagField::Album, find("album"));
    tags.set(TagField::Year, find("date").or_else(|| find("year")));
    tags.set(TagField::Genre, find("genre"));
    tags
}
