use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ToolsConfig;
use crate::error::{Result, RigError};

/// External executables driven by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Transcoder,
    Prober,
    Downloader,
    TagReader,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Transcoder,
        ToolKind::Prober,
        ToolKind::Downloader,
        ToolKind::TagReader,
    ];

    /// Executable name without platform suffix
    pub fn binary_name(self) -> &'static str {
        match self {
            ToolKind::Transcoder => "ffmpeg",
            ToolKind::Prober => "ffprobe",
            ToolKind::Downloader => "yt-dlp",
            ToolKind::TagReader => "exiftool",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}{}", self.binary_name(), std::env::consts::EXE_SUFFIX)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub kind: ToolKind,
    pub path: PathBuf,
    pub available: bool,
}

/// Point-in-time view of every tool. Not cached: take a new one to notice
/// tools installed mid-session.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSet {
    pub tools: Vec<ToolStatus>,
}

impl ToolSet {
    pub fn get(&self, kind: ToolKind) -> Option<&ToolStatus> {
        self.tools.iter().find(|status| status.kind == kind)
    }

    pub fn all_available(&self) -> bool {
        self.tools.iter().all(|status| status.available)
    }
}

/// Resolves tool paths from a fixed layout: transcoder, prober and tag reader
/// next to each other in `base_dir`, the downloader in its own directory.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    config: ToolsConfig,
}

impl ToolLocator {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    fn bundled_path(&self, kind: ToolKind) -> PathBuf {
        let dir = match kind {
            ToolKind::Downloader => self.config.downloader_dir(),
            _ => self.config.base_dir.clone(),
        };
        dir.join(kind.file_name())
    }

    /// Path the tool would be launched from. The bundled location wins; when it
    /// is absent and PATH search is enabled, a PATH hit is returned instead.
    /// An unresolvable tool still yields its bundled path.
    pub fn resolve(&self, kind: ToolKind) -> PathBuf {
        let bundled = self.bundled_path(kind);
        if bundled.is_file() || !self.config.search_path {
            return bundled;
        }

        match which::which(kind.binary_name()) {
            Ok(found) => {
                debug!("Resolved {} from PATH: {}", kind, found.display());
                found
            }
            Err(_) => bundled,
        }
    }

    /// Existence check only; no version or compatibility probing.
    pub fn is_available(&self, kind: ToolKind) -> bool {
        is_present(&self.resolve(kind))
    }

    /// Resolved path of a tool that must be present, or `ToolMissing`.
    pub fn require(&self, kind: ToolKind) -> Result<PathBuf> {
        let path = self.resolve(kind);
        if is_present(&path) {
            Ok(path)
        } else {
            Err(RigError::ToolMissing { tool: kind, path })
        }
    }

    pub fn snapshot(&self) -> ToolSet {
        let tools = ToolKind::ALL
            .iter()
            .map(|&kind| {
                let path = self.resolve(kind);
                ToolStatus {
                    kind,
                    available: is_present(&path),
                    path,
                }
            })
            .collect();
        ToolSet { tools }
    }
}

fn is_present(path: &Path) -> bool {
    path.is_file()
}
