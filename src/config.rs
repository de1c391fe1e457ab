use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, RigError};

fn default_base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_true() -> bool {
    true
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_crf() -> u8 {
    18
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_still_framerate() -> u32 {
    2
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

fn default_recode_audio_bitrate() -> String {
    "320k".to_string()
}

fn default_kill_grace_ms() -> u64 {
    2000
}

fn default_drain_grace_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub convert: ConvertConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory holding ffmpeg, ffprobe and exiftool
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Directory holding yt-dlp; `<base_dir>/tools` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloader_dir: Option<PathBuf>,
    /// Fall back to a PATH lookup when a bundled executable is absent
    #[serde(default = "default_true")]
    pub search_path: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// AAC bitrate for re-encoded audio
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    /// x264 constant rate factor for MP4 targets
    #[serde(default = "default_crf")]
    pub crf: u8,
    /// x264 preset for MP4 targets
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Frame rate of the looped still image in image+audio composition
    #[serde(default = "default_still_framerate")]
    pub still_image_framerate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Verify TLS certificates (yt-dlp `--no-check-certificates` when false)
    #[serde(default)]
    pub check_certificates: bool,
    /// yt-dlp output template, relative to the output directory
    #[serde(default = "default_output_template")]
    pub output_template: String,
    /// Audio bitrate used when recoding downloaded video to MP4
    #[serde(default = "default_recode_audio_bitrate")]
    pub recode_audio_bitrate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Upper bound on reaping a killed child before reporting cancellation
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    /// Upper bound on draining buffered output after the child exits
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            downloader_dir: None,
            search_path: default_true(),
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            audio_bitrate: default_audio_bitrate(),
            crf: default_crf(),
            preset: default_preset(),
            still_image_framerate: default_still_framerate(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            check_certificates: false,
            output_template: default_output_template(),
            recode_audio_bitrate: default_recode_audio_bitrate(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            kill_grace_ms: default_kill_grace_ms(),
            drain_grace_ms: default_drain_grace_ms(),
        }
    }
}

impl ToolsConfig {
    /// Tools that live in a fixed directory only, with no PATH fallback.
    pub fn bundled_only<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
            downloader_dir: None,
            search_path: false,
        }
    }

    pub fn downloader_dir(&self) -> PathBuf {
        self.downloader_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("tools"))
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RigError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RigError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RigError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RigError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.convert.audio_bitrate, "192k");
        assert_eq!(config.convert.crf, 18);
        assert_eq!(config.convert.still_image_framerate, 2);
        assert!(!config.download.check_certificates);
        assert!(config.tools.search_path);
        assert_eq!(config.runner.kill_grace_ms, 2000);
    }

    #[test]
    fn test_downloader_dir_defaults_under_base() {
        let tools = ToolsConfig::bundled_only("/opt/rig");
        assert_eq!(tools.downloader_dir(), PathBuf::from("/opt/rig/tools"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tools]
            base_dir = "/srv/bin"
            search_path = false

            [convert]
            crf = 22
            "#,
        )
        .unwrap();

        assert_eq!(config.tools.base_dir, PathBuf::from("/srv/bin"));
        assert!(!config.tools.search_path);
        assert_eq!(config.convert.crf, 22);
        assert_eq!(config.convert.preset, "medium");
        assert_eq!(config.download.output_template, "%(title)s.%(ext)s");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediarig.toml");

        let mut config = Config::default();
        config.download.check_certificates = true;
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert!(reloaded.download.check_certificates);
        assert_eq!(reloaded.runner.drain_grace_ms, 500);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/nonexistent/mediarig.toml").unwrap_err();
        assert!(matches!(err, RigError::Config(_)));
    }
}
