// Transcoder-driven media operations
//
// - commands: argument templates for every transcoder/prober invocation
// - processor: the Converter orchestrator that checks tools and runs jobs

pub mod commands;
pub mod processor;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use commands::TranscodeCommandBuilder;
pub use processor::Converter;

use crate::error::RigError;

/// Source extensions treated as audio-only containers
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "wma"];

/// Target formats that carry a video stream
pub const VIDEO_CONTAINERS: &[&str] = &["mp4", "mkv", "avi"];

pub fn is_audio_file(path: &Path) -> bool {
    extension_lowercase(path).is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_video_container(format: &str) -> bool {
    VIDEO_CONTAINERS.contains(&format.to_lowercase().as_str())
}

/// Extensions the batch command picks up
pub fn is_media_file(path: &Path) -> bool {
    const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v"];
    extension_lowercase(path).is_some_and(|ext| {
        AUDIO_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
    })
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Output frame size for still-image composition, written `W:H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RigError::InvalidRequest(format!("Invalid resolution '{}', expected W:H", s));
        let (w, h) = s.trim().split_once(':').ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// One file conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source: PathBuf,
    /// Target container/format token, e.g. `mp4` or `MP3`
    pub target_format: String,
    pub output_dir: PathBuf,
    pub still_image: Option<PathBuf>,
    /// Requested frame size as `W:H`; only used for still-image composition
    pub resolution: Option<String>,
}

/// How a request will be carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionMode<'a> {
    /// Loop a still image over an audio track to produce video
    StillImage(&'a Path),
    Direct,
}

impl ConversionRequest {
    pub fn new<S, F, O>(source: S, target_format: F, output_dir: O) -> Self
    where
        S: Into<PathBuf>,
        F: Into<String>,
        O: Into<PathBuf>,
    {
        Self {
            source: source.into(),
            target_format: target_format.into(),
            output_dir: output_dir.into(),
            still_image: None,
            resolution: None,
        }
    }

    pub fn with_still_image<P: Into<PathBuf>>(mut self, image: P) -> Self {
        self.still_image = Some(image.into());
        self
    }

    pub fn with_resolution<S: Into<String>>(mut self, resolution: S) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn format(&self) -> String {
        self.target_format.trim().trim_start_matches('.').to_lowercase()
    }

    /// `<output_dir>/<source stem>.<format>`
    pub fn output_path(&self) -> PathBuf {
        let stem = self
            .source
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        self.output_dir.join(format!("{}.{}", stem, self.format()))
    }

    pub fn composition(&self) -> CompositionMode<'_> {
        match &self.still_image {
            Some(image) if is_audio_file(&self.source) && is_video_container(&self.format()) => {
                CompositionMode::StillImage(image.as_path())
            }
            _ => CompositionMode::Direct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse() {
        assert_eq!(
            "1920:1080".parse::<Resolution>().unwrap(),
            Resolution { width: 1920, height: 1080 }
        );
        assert!("1920x1080".parse::<Resolution>().is_err());
        assert!("0:720".parse::<Resolution>().is_err());
        assert!("wide:tall".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_output_path() {
        let request = ConversionRequest::new("/music/Live Set.flac", "MP3", "/out");
        assert_eq!(request.output_path(), PathBuf::from("/out/Live Set.mp3"));
    }

    #[test]
    fn test_composition_mode() {
        let still = ConversionRequest::new("song.mp3", "mp4", "out").with_still_image("cover.jpg");
        assert_eq!(still.composition(), CompositionMode::StillImage(Path::new("cover.jpg")));

        let audio_target = ConversionRequest::new("song.mp3", "wav", "out").with_still_image("cover.jpg");
        assert_eq!(audio_target.composition(), CompositionMode::Direct);

        let video_source = ConversionRequest::new("clip.mov", "mp4", "out").with_still_image("cover.jpg");
        assert_eq!(video_source.composition(), CompositionMode::Direct);

        let no_image = ConversionRequest::new("song.mp3", "mp4", "out");
        assert_eq!(no_image.composition(), CompositionMode::Direct);
    }

    #[test]
    fn test_media_detection() {
        assert!(is_audio_file(Path::new("a/B.FLAC")));
        assert!(!is_audio_file(Path::new("clip.mp4")));
        assert!(is_media_file(Path::new("clip.webm")));
        assert!(!is_media_file(Path::new("notes.txt")));
        assert!(is_video_container("MKV"));
    }
}
