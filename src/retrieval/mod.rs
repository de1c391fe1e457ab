// Downloader-driven retrieval
//
// - commands: downloader argument templates
// - downloader: the Retriever orchestrator (download + metadata probe)
// - thumbnail: best-effort HTTP fetch of probe thumbnails

pub mod commands;
pub mod downloader;
pub mod thumbnail;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

pub use commands::DownloadCommandBuilder;
pub use downloader::Retriever;
pub use thumbnail::ThumbnailFetcher;

use crate::error::{Result, RigError};

/// Media class and container requested from the downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSelection {
    VideoMp4,
    VideoMkv,
    VideoWebm,
    /// Best available pairing in whatever container the downloader picks
    VideoBest,
    AudioMp3,
    AudioFlac,
    AudioWav,
    AudioM4a,
    AudioWebm,
}

impl FormatSelection {
    pub fn is_video(self) -> bool {
        matches!(
            self,
            Self::VideoMp4 | Self::VideoMkv | Self::VideoWebm | Self::VideoBest
        )
    }

    /// WAV has nowhere to store tags or a thumbnail.
    pub fn supports_tags(self) -> bool {
        !matches!(self, Self::AudioWav)
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::VideoMp4 => "VIDEO_MP4",
            Self::VideoMkv => "VIDEO_MKV",
            Self::VideoWebm => "VIDEO_WEBM",
            Self::VideoBest => "VIDEO_BEST",
            Self::AudioMp3 => "AUDIO_MP3",
            Self::AudioFlac => "AUDIO_FLAC",
            Self::AudioWav => "AUDIO_WAV",
            Self::AudioM4a => "AUDIO_M4A",
            Self::AudioWebm => "AUDIO_WEBM",
        }
    }
}

impl FromStr for FormatSelection {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_uppercase();

        if token.starts_with("VIDEO") {
            return Ok(if token.contains("MP4") {
                Self::VideoMp4
            } else if token.contains("MKV") {
                Self::VideoMkv
            } else if token.contains("WEBM") {
                Self::VideoWebm
            } else {
                Self::VideoBest
            });
        }

        if token.starts_with("AUDIO") {
            if token.contains("MP3") {
                return Ok(Self::AudioMp3);
            } else if token.contains("FLAC") {
                return Ok(Self::AudioFlac);
            } else if token.contains("WAV") {
                return Ok(Self::AudioWav);
            } else if token.contains("M4A") {
                return Ok(Self::AudioM4a);
            } else if token.contains("WEBM") {
                return Ok(Self::AudioWebm);
            }
        }

        Err(RigError::InvalidRequest(format!("Unknown format '{}'", s)))
    }
}

impl fmt::Display for FormatSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub url: Url,
    pub format: FormatSelection,
    pub embed_metadata: bool,
    pub output_dir: PathBuf,
}

impl RetrievalRequest {
    pub fn new<P: Into<PathBuf>>(
        url: &str,
        format: &str,
        embed_metadata: bool,
        output_dir: P,
    ) -> Result<Self> {
        let url = Url::parse(url.trim())
            .map_err(|e| RigError::InvalidRequest(format!("Invalid URL '{}': {}", url, e)))?;

        Ok(Self {
            url,
            format: format.parse()?,
            embed_metadata,
            output_dir: output_dir.into(),
        })
    }

    /// Whether metadata and thumbnail embedding is actually requested
    pub fn embeds_metadata(&self) -> bool {
        self.embed_metadata && self.format.supports_tags()
    }
}

/// Result of a metadata-only probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteMetadata {
    pub title: String,
    pub duration: String,
    pub thumbnail_url: String,
    pub uploader: Option<String>,
}

/// Field separator in the probe print template
pub const PROBE_SEPARATOR: char = '|';

/// Parse the probe line `title|duration|thumbnail[|uploader]`. Fewer than three
/// fields is malformed; the uploader is optional.
pub fn parse_probe_line(line: &str) -> Result<RemoteMetadata> {
    let fields: Vec<&str> = line.split(PROBE_SEPARATOR).map(str::trim).collect();
    if fields.len() < 3 {
        return Err(RigError::MalformedOutput(format!(
            "expected at least 3 probe fields, got {}",
            fields.len()
        )));
    }

    Ok(RemoteMetadata {
        title: fields[0].to_string(),
        duration: fields[1].to_string(),
        thumbnail_url: fields[2].to_string(),
        uploader: fields
            .get(3)
            .filter(|uploader| !uploader.is_empty())
            .map(|uploader| uploader.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tokens() {
        assert_eq!("VIDEO_MP4".parse::<FormatSelection>().unwrap(), FormatSelection::VideoMp4);
        assert_eq!("audio_wav".parse::<FormatSelection>().unwrap(), FormatSelection::AudioWav);
        assert_eq!("VIDEO_AV1".parse::<FormatSelection>().unwrap(), FormatSelection::VideoBest);
        assert!("AUDIO_OPUS".parse::<FormatSelection>().is_err());
        assert!("MP3".parse::<FormatSelection>().is_err());
        assert_eq!(FormatSelection::AudioM4a.to_string(), "AUDIO_M4A");
    }

    #[test]
    fn test_wav_never_embeds() {
        let wav = RetrievalRequest::new("https://example.com/v", "AUDIO_WAV", true, "out").unwrap();
        assert!(!wav.embeds_metadata());

        let mp3 = RetrievalRequest::new("https://example.com/v", "AUDIO_MP3", true, "out").unwrap();
        assert!(mp3.embeds_metadata());

        let off = RetrievalRequest::new("https://example.com/v", "AUDIO_MP3", false, "out").unwrap();
        assert!(!off.embeds_metadata());
    }

    #[test]
    fn test_invalid_url() {
        let err = RetrievalRequest::new("not a url", "AUDIO_MP3", true, "out").unwrap_err();
        assert!(matches!(err, RigError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_probe_line() {
        let meta = parse_probe_line(
            "Some Talk | 1:02:03 | https://img.example.com/t.jpg | Channel\n",
        )
        .unwrap();
        assert_eq!(meta.title, "Some Talk");
        assert_eq!(meta.duration, "1:02:03");
        assert_eq!(meta.thumbnail_url, "https://img.example.com/t.jpg");
        assert_eq!(meta.uploader.as_deref(), Some("Channel"));

        let no_uploader = parse_probe_line("a|3:00|https://x/t.jpg").unwrap();
        assert_eq!(no_uploader.uploader, None);
    }

    #[test]
    fn test_short_probe_line_is_malformed() {
        assert!(matches!(
            parse_probe_line("title|3:00"),
            Err(RigError::MalformedOutput(_))
        ));
        assert!(parse_probe_line("").is_err());
    }
}
