use std::path::{Path, PathBuf};
use url::Url;

use crate::config::DownloadConfig;
use crate::process::ToolCommand;

use super::{FormatSelection, RetrievalRequest, PROBE_SEPARATOR};

const BEST_PAIR: &str = "bestvideo+bestaudio/best";

/// Builds downloader invocations.
pub struct DownloadCommandBuilder {
    program: PathBuf,
    config: DownloadConfig,
    /// Directory handed to `--ffmpeg-location`
    transcoder_dir: Option<PathBuf>,
}

impl DownloadCommandBuilder {
    pub fn new<P: Into<PathBuf>>(program: P, config: DownloadConfig) -> Self {
        Self {
            program: program.into(),
            config,
            transcoder_dir: None,
        }
    }

    pub fn with_transcoder_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.transcoder_dir = Some(dir.into());
        self
    }

    pub fn download(&self, request: &RetrievalRequest) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.program, format!("Download {}", request.format))
            .args(["--no-mtime", "--newline"]);

        if let Some(dir) = &self.transcoder_dir {
            cmd = cmd.arg("--ffmpeg-location").path_arg(dir);
        }

        cmd = cmd.arg(request.url.as_str());

        if !self.config.check_certificates {
            cmd = cmd.arg("--no-check-certificates");
        }

        if request.embeds_metadata() {
            cmd = cmd.args(["--add-metadata", "--embed-thumbnail"]);
        }

        cmd.args(self.format_args(request.format))
            .arg("-o")
            .path_arg(request.output_dir.join(&self.config.output_template))
    }

    fn format_args(&self, format: FormatSelection) -> Vec<String> {
        match format {
            FormatSelection::VideoMp4 => vec![
                "-f".into(),
                "bestvideo[ext=mp4]+bestaudio/bestvideo+bestaudio/best".into(),
                "--recode-video".into(),
                "mp4".into(),
                "--postprocessor-args".into(),
                format!("VideoConvertor:-c:a aac -b:a {}", self.config.recode_audio_bitrate),
            ],
            FormatSelection::VideoMkv => merge_into("mkv"),
            FormatSelection::VideoWebm => merge_into("webm"),
            FormatSelection::VideoBest => vec!["-f".into(), BEST_PAIR.into()],
            FormatSelection::AudioMp3 => extract_audio("mp3")
                .into_iter()
                .chain(["--audio-quality".to_string(), "0".to_string()])
                .collect(),
            FormatSelection::AudioFlac => extract_audio("flac"),
            FormatSelection::AudioWav => extract_audio("wav"),
            FormatSelection::AudioM4a => extract_audio("m4a"),
            FormatSelection::AudioWebm => vec!["-f".into(), "bestaudio[ext=webm]/bestaudio".into()],
        }
    }

    /// Metadata-only query printing one `|`-joined line.
    pub fn probe(&self, url: &Url) -> ToolCommand {
        let template = ["%(title)s", "%(duration_string)s", "%(thumbnail)s", "%(uploader)s"]
            .join(&PROBE_SEPARATOR.to_string());

        ToolCommand::new(&self.program, "Probe")
            .arg(url.as_str())
            .flag("--print", template)
            .args([
                "--no-playlist",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
            ])
    }
}

fn merge_into(container: &str) -> Vec<String> {
    vec![
        "-f".into(),
        BEST_PAIR.into(),
        "--merge-output-format".into(),
        container.into(),
    ]
}

fn extract_audio(codec: &str) -> Vec<String> {
    vec!["-x".into(), "--audio-format".into(), codec.into()]
}

/// Directory containing the transcoder executable
pub fn transcoder_dir(transcoder: &Path) -> Option<PathBuf> {
    transcoder
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(format: &str, embed: bool) -> RetrievalRequest {
        RetrievalRequest::new("https://example.com/watch?v=abc", format, embed, "/downloads").unwrap()
    }

    fn builder() -> DownloadCommandBuilder {
        DownloadCommandBuilder::new("/opt/tools/yt-dlp", DownloadConfig::default())
            .with_transcoder_dir("/opt")
    }

    #[test]
    fn test_wav_omits_metadata_flags() {
        let cmd = builder().download(&request("AUDIO_WAV", true));
        assert!(!cmd.has_arg("--add-metadata"));
        assert!(!cmd.has_arg("--embed-thumbnail"));
        assert_eq!(cmd.value_of("--audio-format"), Some("wav"));
    }

    #[test]
    fn test_mp3_includes_metadata_flags() {
        let cmd = builder().download(&request("AUDIO_MP3", true));
        assert_eq!(
            cmd.args,
            vec![
                "--no-mtime",
                "--newline",
                "--ffmpeg-location",
                "/opt",
                "https://example.com/watch?v=abc",
                "--no-check-certificates",
                "--add-metadata",
                "--embed-thumbnail",
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "0",
                "-o",
                "/downloads/%(title)s.%(ext)s",
            ]
        );
    }

    #[test]
    fn test_video_templates() {
        let mp4 = builder().download(&request("VIDEO_MP4", false));
        assert_eq!(mp4.value_of("--recode-video"), Some("mp4"));
        assert_eq!(
            mp4.value_of("--postprocessor-args"),
            Some("VideoConvertor:-c:a aac -b:a 320k")
        );

        let mkv = builder().download(&request("VIDEO_MKV", false));
        assert_eq!(mkv.value_of("-f"), Some(BEST_PAIR));
        assert_eq!(mkv.value_of("--merge-output-format"), Some("mkv"));

        let best = builder().download(&request("VIDEO_HDR", false));
        assert_eq!(best.value_of("-f"), Some(BEST_PAIR));
        assert!(!best.has_arg("--merge-output-format"));
    }

    #[test]
    fn test_certificate_checks_and_location() {
        let config = DownloadConfig {
            check_certificates: true,
            ..Default::default()
        };
        let cmd = DownloadCommandBuilder::new("yt-dlp", config).download(&request("AUDIO_FLAC", false));
        assert!(!cmd.has_arg("--no-check-certificates"));
        assert!(!cmd.has_arg("--ffmpeg-location"));
    }

    #[test]
    fn test_probe_command() {
        let url = Url::parse("https://example.com/v").unwrap();
        let cmd = builder().probe(&url);
        assert_eq!(cmd.args[0], "https://example.com/v");
        assert_eq!(
            cmd.value_of("--print"),
            Some("%(title)s|%(duration_string)s|%(thumbnail)s|%(uploader)s")
        );
        assert!(cmd.has_arg("--skip-download"));
    }
}
