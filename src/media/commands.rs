use std::path::{Path, PathBuf};

use crate::config::ConvertConfig;
use crate::process::ToolCommand;
use crate::tags::MediaTags;

use super::Resolution;

/// Builds transcoder invocations from the conversion settings.
pub struct TranscodeCommandBuilder {
    program: PathBuf,
    config: ConvertConfig,
}

impl TranscodeCommandBuilder {
    pub fn new<P: Into<PathBuf>>(program: P, config: ConvertConfig) -> Self {
        Self {
            program: program.into(),
            config,
        }
    }

    fn command<S: Into<String>>(&self, description: S) -> ToolCommand {
        ToolCommand::new(&self.program, description)
    }

    /// Loop a still image as video under an audio track, stopping when the
    /// audio ends.
    pub fn still_image_video<P: AsRef<Path>>(
        &self,
        image: P,
        audio: P,
        resolution: Option<Resolution>,
        output: P,
    ) -> ToolCommand {
        self.command("Still image composition")
            .overwrite()
            .flag("-loop", "1")
            .flag("-framerate", self.config.still_image_framerate.to_string())
            .input(image)
            .input(audio)
            .video_codec("libx264")
            .flag("-tune", "stillimage")
            .audio_codec("aac")
            .audio_bitrate(self.config.audio_bitrate.as_str())
            .flag("-pix_fmt", "yuv420p")
            .video_filter(still_image_filter(resolution))
            .arg("-shortest")
            .output(output)
    }

    /// Per-format transcode template. Unknown formats let the transcoder pick
    /// codecs from the output extension.
    pub fn direct<P: AsRef<Path>>(&self, input: P, format: &str, output: P) -> ToolCommand {
        let cmd = self
            .command(format!("Convert to {}", format))
            .overwrite()
            .input(input);

        let cmd = match format {
            "mp4" => cmd
                .video_codec("libx264")
                .flag("-crf", self.config.crf.to_string())
                .flag("-preset", self.config.preset.as_str())
                .audio_codec("aac")
                .audio_bitrate(self.config.audio_bitrate.as_str()),
            "mkv" => cmd.copy_video().copy_audio(),
            "mp3" => cmd.no_video().flag("-q:a", "0"),
            "wav" => cmd.no_video(),
            _ => cmd,
        };

        cmd.output(output)
    }

    /// Bare `-i <input>`: the transcoder prints stream and tag information on
    /// its diagnostic stream, then fails for lack of an output.
    pub fn inspect<P: AsRef<Path>>(&self, input: P) -> ToolCommand {
        self.command("Tag inspection").input(input)
    }

    pub fn cover_art<P: AsRef<Path>>(&self, input: P, output: P) -> ToolCommand {
        self.command("Cover art extraction")
            .overwrite()
            .input(input)
            .no_audio()
            .flag("-vcodec", "copy")
            .output(output)
    }

    /// Rewrite tags into `output`, optionally replacing the attached picture.
    pub fn write_tags<P: AsRef<Path>>(
        &self,
        input: P,
        tags: &MediaTags,
        cover: Option<P>,
        output: P,
    ) -> ToolCommand {
        let cmd = self.command("Tag write").overwrite().input(input);

        let cmd = match cover {
            Some(cover) => cmd
                .input(cover)
                .flag("-map", "0:a")
                .flag("-map", "1")
                .copy_audio()
                .copy_video()
                .flag("-id3v2_version", "3"),
            None => cmd.flag("-c", "copy"),
        };

        cmd.args(tags.metadata_args()).output(output)
    }
}

/// Scale into the requested frame and pad the remainder, or with no frame
/// size, pad to even dimensions for yuv420p.
pub fn still_image_filter(resolution: Option<Resolution>) -> String {
    match resolution {
        Some(Resolution { width, height }) => format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = width,
            h = height
        ),
        None => "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
    }
}

/// Full structured dump from the prober as JSON.
pub fn probe_command<P: AsRef<Path>, Q: AsRef<Path>>(prober: P, input: Q) -> ToolCommand {
    ToolCommand::new(prober.as_ref(), "Probe")
        .flag("-v", "quiet")
        .flag("-print_format", "json")
        .args([
            "-show_format",
            "-show_streams",
            "-show_chapters",
            "-show_private_data",
        ])
        .path_arg(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TranscodeCommandBuilder {
        TranscodeCommandBuilder::new("/opt/ffmpeg", ConvertConfig::default())
    }

    #[test]
    fn test_still_image_without_resolution() {
        let cmd = builder().still_image_video("cover.jpg", "song.mp3", None, "out/song.mp4");

        assert_eq!(
            cmd.args,
            vec![
                "-y", "-loop", "1", "-framerate", "2", "-i", "cover.jpg", "-i", "song.mp3",
                "-c:v", "libx264", "-tune", "stillimage", "-c:a", "aac", "-b:a", "192k",
                "-pix_fmt", "yuv420p", "-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-shortest",
                "out/song.mp4",
            ]
        );
    }

    #[test]
    fn test_still_image_with_resolution() {
        let cmd = builder().still_image_video(
            "cover.jpg",
            "song.mp3",
            Some(Resolution { width: 1280, height: 720 }),
            "song.mp4",
        );
        assert_eq!(
            cmd.value_of("-vf"),
            Some("scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2")
        );
    }

    #[test]
    fn test_direct_templates() {
        let b = builder();

        let mp4 = b.direct("in.mov", "mp4", "in.mp4");
        assert_eq!(
            mp4.args,
            vec![
                "-y", "-i", "in.mov", "-c:v", "libx264", "-crf", "18", "-preset", "medium",
                "-c:a", "aac", "-b:a", "192k", "in.mp4",
            ]
        );

        let mkv = b.direct("in.mp4", "mkv", "in.mkv");
        assert_eq!(mkv.args, vec!["-y", "-i", "in.mp4", "-c:v", "copy", "-c:a", "copy", "in.mkv"]);

        let mp3 = b.direct("in.flac", "mp3", "in.mp3");
        assert_eq!(mp3.args, vec!["-y", "-i", "in.flac", "-vn", "-q:a", "0", "in.mp3"]);

        let wav = b.direct("in.mp4", "wav", "in.wav");
        assert_eq!(wav.args, vec!["-y", "-i", "in.mp4", "-vn", "in.wav"]);

        let ogg = b.direct("in.mp3", "ogg", "in.ogg");
        assert_eq!(ogg.args, vec!["-y", "-i", "in.mp3", "in.ogg"]);
    }

    #[test]
    fn test_write_tags_with_cover() {
        let tags = MediaTags {
            title: Some("Song".to_string()),
            ..Default::default()
        };
        let cmd = builder().write_tags("a.mp3", &tags, Some("c.jpg"), "temp_a.mp3");
        assert_eq!(
            cmd.args,
            vec![
                "-y", "-i", "a.mp3", "-i", "c.jpg", "-map", "0:a", "-map", "1", "-c:a", "copy",
                "-c:v", "copy", "-id3v2_version", "3", "-metadata", "title=Song", "temp_a.mp3",
            ]
        );

        let plain = builder().write_tags("a.mp3", &tags, None, "temp_a.mp3");
        assert_eq!(plain.value_of("-c"), Some("copy"));
        assert!(!plain.has_arg("-map"));
    }

    #[test]
    fn test_cover_and_inspect() {
        let cover = builder().cover_art("a.mp3", "a.jpg");
        assert_eq!(cover.args, vec!["-y", "-i", "a.mp3", "-an", "-vcodec", "copy", "a.jpg"]);

        let inspect = builder().inspect("a.mp3");
        assert_eq!(inspect.args, vec!["-i", "a.mp3"]);
    }

    #[test]
    fn test_probe_command() {
        let cmd = probe_command("/opt/ffprobe", "a b.mkv");
        assert_eq!(cmd.value_of("-print_format"), Some("json"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("a b.mkv"));
        assert!(cmd.has_arg("-show_chapters"));
    }
}
