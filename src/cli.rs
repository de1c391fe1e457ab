use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging and echo every tool output line
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Cancel the command after this many seconds, including one-shot queries
    #[arg(short, long)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show where each external tool resolves and whether it is present
    Tools,

    /// Convert a single media file
    Convert {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,

        /// Target format (mp4, mkv, avi, mp3, wav, ...)
        #[arg(short, long)]
        format: String,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Still image to loop over an audio source when the target is video
        #[arg(long)]
        image: Option<PathBuf>,

        /// Frame size for still-image video, as W:H
        #[arg(long)]
        resolution: Option<String>,
    },

    /// Convert every media file in a directory
    Batch {
        /// Input directory containing media files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Target format
        #[arg(short, long)]
        format: String,

        /// Output directory (defaults to each file's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Still image to loop over audio sources when the target is video
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Download media from a URL
    Download {
        /// Media page URL
        url: String,

        /// Format selection (VIDEO_MP4, VIDEO_MKV, VIDEO_WEBM, AUDIO_MP3, AUDIO_FLAC, AUDIO_WAV, AUDIO_M4A, AUDIO_WEBM)
        #[arg(short, long, default_value = "AUDIO_MP3")]
        format: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Do not embed tags and thumbnail
        #[arg(long)]
        no_metadata: bool,
    },

    /// Look up title, duration, thumbnail and uploader of a URL
    Probe {
        /// Media page URL
        url: String,

        /// Save the thumbnail to this file
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },

    /// Show grouped tags read by the tag reader
    Tags {
        /// Input media file
        input: PathBuf,
    },

    /// Show tags as the transcoder reports them
    Inspect {
        /// Input media file
        input: PathBuf,
    },

    /// Dump format, streams and chapters as JSON
    ProbeFile {
        /// Input media file
        input: PathBuf,
    },

    /// Extract embedded cover art
    Cover {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,

        /// Output image file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Rewrite tags of a media file in place
    Retag {
        /// Input media file
        input: PathBuf,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        artist: Option<String>,

        #[arg(long)]
        album: Option<String>,

        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        genre: Option<String>,

        #[arg(long)]
        comment: Option<String>,

        /// Replace the attached picture with this image
        #[arg(long)]
        cover: Option<PathBuf>,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Destination path
        #[arg(default_value = "mediarig.toml")]
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_defaults() {
        let args = Args::parse_from(["mediarig", "download", "https://example.com/v"]);
        match args.command {
            Commands::Download {
                format,
                output_dir,
                no_metadata,
                ..
            } => {
                assert_eq!(format, "AUDIO_MP3");
                assert_eq!(output_dir, PathBuf::from("."));
                assert!(!no_metadata);
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = Args::parse_from([
            "mediarig", "-v", "--timeout", "30", "convert", "-i", "a.mp3", "-f", "wav",
        ]);
        assert!(args.verbose);
        assert_eq!(args.timeout, Some(30));
        assert!(matches!(args.command, Commands::Convert { .. }));
    }

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
