//! mediarig - external media tool orchestration
//!
//! Drives ffmpeg, ffprobe, yt-dlp and exiftool as child processes, streaming
//! their output line by line, extracting progress from it and cancelling
//! jobs on request.

pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod media;
pub mod process;
pub mod progress;
pub mod retrieval;
pub mod tags;
pub mod tools;
pub mod workflow;
