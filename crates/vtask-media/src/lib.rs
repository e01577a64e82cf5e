//! FFmpeg, yt-dlp and whisper CLI wrapper.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with progress parsing
//! - The SRT subtitle codec and SRT-to-ASS rendering
//! - Audio extraction, transcription, subtitle burning/muxing and section downloads
//! - The [`MediaToolchain`] trait consumed by the job bodies

pub mod ass;
pub mod audio;
pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod filters;
pub mod progress;
pub mod srt;
pub mod subtitles;
pub mod toolchain;
pub mod transcribe;

pub use command::{check_ffmpeg, check_whisper, check_ytdlp, run_tool, FfmpegCommand, FfmpegRunner};
pub use config::MediaConfig;
pub use error::{MediaError, MediaResult};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use srt::SubtitleCue;
pub use toolchain::{Container, FfmpegToolchain, MediaToolchain, VideoArtifact};
