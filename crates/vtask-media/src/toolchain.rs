//! Byte-oriented media toolchain used by the job bodies.
//!
//! Each call gets its own scratch directory under the configured work dir,
//! removed when the call returns, so nothing is left behind on failure.

use async_trait::async_trait;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;
use vtask_models::SubtitleOptions;

use crate::config::MediaConfig;
use crate::error::MediaResult;
use crate::{audio, download, subtitles, transcribe};

/// Output container of a produced video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Matroska,
}

impl Container {
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Matroska => "mkv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Container::Mp4 => "video/mp4",
            Container::Matroska => "video/x-matroska",
        }
    }
}

/// Video bytes together with their container.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub data: Vec<u8>,
    pub container: Container,
}

/// External media tools as seen by the pipelines.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Download `[start_secs, end_secs]` of a remote video as MP4.
    async fn download_section(&self, url: &str, start_secs: f64, end_secs: f64) -> MediaResult<VideoArtifact>;

    /// Mono 16 kHz PCM WAV of the video's audio track.
    async fn extract_audio(&self, video: &[u8]) -> MediaResult<Vec<u8>>;

    /// SRT transcript of a WAV file in `language`.
    async fn transcribe(&self, audio: &[u8], language: &str) -> MediaResult<String>;

    /// Burn or mux SRT subtitles into the video.
    async fn burn_or_mux(&self, video: &[u8], srt: &str, options: &SubtitleOptions) -> MediaResult<VideoArtifact>;

    /// Burn an ASS script into the video, re-encoding to MP4.
    async fn burn_ass(&self, video: &[u8], ass_script: &[u8]) -> MediaResult<VideoArtifact>;
}

/// [`MediaToolchain`] backed by FFmpeg, yt-dlp and whisper.cpp.
#[derive(Debug, Clone)]
pub struct FfmpegToolchain {
    config: MediaConfig,
}

impl FfmpegToolchain {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    async fn scratch(&self) -> MediaResult<TempDir> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix("vtask-")
            .tempdir_in(&self.config.work_dir)?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(dir)
    }
}

async fn write_input(scratch: &Path, name: &str, bytes: &[u8]) -> MediaResult<std::path::PathBuf> {
    let path = scratch.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[async_trait]
impl MediaToolchain for FfmpegToolchain {
    async fn download_section(&self, url: &str, start_secs: f64, end_secs: f64) -> MediaResult<VideoArtifact> {
        let scratch = self.scratch().await?;
        let path = download::download_section(&self.config, url, start_secs, end_secs, scratch.path()).await?;
        Ok(VideoArtifact {
            data: tokio::fs::read(path).await?,
            container: Container::Mp4,
        })
    }

    async fn extract_audio(&self, video: &[u8]) -> MediaResult<Vec<u8>> {
        let scratch = self.scratch().await?;
        let input = write_input(scratch.path(), "input-video", video).await?;
        let wav = audio::extract_audio(&self.config, &input, scratch.path()).await?;
        Ok(tokio::fs::read(wav).await?)
    }

    async fn transcribe(&self, audio: &[u8], language: &str) -> MediaResult<String> {
        let scratch = self.scratch().await?;
        let input = write_input(scratch.path(), "audio.wav", audio).await?;
        transcribe::transcribe(&self.config, &input, language, scratch.path()).await
    }

    async fn burn_or_mux(&self, video: &[u8], srt: &str, options: &SubtitleOptions) -> MediaResult<VideoArtifact> {
        let scratch = self.scratch().await?;
        let input = write_input(scratch.path(), "input-video", video).await?;
        let (output, container) = subtitles::burn_or_mux(&self.config, &input, srt, options, scratch.path()).await?;
        Ok(VideoArtifact {
            data: tokio::fs::read(output).await?,
            container,
        })
    }

    async fn burn_ass(&self, video: &[u8], ass_script: &[u8]) -> MediaResult<VideoArtifact> {
        let scratch = self.scratch().await?;
        let input = write_input(scratch.path(), "input-video", video).await?;
        let output = subtitles::burn_ass(&self.config, &input, ass_script, scratch.path()).await?;
        Ok(VideoArtifact {
            data: tokio::fs::read(output).await?,
            container: Container::Mp4,
        })
    }
}
