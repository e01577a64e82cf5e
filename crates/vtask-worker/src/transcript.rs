//! Transcript extraction for the extraction jobs.
//!
//! Subtitles are downloaded with yt-dlp (manual or automatic captions, VTT)
//! and flattened into text, one `[HH:MM:SS] line` per caption when
//! timestamps are requested. When none of the preferred languages exist, a
//! second download asks for the captions in the video's original language.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tracing::info;
use vtask_media::{download::writable_cookies, run_tool, MediaConfig};

use crate::error::{WorkerError, WorkerResult};

/// Source of video transcripts.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_transcript(&self, url: &str, with_timestamps: bool) -> WorkerResult<String>;
}

/// [`TranscriptSource`] backed by yt-dlp subtitle downloads.
pub struct YtDlpTranscriptSource {
    config: MediaConfig,
    languages: String,
    fallback_languages: String,
}

/// yt-dlp language selector for the auto-captions in a video's spoken language.
pub const ORIGINAL_LANGUAGE_CAPTIONS: &str = ".*-orig";

impl YtDlpTranscriptSource {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            config,
            languages: "en,en-US,en-GB".to_string(),
            fallback_languages: ORIGINAL_LANGUAGE_CAPTIONS.to_string(),
        }
    }

    /// Comma-separated subtitle languages, most preferred first.
    pub fn with_languages(mut self, languages: impl Into<String>) -> Self {
        self.languages = languages.into();
        self
    }

    /// Languages requested when none of the preferred ones were available.
    pub fn with_fallback_languages(mut self, languages: impl Into<String>) -> Self {
        self.fallback_languages = languages.into();
        self
    }

    fn args(&self, languages: &str, url: &str, output_template: &Path, cookies: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--write-auto-sub".to_string(),
            "--write-sub".to_string(),
            "--sub-lang".to_string(),
            languages.to_string(),
            "--skip-download".to_string(),
            "--sub-format".to_string(),
            "vtt".to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().to_string(),
        ];
        if let Some(cookies) = cookies {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl TranscriptSource for YtDlpTranscriptSource {
    async fn fetch_transcript(&self, url: &str, with_timestamps: bool) -> WorkerResult<String> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("vtask-transcript-")
            .tempdir_in(&self.config.work_dir)?;

        info!("Fetching transcript for {} using yt-dlp", url);

        let cookies = writable_cookies(self.config.cookies_path.as_deref(), scratch.path()).await;
        let template = scratch.path().join("%(id)s");

        let mut vtt_files = Vec::new();
        for languages in [self.languages.as_str(), self.fallback_languages.as_str()] {
            let args = self.args(languages, url, &template, cookies.as_deref());
            run_tool(&self.config.ytdlp_bin, &args, self.config.timeout_secs())
                .await
                .map_err(|e| WorkerError::transcript(format!("yt-dlp failed to download subtitles: {}", e)))?;

            vtt_files = list_vtt_files(scratch.path()).await?;
            if !vtt_files.is_empty() {
                break;
            }
            info!(languages, "No captions in requested languages");
        }

        let Some(vtt_path) = pick_caption_file(&vtt_files, &self.languages) else {
            return Err(WorkerError::transcript("No transcript file downloaded. Video may not have captions."));
        };

        let content = tokio::fs::read_to_string(vtt_path).await?;
        let transcript = flatten_vtt(&content, with_timestamps)?;
        if transcript.trim().is_empty() {
            return Err(WorkerError::transcript("Downloaded captions contain no text"));
        }
        Ok(transcript)
    }
}

async fn list_vtt_files(dir: &Path) -> WorkerResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("vtt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Choose the caption file whose language comes first in `preferred`.
///
/// yt-dlp names files `<id>.<lang>.vtt`. Original-language tracks rank after
/// every preferred language and before anything else.
fn pick_caption_file<'a>(files: &'a [PathBuf], preferred: &str) -> Option<&'a PathBuf> {
    let preferred: Vec<&str> = preferred.split(',').map(str::trim).collect();
    files.iter().min_by_key(|path| {
        let language = path
            .file_stem()
            .and_then(|stem| Path::new(stem).extension())
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_default();
        match preferred.iter().position(|p| *p == language) {
            Some(rank) => rank,
            None if language.ends_with("-orig") => preferred.len(),
            None => preferred.len() + 1,
        }
    })
}

/// Flatten WebVTT captions into plain text.
///
/// Inline tags are stripped and the repeated lines of rolling auto-captions
/// are dropped. With timestamps each line is prefixed by its cue start.
pub fn flatten_vtt(content: &str, with_timestamps: bool) -> WorkerResult<String> {
    let ts_pattern = Regex::new(r"^((?:\d{2}:)?\d{2}:\d{2})\.\d{3} -->")
        .map_err(|e| WorkerError::transcript(e.to_string()))?;
    let tag_pattern = Regex::new(r"<[^>]+>").map_err(|e| WorkerError::transcript(e.to_string()))?;

    let mut lines = Vec::new();
    let mut current_ts = "00:00:00".to_string();
    let mut last_text = String::new();
    let mut in_header = true;

    for raw in content.lines() {
        let line = tag_pattern.replace_all(raw.trim(), "").trim().to_string();

        if let Some(caps) = ts_pattern.captures(&line) {
            in_header = false;
            let ts = &caps[1];
            current_ts = if ts.split(':').count() == 2 {
                format!("00:{}", ts)
            } else {
                ts.to_string()
            };
            continue;
        }

        // WEBVTT header plus Kind:/Language: metadata
        if in_header || line.is_empty() || line.starts_with("NOTE") {
            continue;
        }

        // Cue identifiers
        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        if line != last_text {
            if with_timestamps {
                lines.push(format!("[{}] {}", current_ts, line));
            } else {
                lines.push(line.clone());
            }
            last_text = line;
        }
    }

    Ok(lines.join("\n"))
}
