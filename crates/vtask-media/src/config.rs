//! Media toolchain configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Paths and limits for the external media tools.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// FFmpeg binary
    pub ffmpeg_bin: String,
    /// yt-dlp binary
    pub ytdlp_bin: String,
    /// whisper.cpp CLI binary
    pub whisper_bin: String,
    /// whisper.cpp GGML model file
    pub whisper_model: PathBuf,
    /// Scratch directory for per-invocation temp dirs
    pub work_dir: PathBuf,
    /// Optional Netscape cookies file handed to yt-dlp
    pub cookies_path: Option<PathBuf>,
    /// Per-invocation timeout. `None` lets a tool run indefinitely.
    pub tool_timeout: Option<Duration>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ytdlp_bin: "yt-dlp".to_string(),
            whisper_bin: "whisper-cli".to_string(),
            whisper_model: PathBuf::from("/models/ggml-base.bin"),
            work_dir: std::env::temp_dir().join("vtask"),
            cookies_path: None,
            tool_timeout: None,
        }
    }
}

impl MediaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_bin: std::env::var("FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
            ytdlp_bin: std::env::var("YTDLP_BIN").unwrap_or(defaults.ytdlp_bin),
            whisper_bin: std::env::var("WHISPER_BIN").unwrap_or(defaults.whisper_bin),
            whisper_model: std::env::var("WHISPER_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.whisper_model),
            work_dir: std::env::var("MEDIA_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            cookies_path: std::env::var("YTDLP_COOKIES").ok().map(PathBuf::from),
            tool_timeout: std::env::var("MEDIA_TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Timeout in whole seconds, as the runners take it.
    pub fn timeout_secs(&self) -> Option<u64> {
        self.tool_timeout.map(|d| d.as_secs())
    }
}
