//! Section downloads with yt-dlp.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::command::run_tool;
use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};

/// A real Netscape cookies file is at least ~50 bytes.
const MIN_COOKIES_FILE_SIZE: u64 = 50;

/// Format selector preferring MP4/M4A so the merge needs no re-encode.
const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best";

/// Whether a cookies file appears to be in Netscape format.
fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File") || content.starts_with("# HTTP Cookie File") {
        return true;
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split('\t').count() >= 6)
}

/// Copy the configured cookies file into `scratch` so yt-dlp can write it back.
///
/// Missing, tiny or malformed files are skipped rather than failing the download.
pub async fn writable_cookies(source: Option<&Path>, scratch: &Path) -> Option<PathBuf> {
    let source = source?;

    let metadata = match tokio::fs::metadata(source).await {
        Ok(m) => m,
        Err(e) => {
            debug!("Cookies file {} not usable: {}", source.display(), e);
            return None;
        }
    };
    if metadata.len() < MIN_COOKIES_FILE_SIZE {
        debug!("Cookies file {} is too small, skipping", source.display());
        return None;
    }

    match tokio::fs::read_to_string(source).await {
        Ok(content) if is_valid_netscape_cookies(&content) => {}
        Ok(_) => {
            debug!("Cookies file {} is not in Netscape format, skipping", source.display());
            return None;
        }
        Err(e) => {
            warn!("Failed to read cookies file: {}", e);
            return None;
        }
    }

    let target = scratch.join("cookies.txt");
    match tokio::fs::copy(source, &target).await {
        Ok(_) => Some(target),
        Err(e) => {
            warn!("Failed to copy cookies file: {}", e);
            None
        }
    }
}

/// yt-dlp arguments for downloading `[start_secs, end_secs]` of `url` to `output_path`.
pub fn section_args(
    url: &str,
    start_secs: f64,
    end_secs: f64,
    output_path: &Path,
    cookies: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        "--no-playlist".to_string(),
        "--no-progress".to_string(),
        "--download-sections".to_string(),
        format!("*{:.3}-{:.3}", start_secs, end_secs),
        "--force-keyframes-at-cuts".to_string(),
        "-f".to_string(),
        FORMAT_SELECTOR.to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "-o".to_string(),
        output_path.to_string_lossy().to_string(),
    ];

    if let Some(cookies) = cookies {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().to_string());
    }

    args.push(url.to_string());
    args
}

/// Download a section of a remote video into `scratch`, returning the MP4 path.
pub async fn download_section(
    config: &MediaConfig,
    url: &str,
    start_secs: f64,
    end_secs: f64,
    scratch: &Path,
) -> MediaResult<PathBuf> {
    let output_path = scratch.join("section.mp4");
    let cookies = writable_cookies(config.cookies_path.as_deref(), scratch).await;

    info!(
        url = url,
        start = start_secs,
        end = end_secs,
        "Downloading section with yt-dlp"
    );

    let args = section_args(url, start_secs, end_secs, &output_path, cookies.as_deref());
    run_tool(&config.ytdlp_bin, &args, config.timeout_secs())
        .await
        .map_err(|e| match e {
            MediaError::ToolFailed { message, .. } => MediaError::download_failed(message),
            other => other,
        })?;

    match tokio::fs::metadata(&output_path).await {
        Ok(m) if m.len() > 0 => Ok(output_path),
        _ => Err(MediaError::download_failed("yt-dlp produced no output file")),
    }
}
