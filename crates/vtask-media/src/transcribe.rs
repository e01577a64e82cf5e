//! Speech-to-text with the whisper.cpp CLI.

use std::path::Path;
use tracing::info;

use crate::command::run_tool;
use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};

/// whisper.cpp arguments writing `<output_base>.srt`.
pub fn whisper_args(config: &MediaConfig, audio: &Path, language: &str, output_base: &Path) -> Vec<String> {
    vec![
        "-m".to_string(),
        config.whisper_model.to_string_lossy().to_string(),
        "-f".to_string(),
        audio.to_string_lossy().to_string(),
        "-l".to_string(),
        language.to_string(),
        "-osrt".to_string(),
        "-of".to_string(),
        output_base.to_string_lossy().to_string(),
    ]
}

/// Transcribe a 16 kHz WAV file into SRT text.
pub async fn transcribe(config: &MediaConfig, audio: &Path, language: &str, scratch: &Path) -> MediaResult<String> {
    let output_base = scratch.join("transcript");
    let args = whisper_args(config, audio, language, &output_base);

    info!(language = language, "Transcribing audio with whisper");
    run_tool(&config.whisper_bin, &args, config.timeout_secs())
        .await
        .map_err(|e| match e {
            MediaError::ToolFailed { message, .. } => MediaError::transcription_failed(message),
            other => other,
        })?;

    let srt_path = output_base.with_extension("srt");
    let srt = tokio::fs::read_to_string(&srt_path)
        .await
        .map_err(|e| MediaError::transcription_failed(format!("whisper wrote no SRT file: {e}")))?;

    if srt.trim().is_empty() {
        return Err(MediaError::transcription_failed("whisper produced an empty transcript"));
    }

    Ok(srt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_whisper_args() {
        let config = MediaConfig {
            whisper_model: PathBuf::from("/models/ggml-small.bin"),
            ..Default::default()
        };
        let args = whisper_args(&config, Path::new("/s/audio.wav"), "de", Path::new("/s/transcript"));
        assert_eq!(
            args,
            vec!["-m", "/models/ggml-small.bin", "-f", "/s/audio.wav", "-l", "de", "-osrt", "-of", "/s/transcript"]
        );
    }
}
