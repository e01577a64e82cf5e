//! Audio extraction for transcription.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::config::MediaConfig;
use crate::error::MediaResult;

/// Sample rate whisper.cpp expects.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Command producing mono 16 kHz PCM WAV from `video`.
pub fn extract_audio_command(config: &MediaConfig, video: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .binary(&config.ffmpeg_bin)
        .no_video()
        .output_args(["-ac", "1", "-ar"])
        .output_arg(WHISPER_SAMPLE_RATE.to_string())
        .audio_codec("pcm_s16le")
}

/// Extract the audio track of `video` into `scratch/audio.wav`.
pub async fn extract_audio(config: &MediaConfig, video: &Path, scratch: &Path) -> MediaResult<PathBuf> {
    let output = scratch.join("audio.wav");
    let cmd = extract_audio_command(config, video, &output);

    FfmpegRunner::new()
        .with_optional_timeout(config.timeout_secs())
        .run_with_progress(&cmd, |p| debug!(out_time_secs = p.out_time_secs(), "audio extraction progress"))
        .await?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_audio_args() {
        let config = MediaConfig::default();
        let args = extract_audio_command(&config, Path::new("in.mp4"), Path::new("out.wav")).build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-i in.mp4 -vn -ac 1 -ar 16000 -c:a pcm_s16le out.wav"));
    }
}
