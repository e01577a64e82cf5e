//! Burning and muxing subtitles into video.
//!
//! Hard subtitles are always rendered through an ASS script so colour,
//! style, font size and margin apply uniformly. Soft subtitles keep the
//! video stream untouched:
//!
//! | soft | format     | result                                  |
//! |------|------------|-----------------------------------------|
//! | no   | any        | MP4, ASS burned with libass             |
//! | yes  | `mov_text` | MP4, SRT muxed as a `mov_text` track    |
//! | yes  | `ass`      | MKV, styled ASS muxed as a subtitle track |

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vtask_models::{SubtitleFormat, SubtitleOptions};

use crate::ass::render_ass;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::filters::ass_filter;
use crate::srt;
use crate::toolchain::Container;

/// Command that burns an ASS script into `video`.
pub fn burn_command(config: &MediaConfig, video: &Path, script: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .binary(&config.ffmpeg_bin)
        .video_filter(ass_filter(script))
        .video_codec("libx264")
        .preset("veryfast")
        .crf(20)
        .audio_codec("aac")
        .output_args(["-movflags", "+faststart"])
}

/// Command that muxes a subtitle file next to the streams of `video`.
pub fn mux_command(
    config: &MediaConfig,
    video: &Path,
    subtitles: &Path,
    format: SubtitleFormat,
    output: &Path,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(video, output)
        .binary(&config.ffmpeg_bin)
        .extra_input(subtitles)
        .map("0:v")
        .map("0:a?")
        .map("1:s");

    match format {
        SubtitleFormat::MovText => cmd.video_codec("copy").audio_codec("aac").subtitle_codec("mov_text"),
        SubtitleFormat::Ass => cmd.video_codec("copy").audio_codec("copy").subtitle_codec("ass"),
    }
}

async fn run(config: &MediaConfig, cmd: &FfmpegCommand) -> MediaResult<()> {
    FfmpegRunner::new()
        .with_optional_timeout(config.timeout_secs())
        .run_with_progress(cmd, |p| debug!(out_time_secs = p.out_time_secs(), "subtitle encode progress"))
        .await
}

/// Apply SRT subtitles to `video` according to `options`.
pub async fn burn_or_mux(
    config: &MediaConfig,
    video: &Path,
    srt_text: &str,
    options: &SubtitleOptions,
    scratch: &Path,
) -> MediaResult<(PathBuf, Container)> {
    options.validate()?;
    let cues = srt::parse(srt_text)?;
    if cues.is_empty() {
        return Err(MediaError::invalid_subtitle("subtitle track has no cues"));
    }

    if !options.use_soft_subtitles {
        let script = render_ass(&cues, options)?;
        let script_path = scratch.join("styled.ass");
        tokio::fs::write(&script_path, script).await?;

        let output = scratch.join("subtitled.mp4");
        info!(cues = cues.len(), "Burning subtitles");
        run(config, &burn_command(config, video, &script_path, &output)).await?;
        return Ok((output, Container::Mp4));
    }

    let (subtitle_path, container) = match options.subtitle_format {
        SubtitleFormat::MovText => {
            let path = scratch.join("track.srt");
            tokio::fs::write(&path, srt::format(&cues)).await?;
            (path, Container::Mp4)
        }
        SubtitleFormat::Ass => {
            let path = scratch.join("track.ass");
            tokio::fs::write(&path, render_ass(&cues, options)?).await?;
            (path, Container::Matroska)
        }
    };

    let output = scratch.join(format!("subtitled.{}", container.extension()));
    info!(cues = cues.len(), format = %options.subtitle_format, "Muxing soft subtitles");
    run(config, &mux_command(config, video, &subtitle_path, options.subtitle_format, &output)).await?;
    Ok((output, container))
}

/// Burn a ready-made ASS script into `video`. The script is passed through untouched.
pub async fn burn_ass(config: &MediaConfig, video: &Path, ass_script: &[u8], scratch: &Path) -> MediaResult<PathBuf> {
    let script_path = scratch.join("overlay.ass");
    tokio::fs::write(&script_path, ass_script).await?;

    let output = scratch.join("burned.mp4");
    info!("Burning ASS overlay");
    run(config, &burn_command(config, video, &script_path, &output)).await?;
    Ok(output)
}
