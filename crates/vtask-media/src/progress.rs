//! FFmpeg `-progress pipe:2` parsing.

use serde::{Deserialize, Serialize};

/// Progress snapshot emitted at every `progress=` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Output time in whole seconds.
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_ms as f64 / 1000.0
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + 'static>;

/// Outcome of feeding one stderr line to [`parse_progress_line`].
#[derive(Debug, PartialEq)]
pub(crate) enum ProgressLine {
    /// A `key=value` progress field; `Some` once a block is complete
    Field(Option<FfmpegProgress>),
    /// Ordinary FFmpeg diagnostic output
    Diagnostic,
}

/// Parse a line of FFmpeg stderr, accumulating progress fields into `current`.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> ProgressLine {
    let line = line.trim();
    let Some((key, value)) = line.split_once('=') else {
        return ProgressLine::Diagnostic;
    };

    match key {
        "out_time_us" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        // Despite the name FFmpeg reports microseconds here too.
        "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return ProgressLine::Field(Some(current.clone()));
        }
        "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames" => {}
        _ if key.starts_with("stream_") => {}
        _ => return ProgressLine::Diagnostic,
    }

    ProgressLine::Field(None)
}
