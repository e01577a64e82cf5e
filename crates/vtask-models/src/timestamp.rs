//! Timestamp parsing, validation and repair.
//!
//! Two timestamp shapes live here:
//! - free-form strings (`HH:MM:SS`, `MM:SS`, `SS`, optional `.mmm`) used for
//!   section downloads, handled by [`parse_timestamp`] and friends
//! - the structured [`Timestamp`] emitted by the extraction models, which
//!   [`repair_segment_timestamps`] fixes up when a model returns a degenerate range

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::insight::SummarySegment;

/// Maximum reasonable video duration (24 hours in seconds).
pub const MAX_VIDEO_DURATION_SECS: f64 = 86400.0;

/// Parse a timestamp string to total seconds.
///
/// Supports formats:
/// - `HH:MM:SS` or `HH:MM:SS.mmm`
/// - `MM:SS` or `MM:SS.mmm`
/// - `SS` or `SS.mmm`
///
/// # Examples
/// ```
/// use vtask_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    match parts.as_slice() {
        [seconds] => parse_component("seconds", seconds, true),
        [minutes, seconds] => {
            let minutes = parse_component("minutes", minutes, false)?;
            let seconds = parse_component("seconds", seconds, true)?;
            Ok(minutes * 60.0 + seconds)
        }
        [hours, minutes, seconds] => {
            let hours = parse_component("hours", hours, false)?;
            let minutes = parse_component("minutes", minutes, false)?;
            let seconds = parse_component("seconds", seconds, true)?;
            Ok(hours * 3600.0 + minutes * 60.0 + seconds)
        }
        _ => Err(TimestampError::InvalidFormat(ts.to_string())),
    }
}

/// One clock component: ASCII digits, plus an optional `.digits` fraction on seconds.
///
/// Anything `f64::from_str` would additionally accept (`nan`, `inf`, `1e3`,
/// signs) is rejected.
fn parse_component(name: &'static str, raw: &str, allow_fraction: bool) -> Result<f64, TimestampError> {
    let invalid = || TimestampError::InvalidValue(name, raw.to_string());
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if let Some(rest) = raw.strip_prefix('-') {
        if parse_component(name, rest, allow_fraction).is_ok() {
            return Err(TimestampError::Negative);
        }
        return Err(invalid());
    }

    let well_formed = match raw.split_once('.') {
        None => all_digits(raw),
        Some((whole, fraction)) => allow_fraction && all_digits(whole) && all_digits(fraction),
    };
    if !well_formed {
        return Err(invalid());
    }

    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(invalid)
}

/// Normalize a timestamp to HH:MM:SS or HH:MM:SS.mmm format.
///
/// # Examples
/// ```
/// use vtask_models::timestamp::normalize_timestamp;
/// assert_eq!(normalize_timestamp("5:30").unwrap(), "00:05:30");
/// assert_eq!(normalize_timestamp("90").unwrap(), "00:01:30");
/// ```
pub fn normalize_timestamp(ts: &str) -> Result<String, TimestampError> {
    let total_secs = parse_timestamp(ts)?;
    Ok(format_seconds(total_secs))
}

/// Format seconds into HH:MM:SS or HH:MM:SS.mmm string.
pub fn format_seconds(total_secs: f64) -> String {
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;

    // Include milliseconds if present
    if (secs - secs.floor()).abs() > 0.0001 {
        format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs.floor() as u32)
    }
}

/// Structured timestamp as emitted by the extraction models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub struct Timestamp {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Timestamp {
    pub fn new(hour: u32, minute: u32, second: u32) -> Self {
        Self { hour, minute, second }
    }

    /// Timestamp at a whole number of minutes.
    pub fn from_minutes(minutes: u32) -> Self {
        Self {
            hour: minutes / 60,
            minute: minutes % 60,
            second: 0,
        }
    }

    /// Total seconds, without normalising out-of-range components.
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hour) * 3600 + u64::from(self.minute) * 60 + u64::from(self.second)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Replace degenerate or inverted segment ranges with a fixed 2-minute grid.
///
/// A segment at position `i` whose begin is not strictly before its end is
/// rewritten to `[i*2 min, i*2+1 min)`. Well-formed segments are left alone.
/// Returns the number of segments that were rewritten.
pub fn repair_segment_timestamps(segments: &mut [SummarySegment]) -> usize {
    let mut repaired = 0;
    for (index, segment) in segments.iter_mut().enumerate() {
        if segment.begin_timestamp.total_seconds() < segment.end_timestamp.total_seconds() {
            continue;
        }
        let begin_minutes = (index as u32).saturating_mul(2);
        segment.begin_timestamp = Timestamp::from_minutes(begin_minutes);
        segment.end_timestamp = Timestamp::from_minutes(begin_minutes.saturating_add(1));
        repaired += 1;
    }
    repaired
}

/// Validated timestamp pair with computed duration.
#[derive(Debug, Clone)]
pub struct ValidatedTimestamps {
    /// Normalized start timestamp (HH:MM:SS format)
    pub start: String,
    /// Normalized end timestamp (HH:MM:SS format)
    pub end: String,
    /// Duration in seconds
    pub duration_secs: u32,
    /// Start time in seconds
    pub start_secs: f64,
    /// End time in seconds
    pub end_secs: f64,
}

/// Validate a start/end timestamp pair.
///
/// Checks:
/// - Both timestamps are valid
/// - Start is before end
/// - Neither exceeds max video duration
/// - End doesn't exceed video duration (if provided)
pub fn validate_timestamps(
    start: &str,
    end: &str,
    video_duration: Option<f64>,
) -> Result<ValidatedTimestamps, TimestampError> {
    let start_secs = parse_timestamp(start)?;
    let end_secs = parse_timestamp(end)?;

    // Start must be before end
    if start_secs >= end_secs {
        return Err(TimestampError::StartNotBeforeEnd);
    }

    // Reasonable max check
    if start_secs > MAX_VIDEO_DURATION_SECS || end_secs > MAX_VIDEO_DURATION_SECS {
        return Err(TimestampError::ExceedsMaxDuration(MAX_VIDEO_DURATION_SECS));
    }

    // Video duration check if known
    if let Some(duration) = video_duration {
        if end_secs > duration + 1.0 {
            // Allow 1 second buffer
            return Err(TimestampError::ExceedsVideoDuration {
                end_secs,
                video_duration: duration,
            });
        }
    }

    let normalized_start = format_seconds(start_secs);
    let normalized_end = format_seconds(end_secs);
    let duration_secs = (end_secs - start_secs).max(0.0) as u32;

    Ok(ValidatedTimestamps {
        start: normalized_start,
        end: normalized_end,
        duration_secs,
        start_secs,
        end_secs,
    })
}

/// Timestamp parsing/validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampError {
    /// Timestamp string is empty
    Empty,
    /// Timestamp contains negative values
    Negative,
    /// Invalid numeric value for a component
    InvalidValue(&'static str, String),
    /// Invalid timestamp format
    InvalidFormat(String),
    /// Start time is not before end time
    StartNotBeforeEnd,
    /// Timestamp exceeds maximum allowed duration
    ExceedsMaxDuration(f64),
    /// End time exceeds video duration
    ExceedsVideoDuration { end_secs: f64, video_duration: f64 },
}

impl std::fmt::Display for TimestampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Timestamp cannot be empty"),
            Self::Negative => write!(f, "Timestamp cannot be negative"),
            Self::InvalidValue(component, value) => {
                write!(f, "Invalid {} value: {}", component, value)
            }
            Self::InvalidFormat(ts) => write!(
                f,
                "Invalid timestamp format '{}'. Use HH:MM:SS, HH:MM:SS.mmm, MM:SS, or MM:SS.mmm",
                ts
            ),
            Self::StartNotBeforeEnd => write!(f, "Start time must be before end time"),
            Self::ExceedsMaxDuration(max) => {
                write!(f, "Timestamps exceed maximum allowed duration ({} hours)", max / 3600.0)
            }
            Self::ExceedsVideoDuration { end_secs, video_duration } => write!(
                f,
                "End time ({:.1}s) exceeds video duration ({:.1}s)",
                end_secs, video_duration
            ),
        }
    }
}

impl std::error::Error for TimestampError {}
