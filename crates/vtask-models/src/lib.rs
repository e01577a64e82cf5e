//! Shared data models for the media task pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Task ids, statuses and terminal results
//! - Stored-file references
//! - Structured extraction output (key insights, summary segments)
//! - Subtitle styling options
//! - Timestamp parsing and degenerate-range repair

pub mod file;
pub mod insight;
pub mod subtitle;
pub mod task;
pub mod timestamp;
pub mod utils;

// Re-export common types
pub use file::StoredFileId;
pub use insight::{KeyInsight, KeyInsightsResult, SummarySegment};
pub use subtitle::{SubtitleColor, SubtitleFormat, SubtitleOptionError, SubtitleOptions, SubtitleStyle};
pub use task::{is_complete_status, JobKind, TaskId, TaskOutput, TaskRecord, TaskStatus};
pub use timestamp::{repair_segment_timestamps, Timestamp, TimestampError};
pub use utils::{validate_source_url, UrlError};
