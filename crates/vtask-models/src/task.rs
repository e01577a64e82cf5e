//! Task lifecycle models.
//!
//! A task is one queued unit of work. Its record is created by the broker on
//! enqueue and mutated only by the worker executing the job body.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::file::StoredFileId;
use crate::insight::{KeyInsightsResult, SummarySegment};

/// Opaque task identifier returned by enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Task status. The wire strings are consumed verbatim by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting in the broker (also reported for unknown or expired ids)
    #[default]
    Pending,
    /// A worker picked the task up
    Started,
    /// Job body returned a result
    Success,
    /// Job body raised; only a message is kept
    Failure,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Started => "STARTED",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
        }
    }

    /// Parse one of the four status strings. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "STARTED" => Some(TaskStatus::Started),
            "SUCCESS" => Some(TaskStatus::Success),
            "FAILURE" => Some(TaskStatus::Failure),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-side check on a raw status string.
///
/// Unrecognised strings are treated as "not yet complete".
pub fn is_complete_status(raw: &str) -> bool {
    TaskStatus::parse(raw).is_some_and(|s| s.is_terminal())
}

/// Kind of job carried by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    DownloadSection,
    AddSubtitles,
    BurnAss,
    ExtractKeyInsights,
    ExtractVideoSummary,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::DownloadSection => "download_section",
            JobKind::AddSubtitles => "add_subtitles",
            JobKind::BurnAss => "burn_ass",
            JobKind::ExtractKeyInsights => "extract_key_insights",
            JobKind::ExtractVideoSummary => "extract_video_summary",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed payload of a successful task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TaskOutput {
    /// download-section, add-subtitles, burn-ass
    StoredFile(StoredFileId),
    /// extract-key-insights
    KeyInsights(KeyInsightsResult),
    /// extract-video-summary
    VideoSummary(Vec<SummarySegment>),
}

impl TaskOutput {
    pub fn as_stored_file(&self) -> Option<&StoredFileId> {
        match self {
            TaskOutput::StoredFile(id) => Some(id),
            _ => None,
        }
    }

    pub fn into_stored_file(self) -> Option<StoredFileId> {
        match self {
            TaskOutput::StoredFile(id) => Some(id),
            _ => None,
        }
    }

    pub fn into_key_insights(self) -> Option<KeyInsightsResult> {
        match self {
            TaskOutput::KeyInsights(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_video_summary(self) -> Option<Vec<SummarySegment>> {
        match self {
            TaskOutput::VideoSummary(s) => Some(s),
            _ => None,
        }
    }
}

/// Broker-side record of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<JobKind>,
    pub status: TaskStatus,
    /// Populated only when `status == Success`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskOutput>,
    /// Populated only when `status == Failure`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Create a new pending record.
    pub fn pending(task_id: TaskId, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            kind: Some(kind),
            status: TaskStatus::Pending,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record for an id the broker knows nothing about.
    pub fn unknown(task_id: TaskId) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            kind: None,
            status: TaskStatus::Pending,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = TaskStatus::Started;
        self.updated_at = Utc::now();
    }

    pub fn succeed(&mut self, output: TaskOutput) {
        self.status = TaskStatus::Success;
        self.result = Some(output);
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = TaskStatus::Failure;
        self.result = None;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    /// Status and result as exposed by the task port.
    pub fn into_status(self) -> (TaskStatus, Option<TaskOutput>) {
        match self.status {
            TaskStatus::Success => (TaskStatus::Success, self.result),
            other => (other, None),
        }
    }
}
