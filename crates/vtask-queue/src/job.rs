//! Job descriptions carried through the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vtask_models::{JobKind, StoredFileId, SubtitleOptions, TaskId};

/// Cut a section out of a remote video and store it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSectionJob {
    pub task_id: TaskId,
    pub url: String,
    /// `HH:MM:SS`, `MM:SS` or seconds
    pub start: String,
    pub end: String,
    /// Filename of the stored result
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl DownloadSectionJob {
    pub fn new(
        url: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        name: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            task_id: TaskId::new(),
            url: url.into(),
            start: start.into(),
            end: end.into(),
            name: name.into(),
            owner: owner.into(),
            created_at: Utc::now(),
        }
    }
}

/// Transcribe a stored video, optionally translate, and add subtitles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddSubtitlesJob {
    pub task_id: TaskId,
    pub file_id: StoredFileId,
    pub origin_language: String,
    pub target_language: String,
    pub output_filename: String,
    pub options: SubtitleOptions,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl AddSubtitlesJob {
    pub fn new(
        file_id: StoredFileId,
        origin_language: impl Into<String>,
        target_language: impl Into<String>,
        output_filename: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            task_id: TaskId::new(),
            file_id,
            origin_language: origin_language.into(),
            target_language: target_language.into(),
            output_filename: output_filename.into(),
            options: SubtitleOptions::default(),
            owner: owner.into(),
            created_at: Utc::now(),
        }
    }

    /// Set styling options.
    pub fn with_options(mut self, options: SubtitleOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether the transcript has to go through translation.
    pub fn needs_translation(&self) -> bool {
        !self
            .origin_language
            .trim()
            .eq_ignore_ascii_case(self.target_language.trim())
    }
}

/// Burn the ASS subtitle associated with a stored video into its pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnAssJob {
    pub task_id: TaskId,
    pub video_file_id: StoredFileId,
    pub output_filename: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl BurnAssJob {
    pub fn new(video_file_id: StoredFileId, output_filename: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            task_id: TaskId::new(),
            video_file_id,
            output_filename: output_filename.into(),
            owner: owner.into(),
            created_at: Utc::now(),
        }
    }
}

/// Extract a titled list of key insights from a video's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractKeyInsightsJob {
    pub task_id: TaskId,
    pub video_url: String,
    pub model_id: String,
    pub owner: String,
    pub target_language: String,
    pub number_of_key_insights: u32,
    pub created_at: DateTime<Utc>,
}

impl ExtractKeyInsightsJob {
    pub fn new(
        video_url: impl Into<String>,
        model_id: impl Into<String>,
        owner: impl Into<String>,
        target_language: impl Into<String>,
        number_of_key_insights: u32,
    ) -> Self {
        Self {
            task_id: TaskId::new(),
            video_url: video_url.into(),
            model_id: model_id.into(),
            owner: owner.into(),
            target_language: target_language.into(),
            number_of_key_insights,
            created_at: Utc::now(),
        }
    }
}

/// Extract timestamped summary segments from a video's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractVideoSummaryJob {
    pub task_id: TaskId,
    pub video_url: String,
    pub model_id: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl ExtractVideoSummaryJob {
    pub fn new(video_url: impl Into<String>, model_id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            task_id: TaskId::new(),
            video_url: video_url.into(),
            model_id: model_id.into(),
            owner: owner.into(),
            created_at: Utc::now(),
        }
    }
}

/// Envelope placed on the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    DownloadSection(DownloadSectionJob),
    AddSubtitles(AddSubtitlesJob),
    BurnAss(BurnAssJob),
    ExtractKeyInsights(ExtractKeyInsightsJob),
    ExtractVideoSummary(ExtractVideoSummaryJob),
}

impl QueueJob {
    pub fn task_id(&self) -> &TaskId {
        match self {
            QueueJob::DownloadSection(j) => &j.task_id,
            QueueJob::AddSubtitles(j) => &j.task_id,
            QueueJob::BurnAss(j) => &j.task_id,
            QueueJob::ExtractKeyInsights(j) => &j.task_id,
            QueueJob::ExtractVideoSummary(j) => &j.task_id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            QueueJob::DownloadSection(_) => JobKind::DownloadSection,
            QueueJob::AddSubtitles(_) => JobKind::AddSubtitles,
            QueueJob::BurnAss(_) => JobKind::BurnAss,
            QueueJob::ExtractKeyInsights(_) => JobKind::ExtractKeyInsights,
            QueueJob::ExtractVideoSummary(_) => JobKind::ExtractVideoSummary,
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            QueueJob::DownloadSection(j) => &j.owner,
            QueueJob::AddSubtitles(j) => &j.owner,
            QueueJob::BurnAss(j) => &j.owner,
            QueueJob::ExtractKeyInsights(j) => &j.owner,
            QueueJob::ExtractVideoSummary(j) => &j.owner,
        }
    }
}
