//! Enqueue/poll contract used by the API layer.

use std::sync::Arc;

use tracing::debug;
use vtask_models::{KeyInsightsResult, StoredFileId, SummarySegment, TaskId, TaskOutput, TaskStatus};

use crate::broker::TaskBroker;
use crate::error::{QueueError, QueueResult};
use crate::job::{
    AddSubtitlesJob, BurnAssJob, DownloadSectionJob, ExtractKeyInsightsJob, ExtractVideoSummaryJob, QueueJob,
};

/// Task port over an injected broker.
///
/// Enqueue calls return as soon as the broker accepted the job. Status calls
/// are single-shot; callers poll with their own interval and budget.
#[derive(Clone)]
pub struct TaskPort {
    broker: Arc<dyn TaskBroker>,
}

impl TaskPort {
    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self { broker }
    }

    async fn enqueue(&self, job: QueueJob) -> QueueResult<TaskId> {
        let kind = job.kind();
        let task_id = self.broker.submit(job).await?;
        debug!(task_id = %task_id, kind = %kind, "Task submitted");
        Ok(task_id)
    }

    pub async fn enqueue_download_section(&self, job: DownloadSectionJob) -> QueueResult<TaskId> {
        self.enqueue(QueueJob::DownloadSection(job)).await
    }

    pub async fn enqueue_add_subtitles(&self, job: AddSubtitlesJob) -> QueueResult<TaskId> {
        self.enqueue(QueueJob::AddSubtitles(job)).await
    }

    pub async fn enqueue_burn_ass(&self, job: BurnAssJob) -> QueueResult<TaskId> {
        self.enqueue(QueueJob::BurnAss(job)).await
    }

    pub async fn enqueue_extract_key_insights(&self, job: ExtractKeyInsightsJob) -> QueueResult<TaskId> {
        self.enqueue(QueueJob::ExtractKeyInsights(job)).await
    }

    pub async fn enqueue_extract_video_summary(&self, job: ExtractVideoSummaryJob) -> QueueResult<TaskId> {
        self.enqueue(QueueJob::ExtractVideoSummary(job)).await
    }

    /// Current status; the result is present only on SUCCESS.
    pub async fn get_task_status(&self, task_id: &TaskId) -> QueueResult<(TaskStatus, Option<TaskOutput>)> {
        Ok(self.broker.poll(task_id).await?.into_status())
    }

    /// Failure message of a task that ended in FAILURE.
    pub async fn get_task_error(&self, task_id: &TaskId) -> QueueResult<Option<String>> {
        let record = self.broker.poll(task_id).await?;
        Ok(match record.status {
            TaskStatus::Failure => record.error_message,
            _ => None,
        })
    }

    async fn typed_status<T>(
        &self,
        task_id: &TaskId,
        expected: &'static str,
        extract: fn(TaskOutput) -> Option<T>,
    ) -> QueueResult<(TaskStatus, Option<T>)> {
        match self.get_task_status(task_id).await? {
            (status, Some(output)) => match extract(output) {
                Some(value) => Ok((status, Some(value))),
                None => Err(QueueError::UnexpectedResult {
                    task_id: task_id.to_string(),
                    expected,
                }),
            },
            (status, None) => Ok((status, None)),
        }
    }

    pub async fn get_download_section_status(&self, task_id: &TaskId) -> QueueResult<(TaskStatus, Option<StoredFileId>)> {
        self.typed_status(task_id, "a stored file", TaskOutput::into_stored_file).await
    }

    pub async fn get_add_subtitles_status(&self, task_id: &TaskId) -> QueueResult<(TaskStatus, Option<StoredFileId>)> {
        self.typed_status(task_id, "a stored file", TaskOutput::into_stored_file).await
    }

    pub async fn get_burn_ass_status(&self, task_id: &TaskId) -> QueueResult<(TaskStatus, Option<StoredFileId>)> {
        self.typed_status(task_id, "a stored file", TaskOutput::into_stored_file).await
    }

    pub async fn get_key_insights_status(&self, task_id: &TaskId) -> QueueResult<(TaskStatus, Option<KeyInsightsResult>)> {
        self.typed_status(task_id, "key insights", TaskOutput::into_key_insights).await
    }

    pub async fn get_video_summary_status(
        &self,
        task_id: &TaskId,
    ) -> QueueResult<(TaskStatus, Option<Vec<SummarySegment>>)> {
        self.typed_status(task_id, "a video summary", TaskOutput::into_video_summary).await
    }
}
