//! Structured job logging utilities.

use tracing::{error, info, warn, Span};
use vtask_models::{JobKind, TaskId};

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries the task id and the job kind.
#[derive(Debug, Clone)]
pub struct JobLogger {
    task_id: String,
    kind: JobKind,
}

impl JobLogger {
    pub fn new(task_id: &TaskId, kind: JobKind) -> Self {
        Self {
            task_id: task_id.to_string(),
            kind,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(task_id = %self.task_id, kind = %self.kind, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(task_id = %self.task_id, kind = %self.kind, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(task_id = %self.task_id, kind = %self.kind, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(task_id = %self.task_id, kind = %self.kind, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(task_id = %self.task_id, kind = %self.kind, "Job completed: {}", message);
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Span wrapping a whole job execution.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", task_id = %self.task_id, kind = %self.kind)
    }
}
