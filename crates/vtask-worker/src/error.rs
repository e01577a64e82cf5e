//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid job parameters: {0}")]
    Validation(String),

    #[error("No subtitle found for video {0}")]
    SubtitleNotFound(String),

    #[error("Subtitle file {0} is not valid UTF-8 text")]
    SubtitleDecode(String),

    #[error("Model returned unusable output: {0}")]
    InvalidOutput(String),

    #[error("Transcript unavailable: {0}")]
    Transcript(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vtask_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vtask_media::MediaError),

    #[error("LLM error: {0}")]
    Llm(#[from] vtask_llm::LlmError),

    #[error("Queue error: {0}")]
    Queue(#[from] vtask_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput(msg.into())
    }

    pub fn transcript(msg: impl Into<String>) -> Self {
        Self::Transcript(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the job failed on its input rather than while executing.
    ///
    /// Validation failures happen before any external tool is invoked.
    pub fn is_validation(&self) -> bool {
        match self {
            WorkerError::Validation(_) | WorkerError::SubtitleNotFound(_) | WorkerError::SubtitleDecode(_) => true,
            WorkerError::Storage(e) => e.is_validation(),
            WorkerError::Media(vtask_media::MediaError::InvalidOptions(_)) => true,
            _ => false,
        }
    }
}
