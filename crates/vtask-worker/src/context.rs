//! Collaborators shared by all job bodies.

use std::sync::Arc;

use tracing::{info, warn};
use vtask_llm::{GeminiAdapter, LlmAdapter, ModelDirectory};
use vtask_media::{FfmpegToolchain, MediaConfig, MediaToolchain};
use vtask_storage::{FileBridge, R2Client, RedisFileCatalog};

use crate::config::WorkerConfig;
use crate::directory::RedisModelDirectory;
use crate::error::{WorkerError, WorkerResult};
use crate::transcript::{TranscriptSource, YtDlpTranscriptSource};
use crate::translate::{LlmTranslator, SegmentTranslator, UnconfiguredTranslator};

/// Everything a job body may call out to.
#[derive(Clone)]
pub struct JobContext {
    pub toolchain: Arc<dyn MediaToolchain>,
    pub files: FileBridge,
    pub llm: Arc<dyn LlmAdapter>,
    pub models: Arc<dyn ModelDirectory>,
    pub transcripts: Arc<dyn TranscriptSource>,
    pub translator: Arc<dyn SegmentTranslator>,
}

impl JobContext {
    /// Wire the production implementations from environment variables.
    pub fn from_env(config: &WorkerConfig) -> WorkerResult<Self> {
        let mut media = MediaConfig::from_env();
        if std::env::var("MEDIA_WORK_DIR").is_err() {
            media.work_dir = config.work_dir.clone();
        }
        if media.tool_timeout.is_none() {
            warn!("MEDIA_TOOL_TIMEOUT_SECS not set; external tools run without a timeout");
        }

        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let files = FileBridge::new(
            Arc::new(R2Client::from_env()?),
            Arc::new(RedisFileCatalog::new(&redis_url)?),
        );
        let llm: Arc<dyn LlmAdapter> = Arc::new(GeminiAdapter::from_env()?);
        let models: Arc<dyn ModelDirectory> = Arc::new(
            RedisModelDirectory::new(&redis_url)
                .map_err(|e| WorkerError::config_error(format!("invalid REDIS_URL: {}", e)))?,
        );

        let translator: Arc<dyn SegmentTranslator> = match &config.translation_model_id {
            Some(model_id) => {
                info!("Subtitle translation uses model {}", model_id);
                Arc::new(LlmTranslator::new(Arc::clone(&llm), Arc::clone(&models), model_id.clone()))
            }
            None => {
                warn!("TRANSLATION_MODEL_ID not set; add-subtitles jobs that need translation will fail");
                Arc::new(UnconfiguredTranslator)
            }
        };

        Ok(Self {
            toolchain: Arc::new(FfmpegToolchain::new(media.clone())),
            files,
            llm,
            models,
            transcripts: Arc::new(YtDlpTranscriptSource::new(media)),
            translator,
        })
    }
}
