use vtask_models::timestamp::validate_timestamps;
use vtask_models::{validate_source_url, JobKind, StoredFileId};
use vtask_queue::DownloadSectionJob;
use vtask_storage::NewStoredFile;

use super::{output_name, require};
use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Download `[start, end]` of a remote video and store it.
pub async fn download_section(ctx: &JobContext, job: &DownloadSectionJob) -> WorkerResult<StoredFileId> {
    let logger = JobLogger::new(&job.task_id, JobKind::DownloadSection);

    let url = validate_source_url(&job.url).map_err(|e| WorkerError::validation(e.to_string()))?;
    let range = validate_timestamps(&job.start, &job.end, None).map_err(|e| WorkerError::validation(e.to_string()))?;
    require("owner", &job.owner)?;

    logger.log_start(&format!("{} [{} - {}]", url, range.start, range.end));
    let artifact = ctx
        .toolchain
        .download_section(&url, range.start_secs, range.end_secs)
        .await?;
    logger.log_progress(&format!("downloaded {} bytes", artifact.data.len()));

    let file_id = StoredFileId::new();
    let meta = NewStoredFile::new(
        job.owner.clone(),
        output_name(&job.name, artifact.container),
        artifact.container.content_type(),
    );
    ctx.files.save(&file_id, meta, artifact.data).await?;

    logger.log_completion(&format!("stored as {}", file_id));
    Ok(file_id)
}
