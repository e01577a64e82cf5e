use vtask_models::{JobKind, StoredFileId};
use vtask_queue::BurnAssJob;
use vtask_storage::NewStoredFile;

use super::{output_name, require};
use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Burn the ASS subtitle associated with a stored video into its pixels.
pub async fn burn_ass(ctx: &JobContext, job: &BurnAssJob) -> WorkerResult<StoredFileId> {
    let logger = JobLogger::new(&job.task_id, JobKind::BurnAss);
    require("owner", &job.owner)?;

    let subtitle_id = ctx
        .files
        .subtitle_for_video(&job.video_file_id)
        .await?
        .ok_or_else(|| WorkerError::SubtitleNotFound(job.video_file_id.to_string()))?;

    let subtitle_bytes = ctx.files.load(&subtitle_id).await?;
    let script = String::from_utf8(subtitle_bytes).map_err(|_| WorkerError::SubtitleDecode(subtitle_id.to_string()))?;

    logger.log_start(&format!("{} with subtitle {}", job.video_file_id, subtitle_id));
    let video = ctx.files.load(&job.video_file_id).await?;

    let artifact = ctx.toolchain.burn_ass(&video, script.as_bytes()).await?;

    let file_id = StoredFileId::new();
    let meta = NewStoredFile::new(
        job.owner.clone(),
        output_name(&job.output_filename, artifact.container),
        artifact.container.content_type(),
    );
    ctx.files.save(&file_id, meta, artifact.data).await?;

    logger.log_completion(&format!("stored as {}", file_id));
    Ok(file_id)
}
