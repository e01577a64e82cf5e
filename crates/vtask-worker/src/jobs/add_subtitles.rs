use vtask_models::{JobKind, StoredFileId};
use vtask_queue::AddSubtitlesJob;
use vtask_storage::NewStoredFile;

use super::{output_name, require};
use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::translate::translate_srt;

/// Transcribe a stored video, translate if needed, and add the subtitles.
pub async fn add_subtitles(ctx: &JobContext, job: &AddSubtitlesJob) -> WorkerResult<StoredFileId> {
    let logger = JobLogger::new(&job.task_id, JobKind::AddSubtitles);

    require("origin_language", &job.origin_language)?;
    require("target_language", &job.target_language)?;
    require("owner", &job.owner)?;
    job.options
        .validate()
        .map_err(|e| WorkerError::validation(e.to_string()))?;

    logger.log_start(&format!(
        "{} ({} -> {})",
        job.file_id, job.origin_language, job.target_language
    ));

    let video = ctx.files.load(&job.file_id).await?;

    let audio = ctx.toolchain.extract_audio(&video).await?;
    logger.log_progress("audio extracted");

    let transcript = ctx.toolchain.transcribe(&audio, &job.origin_language).await?;
    logger.log_progress("transcription finished");

    let subtitles = if job.needs_translation() {
        let translated = translate_srt(ctx.translator.as_ref(), &transcript, &job.target_language).await?;
        logger.log_progress(&format!("translated to {}", job.target_language));
        translated
    } else {
        transcript
    };

    let artifact = ctx.toolchain.burn_or_mux(&video, &subtitles, &job.options).await?;
    logger.log_progress(&format!(
        "{} subtitles added ({})",
        if job.options.use_soft_subtitles { "soft" } else { "hard" },
        job.options.subtitle_format
    ));

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
