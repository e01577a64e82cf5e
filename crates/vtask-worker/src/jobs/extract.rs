//! Transcript-based structured extraction.
//!
//! Both pipelines fetch a timestamped transcript, resolve the model, and ask
//! for a schema-constrained result. Only the summary pipeline repairs
//! degenerate segment ranges afterwards.

use validator::Validate;
use vtask_llm::structured_output_as;
use vtask_models::{repair_segment_timestamps, validate_source_url, JobKind, KeyInsightsResult, SummarySegment};
use vtask_queue::{ExtractKeyInsightsJob, ExtractVideoSummaryJob};

use super::require;
use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Prompt for the key-insights pipeline.
pub fn key_insights_prompt(count: u32, target_language: &str, video_url: &str, transcript: &str) -> String {
    format!(
        "You are given the timestamped transcript of a video.\n\
         Extract exactly {count} key insights from it and give the whole set a short title.\n\
         Write the title and every insight in {target_language}.\n\
         For each insight, set video_url to {video_url} and give the begin and end timestamps \
         (hour, minute, second) of the part of the video it comes from, taken from the transcript.\n\n\
         Video URL: {video_url}\n\n\
         Transcript:\n{transcript}"
    )
}

/// Prompt for the video-summary pipeline.
pub fn video_summary_prompt(video_url: &str, transcript: &str) -> String {
    format!(
        "You are given the timestamped transcript of a video.\n\
         Summarize the video as multiple consecutive segments in video order.\n\
         For each segment, write a short summary paragraph, set video_url to {video_url}, \
         and give the begin and end timestamps (hour, minute, second) of the segment, \
         taken from the transcript. A segment must end after it begins.\n\n\
         Video URL: {video_url}\n\n\
         Transcript:\n{transcript}"
    )
}

/// Extract a titled list of key insights.
///
/// The requested count is only a prompt instruction; the returned list is
/// used as is.
pub async fn extract_key_insights(ctx: &JobContext, job: &ExtractKeyInsightsJob) -> WorkerResult<KeyInsightsResult> {
    let logger = JobLogger::new(&job.task_id, JobKind::ExtractKeyInsights);

    let url = validate_source_url(&job.video_url).map_err(|e| WorkerError::validation(e.to_string()))?;
    require("model_id", &job.model_id)?;
    require("target_language", &job.target_language)?;
    if job.number_of_key_insights == 0 {
        return Err(WorkerError::validation("number_of_key_insights must be at least 1"));
    }

    logger.log_start(&url);
    let transcript = ctx.transcripts.fetch_transcript(&url, true).await?;
    let credentials = ctx.models.resolve(&job.model_id).await?;
    logger.log_progress(&format!(
        "transcript has {} chars, asking {}",
        transcript.len(),
        credentials.model_name
    ));

    let prompt = key_insights_prompt(job.number_of_key_insights, &job.target_language, &url, &transcript);
    let result: KeyInsightsResult = structured_output_as(ctx.llm.as_ref(), &prompt, &credentials).await?;
    result
        .validate()
        .map_err(|e| WorkerError::invalid_output(e.to_string()))?;

    if result.insights.len() != job.number_of_key_insights as usize {
        logger.log_warning(&format!(
            "requested {} insights, model returned {}",
            job.number_of_key_insights,
            result.insights.len()
        ));
    }
    logger.log_completion(&format!("{} insights", result.insights.len()));
    Ok(result)
}

/// Extract timestamped summary segments, repairing degenerate ranges.
pub async fn extract_video_summary(
    ctx: &JobContext,
    job: &ExtractVideoSummaryJob,
) -> WorkerResult<Vec<SummarySegment>> {
    let logger = JobLogger::new(&job.task_id, JobKind::ExtractVideoSummary);

    let url = validate_source_url(&job.video_url).map_err(|e| WorkerError::validation(e.to_string()))?;
    require("model_id", &job.model_id)?;

    logger.log_start(&url);
    let transcript = ctx.transcripts.fetch_transcript(&url, true).await?;
    let credentials = ctx.models.resolve(&job.model_id).await?;

    let prompt = video_summary_prompt(&url, &transcript);
    let mut segments: Vec<SummarySegment> = structured_output_as(ctx.llm.as_ref(), &prompt, &credentials).await?;
    if segments.is_empty() {
        return Err(WorkerError::invalid_output("model returned no summary segments"));
    }
    for segment in &segments {
        segment
            .validate()
            .map_err(|e| WorkerError::invalid_output(e.to_string()))?;
    }

    let repaired = repair_segment_timestamps(&mut segments);
    if repaired > 0 {
        logger.log_warning(&format!("repaired {} degenerate segment ranges", repaired));
    }

    logger.log_completion(&format!("{} segments", segments.len()));
    Ok(segments)
}
