//! Job bodies.
//!
//! Each body validates its parameters before touching any external tool,
//! then runs its stages strictly in sequence. Any failing stage aborts the
//! job; artifacts are only persisted by the last stage, under a fresh id.

mod add_subtitles;
mod burn_ass;
mod download_section;
mod extract;

pub use add_subtitles::add_subtitles;
pub use burn_ass::burn_ass;
pub use download_section::download_section;
pub use extract::{extract_key_insights, extract_video_summary, key_insights_prompt, video_summary_prompt};

use std::path::Path;

use vtask_media::Container;
use vtask_models::TaskOutput;
use vtask_queue::QueueJob;

use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};

/// Run the body matching `job` and wrap its result.
pub async fn run_job(ctx: &JobContext, job: &QueueJob) -> WorkerResult<TaskOutput> {
    match job {
        QueueJob::DownloadSection(j) => download_section(ctx, j).await.map(TaskOutput::StoredFile),
        QueueJob::AddSubtitles(j) => add_subtitles(ctx, j).await.map(TaskOutput::StoredFile),
        QueueJob::BurnAss(j) => burn_ass(ctx, j).await.map(TaskOutput::StoredFile),
        QueueJob::ExtractKeyInsights(j) => extract_key_insights(ctx, j).await.map(TaskOutput::KeyInsights),
        QueueJob::ExtractVideoSummary(j) => extract_video_summary(ctx, j).await.map(TaskOutput::VideoSummary),
    }
}

fn require(field: &str, value: &str) -> WorkerResult<()> {
    if value.trim().is_empty() {
        Err(WorkerError::validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// Stored filename for an artifact, with the extension of its actual container.
fn output_name(requested: &str, container: Container) -> String {
    let stem = Path::new(requested.trim())
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    format!("{}.{}", stem, container.extension())
}
