//! Job bodies and executor against in-process collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use vtask_llm::{LlmAdapter, LlmError, LlmResult, ModelCredentials, StaticModelDirectory, TextStream};
use vtask_media::{Container, MediaResult, MediaToolchain, VideoArtifact};
use vtask_models::{StoredFileId, SubtitleOptions, TaskStatus, Timestamp};
use vtask_queue::{
    AddSubtitlesJob, BurnAssJob, DownloadSectionJob, ExtractKeyInsightsJob, ExtractVideoSummaryJob, InMemoryBroker,
    TaskConsumer, TaskPort,
};
use vtask_storage::{FileBridge, MemoryFileCatalog, MemoryObjectStore, NewStoredFile};
use vtask_worker::jobs::{add_subtitles, burn_ass, download_section, extract_key_insights, extract_video_summary};
use vtask_worker::{JobContext, JobExecutor, SegmentTranslator, TranscriptSource, WorkerConfig, WorkerError, WorkerResult};

const TRANSCRIPT_SRT: &str = "1\n00:00:01,000 --> 00:00:02,500\nHello there\n\n2\n00:00:03,000 --> 00:00:04,000\nGeneral Kenobi\n";

#[derive(Default)]
struct FakeToolchain {
    download_delay: Duration,
    downloads: AtomicUsize,
    extracts: AtomicUsize,
    transcribes: AtomicUsize,
    mux_calls: AtomicUsize,
    ass_calls: AtomicUsize,
    muxed_srt: Mutex<Option<String>>,
    burned_script: Mutex<Option<Vec<u8>>>,
}

impl FakeToolchain {
    fn total_calls(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
            + self.extracts.load(Ordering::SeqCst)
            + self.transcribes.load(Ordering::SeqCst)
            + self.mux_calls.load(Ordering::SeqCst)
            + self.ass_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaToolchain for FakeToolchain {
    async fn download_section(&self, _url: &str, _start_secs: f64, _end_secs: f64) -> MediaResult<VideoArtifact> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }
        Ok(VideoArtifact {
            data: b"section".to_vec(),
            container: Container::Mp4,
        })
    }

    async fn extract_audio(&self, _video: &[u8]) -> MediaResult<Vec<u8>> {
        self.extracts.fetch_add(1, Ordering::SeqCst);
        Ok(b"pcm".to_vec())
    }

    async fn transcribe(&self, _audio: &[u8], _language: &str) -> MediaResult<String> {
        self.transcribes.fetch_add(1, Ordering::SeqCst);
        Ok(TRANSCRIPT_SRT.to_string())
    }

    async fn burn_or_mux(&self, video: &[u8], srt: &str, _options: &SubtitleOptions) -> MediaResult<VideoArtifact> {
        self.mux_calls.fetch_add(1, Ordering::SeqCst);
        *self.muxed_srt.lock().unwrap() = Some(srt.to_string());
        let mut data = video.to_vec();
        data.extend_from_slice(b"+subs");
        Ok(VideoArtifact {
            data,
            container: Container::Matroska,
        })
    }

    async fn burn_ass(&self, video: &[u8], ass_script: &[u8]) -> MediaResult<VideoArtifact> {
        self.ass_calls.fetch_add(1, Ordering::SeqCst);
        *self.burned_script.lock().unwrap() = Some(ass_script.to_vec());
        let mut data = video.to_vec();
        data.extend_from_slice(b"+ass");
        Ok(VideoArtifact {
            data,
            container: Container::Mp4,
        })
    }
}

struct FakeLlm {
    response: serde_json::Value,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    fn new(response: serde_json::Value) -> Self {
        Self {
            response,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LlmAdapter for FakeLlm {
    async fn generate_stream(&self, _prompt: &str, _credentials: &ModelCredentials) -> LlmResult<TextStream> {
        Err(LlmError::invalid_response("streaming is not used by these tests"))
    }

    async fn structured_output(
        &self,
        prompt: &str,
        _credentials: &ModelCredentials,
        _schema: serde_json::Value,
    ) -> LlmResult<serde_json::Value> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

struct FakeTranscripts;

#[async_trait]
impl TranscriptSource for FakeTranscripts {
    async fn fetch_transcript(&self, _url: &str, with_timestamps: bool) -> WorkerResult<String> {
        assert!(with_timestamps);
        Ok("[00:00:01] welcome\n[00:02:10] the main point".to_string())
    }
}

#[derive(Default)]
struct CountingTranslator {
    calls: AtomicUsize,
}

#[async_trait]
impl SegmentTranslator for CountingTranslator {
    async fn translate_segment(&self, text: &str, target_language: &str) -> WorkerResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("[{}] {}", target_language, text))
    }
}

struct Harness {
    ctx: JobContext,
    toolchain: Arc<FakeToolchain>,
    llm: Arc<FakeLlm>,
    translator: Arc<CountingTranslator>,
}

fn harness(llm_response: serde_json::Value) -> Harness {
    harness_with_toolchain(llm_response, FakeToolchain::default())
}

fn harness_with_toolchain(llm_response: serde_json::Value, toolchain: FakeToolchain) -> Harness {
    let toolchain = Arc::new(toolchain);
    let llm = Arc::new(FakeLlm::new(llm_response));
    let translator = Arc::new(CountingTranslator::default());
    let models = StaticModelDirectory::new().with_model("m1", ModelCredentials::new("gemini-2.5-flash", "k"));

    let ctx = JobContext {
        toolchain: toolchain.clone(),
        files: FileBridge::new(Arc::new(MemoryObjectStore::new()), Arc::new(MemoryFileCatalog::new())),
        llm: llm.clone(),
        models: Arc::new(models),
        transcripts: Arc::new(FakeTranscripts),
        translator: translator.clone(),
    };

    Harness {
        ctx,
        toolchain,
        llm,
        translator,
    }
}

async fn seed(ctx: &JobContext, filename: &str, data: &[u8]) -> StoredFileId {
    let id = StoredFileId::new();
    ctx.files
        .save(&id, NewStoredFile::new("u1", filename, "application/octet-stream"), data.to_vec())
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_download_section_stores_fresh_file() {
    let h = harness(json!(null));
    let job = DownloadSectionJob::new("https://www.youtube.com/watch?v=abc", "00:01:00", "00:02:00", "intro.webm", "u1");

    let first = download_section(&h.ctx, &job).await.unwrap();
    let second = download_section(&h.ctx, &job).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(h.ctx.files.load(&first).await.unwrap(), b"section");
    assert_eq!(h.ctx.files.record(&first).await.unwrap().filename, "intro.mp4");
}

#[tokio::test]
async fn test_download_section_rejects_inverted_range_before_download() {
    let h = harness(json!(null));
    let job = DownloadSectionJob::new("https://www.youtube.com/watch?v=abc", "00:02:00", "00:01:00", "x.mp4", "u1");

    let err = download_section(&h.ctx, &job).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.toolchain.total_calls(), 0);
}

#[tokio::test]
async fn test_download_section_rejects_non_numeric_bounds_before_download() {
    let h = harness(json!(null));
    for (start, end) in [("nan", "00:00:10"), ("00:00:05", "inf"), ("1e3", "00:20:00")] {
        let job = DownloadSectionJob::new("https://www.youtube.com/watch?v=abc", start, end, "x.mp4", "u1");
        let err = download_section(&h.ctx, &job).await.unwrap_err();
        assert!(err.is_validation(), "{start}..{end}");
    }
    assert_eq!(h.toolchain.total_calls(), 0);
}

#[tokio::test]
async fn test_add_subtitles_same_language_skips_translation() {
    let h = harness(json!(null));
    let video = seed(&h.ctx, "talk.mp4", b"video").await;
    let job = AddSubtitlesJob::new(video.clone(), "en", " EN ", "talk_subbed.mp4", "u1");

    let output = add_subtitles(&h.ctx, &job).await.unwrap();

    assert_ne!(output, video);
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.toolchain.transcribes.load(Ordering::SeqCst), 1);
    assert_eq!(h.toolchain.muxed_srt.lock().unwrap().as_deref(), Some(TRANSCRIPT_SRT));
    assert_eq!(h.ctx.files.load(&output).await.unwrap(), b"video+subs");
    // Extension follows the container the toolchain actually produced.
    assert_eq!(h.ctx.files.record(&output).await.unwrap().filename, "talk_subbed.mkv");
    // Input is untouched.
    assert_eq!(h.ctx.files.load(&video).await.unwrap(), b"video");
}

#[tokio::test]
async fn test_add_subtitles_translates_each_cue() {
    let h = harness(json!(null));
    let video = seed(&h.ctx, "talk.mp4", b"video").await;
    let job = AddSubtitlesJob::new(video, "en", "de", "talk_de.mp4", "u1");

    add_subtitles(&h.ctx, &job).await.unwrap();

    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 2);
    let muxed = h.toolchain.muxed_srt.lock().unwrap().clone().unwrap();
    assert!(muxed.contains("[de] Hello there"));
    assert!(muxed.contains("00:00:03,000 --> 00:00:04,000"));
}

#[tokio::test]
async fn test_add_subtitles_rejects_bad_colour_before_tools() {
    let h = harness(json!(null));
    let video = seed(&h.ctx, "talk.mp4", b"video").await;
    let mut options = SubtitleOptions::default();
    options.subtitle_color = vtask_models::SubtitleColor::new("not-a-colour");
    let job = AddSubtitlesJob::new(video, "en", "en", "out.mp4", "u1").with_options(options);

    let err = add_subtitles(&h.ctx, &job).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.toolchain.total_calls(), 0);
}

#[tokio::test]
async fn test_burn_ass_without_association_is_subtitle_not_found() {
    let h = harness(json!(null));
    let video = seed(&h.ctx, "clip.mp4", b"video").await;
    let job = BurnAssJob::new(video.clone(), "clip_ass.mp4", "u1");

    let err = burn_ass(&h.ctx, &job).await.unwrap_err();
    assert!(matches!(err, WorkerError::SubtitleNotFound(ref id) if *id == video.to_string()));
    assert_eq!(h.toolchain.total_calls(), 0);
}

#[tokio::test]
async fn test_burn_ass_reports_undecodable_subtitle() {
    let h = harness(json!(null));
    let video = seed(&h.ctx, "clip.mp4", b"video").await;
    let subtitle = seed(&h.ctx, "clip.ass", &[0xff, 0xfe, 0x00, 0xc3]).await;
    h.ctx.files.link_subtitle(&video, &subtitle).await.unwrap();

    let err = burn_ass(&h.ctx, &BurnAssJob::new(video, "out.mp4", "u1")).await.unwrap_err();
    assert!(matches!(err, WorkerError::SubtitleDecode(_)));
    assert_eq!(h.toolchain.total_calls(), 0);
}

#[tokio::test]
async fn test_burn_ass_uses_associated_script() {
    let h = harness(json!(null));
    let video = seed(&h.ctx, "clip.mp4", b"video").await;
    let script = "[Script Info]\nScriptType: v4.00+\n";
    let subtitle = seed(&h.ctx, "clip.ass", script.as_bytes()).await;
    h.ctx.files.link_subtitle(&video, &subtitle).await.unwrap();

    let output = burn_ass(&h.ctx, &BurnAssJob::new(video.clone(), "clip_ass.mp4", "u1"))
        .await
        .unwrap();

    assert_ne!(output, video);
    assert_ne!(output, subtitle);
    assert_eq!(h.toolchain.burned_script.lock().unwrap().as_deref(), Some(script.as_bytes()));
    assert_eq!(h.ctx.files.load(&output).await.unwrap(), b"video+ass");
}

fn insight_json(content: &str) -> serde_json::Value {
    json!({
        "content": content,
        "video_url": "https://www.youtube.com/watch?v=abc",
        "begin_timestamp": {"hour": 0, "minute": 0, "second": 1},
        "end_timestamp": {"hour": 0, "minute": 2, "second": 10}
    })
}

#[tokio::test]
async fn test_key_insights_prompt_carries_count_and_result_is_not_truncated() {
    let response = json!({
        "title": "Takeaways",
        "insights": [insight_json("one"), insight_json("two"), insight_json("three"), insight_json("four")]
    });
    let h = harness(response);
    let job = ExtractKeyInsightsJob::new("https://www.youtube.com/watch?v=abc", "m1", "u1", "Spanish", 3);

    let result = extract_key_insights(&h.ctx, &job).await.unwrap();

    let prompt = h.llm.last_prompt();
    assert!(prompt.contains("exactly 3 key insights"));
    assert!(prompt.contains("in Spanish"));
    assert!(prompt.contains("[00:02:10] the main point"));
    assert_eq!(result.title, "Takeaways");
    assert_eq!(result.insights.len(), 4);
}

#[tokio::test]
async fn test_key_insights_unknown_model_fails() {
    let h = harness(json!({"title": "t", "insights": []}));
    let job = ExtractKeyInsightsJob::new("https://www.youtube.com/watch?v=abc", "missing", "u1", "English", 3);

    let err = extract_key_insights(&h.ctx, &job).await.unwrap_err();
    assert!(matches!(err, WorkerError::Llm(LlmError::ModelNotFound(_))));
}

fn segment_json(content: &str, begin: (u32, u32, u32), end: (u32, u32, u32)) -> serde_json::Value {
    json!({
        "content": content,
        "video_url": "https://www.youtube.com/watch?v=abc",
        "begin_timestamp": {"hour": begin.0, "minute": begin.1, "second": begin.2},
        "end_timestamp": {"hour": end.0, "minute": end.1, "second": end.2}
    })
}

#[tokio::test]
async fn test_video_summary_repairs_degenerate_ranges() {
    let response = json!([
        segment_json("opening", (0, 5, 0), (0, 5, 0)),
        segment_json("middle", (0, 9, 0), (0, 7, 0)),
        segment_json("ending", (0, 10, 0), (0, 12, 30)),
    ]);
    let h = harness(response);
    let job = ExtractVideoSummaryJob::new("https://www.youtube.com/watch?v=abc", "m1", "u1");

    let segments = extract_video_summary(&h.ctx, &job).await.unwrap();

    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].begin_timestamp, Timestamp::new(0, 0, 0));
    assert_eq!(segments[0].end_timestamp, Timestamp::new(0, 1, 0));
    assert_eq!(segments[1].begin_timestamp, Timestamp::new(0, 2, 0));
    assert_eq!(segments[1].end_timestamp, Timestamp::new(0, 3, 0));
    assert_eq!(segments[2].begin_timestamp, Timestamp::new(0, 10, 0));
    assert_eq!(segments[2].end_timestamp, Timestamp::new(0, 12, 30));
    assert!(!h.llm.last_prompt().contains("exactly"));
}

#[tokio::test]
async fn test_video_summary_empty_list_is_failure() {
    let h = harness(json!([]));
    let job = ExtractVideoSummaryJob::new("https://www.youtube.com/watch?v=abc", "m1", "u1");

    let err = extract_video_summary(&h.ctx, &job).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidOutput(_)));
}

#[tokio::test]
async fn test_failed_delivery_is_recorded_as_failure() {
    let h = harness(json!(null));
    let broker = Arc::new(InMemoryBroker::new());
    let port = TaskPort::new(broker.clone());

    let video = seed(&h.ctx, "clip.mp4", b"video").await;
    let task_id = port
        .enqueue_burn_ass(BurnAssJob::new(video, "out.mp4", "u1"))
        .await
        .unwrap();

    let mut deliveries = broker.fetch("c1", 1, Duration::from_millis(10)).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    JobExecutor::execute_delivery(&h.ctx, broker.as_ref(), "c1", Duration::from_secs(1), deliveries.remove(0)).await;

    let (status, file) = port.get_burn_ass_status(&task_id).await.unwrap();
    assert_eq!(status, TaskStatus::Failure);
    assert!(file.is_none());
    let message = port.get_task_error(&task_id).await.unwrap().unwrap();
    assert!(message.contains("No subtitle found"));
    assert_eq!(broker.in_flight_len(), 0);
}

#[tokio::test]
async fn test_executor_runs_queued_task_to_success() {
    let h = harness(json!(null));
    let broker = Arc::new(InMemoryBroker::new());
    let port = TaskPort::new(broker.clone());

    let config = WorkerConfig {
        fetch_block: Duration::from_millis(20),
        shutdown_timeout: Duration::from_secs(5),
        ..WorkerConfig::default()
    };
    let executor = Arc::new(JobExecutor::new(config, broker.clone(), h.ctx.clone()));
    let runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    let task_id = port
        .enqueue_download_section(DownloadSectionJob::new(
            "https://www.youtube.com/watch?v=abc",
            "10",
            "20",
            "clip.mp4",
            "u1",
        ))
        .await
        .unwrap();

    let mut stored = None;
    for _ in 0..200 {
        let (status, file) = port.get_download_section_status(&task_id).await.unwrap();
        if status == TaskStatus::Success {
            stored = file;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    executor.shutdown();
    runner.await.unwrap().unwrap();

    let stored = stored.expect("task did not reach SUCCESS");
    assert_eq!(h.ctx.files.load(&stored).await.unwrap(), b"section");
    assert_eq!(h.toolchain.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_long_running_job_is_not_reclaimed_while_it_runs() {
    let h = harness_with_toolchain(
        json!(null),
        FakeToolchain {
            download_delay: Duration::from_millis(400),
            ..FakeToolchain::default()
        },
    );
    let broker = Arc::new(InMemoryBroker::new());
    let port = TaskPort::new(broker.clone());

    let config = WorkerConfig {
        fetch_block: Duration::from_millis(20),
        claim_interval: Duration::from_millis(50),
        claim_min_idle: Duration::from_millis(100),
        shutdown_timeout: Duration::from_secs(5),
        ..WorkerConfig::default()
    };
    let executor = Arc::new(JobExecutor::new(config, broker.clone(), h.ctx.clone()));
    let runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    let task_id = port
        .enqueue_download_section(DownloadSectionJob::new(
            "https://www.youtube.com/watch?v=abc",
            "10",
            "20",
            "clip.mp4",
            "u1",
        ))
        .await
        .unwrap();

    let mut status = TaskStatus::Pending;
    for _ in 0..200 {
        status = port.get_task_status(&task_id).await.unwrap().0;
        if status == TaskStatus::Success {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Give the claim loop a few more ticks after completion.
    tokio::time::sleep(Duration::from_millis(200)).await;

    executor.shutdown();
    runner.await.unwrap().unwrap();

    assert_eq!(status, TaskStatus::Success);
    assert_eq!(h.toolchain.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(broker.in_flight_len(), 0);
}

#[tokio::test]
async fn test_unknown_task_polls_pending() {
    let port = TaskPort::new(Arc::new(InMemoryBroker::new()));
    let (status, output) = port
        .get_task_status(&vtask_models::TaskId::from_string("nope"))
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Pending);
    assert!(output.is_none());
}
