//! Media task worker.
//!
//! This crate provides:
//! - The five job bodies (download-section, add-subtitles, burn-ass, and the two extraction jobs)
//! - Transcript source, subtitle translator and model directory collaborators
//! - Job executor with bounded concurrency, idle-delivery reclaim and graceful shutdown
//! - Structured job logging and Prometheus metrics

pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod transcript;
pub mod translate;

pub use config::WorkerConfig;
pub use context::JobContext;
pub use directory::RedisModelDirectory;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use transcript::{TranscriptSource, YtDlpTranscriptSource};
pub use translate::{LlmTranslator, SegmentTranslator, UnconfiguredTranslator};
