//! Task queue for the media pipeline.
//!
//! This crate provides:
//! - Job descriptions for the five job kinds
//! - Broker traits with a Redis Streams and an in-memory implementation
//! - The [`TaskPort`] enqueue/poll contract

pub mod broker;
pub mod error;
pub mod job;
pub mod memory;
pub mod port;
pub mod queue;

pub use broker::{Delivery, TaskBroker, TaskConsumer, TaskOutcome};
pub use error::{QueueError, QueueResult};
pub use job::{
    AddSubtitlesJob, BurnAssJob, DownloadSectionJob, ExtractKeyInsightsJob, ExtractVideoSummaryJob, QueueJob,
};
pub use memory::InMemoryBroker;
pub use port::TaskPort;
pub use queue::{QueueConfig, RedisBroker};
