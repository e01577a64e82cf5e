//! Broker capabilities.
//!
//! The API side only needs [`TaskBroker`] (submit a job, poll a task); the
//! worker side consumes deliveries through [`TaskConsumer`]. Both are
//! implemented by the Redis Streams broker and the in-memory broker.

use std::time::Duration;

use async_trait::async_trait;
use vtask_models::{TaskId, TaskOutput, TaskRecord};

use crate::error::QueueResult;
use crate::job::QueueJob;

/// Producer-side broker operations.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Record the task as PENDING and queue the job. Returns before the job runs.
    async fn submit(&self, job: QueueJob) -> QueueResult<TaskId>;

    /// Current record of a task. Unknown or expired ids come back PENDING.
    async fn poll(&self, task_id: &TaskId) -> QueueResult<TaskRecord>;
}

/// One job handed to one consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Broker-specific handle used to acknowledge the delivery
    pub delivery_id: String,
    pub job: QueueJob,
}

/// Terminal result of a job body.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(TaskOutput),
    Failure(String),
}

/// Worker-side broker operations.
#[async_trait]
pub trait TaskConsumer: Send + Sync {
    /// Wait up to `block` for at most `max` new deliveries.
    async fn fetch(&self, consumer: &str, max: usize, block: Duration) -> QueueResult<Vec<Delivery>>;

    /// Take over deliveries of other consumers that have been idle for at least `min_idle`.
    ///
    /// Deliveries already held by `consumer` are never returned.
    async fn reclaim(&self, consumer: &str, min_idle: Duration, max: usize) -> QueueResult<Vec<Delivery>>;

    /// Reset the idle time of a delivery `consumer` is still working on.
    async fn heartbeat(&self, consumer: &str, delivery: &Delivery) -> QueueResult<()>;

    async fn mark_started(&self, job: &QueueJob) -> QueueResult<()>;

    /// Store the terminal record and acknowledge the delivery.
    async fn finish(&self, delivery: &Delivery, outcome: TaskOutcome) -> QueueResult<()>;
}

/// Apply an outcome to a record.
pub(crate) fn apply_outcome(record: &mut TaskRecord, outcome: TaskOutcome) {
    match outcome {
        TaskOutcome::Success(output) => record.succeed(output),
        TaskOutcome::Failure(message) => record.fail(message),
    }
}
