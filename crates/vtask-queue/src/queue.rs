//! Task broker using Redis Streams.
//!
//! Jobs travel as JSON in the `job` field of a stream entry read through a
//! consumer group. Task records live next to the stream as JSON strings
//! under `{prefix}:task:{id}` and expire after the configured result TTL.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use vtask_models::{TaskId, TaskRecord};

use crate::broker::{apply_outcome, Delivery, TaskBroker, TaskConsumer, TaskOutcome};
use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Prefix of task record keys
    pub key_prefix: String,
    /// How long task records survive after their last update
    pub result_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vtask:jobs".to_string(),
            consumer_group: "vtask:workers".to_string(),
            key_prefix: "vtask".to_string(),
            result_ttl: Duration::from_secs(86400),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            key_prefix: defaults.key_prefix,
            result_ttl: std::env::var("TASK_RESULT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.result_ttl),
        }
    }
}

/// Redis Streams broker.
pub struct RedisBroker {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisBroker {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    fn task_key(&self, task_id: &TaskId) -> String {
        format!("{}:task:{}", self.config.key_prefix, task_id)
    }

    /// Create the consumer group if it does not exist yet.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Number of entries still on the stream.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    async fn load_record(&self, conn: &mut MultiplexedConnection, task_id: &TaskId) -> QueueResult<Option<TaskRecord>> {
        let raw: Option<String> = conn.get(self.task_key(task_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn store_record(&self, conn: &mut MultiplexedConnection, record: &TaskRecord) -> QueueResult<()> {
        let payload = serde_json::to_string(record)?;
        conn.set_ex::<_, _, ()>(self.task_key(&record.task_id), payload, self.config.result_ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn ack(&self, conn: &mut MultiplexedConnection, message_id: &str) -> QueueResult<()> {
        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;

        debug!("Acknowledged delivery: {}", message_id);
        Ok(())
    }

    /// Turn stream entries into deliveries.
    ///
    /// Entries whose payload does not parse are acknowledged so they are not
    /// redelivered forever; if they name a task, that task is failed.
    async fn parse_entries(&self, conn: &mut MultiplexedConnection, entries: Vec<StreamId>) -> QueueResult<Vec<Delivery>> {
        let mut deliveries = Vec::with_capacity(entries.len());

        for entry in entries {
            let message_id = entry.id.clone();
            let payload = match entry.map.get("job") {
                Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
                _ => {
                    warn!("Stream entry {} has no job payload", message_id);
                    self.ack(conn, &message_id).await.ok();
                    continue;
                }
            };

            match serde_json::from_str::<QueueJob>(&payload) {
                Ok(job) => deliveries.push(Delivery {
                    delivery_id: message_id,
                    job,
                }),
                Err(e) => {
                    warn!("Failed to parse job payload {}: {}", message_id, e);
                    if let Some(redis::Value::BulkString(id)) = entry.map.get("task_id") {
                        let task_id = TaskId::from_string(String::from_utf8_lossy(id));
                        let mut record = self
                            .load_record(conn, &task_id)
                            .await
                            .ok()
                            .flatten()
                            .unwrap_or_else(|| TaskRecord::unknown(task_id));
                        record.fail(format!("Malformed job payload: {}", e));
                        self.store_record(conn, &record).await.ok();
                    }
                    self.ack(conn, &message_id).await.ok();
                }
            }
        }

        Ok(deliveries)
    }
}

/// Pending entry ids held by consumers other than `consumer`.
fn claimable_ids(pending: &StreamPendingCountReply, consumer: &str) -> Vec<String> {
    pending
        .ids
        .iter()
        .filter(|entry| entry.consumer != consumer)
        .map(|entry| entry.id.clone())
        .collect()
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn submit(&self, job: QueueJob) -> QueueResult<TaskId> {
        let mut conn = self.connection().await?;

        let task_id = job.task_id().clone();
        let payload = serde_json::to_string(&job)?;

        // Record first so a fast worker never observes a missing record
        self.store_record(&mut conn, &TaskRecord::pending(task_id.clone(), job.kind()))
            .await?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("task_id")
            .arg(task_id.as_str())
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::enqueue_failed(e.to_string()))?;

        info!(task_id = %task_id, kind = %job.kind(), "Enqueued job with message ID {}", message_id);
        Ok(task_id)
    }

    async fn poll(&self, task_id: &TaskId) -> QueueResult<TaskRecord> {
        let mut conn = self.connection().await?;
        Ok(self
            .load_record(&mut conn, task_id)
            .await?
            .unwrap_or_else(|| TaskRecord::unknown(task_id.clone())))
    }
}

#[async_trait]
impl TaskConsumer for RedisBroker {
    async fn fetch(&self, consumer: &str, max: usize, block: Duration) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.connection().await?;

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(max.max(1))
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::dequeue_failed(e.to_string()))?;

        let entries: Vec<StreamId> = reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default();
        self.parse_entries(&mut conn, entries).await
    }

    async fn reclaim(&self, consumer: &str, min_idle: Duration, max: usize) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.connection().await?;
        let min_idle_ms = min_idle.as_millis() as u64;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(max.max(1))
            .query_async(&mut conn)
            .await?;

        let stale = claimable_ids(&pending, consumer);
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(min_idle_ms);
        for id in &stale {
            cmd.arg(id);
        }
        let claimed: StreamClaimReply = cmd.query_async(&mut conn).await?;

        let deliveries = self.parse_entries(&mut conn, claimed.ids).await?;
        for delivery in &deliveries {
            info!(task_id = %delivery.job.task_id(), "Reclaimed idle delivery {}", delivery.delivery_id);
        }
        Ok(deliveries)
    }

    async fn heartbeat(&self, consumer: &str, delivery: &Delivery) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        // Claiming an entry we already own with min-idle 0 resets its idle time.
        let ids: Vec<String> = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(0)
            .arg(&delivery.delivery_id)
            .arg("JUSTID")
            .query_async(&mut conn)
            .await?;

        if ids.is_empty() {
            return Err(QueueError::DeliveryNotFound(delivery.delivery_id.clone()));
        }
        Ok(())
    }

    async fn mark_started(&self, job: &QueueJob) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let mut record = self
            .load_record(&mut conn, job.task_id())
            .await?
            .unwrap_or_else(|| TaskRecord::pending(job.task_id().clone(), job.kind()));
        record.mark_started();
        self.store_record(&mut conn, &record).await
    }

    async fn finish(&self, delivery: &Delivery, outcome: TaskOutcome) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let job = &delivery.job;
        let mut record = self
            .load_record(&mut conn, job.task_id())
            .await?
            .unwrap_or_else(|| TaskRecord::pending(job.task_id().clone(), job.kind()));
        apply_outcome(&mut record, outcome);
        self.store_record(&mut conn, &record).await?;
        self.ack(&mut conn, &delivery.delivery_id).await
    }
}
