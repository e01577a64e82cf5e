//! In-process broker.
//!
//! Implements both broker traits over a mutex-guarded table. Used by tests
//! and by single-process setups where the API and the worker share memory.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;
use vtask_models::{TaskId, TaskRecord};

use crate::broker::{apply_outcome, Delivery, TaskBroker, TaskConsumer, TaskOutcome};
use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

struct InFlight {
    delivery: Delivery,
    consumer: String,
    since: Instant,
}

#[derive(Default)]
struct State {
    records: HashMap<TaskId, TaskRecord>,
    ready: VecDeque<Delivery>,
    in_flight: HashMap<String, InFlight>,
    next_delivery: u64,
}

#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<State>,
    notify: Notify,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> QueueResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| QueueError::connection_failed("in-memory broker lock poisoned"))
    }

    /// Jobs waiting for a consumer.
    pub fn ready_len(&self) -> usize {
        self.state.lock().map(|s| s.ready.len()).unwrap_or(0)
    }

    /// Deliveries handed out but not finished.
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().map(|s| s.in_flight.len()).unwrap_or(0)
    }

    fn take_ready(&self, consumer: &str, max: usize) -> QueueResult<Vec<Delivery>> {
        let mut state = self.lock()?;
        let mut taken = Vec::new();
        while taken.len() < max {
            let Some(delivery) = state.ready.pop_front() else {
                break;
            };
            state.in_flight.insert(
                delivery.delivery_id.clone(),
                InFlight {
                    delivery: delivery.clone(),
                    consumer: consumer.to_string(),
                    since: Instant::now(),
                },
            );
            taken.push(delivery);
        }
        Ok(taken)
    }
}

#[async_trait]
impl TaskBroker for InMemoryBroker {
    async fn submit(&self, job: QueueJob) -> QueueResult<TaskId> {
        let task_id = job.task_id().clone();
        {
            let mut state = self.lock()?;
            state.next_delivery += 1;
            let delivery_id = format!("mem-{}", state.next_delivery);
            state
                .records
                .insert(task_id.clone(), TaskRecord::pending(task_id.clone(), job.kind()));
            state.ready.push_back(Delivery { delivery_id, job });
        }
        self.notify.notify_one();
        Ok(task_id)
    }

    async fn poll(&self, task_id: &TaskId) -> QueueResult<TaskRecord> {
        let state = self.lock()?;
        Ok(state
            .records
            .get(task_id)
            .cloned()
            .unwrap_or_else(|| TaskRecord::unknown(task_id.clone())))
    }
}

#[async_trait]
impl TaskConsumer for InMemoryBroker {
    async fn fetch(&self, consumer: &str, max: usize, block: Duration) -> QueueResult<Vec<Delivery>> {
        let max = max.max(1);
        let taken = self.take_ready(consumer, max)?;
        if !taken.is_empty() {
            return Ok(taken);
        }

        let _ = tokio::time::timeout(block, self.notify.notified()).await;
        self.take_ready(consumer, max)
    }

    async fn reclaim(&self, consumer: &str, min_idle: Duration, max: usize) -> QueueResult<Vec<Delivery>> {
        let mut state = self.lock()?;
        let now = Instant::now();
        let mut claimed = Vec::new();
        for entry in state.in_flight.values_mut() {
            if claimed.len() >= max {
                break;
            }
            if entry.consumer != consumer && now.duration_since(entry.since) >= min_idle {
                entry.consumer = consumer.to_string();
                entry.since = now;
                claimed.push(entry.delivery.clone());
            }
        }
        Ok(claimed)
    }

    async fn heartbeat(&self, consumer: &str, delivery: &Delivery) -> QueueResult<()> {
        let mut state = self.lock()?;
        let entry = state
            .in_flight
            .get_mut(&delivery.delivery_id)
            .ok_or_else(|| QueueError::DeliveryNotFound(delivery.delivery_id.clone()))?;
        entry.consumer = consumer.to_string();
        entry.since = Instant::now();
        Ok(())
    }

    async fn mark_started(&self, job: &QueueJob) -> QueueResult<()> {
        let mut state = self.lock()?;
        state
            .records
            .entry(job.task_id().clone())
            .or_insert_with(|| TaskRecord::pending(job.task_id().clone(), job.kind()))
            .mark_started();
        Ok(())
    }

    async fn finish(&self, delivery: &Delivery, outcome: TaskOutcome) -> QueueResult<()> {
        let mut state = self.lock()?;
        if state.in_flight.remove(&delivery.delivery_id).is_none() {
            return Err(QueueError::DeliveryNotFound(delivery.delivery_id.clone()));
        }
        let job = &delivery.job;
        let record = state
            .records
            .entry(job.task_id().clone())
            .or_insert_with(|| TaskRecord::pending(job.task_id().clone(), job.kind()));
        apply_outcome(record, outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{DownloadSectionJob, ExtractVideoSummaryJob};
    use vtask_models::{StoredFileId, TaskOutput, TaskStatus};

    fn job() -> QueueJob {
        QueueJob::DownloadSection(DownloadSectionJob::new(
            "https://example.com/v",
            "00:00:05",
            "00:00:10",
            "clip.mp4",
            "user-1",
        ))
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let broker = InMemoryBroker::new();
        let task_id = broker.submit(job()).await.unwrap();
        assert_eq!(broker.poll(&task_id).await.unwrap().status, TaskStatus::Pending);

        let deliveries = broker.fetch("w1", 4, Duration::from_millis(10)).await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(broker.in_flight_len(), 1);

        broker.mark_started(&deliveries[0].job).await.unwrap();
        assert_eq!(broker.poll(&task_id).await.unwrap().status, TaskStatus::Started);

        broker
            .finish(&deliveries[0], TaskOutcome::Success(TaskOutput::StoredFile(StoredFileId::from("f"))))
            .await
            .unwrap();
        let record = broker.poll(&task_id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Success);
        assert_eq!(broker.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_task_polls_pending() {
        let broker = InMemoryBroker::new();
        let record = broker.poll(&TaskId::from("never-submitted")).await.unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn test_fetch_times_out_when_empty() {
        let broker = InMemoryBroker::new();
        let deliveries = broker.fetch("w1", 1, Duration::from_millis(20)).await.unwrap();
        assert!(deliveries.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_wakes_on_submit() {
        let broker = std::sync::Arc::new(InMemoryBroker::new());
        let consumer = broker.clone();
        let handle = tokio::spawn(async move { consumer.fetch("w1", 1, Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        broker
            .submit(QueueJob::ExtractVideoSummary(ExtractVideoSummaryJob::new("https://x.test", "m", "u")))
            .await
            .unwrap();

        let deliveries = handle.await.unwrap().unwrap();
        assert_eq!(deliveries.len(), 1);
    }

    #[tokio::test]
    async fn test_idle_deliveries_are_reclaimed() {
        let broker = InMemoryBroker::new();
        broker.submit(job()).await.unwrap();
        let first = broker.fetch("w1", 1, Duration::ZERO).await.unwrap();

        assert!(broker.reclaim("w2", Duration::from_secs(3600), 10).await.unwrap().is_empty());
        let reclaimed = broker.reclaim("w2", Duration::ZERO, 10).await.unwrap();
        assert_eq!(reclaimed, first);
    }

    #[tokio::test]
    async fn test_reclaim_skips_own_deliveries() {
        let broker = InMemoryBroker::new();
        broker.submit(job()).await.unwrap();
        broker.fetch("w1", 1, Duration::ZERO).await.unwrap();

        assert!(broker.reclaim("w1", Duration::ZERO, 10).await.unwrap().is_empty());
        assert_eq!(broker.reclaim("w2", Duration::ZERO, 10).await.unwrap().len(), 1);
        // Ownership moved to w2, so w2 cannot take it again.
        assert!(broker.reclaim("w2", Duration::ZERO, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_delivery_alive() {
        let broker = InMemoryBroker::new();
        broker.submit(job()).await.unwrap();
        let delivery = broker.fetch("w1", 1, Duration::ZERO).await.unwrap().remove(0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        broker.heartbeat("w1", &delivery).await.unwrap();
        assert!(broker.reclaim("w2", Duration::from_millis(50), 10).await.unwrap().is_empty());

        broker.finish(&delivery, TaskOutcome::Failure("boom".into())).await.unwrap();
        let err = broker.heartbeat("w1", &delivery).await.unwrap_err();
        assert!(matches!(err, QueueError::DeliveryNotFound(_)));
    }

    #[tokio::test]
    async fn test_finishing_twice_is_rejected() {
        let broker = InMemoryBroker::new();
        broker.submit(job()).await.unwrap();
        let delivery = broker.fetch("w1", 1, Duration::ZERO).await.unwrap().remove(0);

        broker.finish(&delivery, TaskOutcome::Failure("boom".into())).await.unwrap();
        let err = broker.finish(&delivery, TaskOutcome::Failure("boom".into())).await.unwrap_err();
        assert!(matches!(err, QueueError::DeliveryNotFound(_)));
    }
}
