//! Job executor.
//!
//! Pulls deliveries from a [`TaskConsumer`], runs at most
//! `max_concurrent_jobs` bodies at once, and records every outcome. Nothing is
//! retried: a failed body is stored as FAILURE and its delivery acknowledged.
//! While a body runs its delivery is kept alive with heartbeats, so only
//! deliveries left behind by a crashed worker go idle and get reclaimed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use vtask_queue::{Delivery, TaskConsumer, TaskOutcome};

use crate::config::WorkerConfig;
use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::jobs::run_job;
use crate::logging::JobLogger;
use crate::metrics::record_job;

/// Job executor that processes deliveries from the broker.
pub struct JobExecutor {
    config: WorkerConfig,
    consumer: Arc<dyn TaskConsumer>,
    ctx: Arc<JobContext>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, consumer: Arc<dyn TaskConsumer>, ctx: JobContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            consumer,
            ctx: Arc::new(ctx),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Run until [`JobExecutor::shutdown`] is called, then drain in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_loop();

        loop {
            if *shutdown_rx.borrow_and_update() {
                info!("Shutdown signal received, stopping executor");
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}; their deliveries will be reclaimed",
                self.config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    fn spawn_claim_loop(&self) -> tokio::task::JoinHandle<()> {
        let consumer = Arc::clone(&self.consumer);
        let ctx = Arc::clone(&self.ctx);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let interval_period = self.config.claim_interval;
        let min_idle = self.config.claim_min_idle;
        let heartbeat = self.config.heartbeat_interval();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_period);
            loop {
                if *shutdown_rx.borrow_and_update() {
                    break;
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = interval.tick() => {
                        let available = semaphore.available_permits();
                        if available == 0 {
                            continue;
                        }
                        match consumer.reclaim(&consumer_name, min_idle, available).await {
                            Ok(deliveries) if !deliveries.is_empty() => {
                                info!("Claimed {} idle deliveries", deliveries.len());
                                for delivery in deliveries {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        break;
                                    };
                                    let ctx = Arc::clone(&ctx);
                                    let consumer = Arc::clone(&consumer);
                                    let consumer_name = consumer_name.clone();
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_delivery(&ctx, consumer.as_ref(), &consumer_name, heartbeat, delivery)
                                            .await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to claim idle deliveries: {}", e),
                        }
                    }
                }
            }
        })
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let deliveries = self
            .consumer
            .fetch(&self.consumer_name, available.min(5), self.config.fetch_block)
            .await?;

        if deliveries.is_empty() {
            return Ok(());
        }

        debug!("Fetched {} deliveries", deliveries.len());

        for delivery in deliveries {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::config_error("job semaphore closed"))?;
            let ctx = Arc::clone(&self.ctx);
            let consumer = Arc::clone(&self.consumer);
            let consumer_name = self.consumer_name.clone();
            let heartbeat = self.config.heartbeat_interval();

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_delivery(&ctx, consumer.as_ref(), &consumer_name, heartbeat, delivery).await;
            });
        }

        Ok(())
    }

    /// Run one delivery to completion and store its outcome.
    ///
    /// `consumer_name` sends a heartbeat for the delivery every `heartbeat`
    /// while the body runs.
    pub async fn execute_delivery(
        ctx: &JobContext,
        consumer: &dyn TaskConsumer,
        consumer_name: &str,
        heartbeat: Duration,
        delivery: Delivery,
    ) {
        let job = &delivery.job;
        let kind = job.kind();
        let logger = JobLogger::new(job.task_id(), kind);

        if let Err(e) = consumer.mark_started(job).await {
            logger.log_warning(&format!("failed to mark task started: {}", e));
        }

        let started = Instant::now();
        let body = run_job(ctx, job).instrument(logger.create_span());
        tokio::pin!(body);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + heartbeat, heartbeat);
        let result = loop {
            tokio::select! {
                result = &mut body => break result,
                _ = ticker.tick() => {
                    if let Err(e) = consumer.heartbeat(consumer_name, &delivery).await {
                        logger.log_warning(&format!("heartbeat failed: {}", e));
                    }
                }
            }
        };
        let elapsed = started.elapsed().as_secs_f64();

        let outcome = match result {
            Ok(output) => {
                record_job(kind.as_str(), "success", elapsed);
                TaskOutcome::Success(output)
            }
            Err(e) => {
                let class = if e.is_validation() { "rejected" } else { "failed" };
                logger.log_error(&format!("{} after {:.1}s: {}", class, elapsed, e));
                record_job(kind.as_str(), "failure", elapsed);
                TaskOutcome::Failure(e.to_string())
            }
        };

        if let Err(e) = consumer.finish(&delivery, outcome).await {
            error!(task_id = %job.task_id(), "Failed to record task outcome: {}", e);
        }
    }

    async fn wait_for_jobs(&self) {
        let capacity = self.config.max_concurrent_jobs.max(1);
        while self.job_semaphore.available_permits() < capacity {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
