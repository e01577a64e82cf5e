//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// How long one fetch waits for new deliveries
    pub fetch_block: Duration,
    /// How often the worker should scan for orphaned deliveries
    pub claim_interval: Duration,
    /// Minimum idle time before a delivery can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// Model used to translate subtitle cues
    pub translation_model_id: Option<String>,
    /// Port of the Prometheus exporter; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            shutdown_timeout: Duration::from_secs(30),
            work_dir: std::env::temp_dir().join("vtask"),
            fetch_block: Duration::from_secs(1),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            translation_model_id: None,
            metrics_port: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// How often a running job renews its delivery; well inside `claim_min_idle`.
    pub fn heartbeat_interval(&self) -> Duration {
        (self.claim_min_idle / 3).max(Duration::from_millis(10))
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse::<usize>("WORKER_MAX_JOBS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            fetch_block: defaults.fetch_block,
            claim_interval: env_parse("WORKER_CLAIM_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_interval),
            claim_min_idle: env_parse("WORKER_CLAIM_MIN_IDLE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_min_idle),
            translation_model_id: std::env::var("TRANSLATION_MODEL_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            metrics_port: env_parse("METRICS_PORT"),
        }
    }
}
