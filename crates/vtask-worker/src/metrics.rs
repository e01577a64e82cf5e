//! Prometheus metrics for the worker.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "vtask_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "vtask_job_duration_seconds";
}

/// Install the Prometheus recorder with an HTTP listener on `port`.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()
        .map_err(|e| WorkerError::config_error(format!("failed to start metrics exporter: {}", e)))
}

/// Record one finished job.
pub fn record_job(kind: &str, status: &str, duration_secs: f64) {
    let labels = [("kind", kind.to_string()), ("status", status.to_string())];
    counter!(names::JOBS_TOTAL, &labels).increment(1);

    let labels = [("kind", kind.to_string())];
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}
