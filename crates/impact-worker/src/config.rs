use serde::{Deserialize, Serialize};
use uuid::Uuid;

// The broker caps long-poll waits at 20 seconds.
const MAX_RECEIVE_WAIT_SECS: u64 = 20;

/// Configuration for the worker and its health server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Queue service endpoint
    pub queue_endpoint: String,

    /// Queue to consume
    pub queue_name: String,

    /// Long-poll wait in seconds (broker maximum: 20)
    pub receive_wait_secs: u64,

    /// Health endpoint port (0 selects an ephemeral port)
    pub health_port: u16,

    /// Max seconds between heartbeats before the worker reads as hung
    pub heartbeat_timeout_secs: u64,

    /// Multiplier applied to a long task's estimate before it reads as
    /// overrunning
    pub task_timeout_buffer: f64,

    /// Estimates below this many seconds are not tracked as long tasks
    pub long_task_threshold_secs: u64,

    /// Pause after a retryable failure, in seconds
    pub retry_backoff_secs: u64,

    /// How long shutdown waits for the in-flight message, in seconds
    pub shutdown_grace_secs: u64,

    /// Name reported by the health endpoint
    pub service_name: String,

    /// Fixed worker id (generated from hostname/pid when unset)
    pub worker_id: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            queue_endpoint: "http://127.0.0.1:9324".to_string(),
            queue_name: "impact_assessment_queue".to_string(),
            receive_wait_secs: 20,
            health_port: 8085,
            heartbeat_timeout_secs: 120,
            task_timeout_buffer: 1.5,
            long_task_threshold_secs: 30,
            retry_backoff_secs: 5,
            shutdown_grace_secs: 30,
            service_name: "impact-worker".to_string(),
            worker_id: None,
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Reject values the broker or the liveness algorithm cannot honor.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.receive_wait_secs <= MAX_RECEIVE_WAIT_SECS,
            "receive_wait_secs must be between 0 and {}, got {}",
            MAX_RECEIVE_WAIT_SECS,
            self.receive_wait_secs
        );
        anyhow::ensure!(
            self.task_timeout_buffer >= 1.0,
            "task_timeout_buffer must be at least 1.0, got {}",
            self.task_timeout_buffer
        );
        anyhow::ensure!(
            self.heartbeat_timeout_secs > 0,
            "heartbeat_timeout_secs must be positive"
        );
        Ok(())
    }

    /// Worker id for logs: the configured one, or `hostname-pid-random`.
    pub fn generate_worker_id(&self) -> String {
        if let Some(id) = &self.worker_id {
            return id.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let pid = std::process::id();
        let random = Uuid::new_v4()
            .to_string()
            .split('-')
            .next()
            .unwrap()
            .to_string();

        format!("{}-{}-{}", hostname, pid, random)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_validate() {
        WorkerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_wait_time_over_broker_limit_rejected() {
        let config = WorkerConfig {
            receive_wait_secs: 21,
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buffer_below_one_rejected() {
        let config = WorkerConfig {
            task_timeout_buffer: 0.5,
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_with_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "queue_name: levy_jobs").unwrap();
        writeln!(file, "heartbeat_timeout_secs: 180").unwrap();

        let config = WorkerConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.queue_name, "levy_jobs");
        assert_eq!(config.heartbeat_timeout_secs, 180);
        // Unlisted fields keep their defaults.
        assert_eq!(config.health_port, 8085);
    }

    #[test]
    fn test_worker_id_respects_override() {
        let config = WorkerConfig {
            worker_id: Some("worker-7".to_string()),
            ..WorkerConfig::default()
        };
        assert_eq!(config.generate_worker_id(), "worker-7");
    }

    #[test]
    fn test_generated_worker_id_has_three_parts() {
        let id = WorkerConfig::default().generate_worker_id();
        assert!(id.split('-').count() >= 3);
    }
}
