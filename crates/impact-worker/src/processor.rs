use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use impact_core::{Job, JobError};
use parking_lot::RwLock;
use tracing::info;

/// Executes decoded jobs. Everything behind this trait — geospatial
/// computation, levy calculation, persistence, notifications — is outside
/// the worker's concern.
///
/// The loop treats `process` as an opaque, potentially long call.
/// Implementations that burn CPU should hand the hot section to
/// `tokio::task::spawn_blocking` so the runtime stays responsive.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &Job) -> Result<(), JobError>;
}

/// Registry of job processors by job kind.
pub struct ProcessorRegistry {
    processors: RwLock<HashMap<String, Arc<dyn JobProcessor>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        ProcessorRegistry {
            processors: RwLock::new(HashMap::new()),
        }
    }

    /// Register a processor for a job kind.
    pub fn register<P: JobProcessor + 'static>(&self, kind: impl Into<String>, processor: P) {
        let mut processors = self.processors.write();
        processors.insert(kind.into(), Arc::new(processor));
    }

    /// Get the processor for a job kind.
    pub fn get(&self, kind: &str) -> Option<Arc<dyn JobProcessor>> {
        let processors = self.processors.read();
        processors.get(kind).cloned()
    }

    /// All registered job kinds.
    pub fn kinds(&self) -> Vec<String> {
        let processors = self.processors.read();
        processors.keys().cloned().collect()
    }

    /// Route a job to its processor.
    pub async fn dispatch(&self, job: &Job) -> Result<(), JobError> {
        let processor = self
            .get(&job.kind)
            .ok_or_else(|| JobError::UnknownKind(job.kind.clone()))?;
        processor.process(job).await
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Processor that records the job and completes immediately.
pub struct NoopProcessor;

#[async_trait]
impl JobProcessor for NoopProcessor {
    async fn process(&self, job: &Job) -> Result<(), JobError> {
        info!(job_id = %job.id, kind = %job.kind, "processing job");
        Ok(())
    }
}

/// Processor that simulates long-running work.
pub struct SleepProcessor {
    duration: Duration,
}

impl SleepProcessor {
    pub fn new(duration: Duration) -> Self {
        SleepProcessor { duration }
    }
}

#[async_trait]
impl JobProcessor for SleepProcessor {
    async fn process(&self, _job: &Job) -> Result<(), JobError> {
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job(kind: &str) -> Job {
        Job {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            parameters: serde_json::Value::Null,
            estimated_duration_secs: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_registered_processor() {
        let registry = ProcessorRegistry::new();
        registry.register("noop", NoopProcessor);

        assert!(registry.dispatch(&job("noop")).await.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_kind_fails() {
        let registry = ProcessorRegistry::new();

        let result = registry.dispatch(&job("mystery")).await;
        assert!(matches!(result, Err(JobError::UnknownKind(kind)) if kind == "mystery"));
    }

    #[test]
    fn test_registry_lists_kinds() {
        let registry = ProcessorRegistry::new();
        registry.register("spatial_overlay", NoopProcessor);
        registry.register("levy_calculation", NoopProcessor);

        let mut kinds = registry.kinds();
        kinds.sort();
        assert_eq!(kinds, vec!["levy_calculation", "spatial_overlay"]);
    }
}
