use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry};

/// Prometheus metrics for the worker.
pub struct WorkerMetrics {
    pub registry: Registry,

    /// Messages pulled from the queue
    pub messages_received: IntCounter,

    /// Jobs by outcome
    pub jobs: CounterVec,

    /// Classified processing-loop failures
    pub failures: CounterVec,

    /// Job processing duration
    pub job_duration: HistogramVec,
}

impl WorkerMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let messages_received = IntCounter::new(
            "impact_messages_received_total",
            "Messages received from the queue",
        )?;
        registry.register(Box::new(messages_received.clone()))?;

        let jobs = CounterVec::new(
            Opts::new("impact_jobs_total", "Jobs processed by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(jobs.clone()))?;

        let failures = CounterVec::new(
            Opts::new(
                "impact_failures_total",
                "Processing-loop failures by classification",
            ),
            &["class"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        let job_duration = HistogramVec::new(
            HistogramOpts::new(
                "impact_job_duration_seconds",
                "Job processing duration in seconds",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(job_duration.clone()))?;

        Ok(WorkerMetrics {
            registry,
            messages_received,
            jobs,
            failures,
            job_duration,
        })
    }

    /// Record one processed job.
    pub fn observe_job(&self, kind: &str, duration_secs: f64) {
        self.job_duration
            .with_label_values(&[kind])
            .observe(duration_secs);
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
