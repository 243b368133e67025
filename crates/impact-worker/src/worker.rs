use std::sync::Arc;
use std::time::Duration;

use impact_core::{DurationEstimator, Job};
use impact_queue::{QueueClient, QueueError, QueueMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::{classify, FailureClass, WorkerError};
use crate::config::WorkerConfig;
use crate::correlation::{with_correlation, CorrelationId};
use crate::metrics::WorkerMetrics;
use crate::processor::ProcessorRegistry;
use crate::state::{LivenessState, WorkerStatus};

// Guard against a hot loop when long polling is configured off.
const ZERO_WAIT_IDLE_PAUSE: Duration = Duration::from_millis(100);

/// The processing loop: one message per iteration, handed to the
/// processor registered for its kind, acknowledged on success.
///
/// Messages are never batched. One message per iteration keeps the
/// heartbeat cadence tied to the poll cadence and isolates each failure
/// to its own message; throughput scales by running more workers.
pub struct Worker {
    client: Arc<dyn QueueClient>,
    registry: Arc<ProcessorRegistry>,
    estimator: Arc<dyn DurationEstimator>,
    state: Arc<LivenessState>,
    metrics: Arc<WorkerMetrics>,
    config: Arc<WorkerConfig>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        client: Arc<dyn QueueClient>,
        registry: Arc<ProcessorRegistry>,
        estimator: Arc<dyn DurationEstimator>,
        state: Arc<LivenessState>,
        metrics: Arc<WorkerMetrics>,
        config: Arc<WorkerConfig>,
        shutdown: CancellationToken,
    ) -> Self {
        Worker {
            client,
            registry,
            estimator,
            state,
            metrics,
            config,
            shutdown,
        }
    }

    /// Run until shutdown or a fatal broker failure.
    ///
    /// The shutdown token is checked between iterations only: an
    /// in-flight message always runs to completion before the loop
    /// exits.
    pub async fn run(&self) -> Result<(), WorkerError> {
        self.state.set_status(WorkerStatus::Running);
        info!(
            wait_secs = self.config.receive_wait_secs,
            "worker started, polling for messages"
        );

        while !self.shutdown.is_cancelled() {
            // Freshness must never depend on whether a message arrives.
            self.state.beat();

            match self.client.receive(self.receive_wait()).await {
                Ok(Some(message)) => {
                    self.state.set_ready();
                    self.metrics.messages_received.inc();

                    let result = self.handle_message(message).await;
                    // The message is complete either way: acknowledged,
                    // or abandoned to redelivery.
                    self.state.beat();

                    if let Err(err) = result {
                        if self.fail(&err).await == FailureClass::Fatal {
                            self.state.set_status(WorkerStatus::Error);
                            return Err(err);
                        }
                    }
                }
                Ok(None) => {
                    self.state.set_ready();
                    debug!("no message received within poll window");
                    if self.config.receive_wait_secs == 0 {
                        tokio::time::sleep(ZERO_WAIT_IDLE_PAUSE).await;
                    }
                }
                Err(err) => {
                    let err = WorkerError::from(err);
                    if self.fail(&err).await == FailureClass::Fatal {
                        self.state.set_status(WorkerStatus::Error);
                        return Err(err);
                    }
                }
            }
        }

        self.state.set_status(WorkerStatus::Stopped);
        info!("worker stopped");
        Ok(())
    }

    /// Process one message inside its correlation scope.
    async fn handle_message(&self, message: QueueMessage) -> Result<(), WorkerError> {
        let correlation = CorrelationId::from_message(&message);
        with_correlation(correlation, self.process_message(message)).await
    }

    async fn process_message(&self, message: QueueMessage) -> Result<(), WorkerError> {
        info!(message_id = %message.message_id, "received message");

        // An undecodable body is left unacknowledged: the broker
        // redelivers, and its dead-letter policy catches repeat
        // offenders.
        let job = Job::from_body(&message.body)?;

        let estimate = self.estimator.estimate(&job);
        let long_task = estimate >= Duration::from_secs(self.config.long_task_threshold_secs);
        if long_task {
            debug!(
                job_id = %job.id,
                estimate_secs = estimate.as_secs(),
                "tracking long-running job"
            );
            self.state.begin_task(estimate);
        }

        let started = std::time::Instant::now();
        let outcome = self.registry.dispatch(&job).await;
        if long_task {
            self.state.end_task();
        }
        self.metrics
            .observe_job(&job.kind, started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                self.delete_message(&message).await?;
                self.metrics.jobs.with_label_values(&["completed"]).inc();
                info!(job_id = %job.id, kind = %job.kind, "job completed");
                Ok(())
            }
            Err(err) => {
                self.metrics.jobs.with_label_values(&["failed"]).inc();
                Err(err.into())
            }
        }
    }

    /// Delete a processed message, tolerating an expired receipt handle:
    /// the work is done, redelivery is merely possible.
    async fn delete_message(&self, message: &QueueMessage) -> Result<(), WorkerError> {
        match self.client.delete(message).await {
            Ok(()) => {
                debug!(message_id = %message.message_id, "deleted message");
                Ok(())
            }
            Err(QueueError::Service { ref code, .. }) if code == "ReceiptHandleIsInvalid" => {
                warn!(
                    message_id = %message.message_id,
                    "receipt handle expired, message may have already been deleted"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Log a classified failure and apply the retry backoff for the
    /// non-fatal classes.
    async fn fail(&self, err: &WorkerError) -> FailureClass {
        let class = classify(err);
        self.metrics
            .failures
            .with_label_values(&[class.as_str()])
            .inc();

        match class {
            FailureClass::Fatal => {
                error!(error = %err, "fatal failure, stopping worker");
            }
            FailureClass::Transient => {
                warn!(error = %err, "transient failure, retrying after backoff");
                self.backoff().await;
            }
            FailureClass::Unexpected => {
                error!(error = ?err, "unexpected failure, retrying after backoff");
                self.backoff().await;
            }
        }
        class
    }

    /// Fixed pause between retries, cut short by shutdown.
    async fn backoff(&self) {
        let pause = Duration::from_secs(self.config.retry_backoff_secs);
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = self.shutdown.cancelled() => {}
        }
    }

    fn receive_wait(&self) -> Duration {
        Duration::from_secs(self.config.receive_wait_secs)
    }
}
