use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use impact_core::DurationEstimator;
use impact_queue::QueueClient;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::classify::WorkerError;
use crate::config::WorkerConfig;
use crate::health;
use crate::metrics::WorkerMetrics;
use crate::processor::ProcessorRegistry;
use crate::state::{LivenessState, WorkerStatus};
use crate::worker::Worker;

/// How the worker came down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Stop signal honored within the grace period.
    Clean,
    /// In-flight work overran the grace period and was aborted.
    Forced,
    /// The loop died on a fatal failure.
    Faulted,
}

impl ExitKind {
    /// Process exit code for the orchestrator.
    pub fn code(&self) -> i32 {
        match self {
            ExitKind::Clean => 0,
            ExitKind::Forced | ExitKind::Faulted => 1,
        }
    }
}

/// Owns startup wiring and the shutdown protocol: constructs the shared
/// liveness state, starts the health server and the processing loop as
/// independent execution units, and drives an ordered shutdown.
pub struct Supervisor {
    config: Arc<WorkerConfig>,
    state: Arc<LivenessState>,
    metrics: Arc<WorkerMetrics>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(config: WorkerConfig) -> anyhow::Result<Self> {
        Ok(Supervisor {
            config: Arc::new(config),
            state: Arc::new(LivenessState::new()),
            metrics: Arc::new(WorkerMetrics::new()?),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> Arc<LivenessState> {
        self.state.clone()
    }

    /// Token observed by the processing loop; cancelling it starts a
    /// graceful shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run both execution units until a stop signal or a fatal failure.
    ///
    /// The health server gets its own OS thread and runtime; the
    /// processing loop runs as a task on the calling runtime. Only the
    /// liveness state is shared between them.
    pub async fn run(
        &self,
        client: Arc<dyn QueueClient>,
        registry: Arc<ProcessorRegistry>,
        estimator: Arc<dyn DurationEstimator>,
    ) -> anyhow::Result<ExitKind> {
        // Bind before spawning so a taken port fails startup, not the
        // health thread.
        let listener = TcpListener::bind(("0.0.0.0", self.config.health_port))?;
        info!(addr = %listener.local_addr()?, "health endpoint listening");

        let health_shutdown = self.shutdown.child_token();
        let router = health::router(
            self.state.clone(),
            self.config.clone(),
            self.metrics.clone(),
        );
        let health_thread = health::spawn_server(listener, router, health_shutdown.clone())?;

        let worker = Worker::new(
            client,
            registry,
            estimator,
            self.state.clone(),
            self.metrics.clone(),
            self.config.clone(),
            self.shutdown.clone(),
        );
        let mut worker_task = tokio::spawn(async move { worker.run().await });

        self.install_signal_handlers()?;

        let exit = tokio::select! {
            result = &mut worker_task => self.loop_ended(result),
            _ = self.shutdown.cancelled() => self.drain(worker_task).await,
        };

        health_shutdown.cancel();
        if health_thread.join().is_err() {
            warn!("health server thread panicked during shutdown");
        }

        info!(exit = ?exit, "shutdown complete");
        Ok(exit)
    }

    /// Give the loop the grace period to finish its in-flight message,
    /// then force-terminate it.
    async fn drain(&self, mut worker_task: JoinHandle<Result<(), WorkerError>>) -> ExitKind {
        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        info!(grace_secs = grace.as_secs(), "stop signal received, draining");

        match tokio::time::timeout(grace, &mut worker_task).await {
            Ok(result) => self.loop_ended(result),
            Err(_) => {
                warn!("grace period exceeded, aborting in-flight work");
                worker_task.abort();
                ExitKind::Forced
            }
        }
    }

    fn loop_ended(&self, result: Result<Result<(), WorkerError>, JoinError>) -> ExitKind {
        match result {
            Ok(Ok(())) => {
                if self.shutdown.is_cancelled() {
                    ExitKind::Clean
                } else {
                    error!("processing loop exited without a shutdown signal");
                    self.state.set_status(WorkerStatus::Error);
                    ExitKind::Faulted
                }
            }
            Ok(Err(err)) => {
                // The loop already marked itself errored; the health
                // endpoint reports unavailable from here on.
                error!(error = %err, "processing loop stopped on a fatal failure");
                ExitKind::Faulted
            }
            Err(join_err) => {
                error!(error = %join_err, "processing loop task died");
                self.state.set_status(WorkerStatus::Error);
                ExitKind::Faulted
            }
        }
    }

    /// SIGTERM from the orchestrator, SIGINT for interactive runs; both
    /// set the shutdown flag the loop checks between iterations.
    fn install_signal_handlers(&self) -> anyhow::Result<()> {
        let token = self.shutdown.clone();
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("received SIGINT, shutting down gracefully"),
            }
            token.cancel();
        });
        Ok(())
    }
}
