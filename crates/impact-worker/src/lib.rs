pub mod classify;
pub mod config;
pub mod correlation;
pub mod health;
pub mod metrics;
pub mod processor;
pub mod state;
pub mod supervisor;
pub mod worker;

pub use classify::{classify, FailureClass, WorkerError};
pub use config::WorkerConfig;
pub use metrics::WorkerMetrics;
pub use state::{LivenessState, WorkerStatus};
pub use supervisor::{ExitKind, Supervisor};
pub use worker::Worker;
