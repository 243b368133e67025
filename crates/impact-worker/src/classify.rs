use impact_core::JobError;
use impact_queue::QueueError;
use thiserror::Error;

/// A failure raised inside one processing-loop iteration.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Job(#[from] JobError),
}

/// How the processing loop reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Unrecoverable configuration or authorization problem: mark the
    /// worker errored and stop the loop.
    Fatal,
    /// Worth retrying after a short pause.
    Transient,
    /// Anything else, job failures included: logged in full, retried
    /// like a transient failure, but distinguished in logs and metrics.
    Unexpected,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Fatal => "fatal",
            FailureClass::Transient => "transient",
            FailureClass::Unexpected => "unexpected",
        }
    }
}

/// Broker error codes no amount of retrying will fix. The Kms entries
/// apply when the queue is encryption-enabled.
const FATAL_CODES: &[&str] = &[
    "QueueDoesNotExist",
    "InvalidClientTokenId",
    "InvalidSecurityToken",
    "SignatureDoesNotMatch",
    "AccessDenied",
    "KmsAccessDenied",
    "KmsDisabled",
    "KmsNotFound",
];

/// Classify a failure raised by one loop iteration.
///
/// Deliberate shutdown is not a failure and never reaches this function:
/// the loop observes the cancellation token directly, so a stop signal
/// cannot be misclassified as an error.
pub fn classify(error: &WorkerError) -> FailureClass {
    match error {
        WorkerError::Queue(QueueError::Service { code, .. }) => {
            if FATAL_CODES.contains(&code.as_str()) {
                FailureClass::Fatal
            } else {
                FailureClass::Transient
            }
        }
        WorkerError::Queue(QueueError::Transport(_)) => FailureClass::Transient,
        WorkerError::Queue(QueueError::InvalidResponse(_)) => FailureClass::Unexpected,
        WorkerError::Job(_) => FailureClass::Unexpected,
    }
}
