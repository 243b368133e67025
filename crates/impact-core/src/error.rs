use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("No processor registered for job kind: {0}")]
    UnknownKind(String),

    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),
}

pub type Result<T> = std::result::Result<T, JobError>;
