use thiserror::Error;

/// Failures surfaced by the broker capability.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The broker answered with a coded error.
    #[error("Queue service error {code}: {message}")]
    Service { code: String, message: String },

    /// The broker could not be reached (connect, timeout, I/O).
    #[error("Queue transport error: {0}")]
    Transport(String),

    /// The broker answered with something we could not interpret.
    #[error("Invalid queue response: {0}")]
    InvalidResponse(String),
}

impl QueueError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        QueueError::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Broker-reported error code, when the failure carries one.
    pub fn code(&self) -> Option<&str> {
        match self {
            QueueError::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for QueueError {
    fn from(error: reqwest::Error) -> Self {
        QueueError::Transport(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
