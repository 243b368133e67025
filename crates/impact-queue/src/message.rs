use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Message attribute carrying the correlation identifier, when present.
pub const CORRELATION_ID_ATTRIBUTE: &str = "CorrelationId";

/// A message delivered by the broker.
///
/// The broker owns the lifecycle: a received message must be deleted once
/// processed, or it becomes visible again after the visibility timeout
/// and is redelivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Unique message identifier
    pub message_id: String,

    /// Opaque message body
    pub body: String,

    /// Handle used to delete the message after processing
    pub receipt_handle: String,

    /// Broker-supplied metadata (correlation id, trace context, ...)
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl QueueMessage {
    /// Correlation identifier from message metadata, if the producer set one.
    pub fn correlation_id(&self) -> Option<&str> {
        self.attributes
            .get(CORRELATION_ID_ATTRIBUTE)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_from_attributes() {
        let mut attributes = HashMap::new();
        attributes.insert(CORRELATION_ID_ATTRIBUTE.to_string(), "abc-123".to_string());

        let message = QueueMessage {
            message_id: "m-1".to_string(),
            body: "{}".to_string(),
            receipt_handle: "r-1".to_string(),
            attributes,
        };

        assert_eq!(message.correlation_id(), Some("abc-123"));
    }

    #[test]
    fn test_correlation_id_absent() {
        let message = QueueMessage {
            message_id: "m-1".to_string(),
            body: "{}".to_string(),
            receipt_handle: "r-1".to_string(),
            attributes: HashMap::new(),
        };

        assert_eq!(message.correlation_id(), None);
    }
}
