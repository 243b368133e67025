use std::future::Future;
use std::sync::Arc;

use impact_queue::QueueMessage;
use tracing::{info_span, Instrument};
use uuid::Uuid;

tokio::task_local! {
    /// Correlation id of the message currently being processed.
    static CORRELATION_ID: CorrelationId;
}

/// Correlation identifier scoped to one message's processing.
///
/// Extracted from message metadata, or generated when the producer did
/// not supply one, so every message's logs stay joinable across services.
#[derive(Debug, Clone)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    pub fn from_message(message: &QueueMessage) -> Self {
        match message.correlation_id() {
            Some(id) => CorrelationId(Arc::from(id)),
            None => CorrelationId(Arc::from(Uuid::new_v4().to_string().as_str())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Correlation id of the current logical flow, if inside one.
    pub fn current() -> Option<CorrelationId> {
        CORRELATION_ID.try_with(Clone::clone).ok()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run `future` with `id` as the ambient correlation id.
///
/// The id lives in task-local storage for code that needs to read it, and
/// on a span so every log emission inside the scope carries it without
/// parameter threading. The scope ends with the future; nothing is torn
/// down mid-flight.
pub async fn with_correlation<F>(id: CorrelationId, future: F) -> F::Output
where
    F: Future,
{
    let span = info_span!("message", correlation_id = %id);
    CORRELATION_ID.scope(id, future.instrument(span)).await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use impact_queue::CORRELATION_ID_ATTRIBUTE;

    fn message(attributes: HashMap<String, String>) -> QueueMessage {
        QueueMessage {
            message_id: "m-1".to_string(),
            body: "{}".to_string(),
            receipt_handle: "r-1".to_string(),
            attributes,
        }
    }

    #[test]
    fn test_id_taken_from_message_attribute() {
        let mut attributes = HashMap::new();
        attributes.insert(CORRELATION_ID_ATTRIBUTE.to_string(), "req-42".to_string());

        let id = CorrelationId::from_message(&message(attributes));
        assert_eq!(id.as_str(), "req-42");
    }

    #[test]
    fn test_id_generated_when_absent() {
        let id = CorrelationId::from_message(&message(HashMap::new()));

        // Generated ids are v4 uuids.
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[tokio::test]
    async fn test_current_inside_and_outside_scope() {
        assert!(CorrelationId::current().is_none());

        let id = CorrelationId(Arc::from("scoped"));
        with_correlation(id, async {
            let current = CorrelationId::current().expect("should be in scope");
            assert_eq!(current.as_str(), "scoped");
        })
        .await;

        assert!(CorrelationId::current().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_scopes_stay_isolated() {
        let first = CorrelationId(Arc::from("first"));
        let second = CorrelationId(Arc::from("second"));

        let (_, _) = tokio::join!(
            with_correlation(first, async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                assert_eq!(CorrelationId::current().unwrap().as_str(), "first");
            }),
            with_correlation(second, async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                assert_eq!(CorrelationId::current().unwrap().as_str(), "second");
            })
        );
    }
}
