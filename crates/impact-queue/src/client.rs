use std::time::Duration;

use async_trait::async_trait;

use crate::{QueueMessage, Result};

/// The message-delivery capability the worker consumes.
///
/// `receive` long-polls: it blocks up to `wait` for a message before
/// returning `None`. `delete` acknowledges a processed message; a message
/// that is never deleted becomes visible again for redelivery.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive at most one message, waiting up to `wait` for one to arrive.
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>>;

    /// Remove a processed message from the queue.
    async fn delete(&self, message: &QueueMessage) -> Result<()>;
}
