use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{QueueClient, QueueError, QueueMessage, Result};

/// In-process queue with the broker's observable contract: received
/// messages stay in flight until deleted and can be released back for
/// redelivery. This is a stand-in for the real broker in tests and local
/// runs, not a queue implementation.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

#[derive(Default)]
struct State {
    ready: VecDeque<QueueMessage>,
    in_flight: HashMap<String, QueueMessage>,
    errors: VecDeque<QueueError>,
    sequence: u64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message body with the given attributes.
    pub fn push(
        &self,
        body: impl Into<String>,
        attributes: HashMap<String, String>,
    ) -> QueueMessage {
        let message = {
            let mut state = self.inner.state.lock();
            state.sequence += 1;
            let message = QueueMessage {
                message_id: format!("m-{}", state.sequence),
                body: body.into(),
                receipt_handle: format!("r-{}", state.sequence),
                attributes,
            };
            state.ready.push_back(message.clone());
            message
        };
        self.inner.notify.notify_one();
        message
    }

    /// Queue an error to be returned by the next `receive` call.
    pub fn inject_error(&self, error: QueueError) {
        self.inner.state.lock().errors.push_back(error);
        self.inner.notify.notify_one();
    }

    /// Return all in-flight messages to the queue, as the broker does
    /// when a visibility timeout expires. Returns how many were released.
    pub fn release_inflight(&self) -> usize {
        let released = {
            let mut state = self.inner.state.lock();
            let messages: Vec<QueueMessage> = state.in_flight.drain().map(|(_, m)| m).collect();
            let count = messages.len();
            for message in messages {
                state.ready.push_back(message);
            }
            count
        };
        if released > 0 {
            self.inner.notify.notify_one();
        }
        released
    }

    /// Messages received but not yet deleted.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Messages waiting to be received.
    pub fn len(&self) -> usize {
        self.inner.state.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            {
                let mut state = self.inner.state.lock();
                if let Some(error) = state.errors.pop_front() {
                    return Err(error);
                }
                if let Some(message) = state.ready.pop_front() {
                    state
                        .in_flight
                        .insert(message.receipt_handle.clone(), message.clone());
                    return Ok(Some(message));
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::select! {
                _ = self.inner.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.in_flight.remove(&message.receipt_handle).is_some() {
            Ok(())
        } else {
            Err(QueueError::service(
                "ReceiptHandleIsInvalid",
                "unknown or expired receipt handle",
            ))
        }
    }
}
