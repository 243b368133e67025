mod client;
mod error;
mod http;
mod memory;
mod message;

pub use client::QueueClient;
pub use error::{QueueError, Result};
pub use http::HttpQueueClient;
pub use memory::MemoryQueue;
pub use message::{QueueMessage, CORRELATION_ID_ATTRIBUTE};
