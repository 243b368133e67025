use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{QueueClient, QueueError, QueueMessage, Result};

// Must exceed the longest long-poll the broker allows (20s).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the queue service.
///
/// `connect` resolves the canonical queue URL from the queue name once at
/// startup, so a missing queue surfaces before the processing loop starts.
pub struct HttpQueueClient {
    http: reqwest::Client,
    queue_url: String,
}

#[derive(Debug, Deserialize)]
struct QueueInfo {
    queue_url: String,
}

#[derive(Debug, Deserialize)]
struct ReceiveResponse {
    message: Option<QueueMessage>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: String,
    #[serde(default)]
    message: String,
}

impl HttpQueueClient {
    /// Resolve `queue_name` at `endpoint` and return a client bound to it.
    pub async fn connect(endpoint: &str, queue_name: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let url = format!("{}/queues/{}", endpoint.trim_end_matches('/'), queue_name);
        let response = http.get(&url).send().await?;
        let info: QueueInfo = decode(response).await?;

        debug!(queue_url = %info.queue_url, "resolved queue url");
        Ok(HttpQueueClient {
            http,
            queue_url: info.queue_url,
        })
    }

    /// Canonical URL of the queue this client consumes.
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl QueueClient for HttpQueueClient {
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>> {
        let url = format!("{}/receive", self.queue_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "wait_seconds": wait.as_secs() }))
            .send()
            .await?;

        let body: ReceiveResponse = decode(response).await?;
        Ok(body.message)
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        let url = format!("{}/messages/{}", self.queue_url, message.receipt_handle);
        let response = self.http.delete(&url).send().await?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(error_from(response).await)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| QueueError::InvalidResponse(e.to_string()))
}

/// Map an error response to a coded `QueueError`, falling back to the
/// HTTP status when the body carries no error document.
async fn error_from(response: reqwest::Response) -> QueueError {
    let status = response.status();
    match response.json::<ServiceError>().await {
        Ok(err) => QueueError::Service {
            code: err.code,
            message: err.message,
        },
        Err(_) => QueueError::Service {
            code: status.as_str().to_string(),
            message: format!("queue service returned {status}"),
        },
    }
}
