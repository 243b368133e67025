use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{JobError, Result};

/// Unique identifier for a job
pub type JobId = Uuid;

/// A unit of work delivered through the message queue.
///
/// One queue message body decodes into exactly one job. The parameters
/// are opaque to the worker; only the processor registered for `kind`
/// interprets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,

    /// Job kind name (e.g., "spatial_overlay", "levy_calculation")
    pub kind: String,

    /// Kind-specific parameters
    #[serde(default)]
    pub parameters: serde_json::Value,

    /// Producer-supplied duration hint in seconds, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
}

impl Job {
    /// Decode a job from a raw message body.
    pub fn from_body(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| JobError::InvalidPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_minimal_body() {
        let body = r#"{"id":"9f2c4f6e-3b7a-4b0e-9c57-2f6f2a1d8e01","kind":"levy_calculation"}"#;
        let job = Job::from_body(body).unwrap();

        assert_eq!(job.kind, "levy_calculation");
        assert_eq!(job.parameters, serde_json::Value::Null);
        assert!(job.estimated_duration_secs.is_none());
    }

    #[test]
    fn test_decode_with_duration_hint() {
        let body = serde_json::json!({
            "id": Uuid::new_v4(),
            "kind": "spatial_overlay",
            "parameters": {"region": "eu-west"},
            "estimated_duration_secs": 90,
        })
        .to_string();

        let job = Job::from_body(&body).unwrap();
        assert_eq!(job.estimated_duration_secs, Some(90));
        assert_eq!(job.parameters["region"], "eu-west");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = Job::from_body("not json at all");
        assert!(matches!(result, Err(JobError::InvalidPayload(_))));
    }

    #[test]
    fn test_decode_rejects_missing_kind() {
        let body = serde_json::json!({"id": Uuid::new_v4()}).to_string();
        assert!(Job::from_body(&body).is_err());
    }
}
