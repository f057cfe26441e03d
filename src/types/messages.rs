//! NATS message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ImportJobType;

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

// =============================================================================
// IMPORT PAYLOADS
// =============================================================================

/// Submit a CSV file for background import.
///
/// Exactly one of `content` (plain text) or `content_base64` is expected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitImportRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_base64: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    pub job_type: Option<ImportJobType>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Look up the status of a previously submitted job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusRequest {
    pub job_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_deserializes_from_camel_case() {
        let json = r#"{"content":"a,b","filename":"prices.csv","jobType":"historicalPricesCsv","symbol":"MSFT"}"#;
        let request: SubmitImportRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.content.as_deref(), Some("a,b"));
        assert_eq!(request.job_type, Some(ImportJobType::HistoricalPricesCsv));
        assert_eq!(request.symbol.as_deref(), Some("MSFT"));
        assert!(request.content_base64.is_none());
    }

    #[test]
    fn test_error_response_carries_code_and_message() {
        let error = ErrorResponse::new(Uuid::nil(), "NOT_FOUND", "job not found");
        let json: serde_json::Value = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "job not found");
        assert_eq!(json["error"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_status_request_uses_job_id_key() {
        let json = r#"{"jobId":"00000000-0000-0000-0000-000000000000"}"#;
        let request: JobStatusRequest = serde_json::from_str(json).unwrap();
        assert!(request.job_id.is_nil());
    }
}
