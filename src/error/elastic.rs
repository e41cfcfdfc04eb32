use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured error information extracted from an Elasticsearch error body.
///
/// This is intended to be serialized to JSON and consumed by other
/// components (e.g. logging).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) index: Option<String>,
}

/// An HTTP error response from the search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Build an error response from a status code and raw response body.
    ///
    /// Elasticsearch returns either `{"error": {...}, "status": N}` or, for
    /// some endpoints, `{"error": "message"}`. Anything else is kept verbatim
    /// as the reason.
    pub fn from_body(status: u16, body: &str) -> Self {
        let error = match serde_json::from_str::<Value>(body) {
            Ok(value) => extract_error_info(&value).unwrap_or_else(|| ErrorInfo {
                reason: non_empty(body),
                ..ErrorInfo::default()
            }),
            Err(_) => ErrorInfo {
                reason: non_empty(body),
                ..ErrorInfo::default()
            },
        };
        Self { status, error }
    }

    /// Convert to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Backend returned HTTP {}", self.status)?;
        if let Some(ref kind) = self.error.error_type {
            write!(f, " [{kind}]")?;
        }
        if let Some(ref reason) = self.error.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorResponse {}

/// Pull type, reason, and index out of an error body.
///
/// Prefers the first `root_cause` entry when the top-level error only wraps it.
fn extract_error_info(body: &Value) -> Option<ErrorInfo> {
    let error = body.get("error")?;

    if let Some(msg) = error.as_str() {
        return Some(ErrorInfo {
            reason: Some(msg.to_string()),
            ..ErrorInfo::default()
        });
    }

    let mut info = ErrorInfo {
        error_type: string_field(error, "type"),
        reason: string_field(error, "reason"),
        index: string_field(error, "index"),
    };

    if let Some(cause) = error
        .get("root_cause")
        .and_then(Value::as_array)
        .and_then(|causes| causes.first())
    {
        if info.reason.is_none() {
            info.reason = string_field(cause, "reason");
        }
        if info.index.is_none() {
            info.index = string_field(cause, "index");
        }
    }

    Some(info)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn non_empty(body: &str) -> Option<String> {
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
