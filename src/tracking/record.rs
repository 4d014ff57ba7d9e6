//! Request log record.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::error::{PersistenceErrorKind, TrackingError};

/// Label stored for callers without an authenticated principal.
pub const ANONYMOUS_LABEL: &str = "Anonymous";

/// Longest HTTP method token a record may carry.
pub const MAX_METHOD_LENGTH: usize = 10;

/// One sanitized record per logged request.
///
/// Built after the response is final and never mutated afterwards; the store
/// owns it from `write` on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique identifier of the record.
    pub id: Uuid,
    /// Identifier of the request the record describes.
    pub request_id: Uuid,
    /// When the request entered the interceptor.
    pub requested_at: DateTime<Utc>,
    /// Time to produce the response, in milliseconds. Never negative.
    pub response_ms: u64,
    /// Identifier of the authenticated caller, if any.
    pub caller_identity: Option<String>,
    /// Username snapshot, or [`ANONYMOUS_LABEL`].
    pub caller_identity_label: String,
    /// Normalized client address.
    pub remote_address: String,
    /// Qualified name of the handler that served the request.
    pub handler_name: Option<String>,
    /// Action label, or the lowercased HTTP method.
    pub handler_method: Option<String>,
    /// Request path, truncated.
    pub path: String,
    pub host: String,
    pub http_method: String,
    /// Redacted query parameters.
    pub query_params: serde_json::Value,
    /// Redacted response body; absent for streaming responses.
    pub response_body: Option<serde_json::Value>,
    /// Formatted handler failure, if the handler raised.
    pub error_trace: Option<String>,
    pub status_code: Option<u16>,
}

/// Field limits enforced before a record is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLimits {
    pub username_length: usize,
    pub handler_name_length: usize,
    pub handler_method_length: usize,
}

impl Default for RecordLimits {
    fn default() -> Self {
        Self::from(&TrackingConfig::default())
    }
}

impl From<&TrackingConfig> for RecordLimits {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            username_length: config.username_length,
            handler_name_length: config.handler_name_length,
            handler_method_length: config.handler_method_length,
        }
    }
}

impl LogRecord {
    /// Check the record against the persisted schema.
    pub fn validate(&self, limits: &RecordLimits) -> Result<(), TrackingError> {
        if self.remote_address.parse::<IpAddr>().is_err() {
            return Err(invalid_field(
                "remote_address",
                format!("'{}' is not an IP address", self.remote_address),
            ));
        }

        check_length("http_method", &self.http_method, MAX_METHOD_LENGTH)?;
        check_length(
            "caller_identity_label",
            &self.caller_identity_label,
            limits.username_length,
        )?;
        if let Some(name) = &self.handler_name {
            check_length("handler_name", name, limits.handler_name_length)?;
        }
        if let Some(method) = &self.handler_method {
            check_length("handler_method", method, limits.handler_method_length)?;
        }

        if let Some(status) = self.status_code {
            if !(100..=599).contains(&status) {
                return Err(invalid_field(
                    "status_code",
                    format!("{} is not an HTTP status", status),
                ));
            }
        }

        Ok(())
    }
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), TrackingError> {
    let len = value.chars().count();
    if len > max {
        return Err(invalid_field(
            field,
            format!("{} characters exceeds maximum of {}", len, max),
        ));
    }
    Ok(())
}

fn invalid_field(field: &'static str, message: String) -> TrackingError {
    TrackingError::Persistence {
        kind: PersistenceErrorKind::InvalidField { field, message },
    }
}

#[cfg(test)]
pub(crate) fn sample_record() -> LogRecord {
    LogRecord {
        id: Uuid::nil(),
        request_id: Uuid::nil(),
        requested_at: DateTime::parse_from_rfc3339("2024-01-15T10:30:45Z")
            .unwrap()
            .with_timezone(&Utc),
        response_ms: 15,
        caller_identity: None,
        caller_identity_label: ANONYMOUS_LABEL.to_string(),
        remote_address: "127.0.0.1".to_string(),
        handler_name: Some("api_tracking.endpoints.Echo".to_string()),
        handler_method: Some("get".to_string()),
        path: "/echo/".to_string(),
        host: "testserver".to_string(),
        http_method: "GET".to_string(),
        query_params: serde_json::json!({"a": "1"}),
        response_body: Some(serde_json::json!({"a": "1"})),
        error_trace: None,
        status_code: Some(200),
    }
}
