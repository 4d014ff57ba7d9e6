//! Outgoing response envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Body rendered to text (JSON or plain).
    Rendered(String),
    /// Raw byte buffer.
    Buffer(Vec<u8>),
    /// Body produced incrementally; never buffered for logging.
    Streaming,
    /// No body.
    Empty,
}

/// A response produced by an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Response body.
    pub body: ResponseBody,
}

impl HttpResponse {
    /// Create a response with a JSON-rendered body.
    pub fn json(status: u16, data: &serde_json::Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status,
            headers,
            body: ResponseBody::Rendered(data.to_string()),
        }
    }

    /// Create a response with a plain text body.
    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: ResponseBody::Rendered(text.into()),
        }
    }

    /// Create a response carrying a raw buffer.
    pub fn buffer(status: u16, bytes: Vec<u8>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: ResponseBody::Buffer(bytes),
        }
    }

    /// Create a streaming response.
    pub fn streaming(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: ResponseBody::Streaming,
        }
    }

    /// Create a JSON error response of the form `{"detail": ...}`.
    pub fn error(status: u16, detail: impl Into<String>) -> Self {
        Self::json(status, &serde_json::json!({ "detail": detail.into() }))
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Whether the body is streamed.
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, ResponseBody::Streaming)
    }

    /// The rendered text body, if the body was rendered.
    pub fn rendered_content(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Rendered(text) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response() {
        let response = HttpResponse::json(200, &serde_json::json!({"result": "ok"}));
        assert_eq!(response.status, 200);
        assert_eq!(response.rendered_content(), Some(r#"{"result":"ok"}"#));
        assert_eq!(response.headers["content-type"], "application/json");
        assert!(!response.is_streaming());
    }

    #[test]
    fn test_streaming_response() {
        let response = HttpResponse::streaming(200);
        assert!(response.is_streaming());
        assert!(response.rendered_content().is_none());
    }

    #[test]
    fn test_response_serialization() {
        let response = HttpResponse::text(204, "");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], 204);
        assert_eq!(json["body"]["kind"], "rendered");
        assert!(json.get("headers").is_none()); // Skipped when empty
    }
}
