//! Derivation of log record fields from a request/response pair.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::endpoints::MethodBinding;
use crate::error::{ExtractionErrorKind, TrackingError};
use crate::protocol::{HttpRequest, HttpResponse, Principal, ResponseBody};

use super::record::ANONYMOUS_LABEL;

/// Milliseconds between `started` and `finished`, clamped at zero.
pub fn response_ms(started: DateTime<Utc>, finished: DateTime<Utc>) -> u64 {
    let elapsed = (finished - started).num_milliseconds();
    u64::try_from(elapsed).unwrap_or(0)
}

/// Caller identity resolved from the principal slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: Option<String>,
    pub label: String,
}

/// Resolve the caller; anonymous and missing principals yield no identity.
pub fn caller_identity(principal: Option<&Principal>) -> CallerIdentity {
    match principal {
        Some(Principal::User { id, username }) => CallerIdentity {
            id: Some(id.clone()),
            label: username.clone(),
        },
        Some(Principal::Anonymous) | None => CallerIdentity {
            id: None,
            label: ANONYMOUS_LABEL.to_string(),
        },
    }
}

/// Qualified name of the handler bound to the request's method.
pub fn handler_name(binding: Option<&MethodBinding>) -> Option<String> {
    binding.map(|b| b.name().to_string())
}

/// Action label of the binding, or the lowercased request method.
///
/// A binding that declares an empty action label has no method label.
pub fn handler_method(request: &HttpRequest, binding: Option<&MethodBinding>) -> Option<String> {
    match binding.and_then(|b| b.action()) {
        Some("") => None,
        Some(action) => Some(action.to_string()),
        None => Some(request.method.lowercase()),
    }
}

/// First `max_chars` characters of the request path.
pub fn truncate_path(path: &str, max_chars: usize) -> String {
    path.chars().take(max_chars).collect()
}

/// Query parameters as a JSON object.
pub fn query_params(params: &BTreeMap<String, String>) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>(),
    )
}

/// The response body as a structured value.
///
/// Streaming and empty bodies are not captured. Text that parses as JSON is
/// returned parsed, anything else as a string.
pub fn response_body(response: &HttpResponse) -> Result<Option<Value>, TrackingError> {
    let text = match &response.body {
        ResponseBody::Streaming | ResponseBody::Empty => return Ok(None),
        ResponseBody::Rendered(text) => text.as_str(),
        ResponseBody::Buffer(bytes) => {
            std::str::from_utf8(bytes).map_err(|e| TrackingError::Extraction {
                kind: ExtractionErrorKind::UndecodableBody {
                    message: e.to_string(),
                },
            })?
        }
    };

    let value = serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()));
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::{Handler, MethodBinding};
    use crate::protocol::Method;
    use serde_json::json;
    use std::sync::Arc;

    struct Noop;

    impl Handler for Noop {
        fn handle(&self, _request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
            Ok(HttpResponse::text(200, ""))
        }
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_response_ms() {
        assert_eq!(
            response_ms(at("2019-01-01T10:00:00Z"), at("2019-01-01T10:00:01.250Z")),
            1250
        );
    }

    #[test]
    fn test_response_ms_clamped_on_clock_skew() {
        assert_eq!(
            response_ms(at("2019-01-01T10:00:10Z"), at("2019-01-01T10:00:00Z")),
            0
        );
    }

    #[test]
    fn test_caller_identity() {
        let user = Principal::user("42", "myname");
        assert_eq!(
            caller_identity(Some(&user)),
            CallerIdentity {
                id: Some("42".to_string()),
                label: "myname".to_string()
            }
        );

        let anonymous = caller_identity(Some(&Principal::Anonymous));
        assert_eq!(anonymous.id, None);
        assert_eq!(anonymous.label, "Anonymous");
        assert_eq!(caller_identity(None), anonymous);
    }

    #[test]
    fn test_handler_method_labels() {
        let request = HttpRequest::new(Method::Post, "/items/");
        let plain = MethodBinding::new("app.views.Items", None, Arc::new(Noop));
        let action = MethodBinding::new("app.views.Items", Some("create".to_string()), Arc::new(Noop));
        let blank = MethodBinding::new("app.views.Items", Some(String::new()), Arc::new(Noop));

        assert_eq!(handler_method(&request, Some(&plain)), Some("post".to_string()));
        assert_eq!(handler_method(&request, Some(&action)), Some("create".to_string()));
        assert_eq!(handler_method(&request, Some(&blank)), None);
        assert_eq!(handler_method(&request, None), Some("post".to_string()));

        assert_eq!(handler_name(Some(&plain)), Some("app.views.Items".to_string()));
        assert_eq!(handler_name(None), None);
    }

    #[test]
    fn test_truncate_path_counts_characters() {
        assert_eq!(truncate_path("/logging/", 200), "/logging/");
        assert_eq!(truncate_path("/abcdef", 4), "/abc");
        assert_eq!(truncate_path("/ééé", 3), "/éé");
    }

    #[test]
    fn test_query_params_object() {
        let mut params = BTreeMap::new();
        params.insert("a".to_string(), "1234".to_string());
        assert_eq!(query_params(&params), json!({"a": "1234"}));
    }

    #[test]
    fn test_response_body_variants() {
        let json_body = HttpResponse::json(200, &json!({"token": "t"}));
        assert_eq!(response_body(&json_body).unwrap(), Some(json!({"token": "t"})));

        let text = HttpResponse::text(200, "With Logging");
        assert_eq!(response_body(&text).unwrap(), Some(json!("With Logging")));

        let buffer = HttpResponse::buffer(200, b"[1,2]".to_vec());
        assert_eq!(response_body(&buffer).unwrap(), Some(json!([1, 2])));

        assert_eq!(response_body(&HttpResponse::streaming(200)).unwrap(), None);
    }

    #[test]
    fn test_undecodable_buffer_is_extraction_error() {
        let response = HttpResponse::buffer(200, vec![0xff, 0xfe]);
        assert!(matches!(
            response_body(&response),
            Err(TrackingError::Extraction { .. })
        ));
    }
}
