//! The logging interceptor.
//!
//! Wraps an [`Endpoint`] and, once the response is final, turns the
//! request/response pair into a sanitized [`LogRecord`] handed to a
//! [`LogStore`]. Nothing the interceptor does after the handler returns can
//! change the response the caller receives.

use std::error::Error as StdError;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::endpoints::{Endpoint, Service};
use crate::error::TrackingError;
use crate::protocol::{HttpRequest, HttpResponse};

use super::clock::{Clock, SystemClock};
use super::extract;
use super::ip::normalize_ip;
use super::options::InterceptorOptions;
use super::record::LogRecord;
use super::redact::FieldRedactor;
use super::store::LogStore;

/// Request logging wrapper around an endpoint.
///
/// Construction validates the redaction sentinel, so a misconfigured
/// interceptor never serves a request.
pub struct Interceptor {
    endpoint: Endpoint,
    options: InterceptorOptions,
    redactor: FieldRedactor,
    config: TrackingConfig,
    store: Arc<dyn LogStore>,
    clock: Arc<dyn Clock>,
}

impl Interceptor {
    /// Wrap `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Config`] if the configured redaction sentinel
    /// is not a string.
    pub fn new(
        endpoint: Endpoint,
        options: InterceptorOptions,
        config: TrackingConfig,
        store: Arc<dyn LogStore>,
    ) -> Result<Self, TrackingError> {
        let sentinel = options.validated_sentinel()?;
        let redactor = FieldRedactor::new(&options.sensitive_fields, sentinel);

        debug!(
            endpoint = %endpoint.name(),
            options = ?options,
            "Interceptor configured"
        );

        Ok(Self {
            endpoint,
            options,
            redactor,
            config,
            store,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to time requests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Serve `request` through the wrapped endpoint and log it.
    ///
    /// Handler failures go through the endpoint's normal failure path; a
    /// failure that path re-raises is returned unchanged and produces no
    /// record.
    pub fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
        let requested_at = self.clock.now();

        let (response, error_trace) = match self.endpoint.dispatch(request) {
            Ok(response) => (response, None),
            Err(err) => {
                let trace = format_error_trace(&err);
                (self.endpoint.handle_exception(err)?, Some(trace))
            }
        };

        if !self.should_log(request, &response) {
            debug!(
                request_id = %request.id,
                method = %request.method,
                path = %request.path,
                "Request not logged"
            );
            return Ok(response);
        }

        let record = self.build_record(request, &response, requested_at, error_trace);

        if self.config.persist {
            if let Err(e) = self.store.write(&record) {
                error!(
                    request_id = %request.id,
                    path = %record.path,
                    error = %e,
                    "API request log write failed"
                );
            }
        }

        Ok(response)
    }

    fn should_log(&self, request: &HttpRequest, response: &HttpResponse) -> bool {
        match &self.options.should_log {
            Some(predicate) => predicate(request, response),
            None => self.options.logging_methods.allows(&request.method),
        }
    }

    fn build_record(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        requested_at: DateTime<Utc>,
        error_trace: Option<String>,
    ) -> LogRecord {
        let binding = self.endpoint.binding(&request.method);
        let caller = extract::caller_identity(request.principal.as_ref());

        let response_body = match extract::response_body(response) {
            Ok(body) => body.map(|value| self.redactor.redact(&value)),
            Err(e) => {
                warn!(
                    request_id = %request.id,
                    error = %e,
                    "Response body not captured"
                );
                None
            }
        };

        LogRecord {
            id: Uuid::new_v4(),
            request_id: request.id,
            requested_at,
            response_ms: extract::response_ms(requested_at, self.clock.now()),
            caller_identity: caller.id,
            caller_identity_label: caller.label,
            remote_address: normalize_ip(
                request.forwarded_for.as_deref(),
                request.remote_addr.as_deref(),
            ),
            handler_name: extract::handler_name(binding),
            handler_method: extract::handler_method(request, binding),
            path: extract::truncate_path(&request.path, self.config.path_length),
            host: request.host.clone(),
            http_method: request.method.to_string(),
            query_params: self
                .redactor
                .redact(&extract::query_params(&request.query_params)),
            response_body,
            error_trace,
            status_code: Some(response.status),
        }
    }
}

impl Service for Interceptor {
    fn call(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
        self.handle(request)
    }
}

/// Render an error and its chain of causes.
pub fn format_error_trace(err: &TrackingError) -> String {
    let mut trace = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push_str("\nCaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerErrorKind;
    use crate::protocol::{Method, Principal};
    use crate::tracking::store::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedClock(Mutex<Vec<DateTime<Utc>>>);

    impl FixedClock {
        fn sequence(times: &[&str]) -> Arc<Self> {
            let mut times: Vec<_> = times
                .iter()
                .map(|t| DateTime::parse_from_rfc3339(t).unwrap().with_timezone(&Utc))
                .collect();
            times.reverse();
            Arc::new(Self(Mutex::new(times)))
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.lock().unwrap().pop().unwrap()
        }
    }

    fn mock_endpoint() -> Endpoint {
        Endpoint::new("tests.views.Mock")
            .route(Method::Get, |req: &HttpRequest| {
                Ok(HttpResponse::json(200, &extract::query_params(&req.query_params)))
            })
            .action(Method::Post, "create", |_req: &HttpRequest| {
                Ok(HttpResponse::json(201, &json!({"token": "abc", "id": 1})))
            })
    }

    fn interceptor(options: InterceptorOptions) -> (Interceptor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let interceptor = Interceptor::new(
            mock_endpoint(),
            options,
            TrackingConfig::default(),
            store.clone(),
        )
        .unwrap();
        (interceptor, store)
    }

    #[test]
    fn test_logs_request_fields() {
        let (interceptor, store) = interceptor(InterceptorOptions::new());
        let request = HttpRequest::new(Method::Get, "/mock/")
            .with_host("testserver")
            .with_remote_addr("127.0.0.9:8888")
            .with_query_param("api", "1234")
            .with_query_param("detail", "Test")
            .with_principal(Principal::user("7", "myname"));

        let response = interceptor.handle(&request).unwrap();
        assert_eq!(response.status, 200);

        let records = store.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.request_id, request.id);
        assert_eq!(record.remote_address, "127.0.0.9");
        assert_eq!(record.host, "testserver");
        assert_eq!(record.http_method, "GET");
        assert_eq!(record.handler_name.as_deref(), Some("tests.views.Mock"));
        assert_eq!(record.handler_method.as_deref(), Some("get"));
        assert_eq!(record.caller_identity.as_deref(), Some("7"));
        assert_eq!(record.caller_identity_label, "myname");
        assert_eq!(record.query_params, json!({"api": "******", "detail": "Test"}));
        assert_eq!(record.response_body, Some(json!({"api": "******", "detail": "Test"})));
        assert_eq!(record.status_code, Some(200));
        assert!(record.error_trace.is_none());
    }

    #[test]
    fn test_response_returned_unredacted() {
        let (interceptor, store) = interceptor(InterceptorOptions::new());
        let response = interceptor
            .handle(&HttpRequest::new(Method::Post, "/mock/").with_remote_addr("10.0.0.1"))
            .unwrap();

        assert_eq!(response.rendered_content(), Some(r#"{"id":1,"token":"abc"}"#));
        let record = &store.records()[0];
        assert_eq!(record.handler_method.as_deref(), Some("create"));
        assert_eq!(record.response_body, Some(json!({"token": "******", "id": 1})));
    }

    #[test]
    fn test_response_ms_from_clock() {
        let (interceptor, store) = interceptor(InterceptorOptions::new());
        let interceptor = interceptor.with_clock(FixedClock::sequence(&[
            "2024-01-15T10:00:00Z",
            "2024-01-15T10:00:00.042Z",
        ]));

        interceptor
            .handle(&HttpRequest::new(Method::Get, "/mock/").with_remote_addr("127.0.0.1"))
            .unwrap();

        let record = &store.records()[0];
        assert_eq!(record.response_ms, 42);
        assert_eq!(record.requested_at.to_rfc3339(), "2024-01-15T10:00:00+00:00");
    }

    #[test]
    fn test_unbound_method_logged_with_trace() {
        let (interceptor, store) = interceptor(InterceptorOptions::new());
        let response = interceptor
            .handle(&HttpRequest::new(Method::Delete, "/mock/").with_remote_addr("127.0.0.1"))
            .unwrap();
        assert_eq!(response.status, 405);

        let record = &store.records()[0];
        assert_eq!(record.status_code, Some(405));
        assert!(record.handler_name.is_none());
        assert_eq!(record.handler_method.as_deref(), Some("delete"));
        assert!(record
            .error_trace
            .as_deref()
            .unwrap()
            .contains("DELETE"));
    }

    #[test]
    fn test_reraised_failure_not_logged() {
        let store = Arc::new(MemoryStore::new());
        let endpoint = Endpoint::new("tests.views.Broken").route(Method::Get, |_req: &HttpRequest| {
            Err(TrackingError::handler(HandlerErrorKind::Internal {
                message: "database gone".to_string(),
            }))
        });
        let interceptor = Interceptor::new(
            endpoint,
            InterceptorOptions::new(),
            TrackingConfig::default(),
            store.clone(),
        )
        .unwrap();

        let result = interceptor.handle(&HttpRequest::new(Method::Get, "/broken/"));
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_persist_disabled() {
        let store = Arc::new(MemoryStore::new());
        let config = TrackingConfig {
            persist: false,
            ..TrackingConfig::default()
        };
        let interceptor =
            Interceptor::new(mock_endpoint(), InterceptorOptions::new(), config, store.clone())
                .unwrap();

        let response = interceptor
            .handle(&HttpRequest::new(Method::Get, "/mock/").with_remote_addr("127.0.0.1"))
            .unwrap();
        assert_eq!(response.status, 200);
        assert!(store.is_empty());
    }

    #[test]
    fn test_path_truncated() {
        let store = Arc::new(MemoryStore::new());
        let config = TrackingConfig {
            path_length: 5,
            ..TrackingConfig::default()
        };
        let interceptor =
            Interceptor::new(mock_endpoint(), InterceptorOptions::new(), config, store.clone())
                .unwrap();

        interceptor
            .handle(&HttpRequest::new(Method::Get, "/mock/long/").with_remote_addr("127.0.0.1"))
            .unwrap();
        assert_eq!(store.records()[0].path, "/mock");
    }

    #[test]
    fn test_non_string_sentinel_rejected() {
        let result = Interceptor::new(
            mock_endpoint(),
            InterceptorOptions::new().redaction_sentinel(json!(["x"])),
            TrackingConfig::default(),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(result, Err(TrackingError::Config { .. })));
    }

    #[test]
    fn test_format_error_trace_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = TrackingError::from(io);
        let trace = format_error_trace(&err);
        assert!(trace.contains("disk full"));
    }
}
