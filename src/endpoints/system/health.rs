//! Health endpoint for monitoring the daemon.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::error::TrackingError;
use crate::protocol::{HttpRequest, HttpResponse, Method};
use crate::socket::ConnectionMetrics;

use super::super::endpoint::Endpoint;
use super::super::traits::Handler;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Qualified name of the health endpoint.
pub const HEALTH_ENDPOINT: &str = "system.health";

/// Handler that reports daemon health.
///
/// Returns:
/// - status: Always `"ok"` when the daemon answers
/// - timestamp: Current time, RFC 3339
/// - uptime_seconds: How long the handler has existed
/// - requests_total / requests_failed / requests_rejected / active_connections:
///   when metrics are attached
/// - version: Daemon version
pub struct HealthHandler {
    start_time: Instant,
    metrics: Option<Arc<ConnectionMetrics>>,
}

impl HealthHandler {
    pub fn new(metrics: Option<Arc<ConnectionMetrics>>) -> Self {
        Self {
            start_time: Instant::now(),
            metrics,
        }
    }
}

impl Handler for HealthHandler {
    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
        let mut body = serde_json::json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339(),
            "request_id": request.id.to_string(),
            "uptime_seconds": self.start_time.elapsed().as_secs(),
            "version": VERSION,
        });

        if let Some(metrics) = &self.metrics {
            body["requests_total"] = metrics.total_requests().into();
            body["requests_failed"] = metrics.failed_requests().into();
            body["requests_rejected"] = metrics.rejected_requests().into();
            body["active_connections"] = metrics.active().into();
        }

        Ok(HttpResponse::json(200, &body))
    }
}

/// The health endpoint. Health checks are high-frequency and never logged.
pub fn health_endpoint(metrics: Option<Arc<ConnectionMetrics>>) -> Endpoint {
    Endpoint::new(HEALTH_ENDPOINT).route(Method::Get, HealthHandler::new(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::Service;

    #[test]
    fn test_health_without_metrics() {
        let endpoint = health_endpoint(None);
        assert_eq!(endpoint.name(), "system.health");

        let response = endpoint
            .call(&HttpRequest::new(Method::Get, "/health/"))
            .unwrap();
        assert_eq!(response.status, 200);

        let body: serde_json::Value =
            serde_json::from_str(response.rendered_content().unwrap()).unwrap();
        assert_eq!(body["status"], "ok");
        assert!(body["uptime_seconds"].is_u64());
        assert!(body["version"].is_string());
        assert!(body.get("requests_total").is_none());
    }

    #[test]
    fn test_health_tracks_requests() {
        let metrics = Arc::new(ConnectionMetrics::new());
        metrics.record_request(true);
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_rejected();

        let endpoint = health_endpoint(Some(Arc::clone(&metrics)));
        let response = endpoint
            .call(&HttpRequest::new(Method::Get, "/health/"))
            .unwrap();
        let body: serde_json::Value =
            serde_json::from_str(response.rendered_content().unwrap()).unwrap();

        assert_eq!(body["requests_total"], 3);
        assert_eq!(body["requests_failed"], 1);
        assert_eq!(body["requests_rejected"], 1);
        assert_eq!(body["active_connections"], 0);
    }

    #[test]
    fn test_health_rejects_post() {
        let response = health_endpoint(None)
            .call(&HttpRequest::new(Method::Post, "/health/"))
            .unwrap();
        assert_eq!(response.status, 405);
    }
}
