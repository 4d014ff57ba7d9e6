//! Echo endpoint: answers with the request's query parameters.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::TrackingError;
use crate::protocol::{HttpRequest, HttpResponse, Method};
use crate::tracking::{extract, Interceptor, InterceptorOptions, LogStore};

use super::super::endpoint::Endpoint;

/// Qualified name of the echo endpoint.
pub const ECHO_ENDPOINT: &str = "system.echo";

fn echo(request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
    Ok(HttpResponse::json(200, &extract::query_params(&request.query_params)))
}

/// The bare echo endpoint.
pub fn echo_endpoint() -> Endpoint {
    Endpoint::new(ECHO_ENDPOINT)
        .route(Method::Get, echo)
        .action(Method::Post, "submit", echo)
}

/// The echo endpoint wrapped for request logging.
///
/// `pass` is redacted on top of the built-in keys; overrides from
/// `[handlers."system.echo"]` are applied last.
pub fn echo_interceptor(
    settings: &Settings,
    store: Arc<dyn LogStore>,
) -> Result<Interceptor, TrackingError> {
    let mut options = InterceptorOptions::new().sensitive_fields(["pass"]);
    if let Some(overrides) = settings.handlers.get(ECHO_ENDPOINT) {
        options = options.with_overrides(overrides)?;
    }

    Interceptor::new(echo_endpoint(), options, settings.tracking.clone(), store)
}
