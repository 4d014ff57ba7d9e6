//! Router for dispatching requests to services by path.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{HandlerErrorKind, TrackingError};
use crate::protocol::{HttpRequest, HttpResponse};
use crate::socket::ConnectionMetrics;
use crate::tracking::LogStore;

use super::system::{echo_interceptor, health_endpoint};
use super::traits::Service;

/// Path of the built-in health endpoint.
pub const HEALTH_PATH: &str = "/health/";
/// Path of the built-in echo endpoint.
pub const ECHO_PATH: &str = "/echo/";

/// Path table of mounted services.
#[derive(Clone, Default)]
pub struct Router {
    services: HashMap<String, Arc<dyn Service>>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router with the built-in endpoints mounted.
    ///
    /// The echo endpoint is wrapped in a request logging interceptor writing
    /// to `store`; the health endpoint is not logged.
    pub fn with_builtins(
        settings: &Settings,
        store: Arc<dyn LogStore>,
        metrics: Option<Arc<ConnectionMetrics>>,
    ) -> Result<Self, TrackingError> {
        let mut router = Self::new();

        router.register(HEALTH_PATH, Arc::new(health_endpoint(metrics)));
        router.register(ECHO_PATH, Arc::new(echo_interceptor(settings, store)?));

        info!(count = router.services.len(), "Router initialized");

        Ok(router)
    }

    /// Mount a service on `path`, replacing any previous one.
    pub fn register(&mut self, path: impl Into<String>, service: Arc<dyn Service>) {
        let path = path.into();
        debug!(path = %path, "Registering service");
        self.services.insert(path, service);
    }

    /// Get the service mounted on `path`.
    pub fn get(&self, path: &str) -> Option<Arc<dyn Service>> {
        self.services.get(path).cloned()
    }

    /// Dispatch a request to the service mounted on its path.
    pub fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
        let service = self.services.get(&request.path).ok_or_else(|| {
            TrackingError::handler(HandlerErrorKind::NotFound {
                path: request.path.clone(),
            })
        })?;

        service.call(request)
    }

    /// List all mounted paths.
    pub fn paths(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }
}
