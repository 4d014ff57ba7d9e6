//! Handler and service traits.

use crate::error::TrackingError;
use crate::protocol::{HttpRequest, HttpResponse};

/// Code that turns a request into a response for one HTTP method.
///
/// # Example
///
/// ```ignore
/// pub struct Hello;
///
/// impl Handler for Hello {
///     fn handle(&self, _request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
///         Ok(HttpResponse::text(200, "Hello"))
///     }
/// }
/// ```
pub trait Handler: Send + Sync {
    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError>;
}

impl<F> Handler for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, TrackingError> + Send + Sync,
{
    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError> {
        self(request)
    }
}

/// Uniform request/response interface the router dispatches to.
///
/// Implemented by plain endpoints and by tracking interceptors wrapping them,
/// so either can be mounted on a path.
pub trait Service: Send + Sync {
    /// Serve a request.
    ///
    /// Errors are failures the endpoint's own error handling did not turn
    /// into a response.
    fn call(&self, request: &HttpRequest) -> Result<HttpResponse, TrackingError>;
}
