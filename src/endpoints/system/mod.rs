//! Built-in endpoints.
//!
//! Contains the health endpoint for monitoring and the echo endpoint, which
//! is served through a request logging interceptor.

mod echo;
mod health;

pub use echo::{echo_endpoint, echo_interceptor, ECHO_ENDPOINT};
pub use health::{health_endpoint, HealthHandler, HEALTH_ENDPOINT};
