//! Endpoints module.
//!
//! Contains the handler traits, endpoints with their per-method registration
//! tables, the path router and the built-in endpoints.
//!
//! ## Adding a New Endpoint
//!
//! 1. Build an [`Endpoint`] and bind a [`Handler`] per supported method
//! 2. Wrap it in a [`crate::tracking::Interceptor`] if its requests are logged
//! 3. Mount it with [`Router::register`]

mod endpoint;
mod router;
mod traits;

pub mod system;

pub use endpoint::{Endpoint, MethodBinding};
pub use router::{Router, ECHO_PATH, HEALTH_PATH};
pub use traits::{Handler, Service};
