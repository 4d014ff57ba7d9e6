//! Error types for request tracking.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
