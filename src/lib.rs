//! API Tracking Library
//!
//! This crate provides request logging for HTTP endpoints: an interceptor
//! that records one sanitized log record per request, and a daemon that
//! serves interceptor-wrapped endpoints over a Unix socket.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod protocol;
pub mod socket;
pub mod tracking;
