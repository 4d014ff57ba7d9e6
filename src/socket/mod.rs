//! Unix socket server module.
//!
//! Accepts connections from the fronting proxy and serves newline-delimited
//! request envelopes through the router.

mod connection;
mod listener;

pub use connection::handle_connection;
pub use listener::{open_store, ConnectionMetrics, SocketListener};
