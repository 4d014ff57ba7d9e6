//! Unix socket listener.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tokio::net::UnixListener;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::endpoints::Router;
use crate::error::{ProtocolErrorKind, TrackingError};
use crate::tracking::{JsonLinesStore, LogStore, NullStore, RecordLimits};

use super::handle_connection;

/// Connection metrics for monitoring.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    /// Total requests processed.
    pub requests_total: AtomicU64,
    /// Requests answered with a server error.
    pub requests_failed: AtomicU64,
    /// Frames rejected before dispatch as malformed envelopes.
    pub requests_rejected: AtomicU64,
    /// Currently active connections.
    pub active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment request count.
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a frame that did not parse as a request envelope.
    ///
    /// Rejected frames are not dispatched and count toward neither the
    /// total nor the failures.
    pub fn record_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn rejected_requests(&self) -> u64 {
        self.requests_rejected.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Open the configured request log store.
///
/// Falls back to a [`NullStore`] when persistence is disabled or the log
/// file cannot be opened, so the daemon keeps serving requests.
pub fn open_store(settings: &Settings) -> Arc<dyn LogStore> {
    if !settings.tracking.persist {
        info!("Request log persistence disabled");
        return Arc::new(NullStore::new());
    }

    let limits = RecordLimits::from(&settings.tracking);
    match JsonLinesStore::new(&settings.store.log_path, limits) {
        Ok(store) => {
            info!(
                path = %settings.store.log_path.display(),
                "Request logging enabled"
            );
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %settings.store.log_path.display(),
                "Failed to open request log, request records will be discarded"
            );
            Arc::new(NullStore::new())
        }
    }
}

/// Unix socket server.
pub struct SocketListener {
    listener: UnixListener,
    settings: Arc<Settings>,
    router: RwLock<Arc<Router>>,
    store: Arc<dyn LogStore>,
    metrics: Arc<ConnectionMetrics>,
    /// Semaphore for connection limiting
    connection_semaphore: Arc<Semaphore>,
}

impl SocketListener {
    /// Create and bind a new socket listener.
    ///
    /// Builds the router before binding, so a configuration error is
    /// reported before any request is accepted.
    pub async fn bind(settings: Arc<Settings>) -> Result<Self, TrackingError> {
        let store = open_store(&settings);
        let metrics = Arc::new(ConnectionMetrics::new());
        let router = Router::with_builtins(&settings, Arc::clone(&store), Some(Arc::clone(&metrics)))?;

        let socket_path = &settings.socket.path;

        // Refuse to follow a symlink when clearing a stale socket
        if let Ok(metadata) = std::fs::symlink_metadata(socket_path) {
            if metadata.file_type().is_symlink() {
                return Err(TrackingError::Socket {
                    message: format!(
                        "Socket path {} is a symlink, refusing to remove",
                        socket_path.display()
                    ),
                });
            }

            std::fs::remove_file(socket_path).map_err(|e| TrackingError::Socket {
                message: format!(
                    "Failed to remove existing socket file {}: {}",
                    socket_path.display(),
                    e
                ),
            })?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrackingError::Socket {
                message: format!(
                    "Failed to create socket directory {}: {}",
                    parent.display(),
                    e
                ),
            })?;
        }

        let listener = UnixListener::bind(socket_path).map_err(|e| TrackingError::Socket {
            message: format!("Failed to bind to socket {}: {}", socket_path.display(), e),
        })?;

        Self::set_socket_permissions(socket_path, &settings.socket.permissions)?;

        let connection_semaphore = Arc::new(Semaphore::new(settings.limits.max_concurrent_requests));
        info!(
            max_connections = settings.limits.max_concurrent_requests,
            "Connection limiting enabled"
        );

        info!(
            path = %socket_path.display(),
            "Socket listener bound"
        );

        Ok(Self {
            listener,
            settings,
            router: RwLock::new(Arc::new(router)),
            store,
            metrics,
            connection_semaphore,
        })
    }

    /// Get connection metrics.
    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Current router snapshot.
    pub fn router(&self) -> Result<Arc<Router>, TrackingError> {
        self.router
            .read()
            .map(|router| Arc::clone(&*router))
            .map_err(|e| TrackingError::Socket {
                message: format!("Failed to acquire router lock: {}", e),
            })
    }

    /// Rebuild the endpoints from reloaded settings.
    ///
    /// Connections already open keep the router they started with. Socket
    /// and limit settings only take effect on restart.
    pub fn reload(&self, settings: &Settings) -> Result<(), TrackingError> {
        let router = Router::with_builtins(
            settings,
            Arc::clone(&self.store),
            Some(Arc::clone(&self.metrics)),
        )?;

        let mut guard = self.router.write().map_err(|e| TrackingError::Socket {
            message: format!("Failed to acquire router lock: {}", e),
        })?;
        *guard = Arc::new(router);

        if settings.socket.path != self.settings.socket.path
            || settings.limits.max_concurrent_requests != self.settings.limits.max_concurrent_requests
        {
            warn!("Socket and limit changes require a restart");
        }

        Ok(())
    }

    /// Set socket file permissions.
    fn set_socket_permissions(path: &Path, permissions_str: &str) -> Result<(), TrackingError> {
        let mode = u32::from_str_radix(permissions_str, 8).map_err(|e| TrackingError::Socket {
            message: format!("Invalid socket permissions '{}': {}", permissions_str, e),
        })?;

        let permissions = std::fs::Permissions::from_mode(mode);
        std::fs::set_permissions(path, permissions).map_err(|e| TrackingError::Socket {
            message: format!(
                "Failed to set socket permissions on {}: {}",
                path.display(),
                e
            ),
        })?;

        Ok(())
    }

    /// Run the socket listener, accepting connections.
    ///
    /// The listener will stop accepting new connections when `shutdown` is notified.
    /// Active connections will continue until they complete or are explicitly closed.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), TrackingError> {
        info!("Socket listener running, waiting for connections...");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        max = self.settings.limits.max_concurrent_requests,
                                        "Connection limit reached, rejecting connection"
                                    );
                                    continue;
                                }
                            };

                            let router = match self.router() {
                                Ok(router) => router,
                                Err(e) => {
                                    error!(error = %e, "Router unavailable, rejecting connection");
                                    continue;
                                }
                            };
                            let settings = Arc::clone(&self.settings);
                            let metrics = Arc::clone(&self.metrics);

                            metrics.active_connections.fetch_add(1, Ordering::Relaxed);
                            debug!(
                                active = metrics.active(),
                                "New connection accepted"
                            );

                            tokio::spawn(async move {
                                let _permit = permit;
                                if let Err(e) = handle_connection(
                                    stream,
                                    settings,
                                    router,
                                    Arc::clone(&metrics),
                                ).await {
                                    if !matches!(
                                        &e,
                                        TrackingError::Protocol {
                                            kind: ProtocolErrorKind::ConnectionClosed
                                        }
                                    ) {
                                        error!(error = %e, "Connection handler error");
                                    }
                                }

                                metrics.active_connections.fetch_sub(1, Ordering::Relaxed);
                                debug!(
                                    active = metrics.active(),
                                    "Connection closed"
                                );
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown.notified() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Wait for all active connections to drain.
    ///
    /// Returns immediately if there are no active connections.
    pub async fn wait_for_drain(&self) {
        let poll_interval = std::time::Duration::from_millis(100);

        while self.metrics.active() > 0 {
            debug!(
                active = self.metrics.active(),
                "Waiting for connections to drain"
            );
            tokio::time::sleep(poll_interval).await;
        }

        info!("All connections drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_metrics_counts() {
        let metrics = ConnectionMetrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_rejected();
        assert_eq!(metrics.total_requests(), 2);
        assert_eq!(metrics.failed_requests(), 1);
        assert_eq!(metrics.rejected_requests(), 1);
        assert_eq!(metrics.active(), 0);
    }

    #[test]
    fn test_open_store_falls_back_when_unwritable() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let settings = Settings::from_toml(&format!(
            "[socket]\npath = \"{}\"\n[store]\nlog_path = \"{}\"\n",
            temp_dir.path().join("t.sock").display(),
            blocker.join("requests.log").display(),
        ))
        .unwrap();

        // Parent is a regular file, so the store cannot be opened
        let store = open_store(&settings);
        assert!(store.write(&crate::tracking::LogRecord {
            remote_address: "not-validated".to_string(),
            ..sample()
        })
        .is_ok());
    }

    fn sample() -> crate::tracking::LogRecord {
        serde_json::from_value(serde_json::json!({
            "id": "00000000-0000-0000-0000-000000000000",
            "request_id": "00000000-0000-0000-0000-000000000000",
            "requested_at": "2024-01-15T10:30:45Z",
            "response_ms": 0,
            "caller_identity": null,
            "caller_identity_label": "Anonymous",
            "remote_address": "127.0.0.1",
            "handler_name": null,
            "handler_method": "get",
            "path": "/echo/",
            "host": "",
            "http_method": "GET",
            "query_params": {},
            "response_body": null,
            "error_trace": null,
            "status_code": 200
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_bind_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::from_toml(&format!(
            "[socket]\npath = \"{}\"\n[store]\nlog_path = \"{}\"\n",
            temp_dir.path().join("t.sock").display(),
            temp_dir.path().join("requests.log").display(),
        ))
        .unwrap();

        let listener = SocketListener::bind(Arc::new(settings.clone())).await.unwrap();
        assert!(temp_dir.path().join("t.sock").exists());

        let before = listener.router().unwrap();
        listener.reload(&settings).unwrap();
        let after = listener.router().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
