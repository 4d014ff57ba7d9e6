//! Per-connection handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::endpoints::Router;
use crate::error::{HandlerErrorKind, ProtocolErrorKind, TrackingError};
use crate::protocol::{read_frame_with_timeout, write_frame_with_timeout, HttpRequest, HttpResponse};

use super::ConnectionMetrics;

/// Handle a single client connection.
///
/// Requests are served one after another until the client disconnects or
/// stays idle past the socket timeout.
pub async fn handle_connection(
    stream: UnixStream,
    settings: Arc<Settings>,
    router: Arc<Router>,
    metrics: Arc<ConnectionMetrics>,
) -> Result<(), TrackingError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let result = process_request(&mut reader, &mut writer, &settings, &router, &metrics).await;

        match result {
            Ok(()) => continue,
            Err(TrackingError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }) => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(TrackingError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            }) => {
                warn!("Connection timed out");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read one request frame, serve it, and write the response frame.
async fn process_request<R, W>(
    reader: &mut R,
    writer: &mut W,
    settings: &Settings,
    router: &Arc<Router>,
    metrics: &ConnectionMetrics,
) -> Result<(), TrackingError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let socket_timeout = Duration::from_secs(settings.limits.socket_timeout_seconds);
    let frame =
        read_frame_with_timeout(reader, settings.limits.max_message_size, socket_timeout).await?;

    let request: HttpRequest = match serde_json::from_slice(&frame) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Invalid request envelope");
            metrics.record_rejected();
            let response = HttpResponse::error(400, format!("Invalid request envelope: {}", e));
            return send(writer, &response, socket_timeout).await;
        }
    };

    let request_id = request.id;
    let start_time = Instant::now();

    info!(
        request_id = %request_id,
        method = %request.method,
        path = %request.path,
        "Received request"
    );

    // Handlers and stores are synchronous
    let router = Arc::clone(router);
    let result = tokio::task::spawn_blocking(move || router.dispatch(&request)).await;

    let response = match result {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => error_response(request_id, &e),
        Err(e) => {
            error!(
                request_id = %request_id,
                error = %e,
                "Request task panicked"
            );
            HttpResponse::error(500, "Internal server error.")
        }
    };

    metrics.record_request(response.status < 500);

    info!(
        request_id = %request_id,
        status = response.status,
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Request served"
    );

    send(writer, &response, socket_timeout).await
}

/// Response for a failure no endpoint turned into a response.
fn error_response(request_id: uuid::Uuid, err: &TrackingError) -> HttpResponse {
    match err {
        TrackingError::Handler {
            kind: HandlerErrorKind::NotFound { path },
        } => {
            debug!(request_id = %request_id, path = %path, "No service mounted on path");
            HttpResponse::error(404, "Not found.")
        }
        _ => {
            error!(
                request_id = %request_id,
                error = %err,
                "Request failed"
            );
            HttpResponse::error(500, "Internal server error.")
        }
    }
}

async fn send<W>(writer: &mut W, response: &HttpResponse, timeout: Duration) -> Result<(), TrackingError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = serde_json::to_vec(response)?;
    write_frame_with_timeout(writer, &bytes, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::MemoryStore;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt};

    fn settings() -> Settings {
        Settings::from_toml("[socket]\npath = \"/tmp/conn.sock\"").unwrap()
    }

    async fn round_trip(line: &str) -> HttpResponse {
        round_trip_counted(line, &ConnectionMetrics::new()).await
    }

    async fn round_trip_counted(line: &str, metrics: &ConnectionMetrics) -> HttpResponse {
        let settings = settings();
        let router = Arc::new(
            Router::with_builtins(&settings, Arc::new(MemoryStore::new()), None).unwrap(),
        );

        let (mut client, server) = duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_read = BufReader::new(server_read);

        client.write_all(line.as_bytes()).await.unwrap();
        client.write_all(b"\n").await.unwrap();

        process_request(&mut server_read, &mut server_write, &settings, &router, metrics)
            .await
            .unwrap();

        let mut client = BufReader::new(client);
        let mut reply = String::new();
        client.read_line(&mut reply).await.unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_serves_echo() {
        let response =
            round_trip(r#"{"method":"GET","path":"/echo/","query_params":{"a":"1"}}"#).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.rendered_content(), Some(r#"{"a":"1"}"#));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = round_trip(r#"{"method":"GET","path":"/nope/"}"#).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_invalid_envelope_is_400() {
        let metrics = ConnectionMetrics::new();
        let response = round_trip_counted(r#"{"path":"/echo/"}"#, &metrics).await;
        assert_eq!(response.status, 400);
        assert_eq!(metrics.rejected_requests(), 1);
        assert_eq!(metrics.total_requests(), 0);

        let response = round_trip_counted(r#"{"method":"GET","path":"/nope/"}"#, &metrics).await;
        assert_eq!(response.status, 404);
        assert_eq!(metrics.rejected_requests(), 1);
        assert_eq!(metrics.total_requests(), 1);
        assert_eq!(metrics.failed_requests(), 0);
    }

    #[test]
    fn test_error_response_mapping() {
        let not_found = TrackingError::handler(HandlerErrorKind::NotFound {
            path: "/x/".to_string(),
        });
        assert_eq!(error_response(uuid::Uuid::nil(), &not_found).status, 404);

        let internal = TrackingError::handler(HandlerErrorKind::Internal {
            message: "boom".to_string(),
        });
        assert_eq!(error_response(uuid::Uuid::nil(), &internal).status, 500);
    }
}
