//! Simple test client for the API tracking daemon.
//!
//! Run with: cargo run --example echo_client -- [SOCKET_PATH]
//!
//! Tests:
//! 1. GET /health/ - Health check, not logged
//! 2. GET /echo/ - Echo with a sensitive parameter, logged and redacted
//! 3. POST /echo/ - Echo through the "submit" action
//! 4. DELETE /echo/ - Method not allowed, logged with an error trace
//! 5. GET /missing/ - Unknown path

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

use serde_json::{json, Value};

const DEFAULT_SOCKET: &str = "/run/api-tracking/daemon.sock";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let socket_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SOCKET.to_string());

    println!("=== API Tracking Test Client ===\n");

    let stream = UnixStream::connect(&socket_path)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    let requests = [
        ("Test 1: GET /health/", json!({"method": "GET", "path": "/health/"})),
        (
            "Test 2: GET /echo/",
            json!({
                "method": "GET",
                "path": "/echo/",
                "host": "localhost",
                "forwarded_for": "203.0.113.7, 10.0.0.1",
                "query_params": {"q": "hello", "password": "hunter2"}
            }),
        ),
        (
            "Test 3: POST /echo/",
            json!({
                "method": "POST",
                "path": "/echo/",
                "remote_addr": "[::1]:5000",
                "principal": {"kind": "user", "id": "1", "username": "admin"},
                "query_params": {"filter": "{\"token\": \"abc\"}"}
            }),
        ),
        (
            "Test 4: DELETE /echo/",
            json!({"method": "DELETE", "path": "/echo/", "remote_addr": "127.0.0.1"}),
        ),
        ("Test 5: GET /missing/", json!({"method": "GET", "path": "/missing/"})),
    ];

    for (title, request) in requests {
        println!("{}", title);
        let response = send(&mut writer, &mut reader, &request)?;
        println!("Response: {}\n", serde_json::to_string_pretty(&response)?);
    }

    println!("=== Done. Check the request log for records ===");
    Ok(())
}

fn send(
    writer: &mut UnixStream,
    reader: &mut BufReader<UnixStream>,
    request: &Value,
) -> Result<Value, Box<dyn std::error::Error>> {
    writer.write_all(request.to_string().as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(serde_json::from_str(&line)?)
}
