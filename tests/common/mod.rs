//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use telemetry_loader::config::{LoaderConfig, RetryConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A running mock HTTP backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    heads: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Raw request heads received so far, request line first.
    pub fn requests(&self) -> Vec<String> {
        self.heads.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.heads.lock().unwrap().len()
    }
}

/// Start a mock backend that always answers with `status` and `body`.
pub async fn start_mock_backend(status: u16, body: impl Into<String>) -> MockBackend {
    let body = body.into();
    start_programmable_backend(move |_| {
        let body = body.clone();
        async move { (status, body) }
    })
    .await
}

/// Start a programmable mock backend. The handler gets the request target
/// (path and query) and returns status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let heads = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let recorded = heads.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        handle(socket, f, recorded).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, heads }
}

async fn handle<F, Fut>(mut socket: TcpStream, f: Arc<F>, recorded: Arc<Mutex<Vec<String>>>)
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = (u16, String)>,
{
    let Some(head) = read_head(&mut socket).await else {
        return;
    };
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    recorded.lock().unwrap().push(head);

    let (status, body) = f(target).await;
    let status_text = match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 || buf.len() > 64 * 1024 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Defaults pointed at `jaeger` and `loki` with fast retries.
pub fn test_config(data_dir: &std::path::Path, jaeger: &MockBackend, loki: &MockBackend) -> LoaderConfig {
    let mut config = LoaderConfig::default();
    config.storage.data_dir = data_dir.to_path_buf();
    config.traces.endpoint = jaeger.url("/api/traces");
    config.logs.endpoint = loki.url("/loki/api/v1/query_range");
    config.retries = fast_retries();
    config.timeouts.request_secs = 5;
    config
}

pub fn fast_retries() -> RetryConfig {
    RetryConfig {
        enabled: true,
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
    }
}

/// Jaeger response body with one trace holding the given `(spanID, operationName)` spans.
pub fn jaeger_body(spans: &[(&str, &str)]) -> String {
    let spans: Vec<serde_json::Value> = spans
        .iter()
        .map(|(id, op)| {
            serde_json::json!({
                "traceID": "trace-1",
                "spanID": id,
                "operationName": op,
                "startTime": 1_710_496_800_000_000i64,
                "duration": 1500,
                "processID": "p1",
                "tags": [
                    {"key": "http.status_code", "type": "int64", "value": 200},
                    {"key": "error", "type": "bool", "value": false}
                ]
            })
        })
        .collect();
    serde_json::json!({
        "data": [{
            "traceID": "trace-1",
            "spans": spans,
            "processes": {"p1": {"serviceName": "sr-api"}}
        }]
    })
    .to_string()
}

/// Loki response body with one stream holding `lines`.
pub fn loki_body(lines: &[serde_json::Value]) -> String {
    let values: Vec<serde_json::Value> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| serde_json::json!([i.to_string(), line.to_string()]))
        .collect();
    serde_json::json!({
        "status": "success",
        "data": {"resultType": "streams", "result": [{"stream": {}, "values": values}]}
    })
    .to_string()
}
