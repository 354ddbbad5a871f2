//! Transports for remote tool servers: a spawned subprocess over stdio,
//! streamable HTTP, or HTTP server-sent events. The transport kind is
//! decided once, when the connection is built, from the config's tagged
//! `transportType` field.

use crate::config::{McpServerConfig, McpTransportType};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use ensemble_core::{EnsembleError, EnsembleResult};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, warn};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// A live connection to one remote tool server.
pub enum McpTransport {
    /// Subprocess speaking newline-delimited JSON-RPC.
    Stdio(StdioTransport),
    /// One POST per message; response in the HTTP body.
    Http(HttpTransport),
    /// Long-lived GET event stream plus a POST endpoint.
    Sse(SseTransport),
}

impl McpTransport {
    /// Builds the transport declared by `config`. Missing required fields
    /// (command for stdio, url for HTTP/SSE) fail here, at setup time.
    pub async fn connect(server: &str, config: &McpServerConfig) -> EnsembleResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        match config.transport_type {
            McpTransportType::Stdio => {
                Ok(Self::Stdio(StdioTransport::connect(server, config).await?))
            }
            McpTransportType::Http => Ok(Self::Http(HttpTransport::connect(
                server, config, timeout,
            )?)),
            McpTransportType::Sse => Ok(Self::Sse(
                SseTransport::connect(server, config, timeout).await?,
            )),
        }
    }

    /// Sends a request and waits for its response.
    pub async fn request(&self, request: &JsonRpcRequest) -> EnsembleResult<JsonRpcResponse> {
        match self {
            Self::Stdio(t) => t.request(request).await,
            Self::Http(t) => t.request(request).await,
            Self::Sse(t) => t.request(request).await,
        }
    }

    /// Sends a notification (no response expected).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> EnsembleResult<()> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.unwrap_or(serde_json::json!({})),
        });
        match self {
            Self::Stdio(t) => t.write_line(&body.to_string()).await,
            Self::Http(t) => t.post_notification(&body).await,
            Self::Sse(t) => t.post_notification(&body).await,
        }
    }
}

fn build_header_map(server: &str, headers: &HashMap<String, String>) -> EnsembleResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            EnsembleError::Config(format!("server '{server}': invalid header name '{key}': {e}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            EnsembleError::Config(format!("server '{server}': invalid value for header '{key}': {e}"))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

// --- stdio ---

/// Subprocess transport: newline-delimited JSON-RPC over stdin/stdout, with
/// a background task routing responses to pending callers by request id.
pub struct StdioTransport {
    stdin: Mutex<tokio::process::ChildStdin>,
    _child: Mutex<Child>,
    pending: PendingMap,
    timeout: Duration,
}

impl StdioTransport {
    async fn connect(server: &str, config: &McpServerConfig) -> EnsembleResult<Self> {
        let command = config.command.as_deref().ok_or_else(|| {
            EnsembleError::Config(format!("server '{server}': stdio transport requires a command"))
        })?;

        let mut cmd = Command::new(command);
        cmd.args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null());
        for (key, val) in &config.env {
            cmd.env(key, val);
        }

        let mut child = cmd.spawn().map_err(|e| {
            EnsembleError::Transport(format!("failed to spawn server '{server}' ({command}): {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EnsembleError::Transport(format!("server '{server}': stdin not available")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EnsembleError::Transport(format!("server '{server}': stdout not available")))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let pending_clone = pending.clone();
        let server_name = server.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(server = %server_name, "Remote server stdout closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                            Ok(resp) => {
                                if let Some(id) = resp.id {
                                    let mut map = pending_clone.lock().await;
                                    if let Some(tx) = map.remove(&id) {
                                        let _ = tx.send(resp);
                                    }
                                }
                                // Notifications (no id) are ignored.
                            }
                            Err(e) => {
                                debug!(server = %server_name, line = %trimmed, error = %e, "Non-JSON-RPC line from server");
                            }
                        }
                    }
                    Err(e) => {
                        error!(server = %server_name, error = %e, "Error reading server stdout");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            stdin: Mutex::new(stdin),
            _child: Mutex::new(child),
            pending,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn write_line(&self, line: &str) -> EnsembleResult<()> {
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| EnsembleError::Transport(format!("failed to write to server stdin: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| EnsembleError::Transport(format!("failed to write newline: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| EnsembleError::Transport(format!("failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn request(&self, request: &JsonRpcRequest) -> EnsembleResult<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            map.insert(request.id, tx);
        }

        let msg = serde_json::to_string(request)?;
        if let Err(e) = self.write_line(&msg).await {
            self.pending.lock().await.remove(&request.id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(EnsembleError::Transport(
                "response channel dropped (server exited?)".into(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&request.id);
                Err(EnsembleError::Transport(format!(
                    "request '{}' timed out after {:?}",
                    request.method, self.timeout
                )))
            }
        }
    }
}

// --- streamable HTTP ---

/// Streamable-HTTP transport: each JSON-RPC message is POSTed to the
/// configured URL; responses come back as a JSON body or as a short
/// `text/event-stream` body carrying `message` events.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl HttpTransport {
    fn connect(server: &str, config: &McpServerConfig, timeout: Duration) -> EnsembleResult<Self> {
        let url = config.url.clone().ok_or_else(|| {
            EnsembleError::Config(format!("server '{server}': http transport requires a url"))
        })?;
        let headers = build_header_map(server, &config.headers)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnsembleError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, url, headers })
    }

    async fn post(&self, body: &serde_json::Value) -> EnsembleResult<reqwest::Response> {
        let resp = self
            .http
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| EnsembleError::Transport(format!("POST {} failed: {e}", self.url)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EnsembleError::Transport(format!(
                "POST {} returned {status}",
                self.url
            )));
        }
        Ok(resp)
    }

    async fn post_notification(&self, body: &serde_json::Value) -> EnsembleResult<()> {
        self.post(body).await.map(|_| ())
    }

    async fn request(&self, request: &JsonRpcRequest) -> EnsembleResult<JsonRpcResponse> {
        let body = serde_json::to_value(request)?;
        let resp = self.post(&body).await?;

        let is_event_stream = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let text = resp
            .text()
            .await
            .map_err(|e| EnsembleError::Transport(format!("failed to read response body: {e}")))?;

        if !is_event_stream {
            return serde_json::from_str(&text).map_err(EnsembleError::from);
        }

        let mut decoder = SseDecoder::new();
        let mut events = decoder.push(&text);
        events.extend(decoder.finish());
        for event in events {
            if event.event != "message" {
                continue;
            }
            if let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(&event.data) {
                if resp.id == Some(request.id) {
                    return Ok(resp);
                }
            }
        }

        Err(EnsembleError::Transport(format!(
            "no response for request '{}' in event stream",
            request.method
        )))
    }
}

// --- SSE ---

/// SSE transport: a long-lived GET stream announces a POST endpoint in its
/// first `endpoint` event; responses arrive as `message` events routed by
/// request id through the same pending map the stdio transport uses.
pub struct SseTransport {
    http: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    pending: PendingMap,
    timeout: Duration,
    reader: tokio::task::JoinHandle<()>,
}

impl SseTransport {
    async fn connect(
        server: &str,
        config: &McpServerConfig,
        timeout: Duration,
    ) -> EnsembleResult<Self> {
        let url = config.url.clone().ok_or_else(|| {
            EnsembleError::Config(format!("server '{server}': sse transport requires a url"))
        })?;
        let headers = build_header_map(server, &config.headers)?;

        // No client-level timeout: the event stream outlives any request.
        let http = reqwest::Client::new();
        let resp = http
            .get(&url)
            .headers(headers.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| EnsembleError::Transport(format!("GET {url} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(EnsembleError::Transport(format!(
                "GET {url} returned {}",
                resp.status()
            )));
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();

        let pending_clone = pending.clone();
        let server_name = server.to_string();
        let base_url = url.clone();
        let reader = tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let mut decoder = SseDecoder::new();
            let mut stream = resp.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(server = %server_name, error = %e, "Event stream broke");
                        break;
                    }
                };
                for event in decoder.push(&String::from_utf8_lossy(&chunk)) {
                    match event.event.as_str() {
                        "endpoint" => {
                            if let Some(tx) = endpoint_tx.take() {
                                let _ = tx.send(resolve_endpoint(&base_url, &event.data));
                            }
                        }
                        "message" => match serde_json::from_str::<JsonRpcResponse>(&event.data) {
                            Ok(resp) => {
                                if let Some(id) = resp.id {
                                    let mut map = pending_clone.lock().await;
                                    if let Some(tx) = map.remove(&id) {
                                        let _ = tx.send(resp);
                                    }
                                }
                            }
                            Err(e) => {
                                debug!(server = %server_name, error = %e, "Unparseable message event");
                            }
                        },
                        _ => {}
                    }
                }
            }
            debug!(server = %server_name, "Event stream ended");
        });

        let endpoint = match tokio::time::timeout(timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                reader.abort();
                return Err(EnsembleError::Transport(format!(
                    "server '{server}' event stream closed during setup"
                )));
            }
            Err(_) => {
                reader.abort();
                return Err(EnsembleError::Transport(format!(
                    "server '{server}' did not announce an endpoint within {timeout:?}"
                )));
            }
        };

        Ok(Self {
            http,
            endpoint,
            headers,
            pending,
            timeout,
            reader,
        })
    }

    async fn post(&self, body: &serde_json::Value) -> EnsembleResult<()> {
        let resp = self
            .http
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| EnsembleError::Transport(format!("POST {} failed: {e}", self.endpoint)))?;
        if !resp.status().is_success() {
            return Err(EnsembleError::Transport(format!(
                "POST {} returned {}",
                self.endpoint,
                resp.status()
            )));
        }
        Ok(())
    }

    async fn post_notification(&self, body: &serde_json::Value) -> EnsembleResult<()> {
        self.post(body).await
    }

    async fn request(&self, request: &JsonRpcRequest) -> EnsembleResult<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            map.insert(request.id, tx);
        }

        let body = serde_json::to_value(request)?;
        if let Err(e) = self.post(&body).await {
            self.pending.lock().await.remove(&request.id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(EnsembleError::Transport("event stream closed".into())),
            Err(_) => {
                self.pending.lock().await.remove(&request.id);
                Err(EnsembleError::Transport(format!(
                    "request '{}' timed out after {:?}",
                    request.method, self.timeout
                )))
            }
        }
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn resolve_endpoint(base: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    match reqwest::Url::parse(base).and_then(|b| b.join(endpoint)) {
        Ok(joined) => joined.to_string(),
        Err(_) => endpoint.to_string(),
    }
}

// --- SSE wire decoding ---

/// One decoded server-sent event.
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental decoder for `text/event-stream` bodies. Events are terminated
/// by a blank line; `data:` lines accumulate, `event:` names the event
/// (default `message`), comments and unknown fields are skipped.
pub(crate) struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self { buf: String::new() }
    }

    pub(crate) fn push(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buf.push_str(&chunk.replace("\r\n", "\n"));

        let mut events = Vec::new();
        while let Some(split) = self.buf.find("\n\n") {
            let block: String = self.buf.drain(..split + 2).collect();
            if let Some(event) = Self::decode_block(block.trim_end_matches('\n')) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever remains in the buffer as a final, unterminated event.
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buf);
        Self::decode_block(rest.trim_end_matches('\n'))
    }

    fn decode_block(block: &str) -> Option<SseEvent> {
        let mut event = String::from("message");
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("event:") {
                event = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("data:") {
                data.push(value.strip_prefix(' ').unwrap_or(value));
            }
        }

        if data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: data.join("\n"),
        })
    }
}
