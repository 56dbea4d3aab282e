//! MCP session over the HTTP+SSE transport.
//!
//! The client opens the event stream, waits for the `endpoint` event that
//! names the POST URI, then sends JSON-RPC messages to that URI. Responses
//! come back on the event stream and are routed to the waiting caller by id.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use url::Url;

use super::endpoint::endpoint_url;
use super::protocol::{
    CallToolResult, IncomingMessage, JsonRpcNotification, JsonRpcReply, JsonRpcRequest,
    ListToolsResult, McpTool, MessageKind, PROTOCOL_VERSION,
};
use super::CoralError;
use crate::config::CoralConfig;

type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CoralError>>>>>;

/// An open session with the Coral server.
pub struct CoralSession {
    http: reqwest::Client,
    message_url: Url,
    pending: PendingRequests,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

/// Open a session, retrying transient failures according to `config.connect_retry`.
pub async fn connect_with_retry(config: &CoralConfig) -> Result<CoralSession, CoralError> {
    config
        .connect_retry
        .run(
            "Coral connection",
            |_| CoralSession::connect(config),
            CoralError::is_transient,
        )
        .await
}

impl CoralSession {
    /// Open the event stream and perform the MCP `initialize` handshake.
    pub async fn connect(config: &CoralConfig) -> Result<Self, CoralError> {
        let url = endpoint_url(config)?;
        tracing::info!("Connecting to Coral Server: {}", url);

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        let mut events = EventSource::new(http.get(url.clone()))
            .map_err(|e| CoralError::Stream(e.to_string()))?;
        events.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        let message_url = match tokio::time::timeout(
            config.sse_read_timeout,
            wait_for_endpoint(&mut events, &url),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                events.close();
                return Err(CoralError::Timeout("endpoint event".to_string()));
            }
        };
        tracing::debug!("Coral message endpoint: {}", message_url);

        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_events(
            events,
            http.clone(),
            message_url.clone(),
            pending.clone(),
            closed.clone(),
            config.sse_read_timeout,
        ));

        let session = Self {
            http,
            message_url,
            pending,
            next_id: AtomicU64::new(1),
            closed,
            request_timeout: config.sse_read_timeout,
            reader,
        };
        session.initialize().await?;
        tracing::info!("Coral Server Connection Established");
        Ok(session)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop reading the event stream. Pending requests fail with `Closed`.
    pub async fn close(&self) {
        self.reader.abort();
        self.closed.store(true, Ordering::SeqCst);
        fail_pending(&self.pending).await;
    }

    /// List every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, CoralError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| CoralError::Protocol(format!("tools/list: {}", e)))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => {
                    if !seen.insert(next.clone()) {
                        return Err(CoralError::Protocol(format!(
                            "tools/list repeated cursor '{}'",
                            next
                        )));
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, CoralError> {
        let result = self
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        serde_json::from_value(result).map_err(|e| CoralError::Protocol(format!("tools/call: {}", e)))
    }

    async fn initialize(&self) -> Result<(), CoralError> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                })),
            )
            .await?;

        if let Some(server) = result.get("serverInfo") {
            let name = server.get("name").and_then(Value::as_str).unwrap_or("unknown");
            let version = server.get("version").and_then(Value::as_str).unwrap_or("");
            tracing::debug!("Coral server: {} {}", name, version);
        }

        self.notify("notifications/initialized", None).await
    }

    /// Send a request and wait for its response on the event stream.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, CoralError> {
        if self.is_closed() {
            return Err(CoralError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        // The reader may have shut down between the check above and the insert.
        if self.is_closed() {
            self.pending.lock().await.remove(&id);
            return Err(CoralError::Closed);
        }

        if let Err(e) = post_json(
            &self.http,
            &self.message_url,
            &JsonRpcRequest::new(id, method, params),
            self.request_timeout,
        )
        .await
        {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CoralError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(CoralError::Timeout(method.to_string()))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), CoralError> {
        post_json(
            &self.http,
            &self.message_url,
            &JsonRpcNotification::new(method, params),
            self.request_timeout,
        )
        .await
    }
}

impl std::fmt::Debug for CoralSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoralSession")
            .field("message_url", &self.message_url.as_str())
            .field("closed", &self.is_closed())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Drop for CoralSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn post_json<T: Serialize>(
    http: &reqwest::Client,
    url: &Url,
    body: &T,
    timeout: Duration,
) -> Result<(), CoralError> {
    let response = http
        .post(url.clone())
        .timeout(timeout)
        .json(body)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CoralError::Status(status));
    }
    Ok(())
}

async fn wait_for_endpoint(events: &mut EventSource, base: &Url) -> Result<Url, CoralError> {
    while let Some(event) = events.next().await {
        match event? {
            Event::Open => {}
            Event::Message(message) if message.event == "endpoint" => {
                return Ok(base.join(message.data.trim())?);
            }
            Event::Message(message) => {
                tracing::debug!("Ignoring '{}' event before endpoint", message.event);
            }
        }
    }
    Err(CoralError::Closed)
}

async fn read_events(
    mut events: EventSource,
    http: reqwest::Client,
    message_url: Url,
    pending: PendingRequests,
    closed: Arc<AtomicBool>,
    read_timeout: Duration,
) {
    loop {
        let next = match tokio::time::timeout(read_timeout, events.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::warn!("No events from Coral server for {:?}, closing session", read_timeout);
                break;
            }
        };

        match next {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(message))) => {
                if message.event != "message" {
                    tracing::debug!("Ignoring '{}' event", message.event);
                    continue;
                }
                dispatch(&message.data, &http, &message_url, &pending, read_timeout).await;
            }
            Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => {
                tracing::warn!("Coral event stream ended");
                break;
            }
            Some(Err(e)) => {
                tracing::warn!("Coral event stream failed: {}", e);
                break;
            }
        }
    }

    events.close();
    closed.store(true, Ordering::SeqCst);
    fail_pending(&pending).await;
}

async fn dispatch(
    data: &str,
    http: &reqwest::Client,
    message_url: &Url,
    pending: &PendingRequests,
    timeout: Duration,
) {
    let message: IncomingMessage = match serde_json::from_str(data) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Dropping unparseable Coral message: {}", e);
            return;
        }
    };

    match message.kind() {
        MessageKind::Response { id, outcome } => {
            let Some(tx) = pending.lock().await.remove(&id) else {
                tracing::debug!("No pending request for response id {}", id);
                return;
            };
            let outcome = outcome.map_err(|e| CoralError::Rpc {
                code: e.code,
                message: e.message,
            });
            let _ = tx.send(outcome);
        }
        MessageKind::Request { id, method } => {
            let reply = if method == "ping" {
                JsonRpcReply::result(id, json!({}))
            } else {
                tracing::debug!("Rejecting unsupported server request '{}'", method);
                JsonRpcReply::method_not_found(id, &method)
            };
            if let Err(e) = post_json(http, message_url, &reply, timeout).await {
                tracing::warn!("Failed to answer server request '{}': {}", method, e);
            }
        }
        MessageKind::Notification { method } => {
            tracing::debug!("Coral notification: {}", method);
        }
        MessageKind::Unknown => {
            tracing::debug!("Ignoring unrecognized Coral message");
        }
    }
}

async fn fail_pending(pending: &PendingRequests) {
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(CoralError::Closed));
    }
}
