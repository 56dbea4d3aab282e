//! In-process Coral double speaking MCP over HTTP+SSE.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct FakeCoral {
    pub query: Mutex<Option<String>>,
    events: Mutex<Option<mpsc::UnboundedSender<Event>>>,
    received: Mutex<Vec<Value>>,
    connects: AtomicUsize,
    /// Every `tools/list` page points at the same next cursor.
    pub repeat_cursor: AtomicBool,
    /// The next `wait_for_mentions` call drops the event stream instead of answering.
    pub hang_up_on_wait: AtomicBool,
}

impl FakeCoral {
    pub fn push(&self, message: Value) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(Event::default().event("message").data(message.to_string()));
        }
    }

    pub fn hang_up(&self) {
        self.events.lock().unwrap().take();
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Number of event streams opened so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

async fn sse(
    State(coral): State<Arc<FakeCoral>>,
    RawQuery(query): RawQuery,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    coral.connects.fetch_add(1, Ordering::SeqCst);
    *coral.query.lock().unwrap() = query;
    let (tx, mut rx) = mpsc::unbounded_channel();
    *coral.events.lock().unwrap() = Some(tx);

    Sse::new(async_stream::stream! {
        yield Ok(Event::default().event("endpoint").data("/message?sessionId=test"));
        while let Some(event) = rx.recv().await {
            yield Ok(event);
        }
    })
}

async fn message(State(coral): State<Arc<FakeCoral>>, Json(body): Json<Value>) -> StatusCode {
    coral.received.lock().unwrap().push(body.clone());

    let (Some(id), Some(method)) = (body.get("id").cloned(), body.get("method").and_then(Value::as_str))
    else {
        return StatusCode::ACCEPTED;
    };

    let result = match method {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "fake-coral", "version": "0.0.0"}
        }),
        "tools/list" => match body.pointer("/params/cursor").and_then(Value::as_str) {
            None => json!({
                "tools": [{
                    "name": "wait_for_mentions",
                    "description": "Wait for mentions",
                    "inputSchema": {"type": "object", "properties": {"timeoutMs": {"type": "number"}}}
                }],
                "nextCursor": "page-2"
            }),
            Some(_) if coral.repeat_cursor.load(Ordering::SeqCst) => json!({
                "tools": [{"name": "list_agents"}],
                "nextCursor": "page-2"
            }),
            Some(_) => json!({
                "tools": [{
                    "name": "send_message",
                    "inputSchema": {"type": "object", "properties": {"threadId": {"type": "string"}}}
                }]
            }),
        },
        "tools/call" => match body.pointer("/params/name").and_then(Value::as_str) {
            Some("hang") => {
                coral.hang_up();
                return StatusCode::ACCEPTED;
            }
            Some("wait_for_mentions") if coral.hang_up_on_wait.swap(false, Ordering::SeqCst) => {
                coral.hang_up();
                return StatusCode::ACCEPTED;
            }
            Some("wait_for_mentions") => json!({
                "content": [{"type": "text", "text": "No new messages"}],
                "isError": false
            }),
            Some("send_message") => json!({
                "content": [{"type": "text", "text": "Message sent"}],
                "isError": false
            }),
            _ => json!({
                "content": [{"type": "text", "text": "Thread not found"}],
                "isError": true
            }),
        },
        other => {
            coral.push(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("Method not found: {}", other)}
            }));
            return StatusCode::ACCEPTED;
        }
    };

    coral.push(json!({"jsonrpc": "2.0", "id": id, "result": result}));
    StatusCode::ACCEPTED
}

pub async fn start_fake_coral() -> (SocketAddr, Arc<FakeCoral>) {
    let coral = Arc::new(FakeCoral::default());
    let app = Router::new()
        .route("/sse", get(sse))
        .route("/message", post(message))
        .with_state(coral.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, coral)
}

pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
