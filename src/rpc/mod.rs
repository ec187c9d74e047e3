//! JSON-RPC 2.0 tool-invocation client.
//!
//! Unary calls go over `POST /api/mcp/rpc` with per-instance correlation
//! ids; server-pushed notifications arrive on a sibling SSE channel whose
//! named events dispatch through a string-keyed handler registry.

mod types;

pub use types::{
    JSONRPC_VERSION, JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, ToolCallResult,
    ToolContent, ToolDescriptor,
};
use types::{ToolListResult, extract_result};

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::TokenProvider;
use crate::config::Config;
use crate::error::{ProtocolError, Result};
use crate::http::HttpClient;
use crate::sse::{FrameBuffer, SseFrame};

/// Callback for one named event on the side channel. Receives the frame
/// payload as JSON, or a JSON string of the raw payload when it is not
/// valid JSON.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

pub struct RpcToolClient {
    http: Arc<HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    rpc_url: String,
    events_url: String,
    /// Correlation id sent as a query parameter when subscribing, so the
    /// server can address pushes to this client instance.
    client_id: Option<String>,
    next_id: AtomicU64,
    handlers: Arc<Mutex<HashMap<String, EventHandler>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl RpcToolClient {
    pub fn new(http: Arc<HttpClient>, tokens: Arc<dyn TokenProvider>, config: &Config) -> Self {
        let origin = config.http.origin();
        Self {
            http,
            tokens,
            rpc_url: format!("{origin}/api/mcp/rpc"),
            events_url: format!("{origin}/api/mcp/events"),
            client_id: config
                .rpc
                .correlate_events
                .then(|| Uuid::new_v4().to_string()),
            next_id: AtomicU64::new(1),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            reader: Mutex::new(None),
        }
    }

    fn build_request(&self, method: &str, params: Option<Value>) -> JsonRpcRequest {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        JsonRpcRequest::new(id, method, params)
    }

    /// Issue one JSON-RPC call and return its `result`.
    ///
    /// Responses are matched by arrival, not by id lookup: the client
    /// assumes one logical call completes before the next begins.
    /// Concurrent in-flight calls would need a pending map keyed by id.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = self.build_request(method, params);
        let body = serde_json::to_vec(&request).map_err(ProtocolError::Json)?;
        let token = self.tokens.bearer_token();

        debug!(method = %method, id = request.id, "rpc request");

        let bytes = self
            .http
            .post_json(&self.rpc_url, body.into(), token.as_deref())
            .await?;
        let response: JsonRpcResponse =
            serde_json::from_slice(&bytes).map_err(ProtocolError::Json)?;

        if response.id != Some(json!(request.id)) {
            warn!(expected = request.id, got = ?response.id, "rpc response id mismatch");
        }

        extract_result(response)
    }

    /// Tools advertised by the backend.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let result = self.send_request("tools/list", None).await?;
        let list: ToolListResult = serde_json::from_value(result).map_err(ProtocolError::Json)?;
        Ok(list.tools)
    }

    /// Invoke a named tool. A tool-level failure comes back inside the
    /// envelope (`is_error`), not as an `Err`; see [`ToolCallResult::checked`].
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.send_request("tools/call", Some(params)).await?;
        serde_json::from_value(result).map_err(|e| ProtocolError::Json(e).into())
    }

    /// Register a handler for a named event on the side channel. The
    /// registry is consulted when an event fires, so registration order
    /// relative to `connect_stream` does not matter.
    pub fn on(&self, event: impl Into<String>, handler: impl Fn(Value) + Send + Sync + 'static) {
        self.handlers.lock().insert(event.into(), Arc::new(handler));
    }

    /// Open the SSE side channel. Any previous channel is closed first;
    /// at most one is live per client instance.
    pub async fn connect_stream(&self) -> Result<()> {
        self.disconnect_stream();

        let url = match &self.client_id {
            Some(id) => format!("{}?clientId={id}", self.events_url),
            None => self.events_url.clone(),
        };
        let token = self.tokens.bearer_token();

        let response = self.http.get_stream(&url, token.as_deref()).await?;
        debug!(client_id = ?self.client_id, "rpc event channel opened");

        let handlers = self.handlers.clone();
        let task = tokio::spawn(async move {
            read_events(response.into_body(), handlers).await;
        });
        *self.reader.lock() = Some(task);

        Ok(())
    }

    /// Close the side channel. Safe to call when not connected.
    pub fn disconnect_stream(&self) {
        if let Some(task) = self.reader.lock().take() {
            task.abort();
            debug!("rpc event channel closed");
        }
    }

    pub fn stream_connected(&self) -> bool {
        self.reader
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RpcToolClient {
    fn drop(&mut self) {
        self.disconnect_stream();
    }
}

async fn read_events<B>(mut body: B, handlers: Arc<Mutex<HashMap<String, EventHandler>>>)
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let mut frames = FrameBuffer::new();

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                let Some(data) = frame.data_ref() else {
                    continue;
                };
                for sse_frame in frames.feed(data) {
                    dispatch(&handlers, sse_frame);
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "rpc event channel errored");
                return;
            }
            None => {
                debug!("rpc event channel ended");
                return;
            }
        }
    }
}

/// Route one frame. The built-in `connected` / `message` / `error` events
/// are always wired (for diagnostics); user handlers are looked up in the
/// registry at fire time.
fn dispatch(handlers: &Mutex<HashMap<String, EventHandler>>, frame: SseFrame) {
    let name = frame.event.as_deref().unwrap_or("message");

    match name {
        "connected" => debug!(data = %frame.data, "rpc event channel confirmed"),
        "error" => warn!(data = %frame.data, "rpc event channel reported an error"),
        _ => {}
    }

    // Clone out of the registry before invoking, so a handler can
    // re-register without deadlocking on the map.
    let handler = handlers.lock().get(name).cloned();
    let Some(handler) = handler else {
        return;
    };

    let payload =
        serde_json::from_str(&frame.data).unwrap_or_else(|_| Value::String(frame.data.clone()));
    handler(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use crate::testing::ChunkBody;

    fn client(correlate: bool) -> RpcToolClient {
        let mut config = Config::default();
        config.rpc.correlate_events = correlate;
        let http = Arc::new(HttpClient::new(&config.http));
        RpcToolClient::new(http, NoAuth::new(), &config)
    }

    #[test]
    fn test_request_ids_strictly_increase() {
        let client = client(true);

        let first = client.build_request("tools/list", None);
        let second = client.build_request("tools/list", None);
        let third = client.build_request("tools/call", Some(json!({})));

        assert!(first.id < second.id);
        assert!(second.id < third.id);
    }

    #[test]
    fn test_id_counter_is_per_instance() {
        let a = client(true);
        let b = client(true);

        let id_a = a.build_request("tools/list", None).id;
        let id_b = b.build_request("tools/list", None).id;
        // Fresh instances restart their counter; uniqueness is scoped to
        // one client, not the process.
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn test_client_id_follows_config() {
        assert!(client(true).client_id.is_some());
        assert!(client(false).client_id.is_none());
    }

    #[test]
    fn test_disconnect_is_idempotent_when_never_connected() {
        let client = client(true);
        assert!(!client.stream_connected());
        client.disconnect_stream();
        client.disconnect_stream();
        assert!(!client.stream_connected());
    }

    #[test]
    fn test_dispatch_routes_named_events() {
        let handlers: Arc<Mutex<HashMap<String, EventHandler>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        handlers.lock().insert(
            "indexUpdated".to_string(),
            Arc::new(move |value| sink.lock().push(value)),
        );

        dispatch(
            &handlers,
            SseFrame {
                event: Some("indexUpdated".to_string()),
                data: "{\"documents\":3}".to_string(),
            },
        );
        // Unregistered names are dropped silently.
        dispatch(
            &handlers,
            SseFrame {
                event: Some("somethingElse".to_string()),
                data: "{}".to_string(),
            },
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["documents"], 3);
    }

    #[test]
    fn test_dispatch_defaults_to_message_event() {
        let handlers: Arc<Mutex<HashMap<String, EventHandler>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        handlers
            .lock()
            .insert("message".to_string(), Arc::new(move |v| sink.lock().push(v)));

        dispatch(
            &handlers,
            SseFrame {
                event: None,
                data: "plain text".to_string(),
            },
        );

        // Non-JSON payloads arrive as a JSON string, not an error.
        assert_eq!(seen.lock()[0], Value::String("plain text".to_string()));
    }

    #[tokio::test]
    async fn test_read_events_dispatches_stream_frames() {
        crate::testing::init_tracing();
        let client = client(true);
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        client.on("indexUpdated", move |value| sink.lock().push(value));

        let body = ChunkBody::new(&[
            "event: connected\ndata: {\"clientId\":\"c1\"}\n\n",
            "event: indexUpdated\ndata: {\"documents\":7}\n\n",
        ]);
        read_events(body, client.handlers.clone()).await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["documents"], 7);
    }
}
