//! Low-level Chrome DevTools Protocol (CDP) client over WebSocket.
//!
//! Talks to a running browser via its debugging WebSocket endpoint. Supports
//! sending commands, receiving responses, and subscribing to events. Only the
//! domains needed for request interception are wrapped here: Page/Network
//! bring-up, the Fetch domain, and extra-header control.

use pagemock_core::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};

const COMMAND_TIMEOUT_SECS: u64 = 30;

/// A CDP WebSocket client that can send commands and receive responses/events.
pub struct CdpClient {
    /// Sender to write messages to the WebSocket.
    ws_tx: mpsc::Sender<String>,
    /// Pending command responses, keyed by request ID.
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    /// Auto-incrementing command ID.
    next_id: AtomicU64,
    /// Event listeners (domain.event -> channels).
    event_listeners: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>,
    /// Reader/writer task handles, aborted on drop.
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a CDP WebSocket endpoint (a page target).
    pub async fn connect(ws_url: &str) -> Result<Self> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = connect_async(ws_url).await.map_err(|e| {
            Error::Session(format!("Failed to connect to CDP endpoint {}: {}", ws_url, e))
        })?;

        let (mut ws_sink, mut ws_stream_read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let pending_clone = pending.clone();

        let event_listeners: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let events_clone = event_listeners.clone();

        // Writer task: owns the sink, forwards messages from the channel.
        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(msg)).await {
                    error!("CDP WebSocket write error: {}", e);
                    break;
                }
            }
        });

        // Reader task: dispatches command responses and events.
        let reader_handle = tokio::spawn(async move {
            while let Some(msg_result) = ws_stream_read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        if let Ok(val) = serde_json::from_str::<Value>(&text) {
                            if let Some(id) = val.get("id").and_then(|v| v.as_u64()) {
                                let mut pending = pending_clone.lock().await;
                                if let Some(tx) = pending.remove(&id) {
                                    let _ = tx.send(val);
                                }
                            } else if let Some(method) = val.get("method").and_then(|v| v.as_str())
                            {
                                let listeners = events_clone.lock().await;
                                if let Some(senders) = listeners.get(method) {
                                    let params =
                                        val.get("params").cloned().unwrap_or(Value::Null);
                                    for tx in senders {
                                        let _ = tx.try_send(params.clone());
                                    }
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!("CDP WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            event_listeners,
            _reader_handle: reader_handle,
            _writer_handle: writer_handle,
        })
    }

    /// Send a CDP command and wait for the response.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let msg = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        self.ws_tx
            .send(msg.to_string())
            .await
            .map_err(|e| Error::Tool(format!("Failed to send CDP command: {}", e)))?;

        let timeout =
            tokio::time::timeout(std::time::Duration::from_secs(COMMAND_TIMEOUT_SECS), rx);
        match timeout.await {
            Ok(Ok(response)) => {
                if let Some(err) = response.get("error") {
                    Err(Error::Tool(format!("CDP error: {}", err)))
                } else {
                    Ok(response.get("result").cloned().unwrap_or(Value::Null))
                }
            }
            Ok(Err(_)) => Err(Error::Tool("CDP response channel closed".to_string())),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(Error::Tool(format!(
                    "CDP command '{}' timed out after {}s",
                    method, COMMAND_TIMEOUT_SECS
                )))
            }
        }
    }

    /// Subscribe to a CDP event. Returns a receiver that gets event params.
    pub async fn subscribe_event(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(64);
        let mut listeners = self.event_listeners.lock().await;
        listeners
            .entry(method.to_string())
            .or_insert_with(Vec::new)
            .push(tx);
        rx
    }

    /// Enable a CDP domain (e.g. "Page", "Network").
    pub async fn enable_domain(&self, domain: &str) -> Result<()> {
        self.send_command(&format!("{}.enable", domain), json!({}))
            .await?;
        Ok(())
    }

    /// Replace the page's extra HTTP headers wholesale.
    /// An empty map clears previously set headers (driver contract).
    pub async fn set_extra_headers(&self, headers: Value) -> Result<()> {
        self.send_command("Network.setExtraHTTPHeaders", json!({"headers": headers}))
            .await?;
        Ok(())
    }

    // ─── Network interception (Fetch domain) ──────────────────────────

    /// Enable the Fetch domain for request interception.
    /// Re-issuing Fetch.enable replaces the previous pattern set.
    pub async fn enable_fetch(&self, patterns: Vec<Value>) -> Result<()> {
        self.send_command(
            "Fetch.enable",
            json!({"patterns": patterns, "handleAuthRequests": false}),
        )
        .await?;
        Ok(())
    }

    /// Disable the Fetch domain; all requests proceed unintercepted.
    pub async fn disable_fetch(&self) -> Result<()> {
        self.send_command("Fetch.disable", json!({})).await?;
        Ok(())
    }

    /// Continue a paused request unmodified.
    pub async fn fetch_continue(&self, request_id: &str) -> Result<()> {
        self.send_command("Fetch.continueRequest", json!({"requestId": request_id}))
            .await?;
        Ok(())
    }

    /// Fulfill a paused request with a synthetic response.
    /// The body must be sent base64-encoded per the CDP contract.
    pub async fn fetch_fulfill(
        &self,
        request_id: &str,
        status: u16,
        headers: Vec<Value>,
        body: &str,
    ) -> Result<()> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(body.as_bytes());
        self.send_command(
            "Fetch.fulfillRequest",
            json!({
                "requestId": request_id,
                "responseCode": status,
                "responseHeaders": headers,
                "body": encoded,
            }),
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._reader_handle.abort();
        self._writer_handle.abort();
    }
}
