//! Low-level Chrome DevTools Protocol client.
//!
//! One WebSocket connection to a page target. Commands carry
//! auto-incrementing ids and are correlated back to their callers through
//! oneshot channels; messages without an id are events and go to a
//! bounded event channel. A background task owns the read half for the
//! life of the connection; when the socket closes, every pending command
//! is completed with a synthetic error so no caller hangs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::BrowserError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

/// How long a command may wait for its response before giving up.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Events are buffered up to this many entries; beyond that, new ones are
/// dropped. Event delivery is best-effort and nothing in the bot depends
/// on seeing every frame.
const EVENT_BUFFER: usize = 256;

/// An event pushed by the browser (a message with `method` but no `id`).
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

/// Outgoing command frame.
#[derive(Debug, Clone, serde::Serialize)]
struct CdpCommand {
    id: u64,
    method: String,
    params: Value,
}

/// Error body inside a failed response.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CdpErrorBody {
    pub code: i64,
    pub message: String,
}

/// A response frame, correlated by id.
#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpErrorBody>,
}

/// The DevTools connection.
pub struct CdpClient {
    next_id: AtomicU64,
    pending: PendingMap,
    writer: Mutex<WsSink>,
    event_rx: Mutex<mpsc::Receiver<CdpEvent>>,
    _reader: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a page target, e.g.
    /// `ws://127.0.0.1:9222/devtools/page/<target>`.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let (stream, _) = tokio_tungstenite::connect_async(ws_url).await.map_err(|e| {
            BrowserError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        tracing::info!(url = ws_url, "DevTools WebSocket connected");

        let (writer, reader) = stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let reader_pending = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            read_loop(reader, reader_pending, event_tx).await;
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            event_rx: Mutex::new(event_rx),
            _reader: reader,
        })
    }

    /// Send a command and wait for its result with the default timeout.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.send_command_with_timeout(method, params, DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    /// Send a command and wait for its result.
    pub async fn send_command_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::to_string(&CdpCommand {
            id,
            method: method.to_string(),
            params,
        })
        .map_err(|e| BrowserError::Protocol {
            detail: format!("command serialization failed: {e}"),
        })?;

        tracing::trace!(id, method, "sending CDP command");

        // Register before sending so the response can never race us.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        self.writer
            .lock()
            .await
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| BrowserError::Protocol {
                detail: format!("WebSocket send failed: {e}"),
            })?;

        let response = tokio::time::timeout(timeout, rx)
            .await
            .map_err(|_| BrowserError::Timeout {
                method: method.to_string(),
                duration: timeout,
            })?
            .map_err(|_| BrowserError::Protocol {
                detail: "response channel dropped".to_string(),
            })?;

        if let Some(err) = response.error {
            return Err(BrowserError::Cdp {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Pull the next event, or `None` once the connection is gone.
    pub async fn recv_event(&self) -> Option<CdpEvent> {
        self.event_rx.lock().await.recv().await
    }

    /// Enable a CDP domain; most domains emit nothing until enabled.
    pub async fn enable_domain(&self, domain: &str) -> Result<(), BrowserError> {
        self.send_command(&format!("{domain}.enable"), serde_json::json!({}))
            .await?;
        Ok(())
    }
}

/// Reader task: route responses to their waiters, events to the channel.
async fn read_loop(mut reader: WsSource, pending: PendingMap, event_tx: mpsc::Sender<CdpEvent>) {
    while let Some(msg) = reader.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Close(_)) => {
                tracing::info!("DevTools WebSocket closed by remote");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket read error");
                break;
            }
        };

        let json: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable CDP frame");
                continue;
            }
        };

        if let Some(response) = parse_response(&json) {
            if let Some(tx) = pending.lock().await.remove(&response.id) {
                let _ = tx.send(response);
            } else {
                tracing::trace!(id = response.id, "response for unknown command id");
            }
        } else if let Some(event) = parse_event(&json) {
            // Nobody listening, or a full buffer: drop the event.
            let _ = event_tx.try_send(event);
        }
    }

    // Connection gone: fail every outstanding command.
    for (id, tx) in pending.lock().await.drain() {
        let _ = tx.send(CdpResponse {
            id,
            result: None,
            error: Some(CdpErrorBody {
                code: -1,
                message: "WebSocket connection closed".to_string(),
            }),
        });
    }
}

/// Build a command frame (exposed for tests).
pub fn build_command(id: u64, method: &str, params: Value) -> Value {
    serde_json::json!({ "id": id, "method": method, "params": params })
}

/// Interpret a frame as a response. Frames without an `id` are not responses.
pub fn parse_response(json: &Value) -> Option<CdpResponse> {
    let id = json.get("id")?.as_u64()?;
    Some(CdpResponse {
        id,
        result: json.get("result").cloned(),
        error: json
            .get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok()),
    })
}

/// Interpret a frame as an event. Frames with an `id` are not events.
pub fn parse_event(json: &Value) -> Option<CdpEvent> {
    if json.get("id").is_some() {
        return None;
    }
    Some(CdpEvent {
        method: json.get("method")?.as_str()?.to_string(),
        params: json.get("params").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_frame() {
        let frame = build_command(3, "Runtime.evaluate", serde_json::json!({"expression": "1"}));
        assert_eq!(frame["id"], 3);
        assert_eq!(frame["method"], "Runtime.evaluate");
        assert_eq!(frame["params"]["expression"], "1");
    }

    #[test]
    fn response_success_frame() {
        let json = serde_json::json!({"id": 1, "result": {"value": 2}});
        let resp = parse_response(&json).unwrap();
        assert_eq!(resp.id, 1);
        assert!(resp.error.is_none());
        assert_eq!(resp.result.unwrap()["value"], 2);
    }

    #[test]
    fn response_error_frame() {
        let json = serde_json::json!({
            "id": 2,
            "error": {"code": -32601, "message": "Method not found"}
        });
        let resp = parse_response(&json).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found");
    }

    #[test]
    fn event_frame() {
        let json = serde_json::json!({
            "method": "Page.loadEventFired",
            "params": {"timestamp": 1.5}
        });
        let event = parse_event(&json).unwrap();
        assert_eq!(event.method, "Page.loadEventFired");
        assert_eq!(event.params["timestamp"], 1.5);
    }

    #[test]
    fn event_without_params_defaults_null() {
        let event = parse_event(&serde_json::json!({"method": "Page.domContentEventFired"})).unwrap();
        assert_eq!(event.params, Value::Null);
    }

    #[test]
    fn frames_are_not_both() {
        let response_frame = serde_json::json!({"id": 1, "method": "x", "result": {}});
        assert!(parse_response(&response_frame).is_some());
        assert!(parse_event(&response_frame).is_none());

        let event_frame = serde_json::json!({"method": "x"});
        assert!(parse_response(&event_frame).is_none());
        assert!(parse_event(&event_frame).is_some());
    }

    #[test]
    fn command_serializes_in_wire_order() {
        let cmd = CdpCommand {
            id: 9,
            method: "DOM.getDocument".into(),
            params: serde_json::json!({}),
        };
        let wire = serde_json::to_value(&cmd).unwrap();
        assert_eq!(wire["id"], 9);
        assert_eq!(wire["method"], "DOM.getDocument");
    }
}
