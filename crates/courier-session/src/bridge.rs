// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket bridge to the socket protocol client.
//!
//! The protocol client runs as a local sidecar that speaks JSON frames over a
//! WebSocket. Each [`SessionDriver::open`] dials the bridge, announces the
//! credential directory with a `hello` frame, and then translates inbound
//! frames into [`SessionEvent`]s. Outbound requests carry an id; the bridge
//! answers each with an `ack` or an `error` frame naming that id.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use courier_core::{CourierError, MessageId};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::driver::{MediaPayload, SessionDriver, SessionEvent, SessionHandle};
use crate::machine::CloseReason;

const TRANSPORT: &str = "socket";

/// Frames received from the bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Inbound {
    Qr {
        code: String,
    },
    Open,
    Close {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Ack {
        id: String,
        #[serde(default)]
        message_id: Option<String>,
    },
    Error {
        #[serde(default)]
        id: Option<String>,
        message: String,
    },
}

/// Frames sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Outbound<'a> {
    #[serde(rename_all = "camelCase")]
    Hello { session_path: &'a str },
    Send {
        id: &'a str,
        jid: &'a str,
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    SendMedia {
        id: &'a str,
        jid: &'a str,
        file_name: &'a str,
        mimetype: &'a str,
        /// Base64 payload.
        data: String,
        caption: &'a str,
    },
    Logout { id: &'a str },
}

type Reply = Result<Option<String>, String>;
type Pending = Arc<DashMap<String, oneshot::Sender<Reply>>>;

/// Bridge connection settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Credential directory owned by the bridge.
    pub session_path: PathBuf,
    /// How long a send waits for its ack.
    pub request_timeout: Duration,
}

/// [`SessionDriver`] backed by the WebSocket bridge.
#[derive(Debug, Clone)]
pub struct BridgeDriver {
    config: BridgeConfig,
}

impl BridgeDriver {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionDriver for BridgeDriver {
    async fn open(
        &self,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Box<dyn SessionHandle>, CourierError> {
        let (ws, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| CourierError::transport_with(TRANSPORT, "cannot reach session bridge", e))?;
        let (mut sink, mut stream) = ws.split();

        let session_path = self.config.session_path.display().to_string();
        let hello = encode(&Outbound::Hello {
            session_path: &session_path,
        })?;
        sink.send(hello)
            .await
            .map_err(|e| CourierError::transport_with(TRANSPORT, "bridge handshake failed", e))?;
        debug!(url = %self.config.url, "bridge connected");

        let pending: Pending = Arc::new(DashMap::new());
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let closing = matches!(frame, Message::Close(_));
                if let Err(e) = sink.send(frame).await {
                    debug!(error = %e, "bridge write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            let reason = loop {
                let frame = match stream.next().await {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => break CloseReason::Transient(format!("bridge stream error: {e}")),
                    None => break CloseReason::Transient("bridge connection lost".into()),
                };
                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => break CloseReason::Transient("bridge closed the connection".into()),
                    _ => continue,
                };
                match serde_json::from_str::<Inbound>(text.as_str()) {
                    Ok(Inbound::Qr { code }) => {
                        let _ = events.send(SessionEvent::PairingCode(code));
                    }
                    Ok(Inbound::Open) => {
                        let _ = events.send(SessionEvent::Open);
                    }
                    Ok(Inbound::Close { reason }) => break close_reason(reason.as_deref()),
                    Ok(Inbound::Ack { id, message_id }) => {
                        if let Some((_, tx)) = reader_pending.remove(&id) {
                            let _ = tx.send(Ok(message_id));
                        }
                    }
                    Ok(Inbound::Error { id: Some(id), message }) => {
                        if let Some((_, tx)) = reader_pending.remove(&id) {
                            let _ = tx.send(Err(message));
                        }
                    }
                    Ok(Inbound::Error { id: None, message }) => {
                        warn!(error = %message, "bridge reported an error");
                    }
                    Err(e) => debug!(error = %e, "ignoring unrecognized bridge frame"),
                }
            };
            // Fail outstanding requests; their senders drop here.
            reader_pending.clear();
            let _ = events.send(SessionEvent::Closed(reason));
        });

        Ok(Box::new(BridgeSession {
            out_tx,
            pending,
            timeout: self.config.request_timeout,
            reader,
            writer,
        }))
    }

    fn has_credentials(&self) -> bool {
        std::fs::read_dir(&self.config.session_path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    async fn purge_credentials(&self) -> Result<(), CourierError> {
        match tokio::fs::remove_dir_all(&self.config.session_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn close_reason(raw: Option<&str>) -> CloseReason {
    match raw {
        Some("logged_out" | "loggedOut") => CloseReason::LoggedOut,
        Some("pairing_timeout" | "qr_timeout" | "timedOut") => CloseReason::PairingTimeout,
        Some(other) => CloseReason::Transient(other.to_string()),
        None => CloseReason::Transient("closed by bridge".into()),
    }
}

fn encode(frame: &Outbound<'_>) -> Result<Message, CourierError> {
    serde_json::to_string(frame)
        .map(|json| Message::Text(json.into()))
        .map_err(|e| CourierError::Internal(format!("encode bridge frame: {e}")))
}

struct BridgeSession {
    out_tx: mpsc::UnboundedSender<Message>,
    pending: Pending,
    timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl BridgeSession {
    async fn request(&self, id: &str, frame: Message) -> Result<Option<String>, CourierError> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.to_string(), tx);

        if self.out_tx.send(frame).is_err() {
            self.pending.remove(id);
            return Err(CourierError::transport(TRANSPORT, "bridge connection is closed"));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(message_id))) => Ok(message_id),
            Ok(Ok(Err(message))) => Err(CourierError::transport(TRANSPORT, message)),
            Ok(Err(_)) => Err(CourierError::transport(
                TRANSPORT,
                "bridge closed before acknowledging",
            )),
            Err(_) => {
                self.pending.remove(id);
                Err(CourierError::Timeout {
                    duration: self.timeout,
                })
            }
        }
    }

    fn message_id(id: Option<String>, request_id: String) -> MessageId {
        MessageId(id.unwrap_or(request_id))
    }
}

#[async_trait]
impl SessionHandle for BridgeSession {
    async fn send_text(&self, jid: &str, body: &str) -> Result<MessageId, CourierError> {
        let id = uuid::Uuid::new_v4().to_string();
        let frame = encode(&Outbound::Send {
            id: &id,
            jid,
            text: body,
        })?;
        let reply = self.request(&id, frame).await?;
        Ok(Self::message_id(reply, id))
    }

    async fn send_media(
        &self,
        jid: &str,
        media: MediaPayload,
        caption: &str,
    ) -> Result<MessageId, CourierError> {
        let id = uuid::Uuid::new_v4().to_string();
        let frame = encode(&Outbound::SendMedia {
            id: &id,
            jid,
            file_name: &media.filename,
            mimetype: &media.content_type,
            data: base64::engine::general_purpose::STANDARD.encode(&media.bytes),
            caption,
        })?;
        let reply = self.request(&id, frame).await?;
        Ok(Self::message_id(reply, id))
    }

    async fn logout(&self) -> Result<(), CourierError> {
        let id = uuid::Uuid::new_v4().to_string();
        let frame = encode(&Outbound::Logout { id: &id })?;
        self.request(&id, frame).await.map(|_| ())
    }

    async fn close(&self) -> Result<(), CourierError> {
        let _ = self.out_tx.send(Message::Close(None));
        self.reader.abort();
        Ok(())
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;

    async fn bridge_server<F, Fut>(script: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = accept_async(tcp).await.unwrap();
            script(ws).await;
        });
        format!("ws://{addr}")
    }

    fn driver(url: String, dir: &std::path::Path) -> BridgeDriver {
        BridgeDriver::new(BridgeConfig {
            url,
            session_path: dir.join("session"),
            request_timeout: Duration::from_secs(2),
        })
    }

    fn text(json: serde_json::Value) -> Message {
        Message::Text(json.to_string().into())
    }

    async fn next_json(
        ws: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    ) -> serde_json::Value {
        loop {
            if let Message::Text(t) = ws.next().await.unwrap().unwrap() {
                return serde_json::from_str(t.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn relays_lifecycle_and_acks_sends() {
        let url = bridge_server(|mut ws| async move {
            let hello = next_json(&mut ws).await;
            assert_eq!(hello["type"], "hello");
            ws.send(text(serde_json::json!({"type": "qr", "code": "2@abc"})))
                .await
                .unwrap();
            ws.send(text(serde_json::json!({"type": "open"}))).await.unwrap();

            let send = next_json(&mut ws).await;
            assert_eq!(send["type"], "send");
            assert_eq!(send["jid"], "251911234567@s.whatsapp.net");
            ws.send(text(serde_json::json!({
                "type": "ack", "id": send["id"], "messageId": "3EB0AA"
            })))
            .await
            .unwrap();

            let media = next_json(&mut ws).await;
            assert_eq!(media["type"], "sendMedia");
            assert_eq!(media["fileName"], "invoice.png");
            ws.send(text(serde_json::json!({
                "type": "error", "id": media["id"], "message": "media rejected"
            })))
            .await
            .unwrap();

            ws.send(text(serde_json::json!({"type": "close", "reason": "logged_out"})))
                .await
                .unwrap();
        })
        .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = driver(url, dir.path()).open(tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(SessionEvent::PairingCode("2@abc".into())));
        assert_eq!(rx.recv().await, Some(SessionEvent::Open));

        let id = session
            .send_text("251911234567@s.whatsapp.net", "hello")
            .await
            .unwrap();
        assert_eq!(id.0, "3EB0AA");

        let err = session
            .send_media(
                "251911234567@s.whatsapp.net",
                MediaPayload {
                    bytes: vec![1, 2, 3],
                    filename: "invoice.png".into(),
                    content_type: "image/png".into(),
                },
                "",
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("media rejected"));

        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Closed(CloseReason::LoggedOut))
        );
    }

    #[tokio::test]
    async fn unreachable_bridge_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = driver("ws://127.0.0.1:1".into(), dir.path()).open(tx).await;
        assert!(matches!(result, Err(CourierError::Transport { .. })));
    }

    #[tokio::test]
    async fn credentials_are_purged_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver("ws://127.0.0.1:1".into(), dir.path());
        assert!(!driver.has_credentials());

        std::fs::create_dir_all(dir.path().join("session")).unwrap();
        std::fs::write(dir.path().join("session/creds.json"), "{}").unwrap();
        assert!(driver.has_credentials());

        driver.purge_credentials().await.unwrap();
        assert!(!driver.has_credentials());
        driver.purge_credentials().await.unwrap();
    }

    #[test]
    fn close_reasons_are_classified() {
        assert_eq!(close_reason(Some("logged_out")), CloseReason::LoggedOut);
        assert_eq!(close_reason(Some("qr_timeout")), CloseReason::PairingTimeout);
        assert!(matches!(
            close_reason(Some("stream_errored")),
            CloseReason::Transient(_)
        ));
        assert!(matches!(close_reason(None), CloseReason::Transient(_)));
    }
}
