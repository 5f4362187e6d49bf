//! The persistent socket session bound to one pad.
//!
//! Frames are JSON arrays: a command is emitted as `[name, arg…]` and every
//! command expects exactly one reply `[name, payload]` whose first element
//! echoes the command name (or an explicitly expected alternate). There is no
//! pooling and no automatic reconnection: a dropped socket surfaces as a
//! command failure on the next `run`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{self, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::errors::PadError;
use crate::session::AUTH_COOKIE;

/// How long `run` waits for the matching reply.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Room-join command issued right after the socket opens.
const JOIN_COMMAND: &str = "connexion";

/// Best-effort "leaving" notification emitted on close.
const LEAVE_COMMAND: &str = "sortie";

/// The transport seam: emit one frame, await one frame. The production
/// implementation speaks WebSocket; tests script replies.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn emit(&mut self, frame: Value) -> Result<(), PadError>;

    /// The next JSON frame, or `None` when nothing arrived in time.
    async fn receive(&mut self, timeout: Duration) -> Result<Option<Value>, PadError>;

    async fn close(&mut self);
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// WebSocket transport against the service, authenticated via the session
/// cookie in the handshake headers.
pub struct WsTransport {
    write: WsSink,
    read: WsSource,
}

impl WsTransport {
    pub async fn dial(domain: &str, cookie: &str) -> Result<Self, PadError> {
        let url = socket_url(domain);
        let mut request = url
            .clone()
            .into_client_request()
            .map_err(PadError::Socket)?;
        let header = HeaderValue::from_str(&format!("{AUTH_COOKIE}={cookie}"))
            .map_err(|_| PadError::Scrape("cookie not header-safe".into()))?;
        request.headers_mut().insert(http::header::COOKIE, header);
        debug!(%url, "dialing pad socket");
        let (stream, _) = connect_async(request).await?;
        let (write, read) = stream.split();
        Ok(WsTransport { write, read })
    }
}

#[async_trait]
impl SocketTransport for WsTransport {
    async fn emit(&mut self, frame: Value) -> Result<(), PadError> {
        self.write
            .send(Message::Text(frame.to_string().into()))
            .await?;
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Option<Value>, PadError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let next = match tokio::time::timeout(remaining, self.read.next()).await {
                Err(_) => return Ok(None),
                Ok(next) => next,
            };
            match next {
                Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) => {
                        warn!(error = %e, "discarding non-JSON socket frame");
                        continue;
                    }
                },
                // Control frames are answered by the stream itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(WsError::ConnectionClosed.into()),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.write.send(Message::Close(None)).await;
        let _ = self.write.flush().await;
    }
}

/// `wss://…/ws` for an `https://` domain, `ws://…/ws` otherwise.
fn socket_url(domain: &str) -> String {
    let base = if let Some(rest) = domain.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = domain.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("wss://{domain}")
    };
    format!("{}/ws", base.trim_end_matches('/'))
}

/// Everything a connection needs to join a pad's room and issue commands.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub domain: String,
    pub cookie: String,
    pub pad_id: u64,
    pub pad_hash: String,
    pub username: String,
    pub name: String,
    pub color: String,
}

/// A pad connection: Disconnected or Connected, nothing in between.
/// At most one open socket; opening while Connected is a no-op.
pub struct Connection {
    config: ConnectionConfig,
    transport: Option<Box<dyn SocketTransport>>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Connection {
            config,
            transport: None,
        }
    }

    /// A connection over an already-open transport. The room join is still
    /// the caller's first command.
    pub fn with_transport(config: ConnectionConfig, transport: Box<dyn SocketTransport>) -> Self {
        Connection {
            config,
            transport: Some(transport),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The pad's string form, used in error diagnostics.
    pub fn pad_label(&self) -> String {
        format!("#{}", self.config.pad_id)
    }

    /// Open the socket and join the pad's room. No-op when already
    /// Connected. A missing acknowledgement within the timeout is fatal for
    /// this attempt; no retry.
    pub async fn connect(&mut self) -> Result<(), PadError> {
        if self.transport.is_some() {
            return Ok(());
        }
        let transport = WsTransport::dial(&self.config.domain, &self.config.cookie).await?;
        self.transport = Some(Box::new(transport));

        let join = self
            .send_command(
                JOIN_COMMAND,
                JOIN_COMMAND,
                vec![json!({
                    "pad": self.config.pad_id,
                    "identifiant": self.config.username,
                    "nom": self.config.name,
                })],
            )
            .await;
        if let Err(e) = join {
            // Failed join leaves the connection Disconnected.
            if let Some(mut transport) = self.transport.take() {
                transport.close().await;
            }
            return Err(e);
        }
        debug!(pad = self.config.pad_id, "joined pad room");
        Ok(())
    }

    /// Emit a command and await its matching reply. Connects first when
    /// Disconnected. Returns the reply's payload element.
    pub async fn run(&mut self, command: &str, args: Vec<Value>) -> Result<Value, PadError> {
        self.run_expecting(command, command, args).await
    }

    /// Like `run`, for commands whose reply echoes a different name.
    pub async fn run_expecting(
        &mut self,
        command: &str,
        expected: &str,
        args: Vec<Value>,
    ) -> Result<Value, PadError> {
        if self.transport.is_none() {
            self.connect().await?;
        }
        self.send_command(command, expected, args).await
    }

    /// The emit/receive exchange over an already-open transport.
    async fn send_command(
        &mut self,
        command: &str,
        expected: &str,
        args: Vec<Value>,
    ) -> Result<Value, PadError> {
        let pad = self.pad_label();
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => {
                return Err(PadError::CommandFailed {
                    command: command.to_string(),
                    pad,
                    reply: "connection unavailable".to_string(),
                });
            }
        };

        let mut frame = vec![json!(command)];
        frame.extend(args);
        transport.emit(Value::Array(frame)).await?;

        let reply = match transport.receive(COMMAND_TIMEOUT).await? {
            Some(reply) => reply,
            None => {
                return Err(PadError::CommandTimeout {
                    command: command.to_string(),
                    pad,
                    timeout_secs: COMMAND_TIMEOUT.as_secs(),
                });
            }
        };

        let name = reply.get(0).and_then(Value::as_str);
        if name != Some(expected) {
            return Err(PadError::CommandFailed {
                command: command.to_string(),
                pad,
                reply: reply.to_string(),
            });
        }
        Ok(reply.get(1).cloned().unwrap_or(Value::Null))
    }

    /// Best-effort leave notification, then drop the socket. Safe to call
    /// repeatedly and from error paths.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport
                .emit(json!([
                    LEAVE_COMMAND,
                    self.config.pad_id,
                    self.config.username
                ]))
                .await;
            transport.close().await;
            debug!(pad = self.config.pad_id, "pad connection closed");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// A transport with scripted replies that records every emitted frame.
    pub struct ScriptedTransport {
        pub sent: Arc<Mutex<Vec<Value>>>,
        replies: VecDeque<Value>,
    }

    impl ScriptedTransport {
        pub fn new(replies: Vec<Value>) -> (Self, Arc<Mutex<Vec<Value>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (
                ScriptedTransport {
                    sent: sent.clone(),
                    replies: replies.into(),
                },
                sent,
            )
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn emit(&mut self, frame: Value) -> Result<(), PadError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn receive(&mut self, _timeout: Duration) -> Result<Option<Value>, PadError> {
            Ok(self.replies.pop_front())
        }

        async fn close(&mut self) {}
    }

    pub fn test_config(pad_id: u64) -> ConnectionConfig {
        ConnectionConfig {
            domain: "https://pads.example".to_string(),
            cookie: "tok".to_string(),
            pad_id,
            pad_hash: "abc".to_string(),
            username: "alice".to_string(),
            name: "Alice A.".to_string(),
            color: "#112233".to_string(),
        }
    }

    pub fn scripted_connection(
        pad_id: u64,
        replies: Vec<Value>,
    ) -> (Connection, Arc<Mutex<Vec<Value>>>) {
        let (transport, sent) = ScriptedTransport::new(replies);
        (
            Connection::with_transport(test_config(pad_id), Box::new(transport)),
            sent,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::scripted_connection;
    use super::*;

    #[test]
    fn socket_url_maps_schemes() {
        assert_eq!(socket_url("https://digipad.app"), "wss://digipad.app/ws");
        assert_eq!(socket_url("http://localhost:8000"), "ws://localhost:8000/ws");
        assert_eq!(socket_url("pads.example"), "wss://pads.example/ws");
    }

    #[tokio::test]
    async fn run_returns_payload_on_matching_reply() {
        let (mut conn, sent) =
            scripted_connection(7, vec![json!(["ping", {"ok": true}])]);
        let payload = conn.run("ping", vec![json!(1)]).await.unwrap();
        assert_eq!(payload["ok"], true);
        assert_eq!(sent.lock().unwrap().as_slice(), &[json!(["ping", 1])]);
    }

    #[tokio::test]
    async fn mismatched_reply_is_command_failed_with_diagnostics() {
        let (mut conn, _sent) =
            scripted_connection(42, vec![json!(["erreur", "nope"])]);
        let err = conn.run("ajouterbloc", vec![]).await.unwrap_err();
        match &err {
            PadError::CommandFailed { command, pad, reply } => {
                assert_eq!(command, "ajouterbloc");
                assert_eq!(pad, "#42");
                assert!(reply.contains("erreur"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("ajouterbloc"));
        assert!(msg.contains("#42"));
    }

    #[tokio::test]
    async fn missing_reply_is_command_timeout() {
        let (mut conn, _sent) = scripted_connection(1, vec![]);
        let err = conn.run("commenterbloc", vec![]).await.unwrap_err();
        assert!(matches!(err, PadError::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn alternate_expected_name_is_accepted() {
        let (mut conn, _sent) =
            scripted_connection(1, vec![json!(["autre", null])]);
        let payload = conn
            .run_expecting("commande", "autre", vec![])
            .await
            .unwrap();
        assert_eq!(payload, Value::Null);
    }

    #[tokio::test]
    async fn close_twice_stays_disconnected_without_error() {
        let (mut conn, sent) = scripted_connection(5, vec![]);
        assert!(conn.is_connected());
        conn.close().await;
        assert!(!conn.is_connected());
        conn.close().await;
        assert!(!conn.is_connected());
        // Exactly one leave notification was emitted.
        let frames = sent.lock().unwrap();
        assert_eq!(frames.as_slice(), &[json!(["sortie", 5, "alice"])]);
    }
}
