use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{error, info, trace, warn};

use dsbridge_types::events::{BackendEvent, Inbound, decode_frame, encode_frame};

use crate::auth::Credentials;

/// Ping interval on the backend socket.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// One live backend connection, seen from the bridge.
///
/// Dropping `outgoing` (after detaching it from the link) closes the socket;
/// `incoming` ends when the backend goes away.
pub struct Session {
    pub outgoing: mpsc::UnboundedSender<BackendEvent>,
    pub incoming: mpsc::UnboundedReceiver<Inbound>,
}

/// The far side of a [`Session`]: what the transport reads from and writes to.
pub struct SessionPeer {
    pub from_bridge: mpsc::UnboundedReceiver<BackendEvent>,
    pub to_bridge: mpsc::UnboundedSender<Inbound>,
}

impl Session {
    pub fn pair() -> (Session, SessionPeer) {
        let (outgoing, from_bridge) = mpsc::unbounded_channel();
        let (to_bridge, incoming) = mpsc::unbounded_channel();
        (
            Session { outgoing, incoming },
            SessionPeer {
                from_bridge,
                to_bridge,
            },
        )
    }
}

/// Opens backend sessions. One call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Session>;
}

/// Connects to the backend over a WebSocket and speaks namespaced JSON frames.
pub struct WsConnector {
    url: String,
    namespace: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Session> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .with_context(|| format!("invalid backend url {}", self.url))?;
        for (name, value) in credentials.headers() {
            request.headers_mut().insert(name, HeaderValue::from_str(value)?);
        }

        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .with_context(|| format!("connecting to {}", self.url))?;
        info!("Backend socket open at {} (namespace {})", self.url, self.namespace);

        let (mut sink, mut stream) = ws.split();
        let (session, peer) = Session::pair();
        let SessionPeer {
            mut from_bridge,
            to_bridge,
        } = peer;

        // Writer: bridge events -> socket, plus keepalive pings
        let namespace = self.namespace.clone();
        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;

            loop {
                tokio::select! {
                    event = from_bridge.recv() => {
                        let Some(event) = event else { break };
                        match encode_frame(&namespace, &event) {
                            Ok(text) => {
                                if sink.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                                trace!("Sent {} to backend", event.kind());
                            }
                            Err(e) => error!("Failed to encode {}: {}", event.kind(), e),
                        }
                    }
                    _ = heartbeat.tick() => {
                        if sink.send(Message::Ping(vec![].into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = sink.close().await;
        });

        // Reader: socket -> bridge
        let namespace = self.namespace.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let msg = match frame {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Backend socket error: {}", e);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match decode_frame(&namespace, text.as_str()) {
                        Ok(Some(inbound)) => {
                            if to_bridge.send(inbound).is_err() {
                                break;
                            }
                        }
                        Ok(None) => trace!("Ignoring frame outside {}", namespace),
                        Err(e) => warn!("Dropping malformed backend frame: {}", e),
                    },
                    Message::Close(frame) => {
                        info!("Backend closed the socket: {:?}", frame);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(session)
    }
}
