use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use dsbridge_types::events::{DeletedMessage, GatewayEvent, GatewayMessage};

use super::{BotIdentity, snowflake};

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
const INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 15);

// Gateway opcodes
const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

#[derive(Debug, Deserialize)]
struct Payload {
    op: u8,
    #[serde(default)]
    d: Value,
    s: Option<i64>,
    t: Option<String>,
}

#[derive(Deserialize)]
struct Author {
    id: String,
    #[serde(default)]
    username: String,
}

#[derive(Deserialize)]
struct ReadyData {
    user: Author,
}

#[derive(Deserialize)]
struct MessageData {
    id: String,
    channel_id: String,
    author: Option<Author>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct DeleteData {
    id: String,
    channel_id: String,
}

/// Keeps a Discord gateway session open and forwards message events, in
/// order, to the relay's event queue.
pub struct GatewayListener {
    token: String,
    identity: BotIdentity,
    events: mpsc::Sender<GatewayEvent>,
    reconnect_interval: Duration,
}

impl GatewayListener {
    pub fn new(
        token: impl Into<String>,
        identity: BotIdentity,
        events: mpsc::Sender<GatewayEvent>,
        reconnect_interval: Duration,
    ) -> Self {
        Self {
            token: token.into(),
            identity,
            events,
            reconnect_interval,
        }
    }

    pub async fn run(self) {
        loop {
            match self.session().await {
                Ok(()) => info!("Discord gateway session closed"),
                Err(e) => error!("Discord gateway session failed: {:#}", e),
            }
            if self.events.is_closed() {
                info!("Gateway event queue closed, stopping listener");
                return;
            }
            tokio::time::sleep(self.reconnect_interval).await;
        }
    }

    async fn session(&self) -> Result<()> {
        let (ws, _) = tokio_tungstenite::connect_async(GATEWAY_URL)
            .await
            .context("connecting to Discord gateway")?;
        let (mut sink, mut stream) = ws.split();

        // Step 1: Hello carries the heartbeat interval
        let hello = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => break serde_json::from_str::<Payload>(text.as_str())?,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => bail!("gateway closed before Hello"),
            }
        };
        if hello.op != OP_HELLO {
            bail!("expected Hello, got op {}", hello.op);
        }
        let interval_ms = hello.d["heartbeat_interval"]
            .as_u64()
            .context("Hello without heartbeat_interval")?;

        // Step 2: Identify
        let identify = json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "dsbridge",
                    "device": "dsbridge",
                },
            },
        });
        sink.send(Message::Text(identify.to_string().into())).await?;

        let mut heartbeat = tokio::time::interval(Duration::from_millis(interval_ms));
        let mut seq: Option<i64> = None;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = json!({ "op": OP_HEARTBEAT, "d": seq });
                    sink.send(Message::Text(beat.to_string().into())).await?;
                }
                frame = stream.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            info!("Discord closed the gateway: {:?}", frame);
                            return Ok(());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    };

                    let payload: Payload = serde_json::from_str(text.as_str())?;
                    if payload.s.is_some() {
                        seq = payload.s;
                    }

                    match payload.op {
                        OP_DISPATCH => {
                            let kind = payload.t.unwrap_or_default();
                            match translate(&kind, payload.d) {
                                Ok(Some(event)) => {
                                    if let GatewayEvent::Ready { user_id, .. } = &event {
                                        self.identity.set(*user_id);
                                    }
                                    if self.events.send(event).await.is_err() {
                                        return Ok(());
                                    }
                                }
                                Ok(None) => trace!("Ignoring dispatch {}", kind),
                                Err(e) => warn!("Dropping malformed {} dispatch: {:#}", kind, e),
                            }
                        }
                        OP_HEARTBEAT => {
                            let beat = json!({ "op": OP_HEARTBEAT, "d": seq });
                            sink.send(Message::Text(beat.to_string().into())).await?;
                        }
                        OP_HEARTBEAT_ACK => trace!("Heartbeat acknowledged"),
                        OP_RECONNECT => {
                            info!("Discord requested a reconnect");
                            return Ok(());
                        }
                        OP_INVALID_SESSION => bail!("Discord invalidated the session"),
                        other => debug!("Unhandled gateway op {}", other),
                    }
                }
            }
        }
    }
}

/// Map a dispatch to a relay event. `Ok(None)` for dispatches the bridge does
/// not care about, and for updates that carry no content or author (embed
/// unfurls). Updates whose text did not change are dropped later by the relay.
fn translate(kind: &str, data: Value) -> Result<Option<GatewayEvent>> {
    let event = match kind {
        "READY" => {
            let ready: ReadyData = serde_json::from_value(data)?;
            GatewayEvent::Ready {
                user_id: snowflake(&ready.user.id)?,
                username: ready.user.username,
            }
        }
        "MESSAGE_CREATE" | "MESSAGE_UPDATE" => {
            let message: MessageData = serde_json::from_value(data)?;
            let (Some(author), Some(content)) = (message.author, message.content) else {
                return Ok(None);
            };
            let message = GatewayMessage {
                id: snowflake(&message.id)?,
                channel_id: snowflake(&message.channel_id)?,
                author_id: snowflake(&author.id)?,
                content,
            };
            if kind == "MESSAGE_CREATE" {
                GatewayEvent::MessageCreate(message)
            } else {
                GatewayEvent::MessageEdit(message)
            }
        }
        "MESSAGE_DELETE" => {
            let deleted: DeleteData = serde_json::from_value(data)?;
            GatewayEvent::MessageDelete(DeletedMessage {
                id: snowflake(&deleted.id)?,
                channel_id: snowflake(&deleted.channel_id)?,
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}
