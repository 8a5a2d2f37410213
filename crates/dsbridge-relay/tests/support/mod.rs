#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use dsbridge_db::{Database, NewMessage};
use dsbridge_moderation::{BannedWords, ModerationFilter};
use dsbridge_relay::{BackendLink, BackendRelay, ChatGateway, GatewayRelay};
use dsbridge_types::events::{BackendEvent, GatewayMessage};
use dsbridge_types::models::{GatewayChannel, OutboundContent};

/// The bridge's own gateway account.
pub const BRIDGE_USER: i64 = 1;
/// A gateway channel the bridge can see.
pub const CHANNEL: i64 = 500;
/// First id handed out by the fake for sent messages.
pub const FIRST_GATEWAY_ID: i64 = 9000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { channel: i64, content: OutboundContent },
    Edit { channel: i64, message: i64, content: OutboundContent },
    Delete { channel: i64, message: i64 },
}

pub struct FakeGateway {
    visible: HashSet<i64>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI64,
    pub fail_deletes: AtomicBool,
}

impl FakeGateway {
    pub fn new(visible: impl IntoIterator<Item = i64>) -> Self {
        Self {
            visible: visible.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(FIRST_GATEWAY_ID),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for FakeGateway {
    fn self_id(&self) -> Option<i64> {
        Some(BRIDGE_USER)
    }

    async fn get_channel(&self, channel_id: i64) -> Result<Option<GatewayChannel>> {
        Ok(self.visible.contains(&channel_id).then(|| GatewayChannel {
            id: channel_id,
            name: Some(format!("channel-{}", channel_id)),
        }))
    }

    async fn send_message(&self, channel: &GatewayChannel, content: &OutboundContent) -> Result<i64> {
        self.calls.lock().unwrap().push(Call::Send {
            channel: channel.id,
            content: content.clone(),
        });
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit_message(
        &self,
        channel: &GatewayChannel,
        message_id: i64,
        content: &OutboundContent,
    ) -> Result<i64> {
        self.calls.lock().unwrap().push(Call::Edit {
            channel: channel.id,
            message: message_id,
            content: content.clone(),
        });
        Ok(message_id)
    }

    async fn delete_message(&self, channel: &GatewayChannel, message_id: i64) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Delete {
            channel: channel.id,
            message: message_id,
        });
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("Unknown Message");
        }
        Ok(())
    }
}

/// Both relays wired to one in-memory store, one fake gateway and a link
/// whose backend side is `emitted`.
pub struct Harness {
    pub db: Database,
    pub gateway: Arc<FakeGateway>,
    pub link: BackendLink,
    pub emitted: mpsc::UnboundedReceiver<BackendEvent>,
    pub to_backend: GatewayRelay,
    pub to_gateway: BackendRelay,
}

impl Harness {
    pub fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let gateway = Arc::new(FakeGateway::new([CHANNEL]));
        let link = BackendLink::new();
        let (tx, emitted) = mpsc::unbounded_channel();
        link.attach(tx).unwrap();

        let filter = ModerationFilter::new(&BannedWords::from_lines(["darn"]), Some("bridge.example")).unwrap();
        let to_backend = GatewayRelay::new(db.clone(), gateway.clone(), link.clone(), Arc::new(filter));
        let to_gateway = BackendRelay::new(db.clone(), gateway.clone(), link.clone());

        Self {
            db,
            gateway,
            link,
            emitted,
            to_backend,
            to_gateway,
        }
    }

    /// Everything emitted to the backend so far.
    pub fn drain(&mut self) -> Vec<BackendEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.emitted.try_recv() {
            events.push(event);
        }
        events
    }

    /// A row written by the backend itself: local author, no gateway id yet.
    pub fn backend_message(&self, origin_channel_id: Option<i64>, author: &str, text: &str) -> i64 {
        insert_backend_message(&self.db, origin_channel_id, author, text)
    }

    /// A backend edit: a successor row in the same channel and by the same
    /// author as `before`.
    pub fn backend_edit(&self, before: i64, text: &str) -> i64 {
        let text = text.to_string();
        self.db
            .transact(move |uow| {
                let prev = uow.require_message(before)?;
                let now = Utc::now();
                let row = uow.insert_message(&NewMessage {
                    channel_id: prev.channel_id,
                    origin_message_id: None,
                    user_id: prev.user_id,
                    origin_user_id: prev.origin_user_id,
                    text,
                    created_at: prev.created_at,
                    last_updated: now,
                })?;
                Ok(row.id)
            })
            .unwrap()
    }
}

/// Insert a backend-authored row straight into `db` and return its id.
pub fn insert_backend_message(db: &Database, origin_channel_id: Option<i64>, author: &str, text: &str) -> i64 {
    let author = author.to_string();
    let text = text.to_string();
    db.transact(move |uow| {
        let now = Utc::now();
        let user = uow.insert_user(&author)?;
        let channel = match origin_channel_id {
            Some(origin) => uow.upsert_channel(origin, now)?,
            None => uow.insert_channel(None, now)?,
        };
        let row = uow.insert_message(&NewMessage {
            channel_id: channel.id,
            origin_message_id: None,
            user_id: Some(user.id),
            origin_user_id: None,
            text,
            created_at: now,
            last_updated: now,
        })?;
        Ok(row.id)
    })
    .unwrap()
}

pub fn gateway_message(id: i64, author_id: i64, content: &str) -> GatewayMessage {
    GatewayMessage {
        id,
        channel_id: CHANNEL,
        author_id,
        content: content.to_string(),
    }
}
