//! Backend -> gateway direction.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use dsbridge_db::{Database, Mapping, RetryPolicy, StoreError};
use dsbridge_types::events::{BackendEvent, Inbound};
use dsbridge_types::models::{GatewayChannel, OutboundContent};

use crate::gateway::ChatGateway;
use crate::link::BackendLink;
use crate::middleware::{Handler, handler, log_failures};

/// Shown as the embed title when a row has no local author.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Mirrors backend `chat-message` events onto the gateway and echoes each
/// handled event back as an acknowledgement.
#[derive(Clone)]
pub struct BackendRelay {
    db: Database,
    gateway: Arc<dyn ChatGateway>,
    link: BackendLink,
    policy: RetryPolicy,
}

impl BackendRelay {
    pub fn new(db: Database, gateway: Arc<dyn ChatGateway>, link: BackendLink) -> Self {
        Self {
            db,
            gateway,
            link,
            policy: RetryPolicy::default(),
        }
    }

    /// Retry policy for each storage step. A retried step never repeats the
    /// gateway call that preceded it.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn handler(&self) -> Handler<Inbound> {
        let relay = self.clone();
        let dispatch = handler(move |inbound: Inbound| {
            let relay = relay.clone();
            async move { relay.dispatch(inbound).await }
        });
        log_failures("chat-message", dispatch)
    }

    pub async fn dispatch(&self, inbound: Inbound) -> Result<()> {
        match inbound {
            Inbound::Event(BackendEvent::NewMessage { message_id }) => {
                self.on_new_message(message_id).await
            }
            Inbound::Event(BackendEvent::EditMessage {
                before_message_id,
                after_message_id,
            }) => self.on_edit_message(before_message_id, after_message_id).await,
            Inbound::Event(BackendEvent::DeleteMessage { message_id }) => {
                self.on_delete_message(message_id).await
            }
            Inbound::Unknown { kind } => {
                error!("Unknown chat-message type {:?}, ignoring", kind);
                Ok(())
            }
        }
    }

    pub async fn on_new_message(&self, message_id: i64) -> Result<()> {
        let mapping = self.resolve(message_id).await?;

        if let Some(origin_message_id) = mapping.message.origin_message_id {
            debug!(
                "Message {} already mirrored as gateway message {}",
                message_id, origin_message_id
            );
        } else if let Some(channel) = self.mapped_channel(&mapping).await? {
            let content = OutboundContent::new(author_of(&mapping), mapping.message.text.clone());
            let origin_message_id = self.gateway.send_message(&channel, &content).await?;
            self.db
                .unit_of_work_with_retry("stamp-origin", self.policy, move |uow| {
                    uow.stamp_origin(message_id, origin_message_id, Utc::now())
                })
                .await?;
            info!(
                "Message {} sent to gateway as {}",
                message_id, origin_message_id
            );
        }

        self.ack(BackendEvent::NewMessage { message_id })
    }

    pub async fn on_edit_message(&self, before_message_id: i64, after_message_id: i64) -> Result<()> {
        let before = self.resolve(before_message_id).await?;
        let after = self
            .db
            .unit_of_work_with_retry("load-message", self.policy, move |uow| {
                uow.require_message(after_message_id)
            })
            .await?;

        let mut edited = None;
        if let Some(origin_message_id) = before.message.origin_message_id {
            if let Some(channel) = self.mapped_channel(&before).await? {
                let content = OutboundContent::new(author_of(&before), after.text.clone());
                let id = self
                    .gateway
                    .edit_message(&channel, origin_message_id, &content)
                    .await?;
                info!(
                    "Gateway message {} edited ({} -> {})",
                    id, before_message_id, after_message_id
                );
                edited = Some(id);
            }
        }

        let stamp = edited.or(before.message.origin_message_id);
        self.db
            .unit_of_work_with_retry("hide-and-stamp", self.policy, move |uow| {
                let now = Utc::now();
                uow.hide_message(before_message_id, now)?;
                if let Some(origin_message_id) = stamp {
                    uow.stamp_origin(after_message_id, origin_message_id, now)?;
                }
                Ok(())
            })
            .await?;

        self.ack(BackendEvent::EditMessage {
            before_message_id,
            after_message_id,
        })
    }

    pub async fn on_delete_message(&self, message_id: i64) -> Result<()> {
        let mapping = self.resolve(message_id).await?;

        if let Some(origin_message_id) = mapping.message.origin_message_id {
            // The gateway copy may already be gone; hiding the row still
            // has to happen.
            match self.mapped_channel(&mapping).await {
                Ok(Some(channel)) => {
                    match self.gateway.delete_message(&channel, origin_message_id).await {
                        Ok(()) => info!("Gateway message {} deleted", origin_message_id),
                        Err(e) => warn!(
                            "Could not delete gateway message {}: {:#}",
                            origin_message_id, e
                        ),
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(
                    "Could not look up channel for gateway message {}: {:#}",
                    origin_message_id, e
                ),
            }
        }

        self.db
            .unit_of_work_with_retry("hide-message", self.policy, move |uow| {
                uow.hide_message(message_id, Utc::now())
            })
            .await?;

        self.ack(BackendEvent::DeleteMessage { message_id })
    }

    async fn resolve(&self, message_id: i64) -> Result<Mapping> {
        let mapping = self
            .db
            .unit_of_work_with_retry("resolve-message", self.policy, move |uow| {
                uow.resolve(message_id)
            })
            .await?;
        Ok(mapping.ok_or(StoreError::NotFound {
            entity: "message",
            id: message_id,
        })?)
    }

    /// The gateway channel a row is mirrored into. `None` when the row's
    /// channel has no gateway counterpart or the gateway cannot see it.
    async fn mapped_channel(&self, mapping: &Mapping) -> Result<Option<GatewayChannel>> {
        let Some(origin_channel_id) = mapping.origin_channel_id() else {
            return Ok(None);
        };
        let channel = self.gateway.get_channel(origin_channel_id).await?;
        if channel.is_none() {
            warn!("Gateway channel {} is not visible", origin_channel_id);
        }
        Ok(channel)
    }

    fn ack(&self, event: BackendEvent) -> Result<()> {
        self.link.emit(event)?;
        Ok(())
    }
}

fn author_of(mapping: &Mapping) -> String {
    mapping
        .author
        .clone()
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string())
}
