//! Gateway -> backend direction.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dsbridge_db::{Database, EditOutcome, InboundMessage, RetryPolicy};
use dsbridge_moderation::ModerationFilter;
use dsbridge_types::events::{BackendEvent, DeletedMessage, GatewayEvent, GatewayMessage};

use crate::gateway::ChatGateway;
use crate::link::BackendLink;
use crate::middleware::{Handler, handler, log_failures, skip_own_messages};

/// Records gateway traffic in the store and announces it to the backend.
#[derive(Clone)]
pub struct GatewayRelay {
    db: Database,
    gateway: Arc<dyn ChatGateway>,
    link: BackendLink,
    filter: Arc<ModerationFilter>,
    policy: RetryPolicy,
}

/// The composed gateway handlers, ready to be pumped.
#[derive(Clone)]
pub struct GatewayHandlers {
    pub create: Handler<GatewayMessage>,
    pub edit: Handler<GatewayMessage>,
    pub delete: Handler<DeletedMessage>,
}

impl GatewayRelay {
    pub fn new(
        db: Database,
        gateway: Arc<dyn ChatGateway>,
        link: BackendLink,
        filter: Arc<ModerationFilter>,
    ) -> Self {
        Self {
            db,
            gateway,
            link,
            filter,
            policy: RetryPolicy::default(),
        }
    }

    /// Retry policy for each storage step. Gateway calls are never retried.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Wrap each operation with the relay middleware: own-message filtering
    /// for creates and edits, then failure logging.
    pub fn handlers(&self) -> GatewayHandlers {
        let relay = self.clone();
        let create = handler(move |message: GatewayMessage| {
            let relay = relay.clone();
            async move { relay.on_message_create(message).await }
        });

        let relay = self.clone();
        let edit = handler(move |message: GatewayMessage| {
            let relay = relay.clone();
            async move { relay.on_message_edit(message).await }
        });

        let relay = self.clone();
        let delete = handler(move |deleted: DeletedMessage| {
            let relay = relay.clone();
            async move { relay.on_message_delete(deleted).await }
        });

        GatewayHandlers {
            create: log_failures(
                "message-create",
                skip_own_messages(self.gateway.clone(), create),
            ),
            edit: log_failures("message-edit", skip_own_messages(self.gateway.clone(), edit)),
            delete: log_failures("message-delete", delete),
        }
    }

    pub async fn on_message_create(&self, message: GatewayMessage) -> Result<()> {
        let verdict = self.filter.moderate(&message.content);
        if verdict.is_suppressed() {
            info!(
                "Gateway message {} contains markup, removing it at the source",
                message.id
            );
            return self.delete_at_source(message.channel_id, message.id).await;
        }
        if !verdict.is_clean() {
            debug!(
                "Gateway message {} redacted: {:?}",
                message.id, verdict.redactions
            );
        }

        let inbound = InboundMessage {
            origin_channel_id: message.channel_id,
            origin_message_id: message.id,
            origin_user_id: message.author_id,
            text: verdict.text,
        };
        let row = self
            .db
            .unit_of_work_with_retry("record-message", self.policy, move |uow| {
                uow.record_message(&inbound, Utc::now())
            })
            .await?;

        self.link.emit(BackendEvent::NewMessage { message_id: row.id })?;
        info!("Gateway message {} relayed as {}", message.id, row.id);
        Ok(())
    }

    pub async fn on_message_edit(&self, message: GatewayMessage) -> Result<()> {
        let verdict = self.filter.moderate(&message.content);
        if verdict.is_suppressed() {
            info!(
                "Edit of gateway message {} contains markup, removing it at the source",
                message.id
            );
            self.delete_at_source(message.channel_id, message.id).await?;
            return self
                .on_message_delete(DeletedMessage {
                    id: message.id,
                    channel_id: message.channel_id,
                })
                .await;
        }

        let origin_message_id = message.id;
        let text = verdict.text;
        let outcome = self
            .db
            .unit_of_work_with_retry("supersede-message", self.policy, move |uow| {
                uow.supersede(origin_message_id, &text, Utc::now())
            })
            .await?;

        let (before, after) = match outcome {
            EditOutcome::Superseded { before, after } => (before, after),
            EditOutcome::Unchanged(row) => {
                debug!(
                    "Edit of gateway message {} leaves {} unchanged, skipping",
                    message.id, row.id
                );
                return Ok(());
            }
            EditOutcome::Unknown => {
                warn!("Edit for unknown gateway message {}, skipping", message.id);
                return Ok(());
            }
        };

        self.link.emit(BackendEvent::EditMessage {
            before_message_id: before.id,
            after_message_id: after.id,
        })?;
        info!(
            "Gateway edit of {} relayed ({} -> {})",
            message.id, before.id, after.id
        );
        Ok(())
    }

    pub async fn on_message_delete(&self, deleted: DeletedMessage) -> Result<()> {
        let origin_message_id = deleted.id;
        let retired = self
            .db
            .unit_of_work_with_retry("retire-message", self.policy, move |uow| {
                uow.retire(origin_message_id, Utc::now())
            })
            .await?;

        let Some(row) = retired else {
            warn!("Delete for unknown gateway message {}, skipping", deleted.id);
            return Ok(());
        };

        self.link.emit(BackendEvent::DeleteMessage { message_id: row.id })?;
        info!("Gateway delete of {} relayed as {}", deleted.id, row.id);
        Ok(())
    }

    async fn delete_at_source(&self, channel_id: i64, message_id: i64) -> Result<()> {
        match self.gateway.get_channel(channel_id).await? {
            Some(channel) => self.gateway.delete_message(&channel, message_id).await,
            None => {
                warn!(
                    "Gateway channel {} not visible, cannot remove message {}",
                    channel_id, message_id
                );
                Ok(())
            }
        }
    }
}

/// Feed gateway events to `handlers` one at a time, in arrival order, until
/// the gateway client closes the queue.
pub async fn run_gateway_events(mut events: mpsc::Receiver<GatewayEvent>, handlers: GatewayHandlers) {
    while let Some(event) = events.recv().await {
        let result = match event {
            GatewayEvent::Ready { user_id, username } => {
                info!("Logged in to gateway as {} ({})", username, user_id);
                Ok(())
            }
            GatewayEvent::MessageCreate(message) => (handlers.create)(message).await,
            GatewayEvent::MessageEdit(message) => (handlers.edit)(message).await,
            GatewayEvent::MessageDelete(deleted) => (handlers.delete)(deleted).await,
        };
        if let Err(e) = result {
            warn!("Gateway event dropped: {:#}", e);
        }
    }
    info!("Gateway event queue closed");
}
