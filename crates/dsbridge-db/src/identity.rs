//! Identity mapping between gateway messages and bridge rows.
//!
//! Rows are never deleted. An edit hides the current row and inserts a
//! successor; a delete hides the current row. At most one row per logical
//! message is visible at any time, and none after a delete.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::UnitOfWork;
use crate::error::StoreError;
use crate::models::{ChannelRow, MessageRow, NewMessage};

/// A gateway message as the store records it.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin_channel_id: i64,
    pub origin_message_id: i64,
    pub origin_user_id: i64,
    pub text: String,
}

/// A row resolved to everything needed to mirror it on the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub message: MessageRow,
    pub channel: ChannelRow,
    /// Display name of the local author, when the row has one.
    pub author: Option<String>,
}

impl Mapping {
    /// Gateway channel this row is mirrored into, if the channel is mapped.
    pub fn origin_channel_id(&self) -> Option<i64> {
        self.channel.origin_channel_id
    }
}

/// What [`UnitOfWork::supersede`] did with an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Superseded { before: MessageRow, after: MessageRow },
    /// The visible row already has this text.
    Unchanged(MessageRow),
    /// No visible row mirrors the edited message.
    Unknown,
}

impl UnitOfWork<'_> {
    /// Store a new gateway message, creating its channel on first sight.
    pub fn record_message(&self, inbound: &InboundMessage, now: DateTime<Utc>) -> Result<MessageRow> {
        let channel = self.upsert_channel(inbound.origin_channel_id, now)?;
        let row = self.insert_message(&NewMessage {
            channel_id: channel.id,
            origin_message_id: Some(inbound.origin_message_id),
            user_id: None,
            origin_user_id: Some(inbound.origin_user_id),
            text: inbound.text.clone(),
            created_at: now,
            last_updated: now,
        })?;
        debug!(
            message_id = row.id,
            origin_message_id = inbound.origin_message_id,
            "recorded gateway message"
        );
        Ok(row)
    }

    /// Extend the edit chain of gateway message `origin_message_id`: hide the
    /// current row and insert a successor with `text`, carrying forward
    /// `created_at` and author identity. An edit that leaves the text as it
    /// is (link unfurls, pins) does not extend the chain.
    pub fn supersede(
        &self,
        origin_message_id: i64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<EditOutcome> {
        let Some(before) = self.current_message_by_origin(origin_message_id)? else {
            return Ok(EditOutcome::Unknown);
        };
        if before.text == text {
            return Ok(EditOutcome::Unchanged(before));
        }

        self.hide_message(before.id, now)?;
        let after = self.insert_message(&NewMessage {
            channel_id: before.channel_id,
            origin_message_id: Some(origin_message_id),
            user_id: before.user_id,
            origin_user_id: before.origin_user_id,
            text: text.to_string(),
            created_at: before.created_at,
            last_updated: now,
        })?;

        // Return the before row as it now stands
        let before = self.require_message(before.id)?;
        Ok(EditOutcome::Superseded { before, after })
    }

    /// Hide the visible row mirroring gateway message `origin_message_id`.
    pub fn retire(&self, origin_message_id: i64, now: DateTime<Utc>) -> Result<Option<MessageRow>> {
        let Some(current) = self.current_message_by_origin(origin_message_id)? else {
            return Ok(None);
        };
        self.hide_message(current.id, now)?;
        Ok(Some(self.require_message(current.id)?))
    }

    /// Load row `id` with its channel and author.
    pub fn resolve(&self, id: i64) -> Result<Option<Mapping>> {
        let Some(message) = self.message(id)? else {
            return Ok(None);
        };
        let channel = self.channel(message.channel_id)?.ok_or(StoreError::NotFound {
            entity: "channel",
            id: message.channel_id,
        })?;
        let author = match message.user_id {
            Some(user_id) => self.user(user_id)?.map(|u| u.display_name),
            None => None,
        };
        Ok(Some(Mapping {
            message,
            channel,
            author,
        }))
    }
}
