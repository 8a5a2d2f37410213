use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::UnitOfWork;
use crate::error::StoreError;
use crate::models::{ChannelRow, MessageRow, NewMessage, UserRow};

const CHANNEL_COLUMNS: &str =
    "id, origin_channel_id, public, closed, email_notifs, created_at, last_updated";

const MESSAGE_COLUMNS: &str = "id, channel_id, origin_message_id, user_id, origin_user_id, \
     text, hidden, created_at, last_updated";

impl UnitOfWork<'_> {
    // -- Channels --

    pub fn channel(&self, id: i64) -> Result<Option<ChannelRow>> {
        let sql = format!("SELECT {} FROM chat_channels WHERE id = ?1", CHANNEL_COLUMNS);
        let row = self.tx.query_row(&sql, [id], channel_from_row).optional()?;
        Ok(row)
    }

    pub fn channel_by_origin(&self, origin_channel_id: i64) -> Result<Option<ChannelRow>> {
        let sql = format!(
            "SELECT {} FROM chat_channels WHERE origin_channel_id = ?1",
            CHANNEL_COLUMNS
        );
        let row = self
            .tx
            .query_row(&sql, [origin_channel_id], channel_from_row)
            .optional()?;
        Ok(row)
    }

    /// Insert a channel with default flags (private, open, notifications on).
    pub fn insert_channel(
        &self,
        origin_channel_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ChannelRow> {
        self.tx.execute(
            "INSERT INTO chat_channels (origin_channel_id, created_at, last_updated) VALUES (?1, ?2, ?2)",
            rusqlite::params![origin_channel_id, now],
        )?;
        let id = self.tx.last_insert_rowid();
        self.channel(id)?
            .ok_or_else(|| StoreError::NotFound { entity: "channel", id }.into())
    }

    /// Find the channel mapped to `origin_channel_id`, creating it on first
    /// sight.
    pub fn upsert_channel(&self, origin_channel_id: i64, now: DateTime<Utc>) -> Result<ChannelRow> {
        if let Some(channel) = self.channel_by_origin(origin_channel_id)? {
            return Ok(channel);
        }
        self.insert_channel(Some(origin_channel_id), now)
    }

    // -- Messages --

    pub fn message(&self, id: i64) -> Result<Option<MessageRow>> {
        let sql = format!("SELECT {} FROM chat_messages WHERE id = ?1", MESSAGE_COLUMNS);
        let row = self.tx.query_row(&sql, [id], message_from_row).optional()?;
        Ok(row)
    }

    /// Like [`UnitOfWork::message`] but a missing row is an error.
    pub fn require_message(&self, id: i64) -> Result<MessageRow> {
        self.message(id)?
            .ok_or_else(|| StoreError::NotFound { entity: "message", id }.into())
    }

    /// The non-hidden row mirroring gateway message `origin_message_id`.
    pub fn current_message_by_origin(&self, origin_message_id: i64) -> Result<Option<MessageRow>> {
        let sql = format!(
            "SELECT {} FROM chat_messages
             WHERE origin_message_id = ?1 AND hidden = 0
             ORDER BY id DESC
             LIMIT 1",
            MESSAGE_COLUMNS
        );
        let row = self
            .tx
            .query_row(&sql, [origin_message_id], message_from_row)
            .optional()?;
        Ok(row)
    }

    /// All non-hidden rows in a channel, oldest first.
    pub fn current_messages(&self, channel_id: i64) -> Result<Vec<MessageRow>> {
        let sql = format!(
            "SELECT {} FROM chat_messages
             WHERE channel_id = ?1 AND hidden = 0
             ORDER BY created_at, id",
            MESSAGE_COLUMNS
        );
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt
            .query_map([channel_id], message_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_message(&self, new: &NewMessage) -> Result<MessageRow> {
        self.tx.execute(
            "INSERT INTO chat_messages
                (channel_id, origin_message_id, user_id, origin_user_id, text, hidden, created_at, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
            rusqlite::params![
                new.channel_id,
                new.origin_message_id,
                new.user_id,
                new.origin_user_id,
                new.text,
                new.created_at,
                new.last_updated,
            ],
        )?;
        self.require_message(self.tx.last_insert_rowid())
    }

    /// Mark a row hidden. Hiding an already hidden row only bumps
    /// `last_updated`.
    pub fn hide_message(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        let changed = self.tx.execute(
            "UPDATE chat_messages SET hidden = 1, last_updated = ?2 WHERE id = ?1",
            rusqlite::params![id, now],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "message", id }.into());
        }
        Ok(())
    }

    /// Record the gateway-side id of a row. An origin id is immutable once
    /// set: re-stamping the same value is a no-op, a different value is
    /// rejected.
    pub fn stamp_origin(&self, id: i64, origin_message_id: i64, now: DateTime<Utc>) -> Result<()> {
        let changed = self.tx.execute(
            "UPDATE chat_messages SET origin_message_id = ?2, last_updated = ?3
             WHERE id = ?1 AND origin_message_id IS NULL",
            rusqlite::params![id, origin_message_id, now],
        )?;
        if changed == 1 {
            return Ok(());
        }

        let row = self.require_message(id)?;
        match row.origin_message_id {
            Some(existing) if existing == origin_message_id => Ok(()),
            Some(existing) => Err(StoreError::OriginConflict {
                id,
                existing,
                requested: origin_message_id,
            }
            .into()),
            None => Err(StoreError::NotFound { entity: "message", id }.into()),
        }
    }

    // -- Users --

    pub fn user(&self, id: i64) -> Result<Option<UserRow>> {
        let row = self
            .tx
            .query_row(
                "SELECT id, display_name FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        display_name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn insert_user(&self, display_name: &str) -> Result<UserRow> {
        self.tx
            .execute("INSERT INTO users (display_name) VALUES (?1)", [display_name])?;
        Ok(UserRow {
            id: self.tx.last_insert_rowid(),
            display_name: display_name.to_string(),
        })
    }
}

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        origin_channel_id: row.get(1)?,
        public: row.get(2)?,
        closed: row.get(3)?,
        email_notifs: row.get(4)?,
        created_at: row.get(5)?,
        last_updated: row.get(6)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        origin_message_id: row.get(2)?,
        user_id: row.get(3)?,
        origin_user_id: row.get(4)?,
        text: row.get(5)?,
        hidden: row.get(6)?,
        created_at: row.get(7)?,
        last_updated: row.get(8)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
