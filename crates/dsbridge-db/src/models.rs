//! Database row types. These map directly to SQLite rows and are
//! distinct from the wire types in dsbridge-types.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: i64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    pub id: i64,
    pub origin_channel_id: Option<i64>,
    pub public: bool,
    pub closed: bool,
    pub email_notifs: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: i64,
    pub channel_id: i64,
    /// Gateway-side message id. Set once, when the gateway operation has
    /// succeeded.
    pub origin_message_id: Option<i64>,
    pub user_id: Option<i64>,
    pub origin_user_id: Option<i64>,
    pub text: String,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A message row before insertion.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub channel_id: i64,
    pub origin_message_id: Option<i64>,
    pub user_id: Option<i64>,
    pub origin_user_id: Option<i64>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}
