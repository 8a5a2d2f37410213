//! Minimal Discord adapter: REST calls for the outbound side and a gateway
//! listener that feeds message events to the relay.

pub mod listener;
pub mod rest;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context, Result};

pub use listener::GatewayListener;
pub use rest::DiscordRest;

/// The bot's own user id, learned from `READY`. Shared between the listener,
/// which sets it, and the REST client, which reports it.
#[derive(Clone, Default)]
pub struct BotIdentity(Arc<AtomicI64>);

impl BotIdentity {
    pub fn set(&self, user_id: i64) {
        self.0.store(user_id, Ordering::Release);
    }

    pub fn get(&self) -> Option<i64> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }
}

/// Discord sends ids as decimal strings.
pub(crate) fn snowflake(raw: &str) -> Result<i64> {
    raw.parse()
        .with_context(|| format!("invalid snowflake {:?}", raw))
}
