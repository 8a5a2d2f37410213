use anyhow::Result;
use async_trait::async_trait;

use dsbridge_types::models::{GatewayChannel, OutboundContent};

/// Outbound calls against the chat gateway. Implemented over the gateway's
/// REST API in production and by in-memory fakes in tests.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// User id of the bridge's own gateway account, once the session is ready.
    fn self_id(&self) -> Option<i64>;

    /// Look up a channel. `Ok(None)` means the gateway does not know it or the
    /// bridge cannot see it.
    async fn get_channel(&self, channel_id: i64) -> Result<Option<GatewayChannel>>;

    /// Post `content` and return the gateway id of the new message.
    async fn send_message(&self, channel: &GatewayChannel, content: &OutboundContent) -> Result<i64>;

    /// Replace the content of an existing message. Returns the id of the
    /// edited message.
    async fn edit_message(
        &self,
        channel: &GatewayChannel,
        message_id: i64,
        content: &OutboundContent,
    ) -> Result<i64>;

    async fn delete_message(&self, channel: &GatewayChannel, message_id: i64) -> Result<()>;
}
