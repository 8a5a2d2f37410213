/// A channel as known to the chat gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayChannel {
    pub id: i64,
    pub name: Option<String>,
}

/// What the bridge posts into a gateway channel: the author's display name as
/// the title and the message text as the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundContent {
    pub author: String,
    pub text: String,
}

impl OutboundContent {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }
}
