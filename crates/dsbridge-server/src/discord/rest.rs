use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use dsbridge_relay::ChatGateway;
use dsbridge_types::models::{GatewayChannel, OutboundContent};

use super::{BotIdentity, snowflake};

const API_BASE: &str = "https://discord.com/api/v10";

#[derive(Deserialize)]
struct ChannelPayload {
    id: String,
    name: Option<String>,
}

#[derive(Deserialize)]
struct CreatedMessage {
    id: String,
}

/// [`ChatGateway`] over the Discord REST API. Messages are posted as embeds
/// titled with the author's name.
pub struct DiscordRest {
    http: reqwest::Client,
    token: String,
    identity: BotIdentity,
}

impl DiscordRest {
    pub fn new(token: impl Into<String>, identity: BotIdentity) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("DiscordBot (dsbridge, ", env!("CARGO_PKG_VERSION"), ")"))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            identity,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", API_BASE, path))
            .header("Authorization", format!("Bot {}", self.token))
    }
}

fn embed(content: &OutboundContent) -> serde_json::Value {
    json!({
        "embeds": [{
            "title": content.author,
            "description": content.text,
        }]
    })
}

#[async_trait]
impl ChatGateway for DiscordRest {
    fn self_id(&self) -> Option<i64> {
        self.identity.get()
    }

    async fn get_channel(&self, channel_id: i64) -> Result<Option<GatewayChannel>> {
        let resp = self
            .request(Method::GET, &format!("/channels/{}", channel_id))
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                debug!("Channel {} not visible ({})", channel_id, resp.status());
                Ok(None)
            }
            status if status.is_success() => {
                let payload: ChannelPayload = resp.json().await?;
                Ok(Some(GatewayChannel {
                    id: snowflake(&payload.id)?,
                    name: payload.name,
                }))
            }
            status => bail!("GET channel {} failed: {}", channel_id, status),
        }
    }

    async fn send_message(&self, channel: &GatewayChannel, content: &OutboundContent) -> Result<i64> {
        let created: CreatedMessage = self
            .request(Method::POST, &format!("/channels/{}/messages", channel.id))
            .json(&embed(content))
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("posting to channel {}", channel.id))?
            .json()
            .await?;
        snowflake(&created.id)
    }

    async fn edit_message(
        &self,
        channel: &GatewayChannel,
        message_id: i64,
        content: &OutboundContent,
    ) -> Result<i64> {
        let edited: CreatedMessage = self
            .request(
                Method::PATCH,
                &format!("/channels/{}/messages/{}", channel.id, message_id),
            )
            .json(&embed(content))
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("editing message {}", message_id))?
            .json()
            .await?;
        snowflake(&edited.id)
    }

    async fn delete_message(&self, channel: &GatewayChannel, message_id: i64) -> Result<()> {
        self.request(
            Method::DELETE,
            &format!("/channels/{}/messages/{}", channel.id, message_id),
        )
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("deleting message {}", message_id))?;
        Ok(())
    }
}
