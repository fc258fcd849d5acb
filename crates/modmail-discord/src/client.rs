//! Discord REST client

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use modmail_core::entities::{ChannelEdit, GuildMember, MessageTarget, NewChannel, RemoteChannel};
use modmail_core::error::DomainError;
use modmail_core::traits::{Transport, TransportResult};
use modmail_core::value_objects::Snowflake;

use crate::payload::{
    create_channel_body, edit_channel_body, split_content, DiscordChannel, DiscordMember,
};

/// Discord API base URL
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: Snowflake,
}

/// Transport backed by the Discord REST API
pub struct DiscordTransport {
    http: reqwest::Client,
    base_url: String,
    token: String,
    timeout: Duration,
    /// user id -> DM channel id
    dm_channels: DashMap<Snowflake, Snowflake>,
}

impl DiscordTransport {
    /// Create a transport authenticating with a bot token
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("modmail/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: DISCORD_API_BASE.to_string(),
            token: token.into(),
            timeout,
            dm_channels: DashMap::new(),
        })
    }

    /// Point the client at another API root (proxies, test servers)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    async fn send(&self, route: &str, request: RequestBuilder) -> TransportResult<Response> {
        let resp = request.send().await.map_err(|e| self.map_reqwest_error(route, &e))?;
        self.check(route, resp).await
    }

    async fn check(&self, route: &str, resp: Response) -> TransportResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        warn!(route, %status, body = %body, "Discord request failed");
        Err(DomainError::Transport(format!("{route} failed: {status} {body}")))
    }

    fn map_reqwest_error(&self, route: &str, e: &reqwest::Error) -> DomainError {
        if e.is_timeout() {
            DomainError::TransportTimeout(self.timeout)
        } else {
            DomainError::Transport(format!("{route} failed: {e}"))
        }
    }

    /// Resolve (and cache) the DM channel for a user
    async fn dm_channel(&self, user_id: Snowflake) -> TransportResult<Snowflake> {
        if let Some(channel) = self.dm_channels.get(&user_id) {
            return Ok(*channel);
        }

        let route = "POST /users/@me/channels";
        let resp = self
            .send(
                route,
                self.request(Method::POST, "/users/@me/channels")
                    .json(&json!({ "recipient_id": user_id })),
            )
            .await?;
        let created: CreatedObject = resp
            .json()
            .await
            .map_err(|e| self.map_reqwest_error(route, &e))?;

        self.dm_channels.insert(user_id, created.id);
        Ok(created.id)
    }

    async fn post_message(&self, channel_id: Snowflake, content: &str) -> TransportResult<()> {
        for chunk in split_content(content) {
            self.send(
                "POST /channels/{id}/messages",
                self.request(Method::POST, &format!("/channels/{channel_id}/messages"))
                    .json(&json!({ "content": chunk, "allowed_mentions": { "parse": [] } })),
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for DiscordTransport {
    #[instrument(skip(self, channel), fields(name = %channel.name))]
    async fn create_channel(&self, channel: &NewChannel) -> TransportResult<Snowflake> {
        let route = "POST /guilds/{id}/channels";
        let resp = self
            .send(
                route,
                self.request(Method::POST, &format!("/guilds/{}/channels", channel.guild_id))
                    .json(&create_channel_body(channel)),
            )
            .await?;

        let created: CreatedObject = resp
            .json()
            .await
            .map_err(|e| self.map_reqwest_error(route, &e))?;
        debug!(channel_id = %created.id, "Channel created");
        Ok(created.id)
    }

    #[instrument(skip(self, edit))]
    async fn edit_channel(&self, channel_id: Snowflake, edit: &ChannelEdit) -> TransportResult<()> {
        if edit.is_empty() {
            return Ok(());
        }
        self.send(
            "PATCH /channels/{id}",
            self.request(Method::PATCH, &format!("/channels/{channel_id}"))
                .json(&edit_channel_body(edit)),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, content))]
    async fn send_message(&self, target: MessageTarget, content: &str) -> TransportResult<()> {
        let channel_id = match target {
            MessageTarget::Channel(channel_id) => channel_id,
            MessageTarget::User(user_id) => self.dm_channel(user_id).await?,
        };
        self.post_message(channel_id, content).await
    }

    #[instrument(skip(self))]
    async fn list_guild_channels(&self, guild_id: Snowflake) -> TransportResult<Vec<RemoteChannel>> {
        let route = "GET /guilds/{id}/channels";
        let resp = self
            .send(route, self.request(Method::GET, &format!("/guilds/{guild_id}/channels")))
            .await?;

        let channels: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| self.map_reqwest_error(route, &e))?;

        // Skip entries we cannot parse instead of failing the whole listing
        Ok(channels
            .into_iter()
            .filter_map(|c| serde_json::from_value::<DiscordChannel>(c).ok())
            .filter_map(DiscordChannel::into_remote)
            .collect())
    }

    #[instrument(skip(self))]
    async fn guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> TransportResult<Option<GuildMember>> {
        let route = "GET /guilds/{id}/members/{user}";
        let resp = self
            .request(Method::GET, &format!("/guilds/{guild_id}/members/{user_id}"))
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(route, &e))?;

        // Unknown Member
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("User is not a member of the guild");
            return Ok(None);
        }

        let member: DiscordMember = self
            .check(route, resp)
            .await?
            .json()
            .await
            .map_err(|e| self.map_reqwest_error(route, &e))?;
        Ok(Some(member.into_member(user_id)))
    }
}
