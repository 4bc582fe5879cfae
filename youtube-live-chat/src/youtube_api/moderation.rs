//! Moderation commands: sending and deleting messages, bans, moderators and chat modes.
//!
//! Every command validates its input before touching the network, so an invalid call costs no
//! quota and returns [`ChatError::Validation`].

use crate::error::{ChatError, Result};
use crate::youtube_api::chat::LiveChatMessage;
use crate::youtube_api::client::YouTubeClient;
use crate::youtube_api::types::PagedStream;
use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::instrument;

/// Longest chat message the API accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 200;

/// Channel identity inside ban and moderator resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDetails {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

impl ChannelDetails {
    fn id_only(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BanType {
    Permanent,
    Temporary,
}

/// A ban on one channel in one live chat.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatBans>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatBan {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub snippet: LiveChatBanSnippet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatBanSnippet {
    pub live_chat_id: String,
    #[serde(rename = "type")]
    pub ban_type: BanType,
    /// Whole seconds, encoded as a string on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban_duration_seconds: Option<String>,
    pub banned_user_details: ChannelDetails,
}

/// A moderator of one live chat.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatModerators>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatModerator {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub snippet: LiveChatModeratorSnippet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatModeratorSnippet {
    pub live_chat_id: String,
    pub moderator_details: ChannelDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatModeratorListResponse {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    items: VecDeque<LiveChatModerator>,
}

/// Who may post in a live chat, and how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatMode {
    SubscribersOnly,
    MembersOnly,
    /// Viewers may post at most once per configured delay.
    SlowMode,
    Normal,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubscribersOnly => "subscribersOnly",
            Self::MembersOnly => "membersOnly",
            Self::SlowMode => "slowMode",
            Self::Normal => "normal",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMode {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(ChatError::validation("mode", "must not be empty")),
            "subscribersOnly" => Ok(Self::SubscribersOnly),
            "membersOnly" => Ok(Self::MembersOnly),
            "slowMode" => Ok(Self::SlowMode),
            "normal" => Ok(Self::Normal),
            _ => Err(ChatError::validation("mode", "unknown chat mode")),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatModeTransition<'a> {
    live_chat_id: &'a str,
    mode: ChatMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertMessage<'a> {
    snippet: InsertMessageSnippet<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertMessageSnippet<'a> {
    live_chat_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text_message_details: InsertTextDetails<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertTextDetails<'a> {
    message_text: &'a str,
}

#[derive(Debug, Serialize)]
struct Insert<T> {
    snippet: T,
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ChatError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn validate_message_text(text: &str) -> Result<()> {
    require("message text", text)?;
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::validation(
            "message text",
            "must be at most 200 characters",
        ));
    }
    Ok(())
}

/// Whole seconds of a timeout. Sub-second durations round down and are rejected at zero.
fn validate_ban_duration(duration: Duration) -> Result<u64> {
    match duration.as_secs() {
        0 => Err(ChatError::validation(
            "ban duration",
            "must be at least one second",
        )),
        secs => Ok(secs),
    }
}

fn validate_transition(mode: ChatMode, delay: Option<Duration>) -> Result<Option<u64>> {
    match (mode, delay) {
        (ChatMode::SlowMode, Some(delay)) if !delay.is_zero() => {
            Ok(Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)))
        }
        (ChatMode::SlowMode, _) => Err(ChatError::validation(
            "delay",
            "slow mode requires a positive delay",
        )),
        (_, Some(_)) => Err(ChatError::validation(
            "delay",
            "only slow mode takes a delay",
        )),
        (_, None) => Ok(None),
    }
}

impl YouTubeClient {
    /// Posts a text message to a live chat as the authenticated user.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.force-ssl`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/insert>
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn send_message(&self, live_chat_id: &str, text: &str) -> Result<LiveChatMessage> {
        require("live chat id", live_chat_id)?;
        validate_message_text(text)?;

        let body = InsertMessage {
            snippet: InsertMessageSnippet {
                live_chat_id,
                kind: "textMessageEvent",
                text_message_details: InsertTextDetails { message_text: text },
            },
        };
        let response = self
            .make_authenticated_request(
                Method::POST,
                "liveChat/messages",
                &[("part", "snippet")],
                Some(&body),
            )
            .await?;
        let message: LiveChatMessage = Self::decode(response).await?;
        tracing::debug!(mid = message.id, "sent chat message");
        Ok(message)
    }

    /// <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/delete>
    #[instrument(skip(self))]
    pub async fn delete_message(&self, message_id: &str) -> Result<()> {
        require("message id", message_id)?;
        self.make_authenticated_request(
            Method::DELETE,
            "liveChat/messages",
            &[("id", message_id)],
            None::<&()>,
        )
        .await?;
        Ok(())
    }

    /// Bans a channel from the chat for good.
    #[instrument(skip(self))]
    pub async fn ban_user(&self, live_chat_id: &str, channel_id: &str) -> Result<LiveChatBan> {
        require("live chat id", live_chat_id)?;
        require("channel id", channel_id)?;
        self.insert_ban(live_chat_id, channel_id, BanType::Permanent, None)
            .await
    }

    /// Bans a channel for `duration`, which must be at least one second.
    #[instrument(skip(self))]
    pub async fn timeout_user(
        &self,
        live_chat_id: &str,
        channel_id: &str,
        duration: Duration,
    ) -> Result<LiveChatBan> {
        require("live chat id", live_chat_id)?;
        require("channel id", channel_id)?;
        let secs = validate_ban_duration(duration)?;
        self.insert_ban(live_chat_id, channel_id, BanType::Temporary, Some(secs))
            .await
    }

    /// <https://developers.google.com/youtube/v3/live/docs/liveChatBans/insert>
    async fn insert_ban(
        &self,
        live_chat_id: &str,
        channel_id: &str,
        ban_type: BanType,
        duration_secs: Option<u64>,
    ) -> Result<LiveChatBan> {
        let body = Insert {
            snippet: LiveChatBanSnippet {
                live_chat_id: live_chat_id.to_string(),
                ban_type,
                ban_duration_seconds: duration_secs.map(|s| s.to_string()),
                banned_user_details: ChannelDetails::id_only(channel_id),
            },
        };
        let response = self
            .make_authenticated_request(
                Method::POST,
                "liveChat/bans",
                &[("part", "snippet")],
                Some(&body),
            )
            .await?;
        let ban: LiveChatBan = Self::decode(response).await?;
        tracing::debug!(ban_id = ban.id, ?ban_type, "inserted live chat ban");
        Ok(ban)
    }

    /// Lifts a ban by the ban resource ID returned from [`Self::ban_user`] or
    /// [`Self::timeout_user`].
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatBans/delete>
    #[instrument(skip(self))]
    pub async fn unban_user(&self, ban_id: &str) -> Result<()> {
        require("ban id", ban_id)?;
        self.make_authenticated_request(
            Method::DELETE,
            "liveChat/bans",
            &[("id", ban_id)],
            None::<&()>,
        )
        .await?;
        Ok(())
    }

    /// <https://developers.google.com/youtube/v3/live/docs/liveChatModerators/insert>
    #[instrument(skip(self))]
    pub async fn add_moderator(
        &self,
        live_chat_id: &str,
        channel_id: &str,
    ) -> Result<LiveChatModerator> {
        require("live chat id", live_chat_id)?;
        require("channel id", channel_id)?;
        let body = Insert {
            snippet: LiveChatModeratorSnippet {
                live_chat_id: live_chat_id.to_string(),
                moderator_details: ChannelDetails::id_only(channel_id),
            },
        };
        let response = self
            .make_authenticated_request(
                Method::POST,
                "liveChat/moderators",
                &[("part", "snippet")],
                Some(&body),
            )
            .await?;
        Self::decode(response).await
    }

    /// Removes a moderator by the moderator resource ID.
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatModerators/delete>
    #[instrument(skip(self))]
    pub async fn remove_moderator(&self, moderator_id: &str) -> Result<()> {
        require("moderator id", moderator_id)?;
        self.make_authenticated_request(
            Method::DELETE,
            "liveChat/moderators",
            &[("id", moderator_id)],
            None::<&()>,
        )
        .await?;
        Ok(())
    }

    /// Returns a paginated stream of the chat's moderators.
    ///
    /// An empty `live_chat_id` yields a single validation error without any request.
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatModerators/list>
    pub fn list_moderators<'a>(
        &'a self,
        live_chat_id: &'a str,
    ) -> impl Stream<Item = Result<LiveChatModerator>> + use<'a> {
        PagedStream::new(move |page_token: Option<String>| async move {
            require("live chat id", live_chat_id)?;
            let mut query = vec![
                ("liveChatId", live_chat_id),
                ("part", "id,snippet"),
                ("maxResults", "50"),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let response = self
                .make_authenticated_request(
                    Method::GET,
                    "liveChat/moderators",
                    &query,
                    None::<&()>,
                )
                .await?;
            let page: LiveChatModeratorListResponse = Self::decode(response).await?;
            Ok((page.items, page.next_page_token))
        })
    }

    pub async fn transition_chat_mode(&self, live_chat_id: &str, mode: ChatMode) -> Result<()> {
        self.transition_chat_mode_with_delay(live_chat_id, mode, None)
            .await
    }

    /// Switches the chat into `mode`. Slow mode requires a positive `delay`, which no other
    /// mode accepts.
    #[instrument(skip(self))]
    pub async fn transition_chat_mode_with_delay(
        &self,
        live_chat_id: &str,
        mode: ChatMode,
        delay: Option<Duration>,
    ) -> Result<()> {
        require("live chat id", live_chat_id)?;
        let delay_ms = validate_transition(mode, delay)?;
        let body = ChatModeTransition {
            live_chat_id,
            mode,
            delay_ms,
        };
        self.make_authenticated_request(
            Method::POST,
            "liveChat/messages/transition",
            &[],
            Some(&body),
        )
        .await?;
        tracing::debug!(%mode, ?delay_ms, "transitioned chat mode");
        Ok(())
    }
}
