//! YouTube Live Chat message resources.
//!
//! Both the cursor endpoint (`liveChatMessages.list`) and the push endpoint return pages of
//! [`LiveChatMessage`] wrapped in a [`LiveChatMessageListResponse`].

use crate::youtube_api::types::PageInfo;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One page of chat messages.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/list#response>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageListResponse {
    /// Cursor to submit on the next request to continue after this page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    /// How long the server would like clients to wait before polling again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_interval_millis: Option<u64>,
    /// When the broadcast went offline. Present only once the chat is over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub items: Vec<LiveChatMessage>,
    /// The currently active poll in the chat, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_poll_item: Option<serde_json::Value>,
}

/// A `liveChatMessage` resource.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#resource>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessage {
    /// Unique message ID.
    pub id: String,
    pub snippet: LiveChatMessageSnippet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_details: Option<LiveChatMessageAuthor>,
}

impl LiveChatMessage {
    /// Display name of the author, or `"Anonymous"` when author details were not requested.
    pub fn author_name(&self) -> &str {
        self.author_details
            .as_ref()
            .map(|a| a.display_name.as_str())
            .unwrap_or("Anonymous")
    }

    /// The message text, preferring the raw text for text messages.
    pub fn text(&self) -> Option<&str> {
        match &self.snippet.details {
            LiveChatMessageDetails::TextMessage {
                text_message_details,
            } => Some(&text_message_details.message_text),
            _ => self.snippet.display_message.as_deref(),
        }
    }
}

/// Fields common to every message type plus the type-specific details.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#snippet>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageSnippet {
    #[serde(default)]
    pub live_chat_id: String,
    #[serde(default)]
    pub author_channel_id: String,
    pub published_at: Timestamp,
    /// Human-readable rendering of the message. Absent for some system events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_message: Option<String>,
    /// Selected by the `type` field of the snippet.
    #[serde(flatten)]
    pub details: LiveChatMessageDetails,
}

/// Type-specific payload of a chat message, keyed on `snippet.type`.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#snippet.type>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum LiveChatMessageDetails {
    /// A regular viewer message.
    #[serde(rename = "textMessageEvent")]
    TextMessage {
        text_message_details: TextMessageDetails,
    },
    /// A paid, highlighted message.
    #[serde(rename = "superChatEvent")]
    SuperChat {
        super_chat_details: SuperChatDetails,
    },
    /// A paid animated sticker.
    #[serde(rename = "superStickerEvent")]
    SuperSticker {
        super_sticker_details: SuperStickerDetails,
    },
    /// A viewer joined (or upgraded) a channel membership.
    #[serde(rename = "newSponsorEvent")]
    NewSponsor {
        new_sponsor_details: NewSponsorDetails,
    },
    /// An existing member reached a membership anniversary.
    #[serde(rename = "memberMilestoneChatEvent")]
    MemberMilestone {
        member_milestone_chat_details: MemberMilestoneChatDetails,
    },
    /// A viewer bought memberships for others.
    #[serde(rename = "membershipGiftingEvent")]
    MembershipGifting {
        membership_gifting_details: MembershipGiftingDetails,
    },
    /// A viewer received one of the gifted memberships.
    #[serde(rename = "giftMembershipReceivedEvent")]
    GiftMembershipReceived {
        gift_membership_received_details: GiftMembershipReceivedDetails,
    },
    /// A moderator removed a message.
    #[serde(rename = "messageDeletedEvent")]
    MessageDeleted {
        message_deleted_details: MessageDeletedDetails,
    },
    /// A moderator banned or timed out a user.
    #[serde(rename = "userBannedEvent")]
    UserBanned {
        user_banned_details: UserBannedDetails,
    },
    /// A chat poll was opened, updated, or closed.
    #[serde(rename = "pollEvent")]
    Poll { poll_details: PollDetails },
    /// Placeholder for a message that existed but is no longer available.
    #[serde(rename = "tombstone")]
    Tombstone,
    /// The author retracted their own message.
    #[serde(rename = "messageRetractedEvent")]
    MessageRetracted,
    #[serde(rename = "chatEndedEvent")]
    ChatEnded,
    #[serde(rename = "sponsorOnlyModeStartedEvent")]
    SponsorOnlyModeStarted,
    #[serde(rename = "sponsorOnlyModeEndedEvent")]
    SponsorOnlyModeEnded,
    /// A type this crate does not model yet.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for LiveChatMessageDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextMessage { .. } => write!(f, "text"),
            Self::SuperChat { .. } => write!(f, "superChat"),
            Self::SuperSticker { .. } => write!(f, "superSticker"),
            Self::NewSponsor { .. } => write!(f, "newSponsor"),
            Self::MemberMilestone { .. } => write!(f, "memberMilestone"),
            Self::MembershipGifting { .. } => write!(f, "membershipGift"),
            Self::GiftMembershipReceived { .. } => write!(f, "giftMembershipReceived"),
            Self::MessageDeleted { .. } => write!(f, "messageDeleted"),
            Self::UserBanned { .. } => write!(f, "userBanned"),
            Self::Poll { .. } => write!(f, "poll"),
            Self::Tombstone => write!(f, "tombstone"),
            Self::MessageRetracted => write!(f, "messageRetracted"),
            Self::ChatEnded => write!(f, "chatEnded"),
            Self::SponsorOnlyModeStarted => write!(f, "sponsorOnlyModeStarted"),
            Self::SponsorOnlyModeEnded => write!(f, "sponsorOnlyModeEnded"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Who wrote a message.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#authorDetails>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageAuthor {
    pub channel_id: String,
    pub display_name: String,
    #[serde(default)]
    pub channel_url: Option<String>,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(default)]
    pub is_verified: bool,
    /// The author is the broadcaster.
    #[serde(default)]
    pub is_chat_owner: bool,
    /// The author is a channel member.
    #[serde(default)]
    pub is_chat_sponsor: bool,
    #[serde(default)]
    pub is_chat_moderator: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperChatDetails {
    /// Localized amount such as `"$5.00"`.
    pub amount_display_string: String,
    /// Amount in millionths of the currency unit. A string because the API encodes uint64 so.
    pub amount_micros: String,
    /// ISO 4217 currency code.
    pub currency: String,
    pub tier: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperStickerDetails {
    pub amount_display_string: String,
    pub amount_micros: String,
    pub currency: String,
    pub tier: u32,
    pub super_sticker_metadata: SuperStickerMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperStickerMetadata {
    pub sticker_id: String,
    /// Accessible description of the sticker.
    pub alt_text: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageDetails {
    /// Raw text as typed, unlike the rendered `display_message`.
    pub message_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberMilestoneChatDetails {
    #[serde(default)]
    pub user_comment: Option<String>,
    pub member_month: u32,
    pub member_level_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSponsorDetails {
    pub member_level_name: String,
    #[serde(default)]
    pub is_upgrade: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBannedDetails {
    pub banned_user_details: BannedUserDetails,
    /// `"permanent"` or `"temporary"`.
    pub ban_type: String,
    /// Only present for temporary bans. Encoded by the API as a uint64 string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban_duration_seconds: Option<String>,
}

impl UserBannedDetails {
    pub fn is_permanent(&self) -> bool {
        self.ban_type == "permanent"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedUserDetails {
    pub channel_id: String,
    #[serde(default)]
    pub channel_url: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipGiftingDetails {
    pub gift_memberships_count: u32,
    pub gift_memberships_level_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftMembershipReceivedDetails {
    pub member_level_name: String,
    pub gifter_channel_id: String,
    /// Links back to the `membershipGiftingEvent` that paid for this gift.
    pub associated_membership_gifting_message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedDetails {
    pub deleted_message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDetails {
    #[serde(default)]
    pub metadata: PollMetadata,
    /// `"active"` or `"closed"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollMetadata {
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub option_text: String,
    /// Vote count, only present once the poll has closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tally: Option<String>,
}
