//! YouTube Data API v3 client for live chat.
//!
//! Covers the two ways of reading a chat (the cursor-based `liveChatMessages.list` endpoint and
//! its server-push `streamList` variant) plus the moderation endpoints that act on a chat.
//! Anything else the Data API offers is out of scope.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use youtube_live_chat::youtube_api::{StaticToken, YouTubeClient};
//! use youtube_live_chat::ChatOptions;
//!
//! # async fn example() -> Result<(), youtube_live_chat::ChatError> {
//! let client = YouTubeClient::new(StaticToken::new("ya29..."));
//! let page = client
//!     .fetch_live_chat_messages("live-chat-id", None, &ChatOptions::default())
//!     .await?;
//! for message in &page.items {
//!     println!("{}: {}", message.author_name(), message.snippet.details);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod client;
pub mod moderation;
pub mod types;

pub use client::{DEFAULT_BASE_URL, StaticToken, StreamItem, TokenSource, YouTubeClient};
pub use types::{PageInfo, PagedStream};

pub use chat::{
    BannedUserDetails, GiftMembershipReceivedDetails, LiveChatMessage, LiveChatMessageAuthor,
    LiveChatMessageDetails, LiveChatMessageListResponse, LiveChatMessageSnippet,
    MemberMilestoneChatDetails, MembershipGiftingDetails, MessageDeletedDetails,
    NewSponsorDetails, PollDetails, SuperChatDetails, SuperStickerDetails, TextMessageDetails,
    UserBannedDetails,
};

pub use moderation::{
    BanType, ChannelDetails, ChatMode, LiveChatBan, LiveChatModerator, MAX_MESSAGE_CHARS,
};
