//! Real-time ingestion of YouTube live chat.
//!
//! Two readers cover the two ways the Data API exposes a chat:
//!
//! - [`LiveChatPoller`] repeatedly fetches `liveChatMessages.list`, following the page cursor
//!   and sleeping for the interval the server advises.
//! - [`LiveChatStream`] holds one `streamList` server-sent-events connection open and
//!   reconnects with backoff when it drops.
//!
//! Both run a single background task, deliver events to the callbacks registered on
//! [`ChatHandlers`], contain panicking callbacks, and resume from the last page token after a
//! restart. Moderation commands are available on [`LiveChatPoller`] and on
//! [`youtube_api::YouTubeClient`] directly.

pub mod backoff;
pub mod config;
pub mod error;
pub mod handlers;
pub mod poller;
mod reader;
pub mod session;
pub mod sse;
pub mod stream;
pub mod youtube_api;

pub use backoff::{Backoff, BackoffPolicy, FixedRandom, RandomSource, ThreadRandom};
pub use config::ChatOptions;
pub use error::{ApiError, ApiErrorReason, ChatError, Result};
pub use handlers::{
    ChatHandlers, EventCategory, HandlerId, HandlerRegistry, PollComplete, classify,
};
pub use poller::LiveChatPoller;
pub use session::{LifecycleState, clamp_interval};
pub use stream::LiveChatStream;
pub use tokio_util::sync::CancellationToken;
