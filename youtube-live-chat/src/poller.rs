//! Cursor-based polling of a live chat.

use crate::backoff::Backoff;
use crate::config::ChatOptions;
use crate::error::Result;
use crate::handlers::{ChatHandlers, PollComplete};
use crate::reader::{ChatReader, reader_api};
use crate::session::{LifecycleState, sleep_or_cancel};
use crate::youtube_api::chat::LiveChatMessage;
use crate::youtube_api::client::YouTubeClient;
use crate::youtube_api::moderation::{ChatMode, LiveChatBan, LiveChatModerator};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

/// Reads a live chat by repeatedly fetching `liveChatMessages.list` and sleeping for the
/// interval the server advises.
///
/// Handlers are registered through [`Self::handlers`] and may be added or removed at any time,
/// including while the poller runs. Clones share the same loop, cursor and handlers.
///
/// ```rust,no_run
/// use tokio_util::sync::CancellationToken;
/// use youtube_live_chat::youtube_api::{StaticToken, YouTubeClient};
/// use youtube_live_chat::LiveChatPoller;
///
/// # async fn example() -> Result<(), youtube_live_chat::ChatError> {
/// let client = YouTubeClient::new(StaticToken::new("ya29..."));
/// let poller = LiveChatPoller::new(client, "live-chat-id");
/// poller.handlers().on_message(|m| println!("{}: {:?}", m.author_name(), m.text()));
/// poller.handlers().on_error(|e| eprintln!("{e}"));
///
/// poller.start(&CancellationToken::new())?;
/// tokio::time::sleep(std::time::Duration::from_secs(60)).await;
/// poller.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LiveChatPoller {
    inner: Arc<ChatReader>,
}

impl LiveChatPoller {
    pub fn new(client: YouTubeClient, live_chat_id: impl Into<String>) -> Self {
        Self::with_options(client, live_chat_id, ChatOptions::default())
    }

    pub fn with_options(
        client: YouTubeClient,
        live_chat_id: impl Into<String>,
        options: ChatOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ChatReader::new(client, live_chat_id.into(), options)),
        }
    }

    pub async fn send_message(&self, text: &str) -> Result<LiveChatMessage> {
        self.inner
            .client
            .send_message(&self.inner.live_chat_id, text)
            .await
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<()> {
        self.inner.client.delete_message(message_id).await
    }

    pub async fn ban_user(&self, channel_id: &str) -> Result<LiveChatBan> {
        self.inner
            .client
            .ban_user(&self.inner.live_chat_id, channel_id)
            .await
    }

    /// Temporarily bans `channel_id`. `duration` must be at least one second.
    pub async fn timeout_user(&self, channel_id: &str, duration: Duration) -> Result<LiveChatBan> {
        self.inner
            .client
            .timeout_user(&self.inner.live_chat_id, channel_id, duration)
            .await
    }

    pub async fn unban_user(&self, ban_id: &str) -> Result<()> {
        self.inner.client.unban_user(ban_id).await
    }

    pub async fn add_moderator(&self, channel_id: &str) -> Result<LiveChatModerator> {
        self.inner
            .client
            .add_moderator(&self.inner.live_chat_id, channel_id)
            .await
    }

    pub async fn remove_moderator(&self, moderator_id: &str) -> Result<()> {
        self.inner.client.remove_moderator(moderator_id).await
    }

    pub fn list_moderators(&self) -> impl Stream<Item = Result<LiveChatModerator>> + use<'_> {
        self.inner.client.list_moderators(&self.inner.live_chat_id)
    }

    pub async fn transition_chat_mode(&self, mode: ChatMode) -> Result<()> {
        self.inner
            .client
            .transition_chat_mode(&self.inner.live_chat_id, mode)
            .await
    }

    pub async fn transition_chat_mode_with_delay(
        &self,
        mode: ChatMode,
        delay: Option<Duration>,
    ) -> Result<()> {
        self.inner
            .client
            .transition_chat_mode_with_delay(&self.inner.live_chat_id, mode, delay)
            .await
    }
}

reader_api!(LiveChatPoller);

async fn run(reader: Arc<ChatReader>, cancel: CancellationToken) {
    reader.handlers.dispatch_connect();
    let mut backoff = Backoff::new(reader.options.backoff().clone());

    while !cancel.is_cancelled() {
        let page_token = reader.page_token();
        let fetched = tokio::select! {
            _ = cancel.cancelled() => break,
            fetched = reader.client.fetch_live_chat_messages(
                &reader.live_chat_id,
                page_token.as_deref(),
                &reader.options,
            ) => fetched,
        };

        let page = match fetched {
            Ok(page) => page,
            Err(error) if error.is_chat_ended() => {
                tracing::info!(live_chat_id = reader.live_chat_id, %error, "live chat ended");
                reader.handlers.dispatch_error(&error);
                break;
            }
            Err(error) => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    %error,
                    attempt = backoff.attempt(),
                    ?delay,
                    "live chat fetch failed; retrying"
                );
                reader.handlers.dispatch_error(&error);
                if !sleep_or_cancel(delay, &cancel).await {
                    break;
                }
                continue;
            }
        };
        backoff.reset();
        // Polled pages move the cursor before their handlers run.
        reader
            .session
            .update_cursor(|cursor| cursor.advance(page.next_page_token.as_deref()));

        let interval = match reader.apply_page(&page) {
            ControlFlow::Continue(interval) => interval,
            ControlFlow::Break(()) => break,
        };
        reader.handlers.dispatch_poll_complete(PollComplete {
            item_count: page.items.len(),
            interval,
        });

        if !sleep_or_cancel(interval, &cancel).await {
            break;
        }
    }

    reader.handlers.dispatch_disconnect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::youtube_api::client::StaticToken;

    fn poller() -> LiveChatPoller {
        let client =
            YouTubeClient::new(StaticToken::new("token")).with_base_url("http://127.0.0.1:9");
        LiveChatPoller::new(client, "chat")
    }

    #[test]
    fn cursor_is_editable_while_stopped() {
        let poller = poller();
        assert_eq!(poller.state(), LifecycleState::Stopped);
        poller.set_page_token("abc").unwrap();
        assert_eq!(poller.page_token().as_deref(), Some("abc"));
        poller.reset_page_token().unwrap();
        assert_eq!(poller.page_token(), None);
        assert_eq!(poller.poll_interval(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn validation_happens_before_any_request() {
        let poller = poller();
        let err = poller.send_message("").await.unwrap_err();
        assert!(err.is_validation(), "{err}");
        let err = poller
            .timeout_user("UCx", Duration::ZERO)
            .await
            .unwrap_err();
        assert!(err.is_validation(), "{err}");
        let err = poller
            .transition_chat_mode(ChatMode::SlowMode)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation { field: "delay", .. }));
    }

    #[tokio::test]
    async fn handlers_are_shared_between_clones() {
        let poller = poller();
        let clone = poller.clone();
        let id = clone.handlers().on_connect(|| {});
        assert!(poller.handlers().unsubscribe(id));
        assert!(!clone.handlers().unsubscribe(id));
    }
}
