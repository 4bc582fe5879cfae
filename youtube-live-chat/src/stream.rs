//! Server-push reading of a live chat over `liveChatMessages.streamList`.

use crate::backoff::Backoff;
use crate::config::ChatOptions;
use crate::error::{ChatError, Result};
use crate::handlers::ChatHandlers;
use crate::reader::{ChatReader, reader_api};
use crate::session::{LifecycleState, sleep_or_cancel};
use crate::sse::SseEvent;
use crate::youtube_api::chat::LiveChatMessageListResponse;
use crate::youtube_api::client::{StreamItem, YouTubeClient};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Reads a live chat over one long-lived server-sent-events connection.
///
/// When the connection drops, the stream waits for a backoff delay (or the delay the server
/// asked for with a `retry:` field) and reconnects from the last page token it saw. Connect and
/// disconnect handlers fire once per established connection.
#[derive(Debug, Clone)]
pub struct LiveChatStream {
    inner: Arc<ChatReader>,
}

impl LiveChatStream {
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

    /// The delay scheduled before the most recent reconnect, if any.
    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.inner.reconnect_delay()
    }
}

reader_api!(LiveChatStream);

/// Handles one SSE frame. Breaks once the chat has ended.
fn handle_event(reader: &ChatReader, backoff: &mut Backoff, event: SseEvent) -> ControlFlow<()> {
    if let Some(retry) = event.retry {
        tracing::debug!(?retry, "server advised reconnect delay");
        backoff.advise(retry);
    }
    let Some(data) = event.data else {
        return ControlFlow::Continue(());
    };

    match serde_json::from_str::<LiveChatMessageListResponse>(&data) {
        Ok(page) => match reader.apply_page(&page) {
            ControlFlow::Continue(_) => ControlFlow::Continue(()),
            ControlFlow::Break(()) => ControlFlow::Break(()),
        },
        Err(e) => {
            tracing::warn!(
                error = %e,
                event = event.event.as_deref(),
                "skipping undecodable stream payload"
            );
            reader.handlers.dispatch_error(&ChatError::Decode(e));
            ControlFlow::Continue(())
        }
    }
}

async fn run(reader: Arc<ChatReader>, cancel: CancellationToken) {
    let mut backoff = Backoff::new(reader.options.backoff().clone());
    let mut connected = false;

    'session: loop {
        let page_token = reader.page_token();
        let events = reader.client.stream_live_chat_messages(
            &reader.live_chat_id,
            page_token.as_deref(),
            &reader.options,
        );
        let mut events = std::pin::pin!(events);

        let error = loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break 'session,
                next = events.next() => next,
            };
            match next {
                None => break ChatError::StreamClosed,
                Some(Err(error)) => break error,
                Some(Ok(StreamItem::Connected)) => {
                    connected = true;
                    backoff.reset();
                    reader.handlers.dispatch_connect();
                }
                Some(Ok(StreamItem::Event(event))) => {
                    if handle_event(&reader, &mut backoff, event).is_break() {
                        break 'session;
                    }
                }
            }
        };

        if error.is_chat_ended() {
            tracing::info!(live_chat_id = reader.live_chat_id, %error, "live chat ended");
            reader.handlers.dispatch_error(&error);
            break;
        }

        let delay = backoff.next_delay();
        reader
            .session
            .update_cursor(|cursor| cursor.reconnect_delay = Some(delay));
        tracing::warn!(%error, ?delay, "live chat stream disconnected; reconnecting");
        reader.handlers.dispatch_error(&error);
        if std::mem::take(&mut connected) {
            reader.handlers.dispatch_disconnect();
        }

        if !sleep_or_cancel(delay, &cancel).await {
            break;
        }
    }

    if connected {
        reader.handlers.dispatch_disconnect();
    }
}
