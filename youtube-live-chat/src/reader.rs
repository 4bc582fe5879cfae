//! State and behavior shared by the poller and the stream.

use crate::config::ChatOptions;
use crate::error::{ChatError, Result};
use crate::handlers::ChatHandlers;
use crate::session::{FinishOnDrop, LifecycleState, Session};
use crate::youtube_api::chat::LiveChatMessageListResponse;
use crate::youtube_api::client::YouTubeClient;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub(crate) struct ChatReader {
    pub(crate) client: YouTubeClient,
    pub(crate) live_chat_id: String,
    pub(crate) options: ChatOptions,
    pub(crate) handlers: ChatHandlers,
    pub(crate) session: Session,
}

impl ChatReader {
    pub(crate) fn new(client: YouTubeClient, live_chat_id: String, options: ChatOptions) -> Self {
        let session = Session::new(options.default_poll_interval());
        Self {
            client,
            live_chat_id,
            options,
            handlers: ChatHandlers::new(),
            session,
        }
    }

    /// Transitions to `Running` and spawns `run` as the one loop task of this reader.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime, like [`tokio::spawn`].
    pub(crate) fn launch<F, Fut>(self: &Arc<Self>, ctx: &CancellationToken, run: F) -> Result<()>
    where
        F: FnOnce(Arc<Self>, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Fail before the transition so a missing runtime cannot leave us stuck in Running.
        let runtime = tokio::runtime::Handle::current();
        let cancel = self.session.begin(ctx)?;
        tracing::debug!(live_chat_id = self.live_chat_id, "starting chat loop");

        let reader = Arc::clone(self);
        runtime.spawn(async move {
            let _finish = FinishOnDrop(&reader.session);
            run(Arc::clone(&reader), cancel).await;
            tracing::debug!(live_chat_id = reader.live_chat_id, "chat loop exited");
        });
        Ok(())
    }

    /// Applies one page: interval, raw-response and per-item dispatch, then the cursor.
    ///
    /// The cursor moves only after the page's handlers have run. Breaks if the page reports
    /// that the broadcast went offline; the items of such a page are not dispatched.
    pub(crate) fn apply_page(
        &self,
        page: &LiveChatMessageListResponse,
    ) -> ControlFlow<(), Duration> {
        let interval = self.session.update_cursor(|cursor| {
            cursor.poll_interval = self
                .options
                .clamp_interval(page.polling_interval_millis, cursor.poll_interval);
            cursor.poll_interval
        });

        self.handlers.dispatch_response(page);

        let flow = if let Some(offline_at) = page.offline_at {
            tracing::info!(live_chat_id = self.live_chat_id, %offline_at, "live chat ended");
            self.handlers.dispatch_error(&ChatError::ChatEnded {
                offline_at: Some(offline_at),
            });
            ControlFlow::Break(())
        } else {
            for item in &page.items {
                self.handlers.dispatch_item(item);
            }
            ControlFlow::Continue(interval)
        };

        self.session
            .update_cursor(|cursor| cursor.advance(page.next_page_token.as_deref()));
        flow
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.session.state()
    }

    pub(crate) fn page_token(&self) -> Option<String> {
        self.session.cursor().page_token
    }

    pub(crate) fn set_page_token(&self, token: Option<String>) -> Result<()> {
        self.session.while_stopped(|cursor| {
            cursor.page_token = token.filter(|t| !t.is_empty());
        })
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.session.cursor().poll_interval
    }

    pub(crate) fn reconnect_delay(&self) -> Option<Duration> {
        self.session.cursor().reconnect_delay
    }
}

/// Generates the lifecycle and accessor methods the poller and the stream share.
macro_rules! reader_api {
    ($ty:ident) => {
        impl $ty {
            /// Starts the background loop.
            ///
            /// The loop stops when [`Self::stop`] is called, when `ctx` is cancelled, or when the
            /// chat ends. Fails with [`AlreadyRunning`](crate::ChatError::AlreadyRunning) unless
            /// the reader is stopped.
            ///
            /// # Panics
            ///
            /// Panics if called outside of a Tokio runtime.
            pub fn start(&self, ctx: &CancellationToken) -> Result<()> {
                self.inner.launch(ctx, run)
            }

            /// Stops the background loop and waits until it has exited.
            ///
            /// Safe to call repeatedly and from several tasks at once; every caller returns once
            /// the loop is gone and the final disconnect has been dispatched. Calling this from
            /// inside a handler waits on the very task running the handler and never returns.
            pub async fn stop(&self) {
                self.inner.session.stop().await;
            }

            pub fn is_running(&self) -> bool {
                self.inner.session.is_running()
            }

            pub fn state(&self) -> LifecycleState {
                self.inner.state()
            }

            /// Clears the cursor and restores the default interval. Only allowed while stopped.
            pub fn reset(&self) -> Result<()> {
                self.inner.session.reset()
            }

            pub fn page_token(&self) -> Option<String> {
                self.inner.page_token()
            }

            /// Resumes from `token` on the next start. Only allowed while stopped.
            pub fn set_page_token(&self, token: impl Into<String>) -> Result<()> {
                self.inner.set_page_token(Some(token.into()))
            }

            /// Starts from the live edge on the next start. Only allowed while stopped.
            pub fn reset_page_token(&self) -> Result<()> {
                self.inner.set_page_token(None)
            }

            /// The current effective polling interval, already clamped.
            pub fn poll_interval(&self) -> Duration {
                self.inner.poll_interval()
            }

            pub fn handlers(&self) -> &ChatHandlers {
                &self.inner.handlers
            }

            pub fn live_chat_id(&self) -> &str {
                &self.inner.live_chat_id
            }

            pub fn options(&self) -> &ChatOptions {
                &self.inner.options
            }

            pub fn client(&self) -> &YouTubeClient {
                &self.inner.client
            }
        }
    };
}

pub(crate) use reader_api;
