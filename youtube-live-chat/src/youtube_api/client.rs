//! Core YouTube API client functionality and credential handling.

use crate::config::ChatOptions;
use crate::error::{ApiError, ChatError, Result};
use crate::sse::{SseDecoder, SseEvent};
use crate::youtube_api::chat::LiveChatMessageListResponse;
use eyre::Context;
use http::Method;
use http::header::{ACCEPT, AUTHORIZATION};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tracing::instrument;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = eyre::Result<String>> + Send + 'a>>;

/// Source of the bearer credential attached to every request.
///
/// Obtaining and refreshing credentials is the caller's business; the client only asks for the
/// current access token right before each request.
pub trait TokenSource: fmt::Debug + Send + Sync {
    fn access_token(&self) -> TokenFuture<'_>;
}

/// A fixed access token, e.g. one passed in through the environment.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken([redacted])")
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> TokenFuture<'_> {
        Box::pin(async move {
            if self.0.trim().is_empty() {
                eyre::bail!("access token is empty");
            }
            Ok(self.0.clone())
        })
    }
}

/// A token obtained through an OAuth flow run elsewhere. It is used as-is and never refreshed.
impl TokenSource for BasicTokenResponse {
    fn access_token(&self) -> TokenFuture<'_> {
        Box::pin(async move { Ok(TokenResponse::access_token(self).secret().to_string()) })
    }
}

/// Output of [`YouTubeClient::stream_live_chat_messages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// The server accepted the connection; events follow.
    Connected,
    Event(SseEvent),
}

/// Client for the live chat endpoints of the YouTube Data API v3.
///
/// Cheap to clone; clones share the HTTP connection pool and the token source.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    token: Arc<dyn TokenSource>,
    /// HTTP client for API requests
    client: reqwest::Client,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(token: impl TokenSource + 'static) -> Self {
        Self {
            token: Arc::new(token),
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different API root, such as a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn fresh_access_token(&self) -> Result<String> {
        self.token
            .access_token()
            .await
            .context("get access token for YouTube API")
            .map_err(ChatError::Credential)
    }

    async fn authorized(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let access_token = self.fresh_access_token().await?;
        Ok(self
            .client
            .request(method, self.endpoint(path))
            .header(AUTHORIZATION, format!("Bearer {access_token}")))
    }

    /// Sends a request and turns non-success statuses into [`ApiError`]s.
    async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = ApiError::from_response_body(status, &body);
            tracing::debug!(%status, reason = %error.reason, "YouTube API request failed");
            return Err(error.into());
        }

        Ok(response)
    }

    /// Makes an authenticated request to `path` (relative to the base URL).
    ///
    /// Returns the raw [`reqwest::Response`] for endpoint-specific decoding.
    #[instrument(skip(self, json_body), level = tracing::Level::TRACE)]
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        path: &str,
        query_params: &[(&str, &str)],
        json_body: Option<&impl Serialize>,
    ) -> Result<reqwest::Response> {
        let mut request = self.authorized(method, path).await?.query(query_params);
        if let Some(body) = json_body {
            request = request.json(body);
        }
        Self::send(request).await
    }

    /// Decodes a JSON response body.
    pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetches one page of chat messages starting at `page_token`.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/list>
    #[instrument(skip(self, options))]
    pub async fn fetch_live_chat_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
        options: &ChatOptions,
    ) -> Result<LiveChatMessageListResponse> {
        let max_results = options.max_results().to_string();
        let image_size = options.profile_image_size().to_string();
        let query = chat_query(
            live_chat_id,
            page_token,
            options.parts(),
            &max_results,
            &image_size,
        );

        let response = self
            .make_authenticated_request(Method::GET, "liveChat/messages", &query, None::<&()>)
            .await?;
        let page: LiveChatMessageListResponse = Self::decode(response).await?;

        tracing::debug!(
            items = page.items.len(),
            next = page.next_page_token.as_deref(),
            interval_ms = page.polling_interval_millis,
            "fetched live chat page"
        );
        Ok(page)
    }

    /// Opens the server-push variant of the message list.
    ///
    /// The stream yields [`StreamItem::Connected`] once the server answers with a success status,
    /// then one [`StreamItem::Event`] per decoded frame. It ends when the server closes the
    /// connection or after the first error.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/streamList>
    pub fn stream_live_chat_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
        options: &ChatOptions,
    ) -> impl Stream<Item = Result<StreamItem>> + Send + 'static {
        let client = self.clone();
        let live_chat_id = live_chat_id.to_string();
        let page_token = page_token.map(str::to_string);
        let parts = options.parts().to_string();
        let max_results = options.max_results().to_string();
        let image_size = options.profile_image_size().to_string();

        async_stream::stream! {
            let query = chat_query(
                &live_chat_id,
                page_token.as_deref(),
                &parts,
                &max_results,
                &image_size,
            );
            let request = match client.authorized(Method::GET, "liveChat/messages/stream").await {
                Ok(request) => request.header(ACCEPT, "text/event-stream").query(&query),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let response = match Self::send(request).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            tracing::debug!(%live_chat_id, "live chat stream connected");
            yield Ok(StreamItem::Connected);

            let mut decoder = SseDecoder::new();
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for event in decoder.feed(&bytes) {
                            yield Ok(StreamItem::Event(event));
                        }
                    }
                    Err(e) => {
                        yield Err(ChatError::Transport(e));
                        return;
                    }
                }
            }
            if let Some(event) = decoder.finish() {
                yield Ok(StreamItem::Event(event));
            }
        }
    }
}

fn chat_query<'a>(
    live_chat_id: &'a str,
    page_token: Option<&'a str>,
    parts: &'a str,
    max_results: &'a str,
    image_size: &'a str,
) -> Vec<(&'static str, &'a str)> {
    let mut query = vec![
        ("liveChatId", live_chat_id),
        ("part", parts),
        ("maxResults", max_results),
        ("profileImageSize", image_size),
    ];
    if let Some(token) = page_token.filter(|t| !t.is_empty()) {
        query.push(("pageToken", token));
    }
    query
}
