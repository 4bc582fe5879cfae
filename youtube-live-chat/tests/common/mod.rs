#![allow(dead_code)]

use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::MockServer;
use youtube_live_chat::youtube_api::{StaticToken, YouTubeClient};
use youtube_live_chat::{BackoffPolicy, ChatHandlers, ChatOptions};

pub const CHAT: &str = "chat-1";
pub const WAIT: Duration = Duration::from_secs(5);

pub fn client(server: &MockServer) -> YouTubeClient {
    YouTubeClient::new(StaticToken::new("test-token")).with_base_url(server.uri())
}

/// Millisecond-scale intervals and backoff so loops turn over quickly.
pub fn fast_options() -> ChatOptions {
    ChatOptions::default()
        .with_poll_interval_bounds(Duration::from_millis(10), Duration::from_millis(50))
        .with_default_poll_interval(Duration::from_millis(10))
        .with_backoff(
            BackoffPolicy::new(Duration::from_millis(10), 2.0, Duration::from_millis(50))
                .with_jitter(0.0),
        )
}

pub fn text_item(id: &str, text: &str) -> Value {
    json!({
        "id": id,
        "snippet": {
            "type": "textMessageEvent",
            "liveChatId": CHAT,
            "authorChannelId": "UCviewer",
            "publishedAt": "2024-03-01T12:00:00Z",
            "displayMessage": text,
            "textMessageDetails": {"messageText": text}
        },
        "authorDetails": {
            "channelId": "UCviewer",
            "displayName": "Viewer",
            "profileImageUrl": "https://example.com/a.png"
        }
    })
}

pub fn deleted_item(id: &str, deleted: &str) -> Value {
    json!({
        "id": id,
        "snippet": {
            "type": "messageDeletedEvent",
            "publishedAt": "2024-03-01T12:00:00Z",
            "messageDeletedDetails": {"deletedMessageId": deleted}
        }
    })
}

pub fn page(next: &str, items: Vec<Value>) -> Value {
    json!({
        "kind": "youtube#liveChatMessageListResponse",
        "nextPageToken": next,
        "pollingIntervalMillis": 10,
        "pageInfo": {"totalResults": items.len(), "resultsPerPage": items.len()},
        "items": items
    })
}

pub fn api_error(reason: &str) -> Value {
    json!({
        "error": {
            "code": 403,
            "message": format!("{reason} happened"),
            "errors": [{"domain": "youtube.liveChat", "reason": reason}]
        }
    })
}

/// What the handlers observed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Connect,
    Disconnect,
    Message(String),
    Delete(String),
    Ban(String),
    Error { chat_ended: bool, text: String },
    PollComplete(usize),
    Response(Option<String>),
}

pub fn record(handlers: &ChatHandlers) -> mpsc::UnboundedReceiver<Seen> {
    let (tx, rx) = mpsc::unbounded_channel();

    let t = tx.clone();
    handlers.on_connect(move || {
        let _ = t.send(Seen::Connect);
    });
    let t = tx.clone();
    handlers.on_disconnect(move || {
        let _ = t.send(Seen::Disconnect);
    });
    let t = tx.clone();
    handlers.on_message(move |m| {
        let _ = t.send(Seen::Message(m.id.clone()));
    });
    let t = tx.clone();
    handlers.on_delete(move |m| {
        let _ = t.send(Seen::Delete(m.id.clone()));
    });
    let t = tx.clone();
    handlers.on_ban(move |m| {
        let _ = t.send(Seen::Ban(m.id.clone()));
    });
    let t = tx.clone();
    handlers.on_error(move |e| {
        let _ = t.send(Seen::Error {
            chat_ended: e.is_chat_ended(),
            text: e.to_string(),
        });
    });
    let t = tx.clone();
    handlers.on_poll_complete(move |count, _| {
        let _ = t.send(Seen::PollComplete(count));
    });
    handlers.on_response(move |page| {
        let _ = tx.send(Seen::Response(page.next_page_token.clone()));
    });

    rx
}

/// Receives until `pred` matches, returning everything seen up to and including the match.
pub async fn until(
    rx: &mut mpsc::UnboundedReceiver<Seen>,
    pred: impl Fn(&Seen) -> bool,
) -> Vec<Seen> {
    let mut seen = Vec::new();
    tokio::time::timeout(WAIT, async {
        while let Some(event) = rx.recv().await {
            let done = pred(&event);
            seen.push(event);
            if done {
                return;
            }
        }
        panic!("handlers dropped before a match; saw {seen:?}");
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for event"));
    seen
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Vec<Seen> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    seen
}
