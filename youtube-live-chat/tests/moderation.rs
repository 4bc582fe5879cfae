//! Moderation commands: request shapes, local validation and error mapping.

mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use tokio_stream::StreamExt;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use youtube_live_chat::youtube_api::{BanType, ChatMode};
use youtube_live_chat::{ApiErrorReason, ChatError, LiveChatPoller};

/// Fails the test on drop if any request reaches the server.
async fn no_requests(server: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

fn ban_response(ban_type: &str, duration: Option<&str>) -> serde_json::Value {
    let mut snippet = json!({
        "liveChatId": CHAT,
        "type": ban_type,
        "bannedUserDetails": {"channelId": "UCtroll", "displayName": "Troll"}
    });
    if let Some(duration) = duration {
        snippet["banDurationSeconds"] = json!(duration);
    }
    json!({"kind": "youtube#liveChatBan", "id": "ban-1", "snippet": snippet})
}

#[tokio::test]
async fn zero_timeout_is_rejected_locally() {
    let server = MockServer::start().await;
    no_requests(&server).await;
    let poller = LiveChatPoller::new(client(&server), CHAT);

    let err = poller
        .timeout_user("UCtroll", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ChatError::Validation { field: "ban duration", .. }),
        "{err}"
    );
    let err = poller
        .timeout_user("UCtroll", Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn invalid_input_never_reaches_the_network() {
    let server = MockServer::start().await;
    no_requests(&server).await;
    let poller = LiveChatPoller::new(client(&server), CHAT);

    assert!(poller.send_message("").await.unwrap_err().is_validation());
    assert!(
        poller
            .send_message(&"x".repeat(201))
            .await
            .unwrap_err()
            .is_validation()
    );
    assert!(poller.delete_message(" ").await.unwrap_err().is_validation());
    assert!(poller.ban_user("").await.unwrap_err().is_validation());
    assert!(poller.unban_user("").await.unwrap_err().is_validation());
    assert!(poller.add_moderator("").await.unwrap_err().is_validation());
    assert!(poller.remove_moderator("").await.unwrap_err().is_validation());
    assert!(
        poller
            .transition_chat_mode(ChatMode::SlowMode)
            .await
            .unwrap_err()
            .is_validation()
    );
    assert!(
        poller
            .transition_chat_mode_with_delay(ChatMode::Normal, Some(Duration::from_secs(5)))
            .await
            .unwrap_err()
            .is_validation()
    );
    assert!("".parse::<ChatMode>().unwrap_err().is_validation());

    let empty = LiveChatPoller::new(client(&server), "");
    let mut moderators = std::pin::pin!(empty.list_moderators());
    assert!(moderators.next().await.unwrap().unwrap_err().is_validation());
    assert!(moderators.next().await.is_none());
}

#[tokio::test]
async fn send_message_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/liveChat/messages"))
        .and(query_param("part", "snippet"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "snippet": {
                "liveChatId": CHAT,
                "type": "textMessageEvent",
                "textMessageDetails": {"messageText": "hello chat"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_item("sent-1", "hello chat")))
        .expect(1)
        .mount(&server)
        .await;

    let poller = LiveChatPoller::new(client(&server), CHAT);
    let sent = poller.send_message("hello chat").await.unwrap();
    assert_eq!(sent.id, "sent-1");
    assert_eq!(sent.text(), Some("hello chat"));
}

#[tokio::test]
async fn ban_and_timeout_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/liveChat/bans"))
        .and(query_param("part", "snippet"))
        .and(body_json(json!({
            "snippet": {
                "liveChatId": CHAT,
                "type": "permanent",
                "bannedUserDetails": {"channelId": "UCtroll"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ban_response("permanent", None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/liveChat/bans"))
        .and(body_json(json!({
            "snippet": {
                "liveChatId": CHAT,
                "type": "temporary",
                "banDurationSeconds": "300",
                "bannedUserDetails": {"channelId": "UCtroll"}
            }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ban_response("temporary", Some("300"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/liveChat/bans"))
        .and(query_param("id", "ban-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let poller = LiveChatPoller::new(client(&server), CHAT);
    let ban = poller.ban_user("UCtroll").await.unwrap();
    assert_eq!(ban.snippet.ban_type, BanType::Permanent);
    assert_eq!(ban.snippet.banned_user_details.display_name.as_deref(), Some("Troll"));

    let timeout = poller
        .timeout_user("UCtroll", Duration::from_secs(300))
        .await
        .unwrap();
    assert_eq!(timeout.snippet.ban_duration_seconds.as_deref(), Some("300"));

    poller.unban_user(&ban.id).await.unwrap();
}

#[tokio::test]
async fn moderators_round_trip() {
    let server = MockServer::start().await;
    let moderator = |id: &str, channel: &str| {
        json!({
            "id": id,
            "snippet": {"liveChatId": CHAT, "moderatorDetails": {"channelId": channel}}
        })
    };
    Mock::given(method("POST"))
        .and(path("/liveChat/moderators"))
        .and(body_json(json!({
            "snippet": {"liveChatId": CHAT, "moderatorDetails": {"channelId": "UCmod"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(moderator("mod-1", "UCmod")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/liveChat/moderators"))
        .and(query_param("liveChatId", CHAT))
        .and(query_param("part", "id,snippet"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [moderator("mod-2", "UCother")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/liveChat/moderators"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "page-2",
            "items": [moderator("mod-1", "UCmod")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/liveChat/moderators"))
        .and(query_param("id", "mod-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let poller = LiveChatPoller::new(client(&server), CHAT);
    let added = poller.add_moderator("UCmod").await.unwrap();
    assert_eq!(added.snippet.moderator_details.channel_id, "UCmod");

    let ids: Vec<String> = poller
        .list_moderators()
        .map(|m| m.map(|m| m.id))
        .collect::<Result<_, _>>()
        .await
        .unwrap();
    assert_eq!(ids, ["mod-1", "mod-2"]);

    poller.remove_moderator(&added.id).await.unwrap();
}

#[tokio::test]
async fn chat_mode_transitions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/liveChat/messages/transition"))
        .and(body_json(json!({"liveChatId": CHAT, "mode": "slowMode", "delayMs": 30000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/liveChat/messages/transition"))
        .and(body_json(json!({"liveChatId": CHAT, "mode": "membersOnly"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let poller = LiveChatPoller::new(client(&server), CHAT);
    poller
        .transition_chat_mode_with_delay(ChatMode::SlowMode, Some(Duration::from_secs(30)))
        .await
        .unwrap();
    let mode: ChatMode = "membersOnly".parse().unwrap();
    poller.transition_chat_mode(mode).await.unwrap();
}

#[tokio::test]
async fn api_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/liveChat/messages"))
        .and(query_param("id", "gone"))
        .respond_with(ResponseTemplate::new(403).set_body_json(api_error("liveChatDisabled")))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/liveChat/messages"))
        .and(query_param("id", "plain"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let poller = LiveChatPoller::new(client(&server), CHAT);
    let err = poller.delete_message("gone").await.unwrap_err();
    assert_eq!(err.api_reason(), Some(&ApiErrorReason::ChatDisabled));
    assert!(!err.is_validation());

    let err = poller.delete_message("plain").await.unwrap_err();
    let ChatError::Api(api) = err else {
        panic!("expected api error, got {err}");
    };
    assert_eq!(api.status.as_u16(), 404);
    assert_eq!(api.reason, ApiErrorReason::ChatNotFound);
    assert_eq!(api.message, "not here");
}
