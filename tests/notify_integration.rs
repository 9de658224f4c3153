// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the Telegram Bot API channel using wiremock.

use gridwatch::i18n::Locale;
use gridwatch::{
    BotChannel, NotificationChannel, NotificationPipeline, NotifyError, PipelineConfig, StateStore,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "1234567890:TESTTOKEN";
const CHAT_ID: i64 = -1009876;

fn ok_message(message_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": {"message_id": message_id},
    }))
}

fn ok_true() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true}))
}

async fn channel(server: &MockServer, topic_id: Option<i64>) -> BotChannel {
    BotChannel::with_api_base(server.uri(), TOKEN, CHAT_ID, topic_id).unwrap()
}

#[tokio::test]
async fn send_returns_the_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({
            "chat_id": CHAT_ID,
            "text": "Electricity is returned",
            "disable_notification": false,
        })))
        .respond_with(ok_message(42))
        .expect(1)
        .mount(&server)
        .await;

    let id = channel(&server, None)
        .await
        .send("Electricity is returned", false)
        .await
        .unwrap();
    assert_eq!(id, 42);
}

#[tokio::test]
async fn silent_send_disables_the_notification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({"disable_notification": true})))
        .respond_with(ok_message(7))
        .expect(1)
        .mount(&server)
        .await;

    channel(&server, None)
        .await
        .send("Electricity is cut off", true)
        .await
        .unwrap();
}

#[tokio::test]
async fn topic_id_becomes_the_message_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({"message_thread_id": 55})))
        .respond_with(ok_message(8))
        .expect(1)
        .mount(&server)
        .await;

    channel(&server, Some(55))
        .await
        .send("Electricity is returned", false)
        .await
        .unwrap();
}

#[tokio::test]
async fn api_rejection_carries_the_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was kicked",
        })))
        .mount(&server)
        .await;

    let err = channel(&server, None)
        .await
        .send("Electricity is returned", false)
        .await
        .unwrap_err();
    match err {
        NotifyError::Api(message) => assert!(message.contains("bot was kicked")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn target_verification_fetches_the_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/getChat")))
        .and(body_partial_json(json!({"chat_id": CHAT_ID})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"id": CHAT_ID, "title": "Outage alerts", "type": "supergroup"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    channel(&server, None).await.verify_target().await.unwrap();
}

#[tokio::test]
async fn target_verification_fails_for_unknown_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/getChat")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found",
        })))
        .mount(&server)
        .await;

    let err = channel(&server, None)
        .await
        .verify_target()
        .await
        .unwrap_err();
    match err {
        NotifyError::Api(message) => assert!(message.contains("chat not found")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn pin_and_unpin_target_the_right_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/pinChatMessage")))
        .and(body_partial_json(json!({
            "chat_id": CHAT_ID,
            "message_id": 42,
            "disable_notification": true,
        })))
        .respond_with(ok_true())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/unpinChatMessage")))
        .and(body_partial_json(json!({"chat_id": CHAT_ID, "message_id": 41})))
        .respond_with(ok_true())
        .expect(1)
        .mount(&server)
        .await;

    let channel = channel(&server, None).await;
    channel.pin(42).await.unwrap();
    channel.unpin(41).await.unwrap();
}

// Full path: two decoded transitions rotate the pinned message on a real
// (mocked) Bot API, with state persisted between them.
#[tokio::test]
async fn pipeline_rotates_the_pin_through_the_bot_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({"text": "Electricity is returned"})))
        .respond_with(ok_message(41))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({"text": "Electricity is cut off"})))
        .respond_with(ok_message(42))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/pinChatMessage")))
        .respond_with(ok_true())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/unpinChatMessage")))
        .and(body_partial_json(json!({"message_id": 41})))
        .respond_with(ok_true())
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let pipeline = NotificationPipeline::new(
        channel(&server, None).await,
        store,
        PipelineConfig {
            locale: Locale::En,
            pin_message: true,
            unpin_previous: true,
            ..PipelineConfig::default()
        },
        CHAT_ID,
    );

    pipeline.on_power_state(true).await.unwrap();
    pipeline.on_power_state(false).await.unwrap();
}
