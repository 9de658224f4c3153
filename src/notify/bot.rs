// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Telegram Bot API notification channel.

use std::time::Duration;

use serde_json::{Value, json};

use crate::error::NotifyError;
use crate::notify::{MessageId, NotificationChannel};

/// Public Bot API endpoint.
const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Request timeout for Bot API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bot-style notification channel targeting a numeric chat id, with an
/// optional forum topic (thread) id.
#[derive(Debug, Clone)]
pub struct BotChannel {
    http: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: i64,
    topic_id: Option<i64>,
}

impl BotChannel {
    /// Creates a channel for the given bot token and chat target.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        token: impl Into<String>,
        chat_id: i64,
        topic_id: Option<i64>,
    ) -> Result<Self, NotifyError> {
        Self::with_api_base(DEFAULT_API_BASE, token, chat_id, topic_id)
    }

    /// Creates a channel against a non-default API base. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_api_base(
        api_base: impl Into<String>,
        token: impl Into<String>,
        chat_id: i64,
        topic_id: Option<i64>,
    ) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id,
            topic_id,
        })
    }

    /// Checks that the configured chat is reachable by this bot.
    ///
    /// Called once at startup so a wrong chat id or a bot that was never
    /// added to the chat surfaces immediately. When a topic id is
    /// configured but the chat is not a forum, a warning is logged; the
    /// send itself would still go to the chat's general thread.
    ///
    /// # Errors
    ///
    /// Returns an error when the chat cannot be fetched.
    pub async fn verify_target(&self) -> Result<(), NotifyError> {
        let chat = self
            .call("getChat", json!({"chat_id": self.chat_id}))
            .await?;
        let title = chat
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("private chat");
        tracing::info!(chat_id = self.chat_id, title, "notification target verified");

        if self.topic_id.is_some()
            && chat.get("is_forum").and_then(Value::as_bool) != Some(true)
        {
            tracing::warn!(
                chat_id = self.chat_id,
                "a topic id is configured but the chat is not a forum"
            );
        }
        Ok(())
    }

    /// Calls a Bot API method and returns the `result` value.
    async fn call(&self, method: &str, payload: Value) -> Result<Value, NotifyError> {
        let url = format!("{}/bot{}/{method}", self.api_base, self.token);
        let body: Value = self.http.post(url).json(&payload).send().await?.json().await?;

        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(body.get("result").cloned().unwrap_or(Value::Null))
        } else {
            let description = body
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(NotifyError::Api(format!("{method}: {description}")))
        }
    }
}

impl NotificationChannel for BotChannel {
    async fn send(&self, text: &str, silent: bool) -> Result<MessageId, NotifyError> {
        let mut payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_notification": silent,
        });
        if let Some(topic_id) = self.topic_id {
            payload["message_thread_id"] = json!(topic_id);
        }

        let result = self.call("sendMessage", payload).await?;
        result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                NotifyError::UnexpectedResponse("sendMessage result has no message_id".to_string())
            })
    }

    async fn pin(&self, message_id: MessageId) -> Result<(), NotifyError> {
        self.call(
            "pinChatMessage",
            json!({
                "chat_id": self.chat_id,
                "message_id": message_id,
                "disable_notification": true,
            }),
        )
        .await?;
        Ok(())
    }

    async fn unpin(&self, message_id: MessageId) -> Result<(), NotifyError> {
        self.call(
            "unpinChatMessage",
            json!({
                "chat_id": self.chat_id,
                "message_id": message_id,
            }),
        )
        .await?;
        Ok(())
    }
}
