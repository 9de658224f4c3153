// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Daemon wiring: resolves configuration and collaborators, then hands
//! control to the connectivity manager until shutdown.

use tokio::sync::watch;
use uuid::Uuid;

use crate::auth::AuthClient;
use crate::config::Settings;
use crate::credentials::{CredentialResolver, Prompt, StdinPrompt};
use crate::error::{ConfigError, Result};
use crate::notify::{BotChannel, NotificationChannel, NotificationPipeline, PipelineConfig};
use crate::session::{ConnectivityManager, SessionConfig};
use crate::store::{StateStore, keys};

/// Telegram bot tokens are at least this long; shorter environment values
/// are ignored as misconfiguration.
const BOT_TOKEN_MINIMUM_LENGTH: usize = 43;

/// The notification target: a chat and an optional forum topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChatTarget {
    chat_id: i64,
    topic_id: Option<i64>,
}

/// Runs the daemon until shutdown or a fatal error.
///
/// # Errors
///
/// Returns configuration, certification, transport, or store errors; the
/// caller logs them and exits. All exit paths use code 0.
pub async fn run(settings: Settings) -> Result<()> {
    // Validate the derived configuration up front so a malformed night
    // interval or timezone fails at startup, not at notification time.
    let night_window = settings.night_window()?;
    let timezone = settings.timezone_offset()?;
    let keep_alive = settings.keep_alive_interval()?;

    let store = StateStore::open(&settings.data_dir)?;

    let credentials =
        CredentialResolver::new(&store, StdinPrompt).resolve(settings.auth_method)?;
    tracing::info!(device = credentials.device_serial(), "credentials resolved");
    let token = resolve_bot_token(&store, &mut StdinPrompt, |name| std::env::var(name).ok())?;
    let target = resolve_chat_target(&store, &mut StdinPrompt, |name| std::env::var(name).ok())?;

    let channel = BotChannel::new(token, target.chat_id, target.topic_id)
        .map_err(crate::error::Error::Notify)?;
    // Catches a wrong chat id or a bot that was never added to the chat
    // before the first outage, not after.
    channel
        .verify_target()
        .await
        .map_err(crate::error::Error::Notify)?;

    let pipeline = NotificationPipeline::new(
        channel.clone(),
        store.clone(),
        PipelineConfig {
            locale: settings.language,
            night_window,
            timezone,
            add_timestamp: settings.add_timestamp,
            pin_message: settings.pin_message,
            unpin_previous: settings.unpin_previous,
        },
        target.chat_id,
    );

    let auth = AuthClient::new(&settings.api_url)?;
    let session_config = SessionConfig {
        keep_alive,
        log_alive: settings.log_alive(),
        reconnect_threshold: settings.reconnect_threshold,
    };
    let mut manager = ConnectivityManager::new(
        auth,
        credentials,
        client_id_prefix(&store)?,
        session_config,
        pipeline,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    tracing::info!("gridwatch is running");
    let result = manager.run(shutdown_rx).await;

    // Best-effort channel teardown; partial failures are logged inside
    // and never block shutdown.
    channel.close().await;
    result
}

/// Returns the persisted random client-id prefix, creating it on first
/// run.
fn client_id_prefix(store: &StateStore) -> Result<String> {
    if let Some(prefix) = store.get::<String>(keys::CLIENT_ID_PREFIX)? {
        return Ok(prefix);
    }
    let prefix = Uuid::new_v4().to_string().to_uppercase();
    store.set(keys::CLIENT_ID_PREFIX, &prefix)?;
    Ok(prefix)
}

/// Resolves the bot token: environment, store, then prompt.
fn resolve_bot_token(
    store: &StateStore,
    prompt: &mut impl Prompt,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    if let Some(token) = env("TELEGRAM_BOT_AUTH_TOKEN")
        && token.len() >= BOT_TOKEN_MINIMUM_LENGTH
    {
        store.set(keys::BOT_TOKEN, &token)?;
        return Ok(token);
    }
    if let Some(token) = store.get::<String>(keys::BOT_TOKEN)?
        && !token.is_empty()
    {
        return Ok(token);
    }
    let token = prompt.secret("Enter your Bot Auth Token")?;
    if token.is_empty() {
        return Err(ConfigError::MissingCredential("bot token").into());
    }
    store.set(keys::BOT_TOKEN, &token)?;
    Ok(token)
}

/// Resolves the chat and topic ids: environment, store, then prompt.
/// A topic id of 0 means "no topic".
fn resolve_chat_target(
    store: &StateStore,
    prompt: &mut impl Prompt,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ChatTarget> {
    for (var, key) in [
        ("TELEGRAM_CHAT_ID", keys::CHAT_ID),
        ("TELEGRAM_TOPIC_ID", keys::TOPIC_ID),
    ] {
        if let Some(raw) = env(var).filter(|v| !v.is_empty()) {
            let id: i64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidChatTarget(format!("{var}={raw}")))?;
            store.set(key, &id)?;
        }
    }

    let chat_id = match store.get::<i64>(keys::CHAT_ID)? {
        Some(id) if id != 0 => id,
        _ => {
            let raw = prompt.line("Enter your chat ID")?;
            let id: i64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidChatTarget(raw.clone()))?;
            store.set(keys::CHAT_ID, &id)?;
            id
        }
    };

    let topic_id = match store.get::<i64>(keys::TOPIC_ID)? {
        Some(id) => id,
        None => {
            let raw = prompt.line("Enter your topic ID (0 - if no topics)")?;
            let id: i64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidChatTarget(raw.clone()))?;
            store.set(keys::TOPIC_ID, &id)?;
            id
        }
    };

    Ok(ChatTarget {
        chat_id,
        topic_id: (topic_id > 0).then_some(topic_id),
    })
}

/// Waits for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(signal) => signal,
            Err(error) => {
                tracing::warn!(%error, "cannot install SIGTERM handler");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::{HashMap, VecDeque};

    struct FakePrompt {
        answers: VecDeque<String>,
    }

    impl FakePrompt {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(ToString::to_string).collect(),
            }
        }
    }

    impl Prompt for FakePrompt {
        fn line(&mut self, _label: &str) -> std::result::Result<String, ConfigError> {
            self.answers
                .pop_front()
                .ok_or_else(|| ConfigError::Prompt("no answer queued".to_string()))
        }

        fn secret(&mut self, label: &str) -> std::result::Result<String, ConfigError> {
            self.line(label)
        }
    }

    fn temp_store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn chat_target_from_env_is_persisted() {
        let (_dir, store) = temp_store();
        let env: HashMap<&str, &str> =
            HashMap::from([("TELEGRAM_CHAT_ID", "-1001234"), ("TELEGRAM_TOPIC_ID", "7")]);
        let target = resolve_chat_target(&store, &mut FakePrompt::new(&[]), |k| {
            env.get(k).map(ToString::to_string)
        })
        .unwrap();
        assert_eq!(
            target,
            ChatTarget {
                chat_id: -1001234,
                topic_id: Some(7)
            }
        );
        assert_eq!(store.get::<i64>(keys::CHAT_ID).unwrap(), Some(-1001234));
    }

    #[test]
    fn topic_zero_means_no_topic() {
        let (_dir, store) = temp_store();
        let mut prompt = FakePrompt::new(&["-1001234", "0"]);
        let target = resolve_chat_target(&store, &mut prompt, |_| None).unwrap();
        assert_eq!(target.topic_id, None);
        assert_eq!(target.chat_id, -1001234);
    }

    #[test]
    fn non_numeric_chat_id_is_a_config_error() {
        let (_dir, store) = temp_store();
        let mut prompt = FakePrompt::new(&["not-a-number"]);
        let result = resolve_chat_target(&store, &mut prompt, |_| None);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidChatTarget(_)))
        ));
    }

    #[test]
    fn short_env_token_falls_back_to_prompt() {
        let (_dir, store) = temp_store();
        let env: HashMap<&str, &str> = HashMap::from([("TELEGRAM_BOT_AUTH_TOKEN", "too-short")]);
        let mut prompt = FakePrompt::new(&["1234567890:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"]);
        let token =
            resolve_bot_token(&store, &mut prompt, |k| env.get(k).map(ToString::to_string))
                .unwrap();
        assert!(token.starts_with("1234567890:"));
        assert_eq!(store.get::<String>(keys::BOT_TOKEN).unwrap(), Some(token));
    }

    #[test]
    fn stored_token_is_reused() {
        let (_dir, store) = temp_store();
        store.set(keys::BOT_TOKEN, &"stored-token").unwrap();
        let token = resolve_bot_token(&store, &mut FakePrompt::new(&[]), |_| None).unwrap();
        assert_eq!(token, "stored-token");
    }
}
