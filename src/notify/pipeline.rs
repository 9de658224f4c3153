// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State-change notification pipeline.
//!
//! Turns the stream of observed power states into at most one notification
//! per transition. The persisted power state is the dedupe anchor: it is
//! updated only after a successful send, so a failed delivery can be
//! retried by the next differing observation. Pin/unpin is best-effort
//! decoration and never rolls the state back.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

use crate::config::NightWindow;
use crate::error::StoreError;
use crate::i18n::Locale;
use crate::notify::{NotificationChannel, PendingMessageRef};
use crate::store::{StateStore, keys};

/// Timestamp prefix format for notification texts.
const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Behavioural knobs of the pipeline, derived from [`crate::config::Settings`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Locale for the notification text.
    pub locale: Locale,
    /// Silent-hours window, if configured.
    pub night_window: Option<NightWindow>,
    /// Fixed UTC offset for timestamps and night checks; `None` uses the
    /// system local zone.
    pub timezone: Option<FixedOffset>,
    /// Prefix the text with a timestamp.
    pub add_timestamp: bool,
    /// Pin each notification to the chat.
    pub pin_message: bool,
    /// Unpin the previously pinned message after pinning a new one.
    pub unpin_previous: bool,
}

/// Deduplicating notification pipeline over a [`NotificationChannel`].
#[derive(Debug)]
pub struct NotificationPipeline<C> {
    channel: C,
    store: StateStore,
    config: PipelineConfig,
    /// Channel target recorded in the persisted message reference.
    target: i64,
}

impl<C: NotificationChannel> NotificationPipeline<C> {
    /// Creates a pipeline delivering through `channel` and persisting
    /// through `store`.
    pub fn new(channel: C, store: StateStore, config: PipelineConfig, target: i64) -> Self {
        Self {
            channel,
            store,
            config,
            target,
        }
    }

    /// Handles one observed power state.
    ///
    /// No-op when the state equals the persisted one. Otherwise composes
    /// and sends the notification, persists the new state and message
    /// reference once the send succeeded, then performs the optional
    /// pin/unpin bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an error only on persistent-store failure. Delivery and
    /// pin failures are logged and absorbed.
    pub async fn on_power_state(&self, present: bool) -> Result<(), StoreError> {
        self.handle(present, Utc::now()).await
    }

    /// Clock-injected worker behind [`Self::on_power_state`].
    async fn handle(&self, present: bool, now: DateTime<Utc>) -> Result<(), StoreError> {
        let previous: Option<bool> = self.store.get(keys::POWER_STATE)?;
        if previous == Some(present) {
            tracing::debug!(present, "power state unchanged");
            return Ok(());
        }

        let text = self.compose(present, now);
        let silent = self.is_silent(now);
        tracing::info!(%text, silent, "power state changed");

        let message_id = match self.channel.send(&text, silent).await {
            Ok(id) => id,
            Err(error) => {
                tracing::error!(%error, "failed to send notification");
                return Ok(());
            }
        };

        self.store.set(keys::POWER_STATE, &present)?;
        let previous_ref: Option<PendingMessageRef> = self.store.get(keys::LAST_MESSAGE)?;
        let new_ref = PendingMessageRef {
            message_id,
            chat_id: self.target,
        };
        self.store.set(keys::LAST_MESSAGE, &new_ref)?;

        if self.config.pin_message {
            self.pin_and_rotate(message_id, previous_ref).await;
        }
        Ok(())
    }

    /// Pins the new message, then unpins the previous one when configured.
    /// First-ever pin has no previous reference and skips the unpin
    /// silently.
    async fn pin_and_rotate(&self, message_id: i64, previous: Option<PendingMessageRef>) {
        if let Err(error) = self.channel.pin(message_id).await {
            tracing::error!(%error, message_id, "failed to pin message");
            return;
        }
        tracing::debug!(message_id, "message pinned");

        if !self.config.unpin_previous {
            return;
        }
        let Some(previous) = previous else {
            return;
        };
        if let Err(error) = self.channel.unpin(previous.message_id).await {
            tracing::error!(%error, message_id = previous.message_id, "failed to unpin message");
        } else {
            tracing::debug!(message_id = previous.message_id, "previous message unpinned");
        }
    }

    /// Composes the localized notification text.
    fn compose(&self, present: bool, now: DateTime<Utc>) -> String {
        let message = self.config.locale.power_message(present);
        if self.config.add_timestamp {
            let stamp = match self.config.timezone {
                Some(offset) => now.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string(),
                None => now
                    .with_timezone(&chrono::Local)
                    .format(TIMESTAMP_FORMAT)
                    .to_string(),
            };
            format!("{stamp}: {message}")
        } else {
            message.to_string()
        }
    }

    /// Returns whether the current local hour falls inside the configured
    /// night window.
    fn is_silent(&self, now: DateTime<Utc>) -> bool {
        let Some(window) = self.config.night_window else {
            return false;
        };
        let hour = match self.config.timezone {
            Some(offset) => now.with_timezone(&offset).hour(),
            None => now.with_timezone(&chrono::Local).hour(),
        };
        // Hour is always in 0..24.
        #[allow(clippy::cast_possible_truncation)]
        window.contains(hour as u8)
    }
}
