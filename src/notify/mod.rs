// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notification delivery: the channel capability and the state-change
//! pipeline.
//!
//! Callers never branch on which concrete channel is in use; everything
//! goes through the [`NotificationChannel`] trait. The shipped
//! implementation is [`BotChannel`], a Telegram Bot API client.

mod bot;
mod pipeline;

pub use bot::BotChannel;
pub use pipeline::{NotificationPipeline, PipelineConfig};

use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Identifier of a message accepted by the channel.
pub type MessageId = i64;

/// Reference to the last successfully sent message.
///
/// Persisted so that "unpin previous" survives process restarts.
/// Overwritten on every successful send, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessageRef {
    /// The message id returned by the channel.
    pub message_id: MessageId,
    /// The chat the message was delivered to.
    pub chat_id: i64,
}

/// Capability interface of a notification channel.
#[allow(async_fn_in_trait)]
pub trait NotificationChannel {
    /// Delivers a message and returns its id.
    ///
    /// `silent` suppresses the audible/visible alert without suppressing
    /// delivery.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel rejects or fails to deliver the
    /// message.
    async fn send(&self, text: &str, silent: bool) -> Result<MessageId, NotifyError>;

    /// Pins a previously sent message.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel rejects the pin.
    async fn pin(&self, message_id: MessageId) -> Result<(), NotifyError>;

    /// Unpins a previously pinned message.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel rejects the unpin.
    async fn unpin(&self, message_id: MessageId) -> Result<(), NotifyError>;

    /// Best-effort teardown during shutdown. The default does nothing,
    /// which suits stateless HTTP channels.
    async fn close(&self) {}
}
