// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Durable key/value state backed by an embedded sled database.
//!
//! Values are stored as JSON so every persisted type only needs serde
//! derives. The daemon is single-instance, and all writes happen from the
//! serialized session event consumer, so no cross-process locking exists
//! beyond what sled itself provides.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Well-known store keys.
pub mod keys {
    /// Last reported mains-power state (`bool`).
    pub const POWER_STATE: &str = "acInputState";
    /// Reference to the last successfully sent message.
    pub const LAST_MESSAGE: &str = "lastMessage";
    /// Cached provider credentials.
    pub const CREDENTIALS: &str = "providerCredentials";
    /// Notification channel bot token.
    pub const BOT_TOKEN: &str = "botToken";
    /// Notification target chat id (`i64`).
    pub const CHAT_ID: &str = "chatId";
    /// Notification target topic/thread id (`i64`, 0 when unused).
    pub const TOPIC_ID: &str = "topicId";
    /// Random prefix kept stable across restarts for MQTT client ids.
    pub const CLIENT_ID_PREFIX: &str = "clientIdPrefix";
}

/// Typed get/set persistence over a sled tree.
#[derive(Debug, Clone)]
pub struct StateStore {
    db: sled::Db,
}

impl StateStore {
    /// Opens (or creates) the store at the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Reads and decodes a value.
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or when the stored bytes do
    /// not decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.db.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| StoreError::Encoding {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    /// Encodes and writes a value, flushing to disk.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or when `value` cannot be
    /// encoded.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Encoding {
            key: key.to_string(),
            source,
        })?;
        self.db.insert(key, bytes)?;
        self.db.flush()?;
        Ok(())
    }

}
