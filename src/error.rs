// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for `gridwatch`.
//!
//! The hierarchy mirrors the failure classes of the daemon: configuration
//! problems are fatal at startup, certification and transport problems are
//! fatal for the current connect cycle, notification delivery problems are
//! logged and absorbed, and malformed telemetry is dropped without ever
//! producing an error at all.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credential exchange with the provider failed. Fatal for the cycle.
    #[error("certification error: {0}")]
    Auth(#[from] AuthError),

    /// MQTT transport failure. Fatal, triggers graceful shutdown.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Notification delivery failure. Logged, never fatal.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Persistent state store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised while validating configuration and credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential field is empty or missing.
    #[error("missing credential field: {0}")]
    MissingCredential(&'static str),

    /// The keep-alive interval is zero.
    #[error("keep-alive interval must be at least 1 second")]
    InvalidKeepAlive,

    /// The night interval string is not of the form `"HH:HH"`.
    #[error("invalid night interval {value:?}: {reason}")]
    InvalidNightWindow {
        /// The string that failed to parse.
        value: String,
        /// Description of the parsing failure.
        reason: String,
    },

    /// The timezone string is not a fixed UTC offset such as `+02:00`.
    #[error("invalid timezone offset: {0}")]
    InvalidTimezone(String),

    /// The notification target chat id is missing or not a number.
    #[error("invalid chat target: {0}")]
    InvalidChatTarget(String),

    /// Reading an interactive prompt failed.
    #[error("prompt failed: {0}")]
    Prompt(String),
}

/// Errors raised while exchanging long-lived credentials for short-lived
/// MQTT broker credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success envelope.
    #[error("provider rejected the request: code {code} ({message})")]
    Envelope {
        /// Provider status code (`"0"` means success).
        code: String,
        /// Provider status message.
        message: String,
    },

    /// A required field is missing from the certification payload.
    #[error("missing field in certification response: {0}")]
    MissingField(&'static str),

    /// The certification payload carries a value we cannot use.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: &'static str,
        /// Description of the parsing failure.
        message: String,
    },

    /// The broker endpoint does not speak a secure MQTT scheme.
    #[error("certification returned insecure protocol {0:?}")]
    InsecureProtocol(String),
}

/// Errors related to the MQTT transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// MQTT connection or communication failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect or subscribe did not complete in time.
    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    /// The broker event loop terminated with an error.
    #[error("broker connection lost: {0}")]
    ConnectionLost(String),
}

/// Errors related to delivering notifications through the channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request to the channel API failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The channel API answered with an error description.
    #[error("channel API error: {0}")]
    Api(String),

    /// The API response was missing an expected field.
    #[error("unexpected channel response: {0}")]
    UnexpectedResponse(String),
}

/// Errors related to the persistent key/value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying sled database failed.
    #[error("database error: {0}")]
    Db(#[from] sled::Error),

    /// A stored value could not be encoded or decoded.
    #[error("value encoding error for key {key:?}: {source}")]
    Encoding {
        /// The key whose value failed to round-trip.
        key: String,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
