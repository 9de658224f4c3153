// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `gridwatch` - a mains-power outage watchdog.
//!
//! Watches a power station's AC-input telemetry (voltage, current,
//! frequency) published over MQTT by the vendor's cloud broker, detects
//! transitions between "mains present" and "mains absent", and delivers a
//! deduplicated, optionally pinned, optionally silenced notification to a
//! Telegram chat.
//!
//! # Architecture
//!
//! - [`credentials`]: resolves long-lived secrets (environment, persisted
//!   store, interactive prompt).
//! - [`auth`]: exchanges them for short-lived MQTT broker credentials via
//!   the provider's signed-request or login API.
//! - [`session`]: owns the MQTT session lifecycle, the liveness watchdog,
//!   and the escalating soft/full reconnect policy.
//! - [`telemetry`]: decodes a raw payload into an AC-input reading.
//! - [`notify`]: deduplicates state transitions against persisted state
//!   and delivers through a channel capability (Telegram Bot API).
//! - [`store`]: durable typed key/value state on sled.
//!
//! All session and pipeline state is mutated from a single serialized
//! event consumer, so transitions never interleave.

pub mod app;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod i18n;
pub mod notify;
pub mod session;
pub mod store;
pub mod telemetry;

pub use auth::{AuthClient, BrokerConnectInfo, Transport};
pub use config::{AuthMethod, NightWindow, Settings};
pub use credentials::Credentials;
pub use error::{AuthError, ConfigError, Error, NotifyError, Result, StoreError, TransportError};
pub use notify::{BotChannel, NotificationChannel, NotificationPipeline, PipelineConfig};
pub use session::{ConnectivityManager, SessionConfig, SessionState};
pub use store::StateStore;
pub use telemetry::AcInputReading;
