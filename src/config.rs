// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line and environment configuration.
//!
//! All tunables of the daemon are collected in [`Settings`], parsed with
//! clap. Values that need validation beyond what clap offers (the night
//! interval, the timezone offset) are parsed into dedicated types up front
//! so that a malformed value fails the process at startup instead of at
//! notification time.

use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use clap::{Parser, ValueEnum};

use crate::error::ConfigError;
use crate::i18n::Locale;

/// Default base URL of the provider HTTP API.
pub const DEFAULT_API_URL: &str = "https://api.ecoflow.com";

/// How the long-lived credentials are exchanged for broker credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AuthMethod {
    /// POST credentials to a login endpoint, then fetch certification with
    /// a bearer token. Works with account username/password.
    #[default]
    Login,
    /// HMAC-SHA256 signed request against the open API. Works with a
    /// developer access-key/secret-key pair.
    SignedRequest,
}

/// Runtime configuration for the daemon.
#[derive(Debug, Parser)]
#[command(name = "gridwatch", version, about)]
pub struct Settings {
    /// Override the provider API base URL.
    #[arg(long, env = "GRIDWATCH_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Credential exchange strategy.
    #[arg(long, value_enum, default_value_t = AuthMethod::Login)]
    pub auth_method: AuthMethod,

    /// Check that the MQTT session is alive every X seconds.
    #[arg(short, long, default_value_t = 60)]
    pub keep_alive: u64,

    /// Log an informational alive status every Y minutes (0 disables).
    #[arg(long, default_value_t = 0)]
    pub log_alive_interval: u64,

    /// Escalate to a full re-authentication after this many consecutive
    /// missed liveness checks (0 disables escalation).
    #[arg(long, default_value_t = 0)]
    pub reconnect_threshold: u32,

    /// Pin the notification message to the chat.
    #[arg(short = 'p', long)]
    pub pin_message: bool,

    /// Unpin the previously pinned message after pinning a new one.
    #[arg(short = 'u', long)]
    pub unpin_previous: bool,

    /// Prefix the notification text with a timestamp.
    #[arg(short = 't', long)]
    pub add_timestamp: bool,

    /// Fixed UTC offset for timestamps and night-time checks, e.g. +02:00.
    #[arg(long = "time-zone", env = "TZ_OFFSET")]
    pub timezone: Option<String>,

    /// Night-time interval "HH:HH" during which notifications are silent.
    /// The interval may wrap past midnight, e.g. "22:06".
    #[arg(long = "night-time")]
    pub night_time: Option<String>,

    /// Language for notification messages.
    #[arg(short, long, value_enum, default_value_t = Locale::En)]
    pub language: Locale,

    /// Enable debug logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Directory for the persistent state database.
    #[arg(long, env = "GRIDWATCH_DATA_DIR", default_value = "data/storage")]
    pub data_dir: PathBuf,
}

impl Settings {
    /// Returns the keep-alive check interval.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKeepAlive`] when the interval is zero;
    /// the liveness timer cannot run with a zero period.
    pub fn keep_alive_interval(&self) -> Result<Duration, ConfigError> {
        if self.keep_alive == 0 {
            return Err(ConfigError::InvalidKeepAlive);
        }
        Ok(Duration::from_secs(self.keep_alive))
    }

    /// Returns the log-alive interval, or `None` when disabled.
    #[must_use]
    pub fn log_alive(&self) -> Option<Duration> {
        (self.log_alive_interval > 0).then(|| Duration::from_secs(self.log_alive_interval * 60))
    }

    /// Parses the configured night interval, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidNightWindow`] when the string is not
    /// of the form `"HH:HH"` with both hours in `0..24`.
    pub fn night_window(&self) -> Result<Option<NightWindow>, ConfigError> {
        self.night_time.as_deref().map(str::parse).transpose()
    }

    /// Parses the configured timezone offset, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTimezone`] when the string is not a
    /// `±HH:MM` offset.
    pub fn timezone_offset(&self) -> Result<Option<FixedOffset>, ConfigError> {
        self.timezone.as_deref().map(parse_offset).transpose()
    }
}

/// A silent-hours interval `[start, stop)` on a 24-hour clock.
///
/// When `stop < start` the interval wraps past midnight: hour 23 and hour 2
/// are both inside `"22:06"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    start: u8,
    stop: u8,
}

impl NightWindow {
    /// Creates a window from start/stop hours.
    ///
    /// # Errors
    ///
    /// Returns an error when either hour is outside `0..24`, or when the
    /// hours are equal (ambiguous between "never" and "always").
    pub fn new(start: u8, stop: u8) -> Result<Self, ConfigError> {
        if start > 23 || stop > 23 {
            return Err(ConfigError::InvalidNightWindow {
                value: format!("{start:02}:{stop:02}"),
                reason: "hours must be in 0..24".to_string(),
            });
        }
        if start == stop {
            return Err(ConfigError::InvalidNightWindow {
                value: format!("{start:02}:{stop:02}"),
                reason: "start and stop hours are equal".to_string(),
            });
        }
        Ok(Self { start, stop })
    }

    /// Returns whether the given hour falls inside the window.
    #[must_use]
    pub fn contains(&self, hour: u8) -> bool {
        if self.start <= self.stop {
            hour >= self.start && hour < self.stop
        } else {
            hour >= self.start || hour < self.stop
        }
    }
}

impl std::str::FromStr for NightWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidNightWindow {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let (start, stop) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected \"HH:HH\""))?;
        let start: u8 = start.parse().map_err(|_| invalid("start is not a number"))?;
        let stop: u8 = stop.parse().map_err(|_| invalid("stop is not a number"))?;
        Self::new(start, stop)
    }
}

/// Parses a `±HH:MM` UTC offset.
fn parse_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidTimezone(s.to_string());
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1i32, &s[1..]),
        Some(b'-') => (-1i32, &s[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
