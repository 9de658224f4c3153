// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Liveness watchdog for the MQTT session.
//!
//! The broker pushes telemetry continuously while the session is healthy,
//! so "no message for a full keep-alive interval" is the degradation
//! signal. A single miss is tolerated with a cheap soft reconnect; only
//! `threshold` consecutive misses justify the expensive full
//! re-authentication, which also re-derives broker credentials that may
//! have expired. The watchdog is synchronous and clock-injected so the
//! escalation policy is testable without timers or I/O.

use std::time::{Duration, Instant};

/// Outcome of one watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Fresh traffic was seen within the keep-alive interval.
    Alive,
    /// The session is silent; ask the transport to cycle the connection
    /// without re-authenticating.
    SoftReconnect,
    /// Sustained silence; discard the session and re-run the full
    /// authentication cycle.
    FullReconnect,
}

/// Tracks message recency and consecutive missed liveness checks.
#[derive(Debug)]
pub struct Watchdog {
    keep_alive: Duration,
    /// Full-reconnect threshold; 0 disables escalation.
    threshold: u32,
    missed: u32,
    last_message_at: Instant,
}

impl Watchdog {
    /// Creates a watchdog considering the session alive as of `now`.
    #[must_use]
    pub fn new(keep_alive: Duration, threshold: u32, now: Instant) -> Self {
        Self {
            keep_alive,
            threshold,
            missed: 0,
            last_message_at: now,
        }
    }

    /// Records an inbound message, resetting the miss counter.
    pub fn on_message(&mut self, now: Instant) {
        self.last_message_at = now;
        self.missed = 0;
    }

    /// Evaluates one keep-alive tick.
    pub fn on_tick(&mut self, now: Instant) -> Verdict {
        if now.duration_since(self.last_message_at) <= self.keep_alive {
            self.missed = 0;
            return Verdict::Alive;
        }
        self.missed += 1;
        if self.threshold > 0 && self.missed >= self.threshold {
            self.missed = 0;
            Verdict::FullReconnect
        } else {
            Verdict::SoftReconnect
        }
    }

    /// Returns the current consecutive-miss count.
    #[must_use]
    pub fn missed_checks(&self) -> u32 {
        self.missed
    }
}
