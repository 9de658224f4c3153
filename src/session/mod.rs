// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connectivity management: session lifecycle, liveness, and escalating
//! reconnects.
//!
//! The manager owns the whole credential-to-subscription chain and drives
//! it as an explicit state machine. All state mutation happens in one
//! serialized consumer that multiplexes the transport event stream, the
//! keep-alive tick, the optional log-alive tick, and the shutdown signal;
//! no two handlers ever run concurrently.

mod transport;
mod watchdog;

pub use transport::{MqttSession, SessionEvent};
pub use watchdog::{Verdict, Watchdog};

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::auth::AuthClient;
use crate::credentials::Credentials;
use crate::error::{Result, TransportError};
use crate::notify::{NotificationChannel, NotificationPipeline};
use crate::telemetry;

/// Lifecycle of the MQTT session. Exactly one instance per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started.
    Idle,
    /// Exchanging credentials for broker connection parameters.
    Authenticating,
    /// Broker connect + subscribe handshake in progress.
    Connecting,
    /// Subscribed and receiving telemetry.
    Subscribed,
    /// Liveness degraded; soft reconnect in progress.
    Degraded,
    /// Discarded the session, re-running the authentication cycle.
    ReAuthenticating,
    /// Shut down.
    Terminated,
}

/// Timing and escalation knobs for the manager.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Liveness check interval.
    pub keep_alive: Duration,
    /// Informational alive log interval; `None` disables it.
    pub log_alive: Option<Duration>,
    /// Consecutive missed checks before a full reconnect; 0 disables.
    pub reconnect_threshold: u32,
}

/// Outcome of one connect cycle's event loop.
enum CycleOutcome {
    /// Watchdog escalation: discard the session and re-authenticate.
    FullReconnect,
    /// Operator-initiated shutdown.
    Shutdown,
}

/// Owns the MQTT session lifecycle and feeds decoded telemetry into the
/// notification pipeline.
pub struct ConnectivityManager<C> {
    auth: AuthClient,
    credentials: Credentials,
    client_id_prefix: String,
    config: SessionConfig,
    pipeline: NotificationPipeline<C>,
    state: SessionState,
}

impl<C: NotificationChannel> ConnectivityManager<C> {
    /// Creates a manager in the idle state.
    pub fn new(
        auth: AuthClient,
        credentials: Credentials,
        client_id_prefix: String,
        config: SessionConfig,
        pipeline: NotificationPipeline<C>,
    ) -> Self {
        Self {
            auth,
            credentials,
            client_id_prefix,
            config,
            pipeline,
            state: SessionState::Idle,
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session until shutdown is signalled or a fatal error
    /// occurs.
    ///
    /// Authentication and transport failures are fatal: they propagate to
    /// the caller after a best-effort disconnect, since repeated failure
    /// there usually indicates a configuration problem. Only the watchdog
    /// path recovers autonomously.
    ///
    /// # Errors
    ///
    /// Returns the fatal certification, transport, or store error that
    /// ended the session.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            self.transition(SessionState::Authenticating);
            let info = self
                .auth
                .certify(&self.credentials, &self.client_id_prefix)
                .await?;

            self.transition(SessionState::Connecting);
            let (session, events) = MqttSession::connect(&info).await?;
            self.transition(SessionState::Subscribed);

            let outcome = self.drive(&session, events, &mut shutdown).await;
            session.disconnect().await;
            match outcome {
                Ok(CycleOutcome::FullReconnect) => {
                    self.transition(SessionState::ReAuthenticating);
                }
                Ok(CycleOutcome::Shutdown) => {
                    self.transition(SessionState::Terminated);
                    return Ok(());
                }
                Err(error) => {
                    self.transition(SessionState::Terminated);
                    return Err(error);
                }
            }
        }
    }

    /// The serialized event consumer for one connect cycle.
    async fn drive(
        &mut self,
        session: &MqttSession,
        mut events: mpsc::Receiver<SessionEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<CycleOutcome> {
        let mut watchdog = Watchdog::new(
            self.config.keep_alive,
            self.config.reconnect_threshold,
            Instant::now(),
        );

        let start = tokio::time::Instant::now();
        let mut keep_alive =
            tokio::time::interval_at(start + self.config.keep_alive, self.config.keep_alive);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The log-alive tick is purely observational and never alters
        // state; when disabled the interval is never polled.
        let mut log_alive = self
            .config
            .log_alive
            .map(|period| tokio::time::interval_at(start + period, period));

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    None => {
                        return Err(TransportError::ConnectionLost(
                            "event stream closed".to_string(),
                        )
                        .into());
                    }
                    Some(event) => {
                        if let Some(outcome) = self.on_event(event, &mut watchdog).await? {
                            return Ok(outcome);
                        }
                    }
                },
                _ = keep_alive.tick() => {
                    match watchdog.on_tick(Instant::now()) {
                        Verdict::Alive => {
                            tracing::debug!("MQTT session is alive");
                            if self.state == SessionState::Degraded && session.is_connected() {
                                self.transition(SessionState::Subscribed);
                            }
                        }
                        Verdict::SoftReconnect => {
                            tracing::warn!(
                                missed = watchdog.missed_checks(),
                                "no telemetry within keep-alive interval"
                            );
                            self.transition(SessionState::Degraded);
                            if let Err(error) = session.soft_reconnect().await {
                                tracing::warn!(%error, "soft reconnect request failed");
                            }
                        }
                        Verdict::FullReconnect => {
                            tracing::warn!("sustained silence, performing full reconnect");
                            return Ok(CycleOutcome::FullReconnect);
                        }
                    }
                },
                _ = tick_opt(log_alive.as_mut()), if log_alive.is_some() => {
                    tracing::info!("MQTT session is alive");
                },
                _ = shutdown.changed() => {
                    tracing::info!("shutdown requested");
                    return Ok(CycleOutcome::Shutdown);
                },
            }
        }
    }

    /// Handles one transport event. Returns a cycle outcome for fatal
    /// subscription failures, `None` to keep going.
    async fn on_event(
        &mut self,
        event: SessionEvent,
        watchdog: &mut Watchdog,
    ) -> Result<Option<CycleOutcome>> {
        match event {
            SessionEvent::Message(payload) => {
                // Liveness reset and decode are applied back to back in
                // this single consumer, so a watchdog tick can never
                // observe one without the other.
                watchdog.on_message(Instant::now());
                if let Some(reading) = telemetry::decode(&payload) {
                    tracing::debug!(
                        voltage = reading.voltage,
                        current = reading.current,
                        frequency = reading.frequency,
                        "AC input reading"
                    );
                    self.pipeline.on_power_state(reading.mains_present()).await?;
                }
            }
            SessionEvent::Connected => {
                tracing::info!("broker connection established");
            }
            SessionEvent::Subscribed => {
                if self.state == SessionState::Degraded {
                    self.transition(SessionState::Subscribed);
                }
            }
            SessionEvent::ConnectionLost(reason) => {
                tracing::warn!(%reason, "broker connection lost, transport is retrying");
                self.transition(SessionState::Degraded);
            }
            SessionEvent::SubscribeFailed(reason) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "subscription failed: {reason}"
                ))
                .into());
            }
        }
        Ok(None)
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "session state");
            self.state = next;
        }
    }
}

/// Polls an optional interval. Only called when the interval exists.
async fn tick_opt(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        // The select branch is disabled when the interval is absent.
        None => std::future::pending::<()>().await,
    }
}
