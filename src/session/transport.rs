// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport session against the provider broker.
//!
//! A session owns one `rumqttc` client plus its event loop, polled on a
//! spawned task that forwards everything of interest to the serialized
//! session consumer as [`SessionEvent`]s. The event loop keeps retrying
//! after connection errors, so a "soft reconnect" is simply cycling the
//! connection: the broker drops us, the next poll reconnects, and the
//! ConnAck handler re-subscribes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, oneshot};

use crate::auth::{BrokerConnectInfo, Transport};
use crate::error::TransportError;

/// MQTT protocol-level keep-alive (independent of the liveness watchdog).
const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Time allowed for the initial connect + subscribe handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between reconnect attempts after a transport error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events reported by the transport task to the session consumer.
#[derive(Debug)]
pub enum SessionEvent {
    /// The broker acknowledged the connection (initial or after a cycle).
    Connected,
    /// The telemetry subscription was acknowledged.
    Subscribed,
    /// An inbound message payload on the subscribed topic filter.
    Message(Vec<u8>),
    /// The connection dropped; the event loop is retrying.
    ConnectionLost(String),
    /// Re-subscribing after a reconnect failed. Unrecoverable.
    SubscribeFailed(String),
}

/// A live MQTT session subscribed to the device topic filter.
#[derive(Debug)]
pub struct MqttSession {
    client: AsyncClient,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl MqttSession {
    /// Connects to the broker described by `info` and subscribes to its
    /// topic filter.
    ///
    /// Returns the session handle and the event stream once the
    /// connect + subscribe handshake completed.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport scheme is unsupported, the
    /// handshake fails, or it does not complete within the timeout.
    pub async fn connect(
        info: &BrokerConnectInfo,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), TransportError> {
        let mut options = MqttOptions::new(&info.client_id, &info.host, info.port);
        options.set_keep_alive(MQTT_KEEP_ALIVE);
        options.set_clean_session(true);
        options.set_credentials(&info.username, &info.password);
        options.set_transport(transport_config(info.transport)?);

        let (client, event_loop) = AsyncClient::new(options, 10);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        let shutdown = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(false));

        let task = SessionTask {
            client: client.clone(),
            topic_filter: info.topic_filter.clone(),
            event_tx,
            shutdown: Arc::clone(&shutdown),
            connected: Arc::clone(&connected),
        };
        tokio::spawn(task.run(event_loop, ready_tx));

        match tokio::time::timeout(HANDSHAKE_TIMEOUT, ready_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                return Err(TransportError::ConnectionFailed(
                    "MQTT event loop terminated during handshake".to_string(),
                ));
            }
            Err(_) => {
                // Safe: the timeout fits in u64 milliseconds.
                #[allow(clippy::cast_possible_truncation)]
                return Err(TransportError::Timeout(HANDSHAKE_TIMEOUT.as_millis() as u64));
            }
        }

        tracing::info!(host = %info.host, port = info.port, topic = %info.topic_filter,
            "MQTT session subscribed");

        Ok((
            Self {
                client,
                shutdown,
                connected,
            },
            event_rx,
        ))
    }

    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Cycles the broker connection without re-authenticating.
    ///
    /// The event loop reconnects on its next poll and the subscription is
    /// re-established on the fresh ConnAck.
    ///
    /// # Errors
    ///
    /// Returns an error when the disconnect request cannot be queued.
    pub async fn soft_reconnect(&self) -> Result<(), TransportError> {
        tracing::warn!("cycling MQTT connection");
        self.client.disconnect().await.map_err(TransportError::Mqtt)
    }

    /// Tears down the session. Idempotent: a second call is a no-op.
    pub async fn disconnect(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(error) = self.client.disconnect().await {
            tracing::debug!(%error, "MQTT disconnect request failed");
        }
        self.connected.store(false, Ordering::Release);
        tracing::info!("MQTT session closed");
    }
}

/// State shared with the spawned event-loop task.
struct SessionTask {
    client: AsyncClient,
    topic_filter: String,
    event_tx: mpsc::Sender<SessionEvent>,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl SessionTask {
    async fn run(self, mut event_loop: EventLoop, ready_tx: oneshot::Sender<()>) {
        let mut ready_tx = Some(ready_tx);
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    tracing::debug!(?connack, "MQTT connected");
                    self.connected.store(true, Ordering::Release);
                    if !self.forward(SessionEvent::Connected).await {
                        break;
                    }
                    if let Err(error) = self
                        .client
                        .subscribe(&self.topic_filter, QoS::AtLeastOnce)
                        .await
                    {
                        let _ = self
                            .forward(SessionEvent::SubscribeFailed(error.to_string()))
                            .await;
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    tracing::debug!(?suback, "MQTT subscription acknowledged");
                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(());
                    }
                    if !self.forward(SessionEvent::Subscribed).await {
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if !self
                        .forward(SessionEvent::Message(publish.payload.to_vec()))
                        .await
                    {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    self.connected.store(false, Ordering::Release);
                    if self.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    if !self
                        .forward(SessionEvent::ConnectionLost(error.to_string()))
                        .await
                    {
                        break;
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
        tracing::debug!("MQTT event loop task finished");
    }

    /// Sends an event to the consumer; returns `false` when it is gone.
    async fn forward(&self, event: SessionEvent) -> bool {
        self.event_tx.send(event).await.is_ok()
    }
}

/// Maps the certified scheme onto a `rumqttc` transport configuration.
fn transport_config(transport: Transport) -> Result<rumqttc::Transport, TransportError> {
    match transport {
        Transport::Mqtts => Ok(rumqttc::Transport::tls_with_default_config()),
        Transport::Mqtt | Transport::Ws | Transport::Wss => Err(
            TransportError::ConnectionFailed(format!("unsupported transport: {transport:?}")),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_transport_is_supported() {
        assert!(transport_config(Transport::Mqtts).is_ok());
    }

    #[test]
    fn plain_and_websocket_transports_are_rejected() {
        for t in [Transport::Mqtt, Transport::Ws, Transport::Wss] {
            assert!(matches!(
                transport_config(t),
                Err(TransportError::ConnectionFailed(_))
            ));
        }
    }
}
