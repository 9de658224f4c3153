// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exchange of long-lived credentials for short-lived MQTT broker
//! credentials.
//!
//! The provider exposes two routes to the same certification payload:
//! a signed-request API for developer access-key pairs, and a classic
//! login endpoint that yields a bearer token for account credentials.
//! Both answer with a `{code, message, data}` envelope where `code == "0"`
//! means success.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde_json::Value;
use sha2::Sha256;

use crate::credentials::Credentials;
use crate::error::AuthError;

/// Request timeout for certification calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Signed-request certification path.
const SIGN_CERTIFICATION_PATH: &str = "/iot-open/sign/certification";
/// Login path for account credentials.
const LOGIN_PATH: &str = "/auth/login";
/// Bearer-token certification path.
const APP_CERTIFICATION_PATH: &str = "/iot-auth/app/certification";

/// MQTT transport scheme reported by the certification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plain MQTT over TCP.
    Mqtt,
    /// MQTT over TLS.
    Mqtts,
    /// MQTT over WebSocket.
    Ws,
    /// MQTT over secure WebSocket.
    Wss,
}

impl Transport {
    /// Parses a scheme string from the certification payload.
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "mqtt" => Some(Self::Mqtt),
            "mqtts" | "ssl" => Some(Self::Mqtts),
            "ws" => Some(Self::Ws),
            "wss" => Some(Self::Wss),
            _ => None,
        }
    }

    /// Returns whether the scheme carries TLS.
    #[must_use]
    pub fn is_secure(self) -> bool {
        matches!(self, Self::Mqtts | Self::Wss)
    }
}

/// Short-lived broker connection parameters.
///
/// Created once per authentication cycle and discarded on full reconnect.
/// Never persisted: the username/password pair expires server-side.
#[derive(Debug, Clone)]
pub struct BrokerConnectInfo {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Transport scheme (always secure once certification succeeds).
    pub transport: Transport,
    /// Broker username (certificate account).
    pub username: String,
    /// Broker password (certificate password).
    pub password: String,
    /// Topic filter carrying the device's property updates.
    pub topic_filter: String,
    /// Client id to present to the broker.
    pub client_id: String,
}

/// HTTP client for the provider's certification API.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    /// Creates a client for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Exchanges the given credentials for broker connection parameters.
    ///
    /// `client_id_prefix` is the persisted random prefix for this
    /// installation; the login strategy appends the provider user id to it.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTP failure, a non-success envelope, missing
    /// payload fields, or an insecure broker scheme. These are all fatal
    /// for the current connect cycle and are never retried here.
    pub async fn certify(
        &self,
        credentials: &Credentials,
        client_id_prefix: &str,
    ) -> Result<BrokerConnectInfo, AuthError> {
        match credentials {
            Credentials::AccessKey {
                access_key,
                secret_key,
                device_serial,
            } => {
                self.certify_signed(access_key, secret_key, device_serial, client_id_prefix)
                    .await
            }
            Credentials::User {
                username,
                password,
                device_serial,
            } => {
                self.certify_login(username, password, device_serial, client_id_prefix)
                    .await
            }
        }
    }

    async fn certify_signed(
        &self,
        access_key: &str,
        secret_key: &str,
        device_serial: &str,
        client_id_prefix: &str,
    ) -> Result<BrokerConnectInfo, AuthError> {
        let nonce = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let sign = signature(secret_key, access_key, &nonce, &timestamp);

        tracing::debug!(path = SIGN_CERTIFICATION_PATH, "requesting certification");
        let response = self
            .http
            .get(format!("{}{SIGN_CERTIFICATION_PATH}", self.base_url))
            .header("accessKey", access_key)
            .header("nonce", &nonce)
            .header("timestamp", &timestamp)
            .header("sign", &sign)
            .send()
            .await?
            .error_for_status()?;

        let data = unwrap_envelope(response.json().await?)?;
        let account = str_field(&data, "certificateAccount")?;
        let topic_filter = format!("/open/{account}/{device_serial}/quota");
        let client_id = format!("ANDROID_{}", client_id_prefix.to_uppercase());
        broker_info(&data, topic_filter, client_id)
    }

    async fn certify_login(
        &self,
        username: &str,
        password: &str,
        device_serial: &str,
        client_id_prefix: &str,
    ) -> Result<BrokerConnectInfo, AuthError> {
        tracing::debug!(path = LOGIN_PATH, "authenticating");
        let response = self
            .http
            .post(format!("{}{LOGIN_PATH}", self.base_url))
            .header("lang", "en_US")
            .json(&serde_json::json!({
                "email": username,
                "password": BASE64.encode(password),
                "scene": "IOT_APP",
                "userType": "ECOFLOW",
            }))
            .send()
            .await?
            .error_for_status()?;

        let data = unwrap_envelope(response.json().await?)?;
        let token = str_field(&data, "token")?;
        let user_id = data
            .get("user")
            .and_then(|u| u.get("userId"))
            .and_then(json_to_string)
            .ok_or(AuthError::MissingField("user.userId"))?;

        tracing::debug!(path = APP_CERTIFICATION_PATH, "requesting certification");
        let response = self
            .http
            .get(format!("{}{APP_CERTIFICATION_PATH}", self.base_url))
            .query(&[("userId", user_id.as_str())])
            .header("lang", "en_US")
            .header("authorization", format!("Bearer {token}"))
            .send()
            .await?
            .error_for_status()?;

        let data = unwrap_envelope(response.json().await?)?;
        let topic_filter = format!("/app/device/property/{device_serial}");
        let client_id = format!("ANDROID_{}_{user_id}", client_id_prefix.to_uppercase());
        broker_info(&data, topic_filter, client_id)
    }
}

/// Computes the hex HMAC-SHA256 signature over the sorted query string of
/// the request identity fields.
fn signature(secret_key: &str, access_key: &str, nonce: &str, timestamp: &str) -> String {
    let payload = sign_payload(access_key, nonce, timestamp);
    // The key length is unconstrained for HMAC, so this cannot fail.
    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(payload.as_bytes());
    let digest = mac.finalize().into_bytes();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Builds the canonical `key=value&…` string, keys in sorted order.
fn sign_payload(access_key: &str, nonce: &str, timestamp: &str) -> String {
    format!("accessKey={access_key}&nonce={nonce}&timestamp={timestamp}")
}

/// Validates the `{code, message, data}` envelope and extracts `data`.
fn unwrap_envelope(body: Value) -> Result<Value, AuthError> {
    let code = body
        .get("code")
        .and_then(json_to_string)
        .ok_or(AuthError::MissingField("code"))?;
    if code != "0" {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message")
            .to_string();
        return Err(AuthError::Envelope { code, message });
    }
    body.get("data")
        .cloned()
        .ok_or(AuthError::MissingField("data"))
}

/// Assembles [`BrokerConnectInfo`] from a certification payload.
fn broker_info(
    data: &Value,
    topic_filter: String,
    client_id: String,
) -> Result<BrokerConnectInfo, AuthError> {
    let host = str_field(data, "url")?;
    let scheme = str_field(data, "protocol")?;
    let transport =
        Transport::from_scheme(&scheme).ok_or_else(|| AuthError::InsecureProtocol(scheme.clone()))?;
    if !transport.is_secure() {
        return Err(AuthError::InsecureProtocol(scheme));
    }

    let port_value = data.get("port").ok_or(AuthError::MissingField("port"))?;
    let port = json_to_string(port_value)
        .and_then(|p| p.parse::<u16>().ok())
        .ok_or_else(|| AuthError::InvalidValue {
            field: "port",
            message: format!("not a valid port: {port_value}"),
        })?;

    Ok(BrokerConnectInfo {
        host,
        port,
        transport,
        username: str_field(data, "certificateAccount")?,
        password: str_field(data, "certificatePassword")?,
        topic_filter,
        client_id,
    })
}

fn str_field(data: &Value, field: &'static str) -> Result<String, AuthError> {
    data.get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or(AuthError::MissingField(field))
}

/// Renders a JSON string or number as a plain string.
fn json_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
