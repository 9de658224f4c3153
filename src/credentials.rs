// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Long-lived provider credentials and their resolution chain.
//!
//! Credentials are looked up in order: environment variables, the
//! persistent store, and finally an interactive prompt. Whatever source
//! wins is written back to the store so the next run starts silently.
//! Core code never touches the terminal directly; prompting sits behind
//! the [`Prompt`] trait so tests can inject canned answers.

use serde::{Deserialize, Serialize};

use crate::config::AuthMethod;
use crate::error::ConfigError;
use crate::store::{StateStore, keys};

/// Long-lived secrets identifying the account and device.
///
/// Exactly one variant is valid per configuration: the signed-request
/// strategy needs an access-key pair, the login strategy needs account
/// credentials. Both carry the device serial that scopes the telemetry
/// subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Credentials {
    /// Developer access-key pair for the signed-request strategy.
    #[serde(rename_all = "camelCase")]
    AccessKey {
        /// Public access key.
        access_key: String,
        /// Secret key used as the HMAC key.
        secret_key: String,
        /// Device serial number.
        device_serial: String,
    },
    /// Account credentials for the login strategy.
    #[serde(rename_all = "camelCase")]
    User {
        /// Account username (email).
        username: String,
        /// Account password.
        password: String,
        /// Device serial number.
        device_serial: String,
    },
}

impl Credentials {
    /// Returns the device serial number.
    #[must_use]
    pub fn device_serial(&self) -> &str {
        match self {
            Self::AccessKey { device_serial, .. } | Self::User { device_serial, .. } => {
                device_serial
            }
        }
    }

    /// Checks the non-empty invariants for the chosen variant.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] naming the first empty
    /// field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields: [(&str, &'static str); 3] = match self {
            Self::AccessKey {
                access_key,
                secret_key,
                device_serial,
            } => [
                (access_key, "access key"),
                (secret_key, "secret key"),
                (device_serial, "device serial"),
            ],
            Self::User {
                username,
                password,
                device_serial,
            } => [
                (username, "username"),
                (password, "password"),
                (device_serial, "device serial"),
            ],
        };
        for (value, name) in fields {
            if value.is_empty() {
                return Err(ConfigError::MissingCredential(name));
            }
        }
        Ok(())
    }
}

/// Interactive input source for first-run configuration.
pub trait Prompt {
    /// Asks for a plain line of input.
    ///
    /// # Errors
    ///
    /// Returns an error when reading from the input fails.
    fn line(&mut self, label: &str) -> Result<String, ConfigError>;

    /// Asks for a secret (no echo).
    ///
    /// # Errors
    ///
    /// Returns an error when reading from the input fails.
    fn secret(&mut self, label: &str) -> Result<String, ConfigError>;
}

/// Terminal-backed prompt used by the daemon binary.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn line(&mut self, label: &str) -> Result<String, ConfigError> {
        use std::io::Write;

        print!("{label}: ");
        std::io::stdout()
            .flush()
            .map_err(|e| ConfigError::Prompt(e.to_string()))?;
        let mut buf = String::new();
        std::io::stdin()
            .read_line(&mut buf)
            .map_err(|e| ConfigError::Prompt(e.to_string()))?;
        Ok(buf.trim().to_string())
    }

    fn secret(&mut self, label: &str) -> Result<String, ConfigError> {
        rpassword::prompt_password(format!("{label}: "))
            .map_err(|e| ConfigError::Prompt(e.to_string()))
    }
}

/// Resolves credentials from environment, store, and prompt, in that order.
pub struct CredentialResolver<'a, P> {
    store: &'a StateStore,
    prompt: P,
}

impl<'a, P: Prompt> CredentialResolver<'a, P> {
    /// Creates a resolver over the given store and prompt.
    pub fn new(store: &'a StateStore, prompt: P) -> Self {
        Self { store, prompt }
    }

    /// Resolves a validated set of credentials for the given strategy.
    ///
    /// # Errors
    ///
    /// Returns an error when no source yields a complete set, when the
    /// prompt fails, or on store failure.
    pub fn resolve(&mut self, method: AuthMethod) -> crate::error::Result<Credentials> {
        self.resolve_with(method, |name| std::env::var(name).ok())
    }

    /// Same as [`Self::resolve`] with an injectable environment lookup.
    fn resolve_with(
        &mut self,
        method: AuthMethod,
        env: impl Fn(&str) -> Option<String>,
    ) -> crate::error::Result<Credentials> {
        // Environment values override whatever a previous run persisted.
        if let Some(creds) = credentials_from_env(method, &env) {
            creds.validate()?;
            self.store.set(keys::CREDENTIALS, &creds)?;
            return Ok(creds);
        }

        if let Some(creds) = self.store.get::<Credentials>(keys::CREDENTIALS)?
            && creds.validate().is_ok()
            && matches_method(&creds, method)
        {
            return Ok(creds);
        }

        let creds = self.prompt_credentials(method)?;
        creds.validate()?;
        self.store.set(keys::CREDENTIALS, &creds)?;
        Ok(creds)
    }

    fn prompt_credentials(&mut self, method: AuthMethod) -> Result<Credentials, ConfigError> {
        tracing::info!("no stored credentials found, asking interactively");
        let creds = match method {
            AuthMethod::Login => Credentials::User {
                username: self.prompt.line("Enter your EcoFlow username")?,
                password: self.prompt.secret("Enter your EcoFlow password")?,
                device_serial: self.prompt.line("Enter your EcoFlow device SN")?,
            },
            AuthMethod::SignedRequest => Credentials::AccessKey {
                access_key: self.prompt.line("Enter your EcoFlow access key")?,
                secret_key: self.prompt.secret("Enter your EcoFlow secret key")?,
                device_serial: self.prompt.line("Enter your EcoFlow device SN")?,
            },
        };
        Ok(creds)
    }
}

fn credentials_from_env(
    method: AuthMethod,
    env: &impl Fn(&str) -> Option<String>,
) -> Option<Credentials> {
    let non_empty = |name: &str| env(name).filter(|v| !v.is_empty());
    let device_serial = non_empty("ECOFLOW_DEVICE_SN")?;
    match method {
        AuthMethod::Login => Some(Credentials::User {
            username: non_empty("ECOFLOW_USERNAME")?,
            password: non_empty("ECOFLOW_PASSWORD")?,
            device_serial,
        }),
        AuthMethod::SignedRequest => Some(Credentials::AccessKey {
            access_key: non_empty("ECOFLOW_ACCESS_KEY")?,
            secret_key: non_empty("ECOFLOW_SECRET_KEY")?,
            device_serial,
        }),
    }
}

fn matches_method(creds: &Credentials, method: AuthMethod) -> bool {
    matches!(
        (creds, method),
        (Credentials::User { .. }, AuthMethod::Login)
            | (Credentials::AccessKey { .. }, AuthMethod::SignedRequest)
    )
}
