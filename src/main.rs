// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Daemon entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gridwatch::Settings;

#[tokio::main]
async fn main() {
    let settings = Settings::parse();

    let default_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting gridwatch");

    if let Err(error) = gridwatch::app::run(settings).await {
        tracing::error!(%error, "fatal error, shutting down");
    }
    // Every shutdown path, signal-driven or fatal, exits with code 0.
}
