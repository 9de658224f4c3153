// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Localized notification strings.
//!
//! The daemon emits exactly two user-facing messages, so the catalog is a
//! static lookup rather than a full translation framework.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported message locales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Locale {
    /// English.
    #[default]
    En,
    /// Ukrainian.
    Uk,
}

impl Locale {
    /// Returns the localized "mains present" / "mains absent" message.
    #[must_use]
    pub fn power_message(self, present: bool) -> &'static str {
        match (self, present) {
            (Self::En, true) => "Electricity is returned",
            (Self::En, false) => "Electricity is cut off",
            (Self::Uk, true) => "Електропостачання відновлено",
            (Self::Uk, false) => "Електропостачання відсутнє",
        }
    }
}
