// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder for AC-input telemetry messages.
//!
//! The device publishes property updates as JSON with a flat `params`
//! object. Only messages carrying all three AC-input readings (voltage,
//! current, frequency) are of interest; everything else, including
//! malformed JSON, is expected broker noise and decodes to `None`.

use serde::Deserialize;

/// Fixed-point scale used by the manufacturer for voltage and current.
const MILLI_SCALE: f64 = 1000.0;

/// A decoded AC-input reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcInputReading {
    /// Input voltage in volts.
    pub voltage: f64,
    /// Input current in amperes.
    pub current: f64,
    /// Input frequency in hertz.
    pub frequency: f64,
}

impl AcInputReading {
    /// Returns whether mains power is present.
    ///
    /// All three readings drop to zero when the AC input is unplugged or
    /// the grid is down.
    #[must_use]
    pub fn mains_present(&self) -> bool {
        self.voltage > 0.0 && self.current > 0.0 && self.frequency > 0.0
    }
}

#[derive(Debug, Deserialize)]
struct PropertyMessage {
    #[serde(default)]
    params: Option<AcInputParams>,
}

#[derive(Debug, Deserialize)]
struct AcInputParams {
    #[serde(rename = "inv.acInVol", default)]
    voltage: Option<f64>,
    #[serde(rename = "inv.acInAmp", default)]
    current: Option<f64>,
    #[serde(rename = "inv.acInFreq", default)]
    frequency: Option<f64>,
}

/// Decodes a raw telemetry payload into an AC-input reading.
///
/// Returns `None` when the payload is not valid JSON or does not carry all
/// three numeric AC-input fields. Voltage and current arrive in
/// millivolt/milliampere fixed point and are scaled down; frequency is
/// used as-is.
#[must_use]
pub fn decode(payload: &[u8]) -> Option<AcInputReading> {
    let message: PropertyMessage = serde_json::from_slice(payload).ok()?;
    let params = message.params?;
    Some(AcInputReading {
        voltage: params.voltage? / MILLI_SCALE,
        current: params.current? / MILLI_SCALE,
        frequency: params.frequency?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mains_present() {
        let payload =
            br#"{"params": {"inv.acInVol": 220000, "inv.acInFreq": 50, "inv.acInAmp": 2000}}"#;
        let reading = decode(payload).unwrap();
        assert!((reading.voltage - 220.0).abs() < f64::EPSILON);
        assert!((reading.current - 2.0).abs() < f64::EPSILON);
        assert!((reading.frequency - 50.0).abs() < f64::EPSILON);
        assert!(reading.mains_present());
    }

    #[test]
    fn zero_voltage_means_mains_absent() {
        let payload = br#"{"params": {"inv.acInVol": 0, "inv.acInFreq": 0, "inv.acInAmp": 0}}"#;
        let reading = decode(payload).unwrap();
        assert!(!reading.mains_present());
    }

    #[test]
    fn missing_frequency_is_dropped() {
        let payload = br#"{"params": {"inv.acInVol": 220000, "inv.acInAmp": 2000}}"#;
        assert!(decode(payload).is_none());
    }

    #[test]
    fn unrelated_params_are_dropped() {
        let payload = br#"{"params": {"bms.soc": 87}}"#;
        assert!(decode(payload).is_none());
    }

    #[test]
    fn missing_params_object_is_dropped() {
        assert!(decode(br#"{"moduleType": 1}"#).is_none());
    }

    #[test]
    fn malformed_json_is_dropped() {
        assert!(decode(b"not json at all").is_none());
        assert!(decode(b"").is_none());
    }

    #[test]
    fn non_numeric_field_is_dropped() {
        let payload =
            br#"{"params": {"inv.acInVol": "220000", "inv.acInFreq": 50, "inv.acInAmp": 2000}}"#;
        assert!(decode(payload).is_none());
    }
}
