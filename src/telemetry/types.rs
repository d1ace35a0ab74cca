//! Telemetry records and the provider's wire envelopes.

use core::fmt;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::units::fahrenheit_to_celsius;

/// Length of the trailing window requested from the provider.
pub const TELEMETRY_WINDOW_MINUTES: i64 = 10;

/// Opaque bearer token issued by the telemetry provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token for an `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Most recent per-minute aggregation for one sensor.
///
/// Temperature is already in Celsius. Field names match what the client
/// application consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReading {
    /// Carbon dioxide concentration (ppm).
    #[serde(rename = "cO2_ppm")]
    pub co2_ppm: Option<f64>,
    /// Relative humidity (%).
    pub humidity: Option<f64>,
    /// Temperature (°C).
    #[serde(rename = "temperature_centigrados")]
    pub temperature_celsius: Option<f64>,
    /// Mold index.
    #[serde(rename = "moldIndex")]
    pub mold_index: Option<f64>,
    /// Ozone concentration (ppb).
    #[serde(rename = "o3_ppb")]
    pub ozone_ppb: Option<f64>,
    /// Total volatile organic compounds (ppb).
    #[serde(rename = "tvoCs_ppb")]
    pub tvoc_ppb: Option<f64>,
    /// Air quality index.
    pub aqi: Option<f64>,
    /// Particulate concentration, class 0.1 (µg/m³).
    #[serde(rename = "pC0_1")]
    pub pc0_1: Option<f64>,
}

/// Envelope returned by the grouped telemetry endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TelemetrySeries {
    #[serde(default)]
    pub(crate) data: Vec<RawBucket>,
}

/// One aggregation bucket as sent by the provider.
///
/// `temp_C` is Fahrenheit despite its name.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub(crate) struct RawBucket {
    #[serde(default)]
    cO2_ppm: Option<f64>,
    #[serde(default)]
    humd: Option<f64>,
    #[serde(default)]
    temp_C: Option<f64>,
    #[serde(default)]
    moldIndex: Option<f64>,
    #[serde(default)]
    o3_ppb: Option<f64>,
    #[serde(default)]
    tvoCs_ppb: Option<f64>,
    #[serde(default)]
    aqi: Option<f64>,
    #[serde(default)]
    pC0_1: Option<f64>,
}

impl From<RawBucket> for TelemetryReading {
    fn from(raw: RawBucket) -> Self {
        Self {
            co2_ppm: raw.cO2_ppm,
            humidity: raw.humd,
            temperature_celsius: raw.temp_C.map(fahrenheit_to_celsius),
            mold_index: raw.moldIndex,
            ozone_ppb: raw.o3_ppb,
            tvoc_ppb: raw.tvoCs_ppb,
            aqi: raw.aqi,
            pc0_1: raw.pC0_1,
        }
    }
}

/// Login request body.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub(crate) email: &'a str,
    pub(crate) password: &'a str,
}

/// Login response: `{status, data: {data: {token}}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub(crate) status: Option<String>,
    pub(crate) data: Option<LoginOuter>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginOuter {
    pub(crate) data: Option<LoginInner>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginInner {
    pub(crate) token: Option<String>,
}

impl LoginResponse {
    /// Extract the token when the provider reports success.
    pub(crate) fn into_token(self) -> Option<String> {
        if self.status.as_deref() != Some("Success") {
            return None;
        }
        self.data
            .and_then(|outer| outer.data)
            .and_then(|inner| inner.token)
            .filter(|token| !token.is_empty())
    }
}

/// Query window `[start, end]` rendered the way the provider expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryWindow {
    /// Window start, ISO-8601 UTC.
    pub start: String,
    /// Window end, ISO-8601 UTC.
    pub end: String,
}

impl TelemetryWindow {
    /// Trailing window ending at `now`.
    #[must_use]
    pub fn ending_at(now: DateTime<Utc>) -> Self {
        let start = now - Duration::minutes(TELEMETRY_WINDOW_MINUTES);
        Self {
            start: start.to_rfc3339_opts(SecondsFormat::Millis, true),
            end: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
