//! Sensor identifiers and metadata records.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};

/// Identifier of one air-quality sensor, shared by both upstream providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(String);

impl SensorId {
    /// Parse a sensor identifier, rejecting blank input.
    ///
    /// # Errors
    /// Returns a validation error if the identifier is empty after trimming.
    pub fn parse(raw: &str) -> RelayResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RelayError::Validation("sensorID must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static sensor and location metadata.
///
/// Serialized with the field names the client application already consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorMetadata {
    /// Identifier reported by the metadata provider.
    #[serde(rename = "sensorId")]
    pub sensor_id: String,
    /// City where the sensor is installed, if the provider knows it.
    #[serde(rename = "location_city")]
    pub city: Option<String>,
    /// Consecutive days without pathogen alerts.
    #[serde(rename = "dias_libres_de_patogenos")]
    pub pathogen_free_days: Option<u32>,
    /// Consecutive days without mold alerts.
    #[serde(rename = "dias_libres_de_moho")]
    pub mold_free_days: Option<u32>,
}

/// Envelope returned by the metadata provider.
#[derive(Debug, Deserialize)]
pub(crate) struct MetadataEnvelope {
    pub(crate) data: RawSensorRecord,
}

/// Record as sent by the metadata provider. Numbers may arrive as strings.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSensorRecord {
    #[serde(rename = "sensorId", deserialize_with = "lenient_string")]
    sensor_id: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    days: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    daysm: Option<u32>,
}

impl From<RawSensorRecord> for SensorMetadata {
    fn from(raw: RawSensorRecord) -> Self {
        Self {
            sensor_id: raw.sensor_id,
            city: raw.city.filter(|city| !city.trim().is_empty()),
            pathogen_free_days: raw.days,
            mold_free_days: raw.daysm,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid day count {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid day count {s:?}: {e}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected day count, got {other}"
        ))),
    }
}
