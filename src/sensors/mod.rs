//! Sensor metadata lookups.
//!
//! The metadata provider is unauthenticated and keyed by sensor id. Every
//! call is independent: no caching, no retry.

pub mod types;

pub use types::{SensorId, SensorMetadata};

use tracing::debug;
use url::Url;

use crate::config::SensorConfig;
use crate::error::{RelayError, RelayResult};
use crate::telemetry::session::describe_transport;

use types::MetadataEnvelope;

/// Client for the sensor metadata provider.
pub struct SensorMetadataClient {
    client: reqwest::Client,
    lookup_url: Url,
}

impl SensorMetadataClient {
    /// Create a new metadata client.
    ///
    /// # Errors
    /// Returns an error if the lookup URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &SensorConfig) -> RelayResult<Self> {
        let lookup_url = Url::parse(&config.metadata_url)
            .map_err(|e| RelayError::Config(format!("invalid metadata URL: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("metadata http client: {e}")))?;
        Ok(Self { client, lookup_url })
    }

    /// Look up metadata for one sensor.
    ///
    /// # Errors
    /// Returns `RelayError::Metadata` on transport failure, timeout, non-2xx
    /// status or a malformed body.
    pub async fn fetch_metadata(&self, sensor: &SensorId) -> RelayResult<SensorMetadata> {
        let response = self
            .client
            .get(self.lookup_url.clone())
            .query(&[("sensor_id", sensor.as_str())])
            .send()
            .await
            .map_err(|e| RelayError::Metadata(describe_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Metadata(format!(
                "provider returned status {status} for sensor {sensor}"
            )));
        }

        let envelope: MetadataEnvelope = response
            .json()
            .await
            .map_err(|e| RelayError::Metadata(format!("malformed metadata body: {e}")))?;

        debug!(sensor = %sensor, "sensor metadata received");
        Ok(SensorMetadata::from(envelope.data))
    }
}
