//! Dashboard data aggregation.
//!
//! Fetches live telemetry and static sensor metadata concurrently and merges
//! them. Either failure fails the whole aggregate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::RelayResult;
use crate::sensors::{SensorId, SensorMetadata, SensorMetadataClient};
use crate::telemetry::{TelemetryReading, TelemetrySession};

/// Boxed future type for data source operations.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of live telemetry readings.
pub trait TelemetrySource: Send + Sync {
    /// Fetch the latest reading for a sensor.
    ///
    /// # Errors
    /// Returns an error if the reading cannot be obtained.
    fn latest_reading<'a>(&'a self, sensor: &'a SensorId)
    -> SourceFuture<'a, RelayResult<TelemetryReading>>;
}

/// Source of static sensor metadata.
pub trait SensorDirectory: Send + Sync {
    /// Look up metadata for a sensor.
    ///
    /// # Errors
    /// Returns an error if the lookup fails.
    fn metadata<'a>(&'a self, sensor: &'a SensorId) -> SourceFuture<'a, RelayResult<SensorMetadata>>;
}

impl TelemetrySource for TelemetrySession {
    fn latest_reading<'a>(
        &'a self,
        sensor: &'a SensorId,
    ) -> SourceFuture<'a, RelayResult<TelemetryReading>> {
        Box::pin(self.fetch_telemetry(sensor))
    }
}

impl SensorDirectory for SensorMetadataClient {
    fn metadata<'a>(&'a self, sensor: &'a SensorId) -> SourceFuture<'a, RelayResult<SensorMetadata>> {
        Box::pin(self.fetch_metadata(sensor))
    }
}

/// Telemetry and metadata for the single sensor of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    /// Latest telemetry reading.
    #[serde(rename = "deviceData")]
    pub device: TelemetryReading,
    /// Sensor metadata.
    #[serde(rename = "sensorData")]
    pub sensor: SensorMetadata,
}

/// Runs both dashboard fetches concurrently.
#[derive(Clone)]
pub struct DashboardAggregator {
    telemetry: Arc<dyn TelemetrySource>,
    directory: Arc<dyn SensorDirectory>,
}

impl DashboardAggregator {
    /// Create an aggregator over the given sources.
    #[must_use]
    pub fn new(telemetry: Arc<dyn TelemetrySource>, directory: Arc<dyn SensorDirectory>) -> Self {
        Self {
            telemetry,
            directory,
        }
    }

    /// Fetch and merge dashboard data for `sensor`.
    ///
    /// # Errors
    /// Returns the first error raised by either fetch. No partial result is produced.
    pub async fn aggregate(&self, sensor: &SensorId) -> RelayResult<DashboardData> {
        let result = tokio::try_join!(
            self.telemetry.latest_reading(sensor),
            self.directory.metadata(sensor),
        );

        match result {
            Ok((device, metadata)) => {
                debug!(sensor = %sensor, "dashboard data aggregated");
                Ok(DashboardData {
                    device,
                    sensor: metadata,
                })
            }
            Err(e) => {
                warn!(sensor = %sensor, kind = e.kind(), "dashboard aggregation failed: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::RelayError;

    /// Canned reading used across tests.
    pub(crate) fn sample_reading() -> TelemetryReading {
        TelemetryReading {
            co2_ppm: Some(812.0),
            humidity: Some(48.0),
            temperature_celsius: Some(23.5),
            mold_index: Some(3.0),
            ozone_ppb: Some(14.0),
            tvoc_ppb: Some(210.0),
            aqi: Some(41.0),
            pc0_1: Some(1.2),
        }
    }

    /// Canned metadata used across tests.
    pub(crate) fn sample_metadata(sensor: &SensorId) -> SensorMetadata {
        SensorMetadata {
            sensor_id: sensor.to_string(),
            city: Some("Monterrey".to_string()),
            pathogen_free_days: Some(30),
            mold_free_days: Some(12),
        }
    }

    /// Telemetry source with a fixed outcome and an optional delay.
    pub(crate) struct FakeTelemetry {
        pub(crate) fail: bool,
        pub(crate) delay: Duration,
        pub(crate) calls: AtomicUsize,
    }

    impl FakeTelemetry {
        pub(crate) const fn ok() -> Self {
            Self {
                fail: false,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) const fn failing() -> Self {
            Self {
                fail: true,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TelemetrySource for FakeTelemetry {
        fn latest_reading<'a>(
            &'a self,
            _sensor: &'a SensorId,
        ) -> SourceFuture<'a, RelayResult<TelemetryReading>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                if self.fail {
                    Err(RelayError::Telemetry("scripted failure".to_string()))
                } else {
                    Ok(sample_reading())
                }
            })
        }
    }

    /// Sensor directory with a fixed outcome and an optional delay.
    pub(crate) struct FakeDirectory {
        pub(crate) fail: bool,
        pub(crate) delay: Duration,
        pub(crate) calls: AtomicUsize,
    }

    impl FakeDirectory {
        pub(crate) const fn ok() -> Self {
            Self {
                fail: false,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) const fn failing() -> Self {
            Self {
                fail: true,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SensorDirectory for FakeDirectory {
        fn metadata<'a>(
            &'a self,
            sensor: &'a SensorId,
        ) -> SourceFuture<'a, RelayResult<SensorMetadata>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                if self.fail {
                    Err(RelayError::Metadata("scripted failure".to_string()))
                } else {
                    Ok(sample_metadata(sensor))
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    use super::fakes::{FakeDirectory, FakeTelemetry, sample_reading};
    use super::*;
    use crate::error::RelayError;

    fn sensor() -> SensorId {
        SensorId::parse("S1").expect("sensor")
    }

    #[tokio::test]
    async fn test_aggregate_merges_both_sources() {
        let aggregator = DashboardAggregator::new(
            Arc::new(FakeTelemetry::ok()),
            Arc::new(FakeDirectory::ok()),
        );

        let data = aggregator.aggregate(&sensor()).await.expect("data");

        assert_eq!(data.device, sample_reading());
        assert_eq!(data.sensor.sensor_id, "S1");
    }

    #[tokio::test]
    async fn test_failed_telemetry_fails_aggregate() {
        let aggregator = DashboardAggregator::new(
            Arc::new(FakeTelemetry::failing()),
            Arc::new(FakeDirectory::ok()),
        );

        let result = aggregator.aggregate(&sensor()).await;

        assert!(matches!(result, Err(RelayError::Telemetry(_))));
    }

    #[tokio::test]
    async fn test_failed_metadata_fails_aggregate() {
        let aggregator = DashboardAggregator::new(
            Arc::new(FakeTelemetry::ok()),
            Arc::new(FakeDirectory::failing()),
        );

        let result = aggregator.aggregate(&sensor()).await;

        assert!(matches!(result, Err(RelayError::Metadata(_))));
    }

    #[tokio::test]
    async fn test_fetches_run_concurrently() {
        let telemetry = Arc::new(FakeTelemetry {
            delay: Duration::from_millis(200),
            ..FakeTelemetry::ok()
        });
        let directory = Arc::new(FakeDirectory {
            delay: Duration::from_millis(200),
            ..FakeDirectory::ok()
        });
        let aggregator = DashboardAggregator::new(telemetry.clone(), directory.clone());

        let started = Instant::now();
        aggregator.aggregate(&sensor()).await.expect("data");

        assert!(started.elapsed() < Duration::from_millis(380));
        assert_eq!(telemetry.calls.load(Ordering::SeqCst), 1);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let sensor = sensor();
        let data = DashboardData {
            device: sample_reading(),
            sensor: super::fakes::sample_metadata(&sensor),
        };
        let json = serde_json::to_value(&data).unwrap_or_default();
        assert!(json["deviceData"]["cO2_ppm"].is_number());
        assert_eq!(json["sensorData"]["sensorId"], "S1");
    }
}
