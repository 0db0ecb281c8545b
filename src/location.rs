//! Resolution of the single authoritative location for a report draft.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::device::LocationSensor;
use crate::error::LocationError;
use crate::geo::GeoPoint;
use crate::metadata::MetadataDecoder;

/// What prompted a location lookup.
pub enum CaptureTrigger<'a> {
    /// A frame grabbed from the live camera; the device sensor is the source.
    Camera,
    /// An uploaded batch; the first file's embedded metadata is the source.
    Upload { first_file: &'a [u8] },
}

/// Upper bound (exclusive) of the latitude band whose sign the metadata
/// writers in this deployment's region reliably drop. Everything the kiosks
/// photograph sits south of the equator within this band, so an unsigned
/// small latitude is read as southern.
const SIGN_LOSS_BAND_DEGREES: f64 = 10.0;

/// Produces at most one location per draft.
///
/// The first capture to resolve successfully locks the draft's location;
/// every later capture short-circuits to the locked point without touching
/// the sensor or any photo's metadata.
pub struct LocationResolver {
    sensor: Arc<dyn LocationSensor>,
    decoder: Arc<dyn MetadataDecoder>,
    fix_timeout: Duration,
    high_accuracy: bool,
}

impl LocationResolver {
    pub fn new(
        sensor: Arc<dyn LocationSensor>,
        decoder: Arc<dyn MetadataDecoder>,
        fix_timeout: Duration,
        high_accuracy: bool,
    ) -> Self {
        Self {
            sensor,
            decoder,
            fix_timeout,
            high_accuracy,
        }
    }

    pub async fn resolve(
        &self,
        trigger: CaptureTrigger<'_>,
        current: Option<GeoPoint>,
    ) -> Result<GeoPoint, LocationError> {
        if let Some(locked) = current {
            debug!(%locked, "location already locked; skipping lookup");
            return Ok(locked);
        }
        match trigger {
            CaptureTrigger::Camera => {
                let fix = self
                    .sensor
                    .get_fix(self.fix_timeout, self.high_accuracy)
                    .await?;
                // Sensor coordinates are correctly signed; no correction.
                let point = GeoPoint::try_new(fix.lat, fix.lon)?;
                info!(%point, "location locked from device sensor");
                Ok(point)
            }
            CaptureTrigger::Upload { first_file } => {
                let raw = self
                    .decoder
                    .gps(first_file)
                    .ok_or(LocationError::NoMetadata)?;
                let corrected = correct_hemisphere(raw.lat);
                let point = GeoPoint::try_new(corrected, raw.lon)?;
                info!(%point, raw_latitude = raw.lat, "location locked from photo metadata");
                Ok(point)
            }
        }
    }
}

/// Hemisphere workaround for metadata-sourced latitudes: a positive latitude
/// below the sign-loss band is negated; zero, negative and large-magnitude
/// latitudes pass through, as do all longitudes.
fn correct_hemisphere(latitude: f64) -> f64 {
    if latitude > 0.0 && latitude < SIGN_LOSS_BAND_DEGREES {
        -latitude
    } else {
        latitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeSensor;
    use crate::error::SensorError;
    use crate::metadata::FixedDecoder;

    fn resolver(sensor: FakeSensor, decoder: FixedDecoder) -> LocationResolver {
        LocationResolver::new(
            Arc::new(sensor),
            Arc::new(decoder),
            Duration::from_secs(5),
            true,
        )
    }

    #[tokio::test]
    async fn camera_fix_passes_through_unchanged() {
        let r = resolver(FakeSensor::with_fix(-6.2, 106.8), FixedDecoder::empty());
        let point = r.resolve(CaptureTrigger::Camera, None).await.unwrap();
        assert_eq!(point, GeoPoint::try_new(-6.2, 106.8).unwrap());
    }

    #[tokio::test]
    async fn camera_fix_is_not_hemisphere_corrected() {
        // A genuine northern small latitude from the sensor stays northern.
        let r = resolver(FakeSensor::with_fix(6.2, 106.8), FixedDecoder::empty());
        let point = r.resolve(CaptureTrigger::Camera, None).await.unwrap();
        assert_eq!(point.latitude, 6.2);
    }

    #[tokio::test]
    async fn locked_location_short_circuits_the_sensor() {
        let sensor = FakeSensor::with_fix(1.0, 2.0);
        let r = resolver(sensor.clone(), FixedDecoder::empty());
        let locked = GeoPoint::try_new(-6.2, 106.8).unwrap();

        let point = r
            .resolve(CaptureTrigger::Camera, Some(locked))
            .await
            .unwrap();
        assert_eq!(point, locked);
        assert_eq!(sensor.calls(), 0);
    }

    #[tokio::test]
    async fn locked_location_short_circuits_the_metadata() {
        let decoder = FixedDecoder::reporting(7.0, 8.0);
        let r = resolver(FakeSensor::default(), decoder.clone());
        let locked = GeoPoint::try_new(-6.2, 106.8).unwrap();

        let point = r
            .resolve(CaptureTrigger::Upload { first_file: b"img" }, Some(locked))
            .await
            .unwrap();
        assert_eq!(point, locked);
        assert_eq!(decoder.calls(), 0);
    }

    #[tokio::test]
    async fn small_positive_metadata_latitude_is_negated() {
        let r = resolver(FakeSensor::default(), FixedDecoder::reporting(6.2, 106.8));
        let point = r
            .resolve(CaptureTrigger::Upload { first_file: b"img" }, None)
            .await
            .unwrap();
        assert_eq!(point, GeoPoint::try_new(-6.2, 106.8).unwrap());
    }

    #[tokio::test]
    async fn large_metadata_latitude_passes_through() {
        let r = resolver(FakeSensor::default(), FixedDecoder::reporting(45.0, 9.0));
        let point = r
            .resolve(CaptureTrigger::Upload { first_file: b"img" }, None)
            .await
            .unwrap();
        assert_eq!(point.latitude, 45.0);
    }

    #[tokio::test]
    async fn band_boundary_is_exclusive() {
        let r = resolver(FakeSensor::default(), FixedDecoder::reporting(10.0, 9.0));
        let point = r
            .resolve(CaptureTrigger::Upload { first_file: b"img" }, None)
            .await
            .unwrap();
        assert_eq!(point.latitude, 10.0);
    }

    #[tokio::test]
    async fn missing_metadata_is_an_error() {
        let r = resolver(FakeSensor::default(), FixedDecoder::empty());
        let err = r
            .resolve(CaptureTrigger::Upload { first_file: b"img" }, None)
            .await
            .unwrap_err();
        assert_eq!(err, LocationError::NoMetadata);
    }

    #[tokio::test]
    async fn out_of_range_metadata_is_rejected() {
        let r = resolver(FakeSensor::default(), FixedDecoder::reporting(95.0, 10.0));
        let err = r
            .resolve(CaptureTrigger::Upload { first_file: b"img" }, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LocationError::InvalidCoordinates { .. }));

        let r = resolver(FakeSensor::default(), FixedDecoder::reporting(6.2, 200.0));
        assert!(matches!(
            r.resolve(CaptureTrigger::Upload { first_file: b"img" }, None)
                .await,
            Err(LocationError::InvalidCoordinates { .. })
        ));
    }

    #[tokio::test]
    async fn sensor_failures_map_onto_location_errors() {
        for (sensor_err, location_err) in [
            (SensorError::Denied, LocationError::SensorDenied),
            (SensorError::Timeout, LocationError::SensorTimeout),
            (SensorError::Unavailable, LocationError::SensorUnavailable),
        ] {
            let r = resolver(FakeSensor::failing(sensor_err), FixedDecoder::empty());
            let err = r.resolve(CaptureTrigger::Camera, None).await.unwrap_err();
            assert_eq!(err, location_err);
        }
    }

    #[test]
    fn hemisphere_correction_only_touches_the_band() {
        assert_eq!(correct_hemisphere(6.2), -6.2);
        assert_eq!(correct_hemisphere(9.999), -9.999);
        assert_eq!(correct_hemisphere(10.0), 10.0);
        assert_eq!(correct_hemisphere(45.0), 45.0);
        assert_eq!(correct_hemisphere(0.0), 0.0);
        assert_eq!(correct_hemisphere(-6.2), -6.2);
    }
}
