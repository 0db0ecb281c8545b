use std::fmt;

use crate::error::LocationError;

/// A validated WGS-84 coordinate pair.
///
/// Construction goes through [`GeoPoint::try_new`], so a `GeoPoint` that
/// exists is always within bounds. Once a draft locks one it is never
/// mutated, only dropped on reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const MAX_LATITUDE: f64 = 90.0;
    pub const MAX_LONGITUDE: f64 = 180.0;

    /// Builds a point, rejecting non-finite or out-of-range coordinates.
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !latitude.is_finite()
            || !longitude.is_finite()
            || latitude.abs() > Self::MAX_LATITUDE
            || longitude.abs() > Self::MAX_LONGITUDE
        {
            return Err(LocationError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_in_range_coordinates() {
        let point = GeoPoint::try_new(-6.2, 106.8).unwrap();
        assert_eq!(point.latitude, -6.2);
        assert_eq!(point.longitude, 106.8);
    }

    #[test]
    fn accepts_the_exact_bounds() {
        assert!(GeoPoint::try_new(90.0, 180.0).is_ok());
        assert!(GeoPoint::try_new(-90.0, -180.0).is_ok());
        assert!(GeoPoint::try_new(0.0, 0.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        let err = GeoPoint::try_new(90.1, 0.0).unwrap_err();
        assert!(matches!(err, LocationError::InvalidCoordinates { .. }));
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        let err = GeoPoint::try_new(0.0, -180.5).unwrap_err();
        assert!(matches!(err, LocationError::InvalidCoordinates { .. }));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        assert!(GeoPoint::try_new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::try_new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn displays_as_comma_separated_pair() {
        let point = GeoPoint::try_new(-6.2, 106.8).unwrap();
        assert_eq!(point.to_string(), "-6.2, 106.8");
    }
}
