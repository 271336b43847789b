//! Location related module
//!
//! A `Coordinate` is a validated WGS84 (latitude, longitude) pair.  It is a plain value type: any
//! update replaces the previous value, nothing is ever mutated in place.
//!
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean earth radius in meters
const EARTH_RADIUS: f64 = 6_371_008.8;

/// Where the map goes when the device can not tell us anything.
pub const DEFAULT_FALLBACK: Coordinate = Coordinate {
    latitude: 5.99245976331867,
    longitude: 7.465015634005065,
};

/// Errors raised when building a `Coordinate`.
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CoordError {
    #[error("Latitude {0} out of [-90, 90]")]
    Latitude(f64),
    #[error("Longitude {0} out of [-180, 180]")]
    Longitude(f64),
}

/// Actual location
///
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    /// Latitude
    latitude: f64,
    /// Longitude
    longitude: f64,
}

/// Unchecked version, only used to go through `TryFrom` when deserializing.
///
#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordError;

    fn try_from(value: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(value.latitude, value.longitude)
    }
}

impl Coordinate {
    /// Check both ranges, NaN and infinities are rejected as well.
    ///
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordError::Longitude(longitude));
        }
        Ok(Coordinate {
            latitude,
            longitude,
        })
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance in meters (haversine).
    ///
    pub fn distance(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.).sin().powi(2);
        2. * EARTH_RADIUS * a.sqrt().asin()
    }

    /// Point at fraction `t` (0..=1) of the straight segment between `self` and `to`.
    ///
    /// This is what a map camera follows when flying between two nearby points, we do not need
    /// great-circle accuracy for this.
    ///
    pub fn lerp(&self, to: &Coordinate, t: f64) -> Coordinate {
        let t = t.clamp(0., 1.);
        Coordinate {
            latitude: self.latitude + (to.latitude - self.latitude) * t,
            longitude: self.longitude + (to.longitude - self.longitude) * t,
        }
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

impl TryFrom<(f64, f64)> for Coordinate {
    type Error = CoordError;

    fn try_from((lat, lon): (f64, f64)) -> Result<Self, Self::Error> {
        Coordinate::new(lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[inline]
    fn shorten(v: f64) -> String {
        format!("{:.3}", v)
    }

    #[rstest]
    #[case(0., 0.)]
    #[case(90., 180.)]
    #[case(-90., -180.)]
    #[case(5.99245976331867, 7.465015634005065)]
    fn test_coordinate_valid(#[case] lat: f64, #[case] lon: f64) {
        let c = Coordinate::new(lat, lon).unwrap();
        assert_eq!(lat, c.latitude());
        assert_eq!(lon, c.longitude());
    }

    #[rstest]
    #[case(90.5, 0., CoordError::Latitude(90.5))]
    #[case(-91., 0., CoordError::Latitude(-91.))]
    #[case(0., 180.1, CoordError::Longitude(180.1))]
    #[case(0., -200., CoordError::Longitude(-200.))]
    fn test_coordinate_out_of_range(#[case] lat: f64, #[case] lon: f64, #[case] err: CoordError) {
        assert_eq!(Err(err), Coordinate::new(lat, lon));
    }

    #[test]
    fn test_default_fallback_is_valid() {
        let c = Coordinate::new(DEFAULT_FALLBACK.latitude(), DEFAULT_FALLBACK.longitude());
        assert_eq!(Ok(DEFAULT_FALLBACK), c);
    }

    #[test]
    fn test_coordinate_nan() {
        assert!(Coordinate::new(f64::NAN, 0.).is_err());
        assert!(Coordinate::new(0., f64::INFINITY).is_err());
    }

    #[test]
    fn test_coordinate_deserialize_checks_range() {
        let c: Coordinate = serde_json::from_str(r#"{"latitude": 9.05, "longitude": 7.49}"#).unwrap();
        assert_eq!(Coordinate::new(9.05, 7.49).unwrap(), c);

        let c = serde_json::from_str::<Coordinate>(r#"{"latitude": 99.0, "longitude": 7.49}"#);
        assert!(c.is_err());
    }

    #[test]
    fn test_coordinate_serialize() {
        let c = Coordinate::new(9.05, 7.49).unwrap();
        assert_eq!(r#"{"latitude":9.05,"longitude":7.49}"#, serde_json::to_string(&c).unwrap());
    }

    #[test]
    fn test_distance_abuja_enugu() {
        let abuja = Coordinate::new(9.0579, 7.4951).unwrap();
        let enugu = Coordinate::new(6.4584, 7.5464).unwrap();

        // ~289 km
        let d = abuja.distance(&enugu) / 1000.;
        assert!((288. ..290.).contains(&d), "got {d}");
        assert_eq!(0., abuja.distance(&abuja));
    }

    #[test]
    fn test_lerp() {
        let a = Coordinate::new(9.05, 7.49).unwrap();
        let b = Coordinate::new(9.06, 7.50).unwrap();

        let mid = a.lerp(&b, 0.5);
        assert_eq!(shorten(9.055), shorten(mid.latitude()));
        assert_eq!(shorten(7.495), shorten(mid.longitude()));
        assert_eq!(b, a.lerp(&b, 2.));
        assert_eq!(a, a.lerp(&b, -1.));
    }
}
