use std::hash::{Hash, Hasher};

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::state::world::WorldId;

/// Points closer than this are considered the same place
pub const CLOSE_DISTANCE_METERS: f64 = 15.0;

/// Maximum altitude difference for two points to be the same place
pub const ALTITUDE_TOLERANCE: f64 = 2.0;

const METERS_PER_DEGREE_LATITUDE: f64 = 111_320.0;
const LATITUDE_TOLERANCE_DEGREES: f64 = CLOSE_DISTANCE_METERS / METERS_PER_DEGREE_LATITUDE;

/// A geographic position, optionally a member of a segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub world: WorldId,
    /// Position within the owning segment
    #[serde(skip)]
    pub index: Option<usize>,
    #[serde(skip)]
    pub distance_from_previous: f64,
    #[serde(skip)]
    pub distance_along_segment: f64,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, world: WorldId) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            world,
            index: None,
            distance_from_previous: 0.0,
            distance_along_segment: 0.0,
        }
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Great-circle distance in meters
    pub fn distance_to(&self, other: &TrackPoint) -> f64 {
        Haversine::distance(self.point(), other.point())
    }

    pub fn altitude_delta(&self, other: &TrackPoint) -> f64 {
        (self.altitude - other.altitude).abs()
    }

    /// Fuzzy equality: within 15m and 2 altitude units
    pub fn is_close_to(&self, other: &TrackPoint) -> bool {
        // Degrees of longitude shrink towards the poles
        let cos_lat = self.latitude.to_radians().cos().abs().max(0.01);
        if (self.longitude - other.longitude).abs() > LATITUDE_TOLERANCE_DEGREES / cos_lat {
            return false;
        }
        if (self.latitude - other.latitude).abs() > LATITUDE_TOLERANCE_DEGREES {
            return false;
        }
        if self.altitude_delta(other) > ALTITUDE_TOLERANCE {
            return false;
        }
        self.distance_to(other) < CLOSE_DISTANCE_METERS
    }

    fn rounded(&self) -> (i64, i64, i64) {
        (
            (self.latitude * 1e5).round() as i64,
            (self.longitude * 1e5).round() as i64,
            (self.altitude * 1e2).round() as i64,
        )
    }
}

impl PartialEq for TrackPoint {
    fn eq(&self, other: &Self) -> bool {
        self.rounded() == other.rounded()
    }
}

impl Eq for TrackPoint {}

impl Hash for TrackPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rounded().hash(state);
    }
}

impl std::fmt::Display for TrackPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5} @ {:.1}", self.latitude, self.longitude, self.altitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watopia(lat: f64, lon: f64, alt: f64) -> TrackPoint {
        TrackPoint::new(lat, lon, alt, WorldId::Watopia)
    }

    #[test]
    fn test_equality_uses_rounded_coordinates() {
        let a = watopia(-11.640001, 166.950001, 10.001);
        let b = watopia(-11.640004, 166.949998, 10.002);
        assert_eq!(a, b);
        assert_ne!(a, watopia(-11.6401, 166.95, 10.0));
    }

    #[test]
    fn test_distance() {
        // One thousandth of a degree of latitude is roughly 111m
        let a = watopia(-11.640, 166.950, 0.0);
        let b = watopia(-11.641, 166.950, 0.0);
        let d = a.distance_to(&b);
        assert!((d - 111.2).abs() < 1.0, "distance was {d}");
    }

    #[test]
    fn test_close_within_thresholds() {
        let a = watopia(-11.64000, 166.95000, 10.0);
        let b = watopia(-11.64005, 166.95005, 11.5);
        assert!(a.is_close_to(&b));
        assert!(b.is_close_to(&a));
    }

    #[test]
    fn test_not_close_when_too_far() {
        let a = watopia(-11.64000, 166.95000, 10.0);
        let b = watopia(-11.64020, 166.95000, 10.0);
        assert!(!a.is_close_to(&b));
    }

    #[test]
    fn test_not_close_when_altitude_differs() {
        let a = watopia(-11.64000, 166.95000, 10.0);
        let b = watopia(-11.64000, 166.95000, 12.5);
        assert!(!a.is_close_to(&b));
    }

    #[test]
    fn test_longitude_filter_scales_with_latitude() {
        // At 60 degrees north 0.0002 degrees of longitude is about 11m
        let a = watopia(60.0, 10.0000, 0.0);
        let b = watopia(60.0, 10.0002, 0.0);
        assert!(a.is_close_to(&b));
    }
}
