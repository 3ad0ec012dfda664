//! The `location` module defines [`Location`], the shared spatial reference type for canonical
//! addresses.
use serde::{Deserialize, Serialize};

/// A location carries both a national-grid projection (easting/northing) and WGS84 geographic
/// coordinates (latitude/longitude), since the source gazetteer publishes both. A given UPRN has
/// at most one location; historic records may use the `(0.0, 0.0)` sentinel when no location was
/// ever recorded for them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Easting, national grid.
    pub easting: f64,
    /// Northing, national grid.
    pub northing: f64,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

impl Location {
    /// Constructs a new `Location` from the four coordinate fields.
    pub fn new(easting: f64, northing: f64, latitude: f64, longitude: f64) -> Self {
        Self {
            easting,
            northing,
            latitude,
            longitude,
        }
    }

    /// The sentinel location used by historic records that predate coordinate capture.
    pub fn historic_sentinel() -> Self {
        Self {
            easting: 0.0,
            northing: 0.0,
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    /// True when this location is the historic sentinel `(0, 0)` in both projections.
    pub fn is_sentinel(&self) -> bool {
        self.easting == 0.0 && self.northing == 0.0 && self.latitude == 0.0 && self.longitude == 0.0
    }
}
