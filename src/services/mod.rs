use serde::{Deserialize, Serialize};

use crate::NearMeError;

pub mod distance;
pub mod overpass;
pub mod search;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, NearMeError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(NearMeError::InvalidCoordinate(format!(
                "latitude {latitude} must be within [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(NearMeError::InvalidCoordinate(format!(
                "longitude {longitude} must be within [-180, 180]"
            )));
        }
        Ok(GeoPoint {
            latitude,
            longitude,
        })
    }

    /// Builds a point from coordinates already known to be valid, such as backend output.
    pub const fn unchecked(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmenityResult {
    pub name: String,
    pub address: String,
    pub contact: String,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
}
