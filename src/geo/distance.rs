use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
pub const EARTH_RADIUS_MILES: f64 = 3_958.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    #[schema(example = 37.5407)]
    pub lat: f64,
    #[schema(example = -77.436)]
    pub lng: f64,
}

impl Coordinate {
    /// Rejects a deserialized coordinate that is not on the globe.
    pub fn validated(self) -> AppResult<Self> {
        let Self { lat, lng } = self;
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(format!("latitude {lat} out of range")));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::Validation(format!("longitude {lng} out of range")));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Meters,
    Miles,
}

impl DistanceUnit {
    fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Meters => EARTH_RADIUS_METERS,
            DistanceUnit::Miles => EARTH_RADIUS_MILES,
        }
    }
}

/// Great-circle distance using the haversine formula.
///
/// Input is not validated; garbage coordinates give a garbage distance.
pub fn haversine(a: Coordinate, b: Coordinate, unit: DistanceUnit) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    unit.earth_radius() * c
}

pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    haversine(a, b, DistanceUnit::Meters)
}

pub fn distance_miles(a: Coordinate, b: Coordinate) -> f64 {
    haversine(a, b, DistanceUnit::Miles)
}
