use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::geo::distance::{Coordinate, distance_meters};
use crate::model::worker::GeofenceStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeofenceZone {
    #[schema(example = "Main Shop")]
    pub name: String,
    pub center: Coordinate,
    #[schema(example = 150.0)]
    pub radius_meters: f64,
}

impl GeofenceZone {
    pub fn new(name: impl Into<String>, center: Coordinate, radius_meters: f64) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::Validation("zone name must not be empty".into()));
        }
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(AppError::Validation(format!(
                "zone {name} needs a positive radius"
            )));
        }
        Ok(Self {
            name,
            center: center.validated()?,
            radius_meters,
        })
    }
}

/// Shop and yard zones used when no zone file is configured.
pub static DEFAULT_ZONES: Lazy<Vec<GeofenceZone>> = Lazy::new(|| {
    vec![
        GeofenceZone {
            name: "Main Shop".into(),
            center: Coordinate { lat: 37.5407, lng: -77.4360 },
            radius_meters: 150.0,
        },
        GeofenceZone {
            name: "Equipment Yard".into(),
            center: Coordinate { lat: 37.5521, lng: -77.4602 },
            radius_meters: 250.0,
        },
        GeofenceZone {
            name: "Asphalt Plant".into(),
            center: Coordinate { lat: 37.4863, lng: -77.5031 },
            radius_meters: 400.0,
        },
    ]
});

/// Loads zones from a JSON array, validating each one.
pub fn load_zones(path: &Path) -> AppResult<Vec<GeofenceZone>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    let zones: Vec<GeofenceZone> = serde_json::from_str(&raw)
        .map_err(|e| AppError::Config(format!("invalid zone file {}: {e}", path.display())))?;

    zones
        .into_iter()
        .map(|z| GeofenceZone::new(z.name, z.center, z.radius_meters))
        .collect::<AppResult<Vec<_>>>()
        .map_err(|e| AppError::Config(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GeofenceMatch {
    pub zone: GeofenceZone,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GeofenceEvaluation {
    pub status: GeofenceStatus,
    pub matched: Option<GeofenceMatch>,
}

impl GeofenceEvaluation {
    pub fn in_range(&self) -> bool {
        self.status == GeofenceStatus::InRange
    }

    pub fn zone_name(&self) -> Option<&str> {
        self.matched.as_ref().map(|m| m.zone.name.as_str())
    }
}

/// Classifies a point against every zone. The radius is inclusive and
/// overlapping zones resolve to the nearest center, then list order.
pub fn evaluate(point: Coordinate, zones: &[GeofenceZone]) -> GeofenceEvaluation {
    let mut best: Option<GeofenceMatch> = None;

    for zone in zones {
        let d = distance_meters(zone.center, point);
        if d > zone.radius_meters {
            continue;
        }
        let closer = best.as_ref().is_none_or(|b| d < b.distance_meters);
        if closer {
            best = Some(GeofenceMatch {
                zone: zone.clone(),
                distance_meters: d,
            });
        }
    }

    GeofenceEvaluation {
        status: if best.is_some() {
            GeofenceStatus::InRange
        } else {
            GeofenceStatus::OutOfRange
        },
        matched: best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance::EARTH_RADIUS_METERS;

    fn zone(name: &str, lat: f64, lng: f64, radius: f64) -> GeofenceZone {
        GeofenceZone::new(name, Coordinate { lat, lng }, radius).unwrap()
    }

    /// Degrees of latitude covering `meters` along a meridian.
    fn lat_offset(meters: f64) -> f64 {
        (meters / EARTH_RADIUS_METERS).to_degrees()
    }

    #[test]
    fn point_inside_radius_is_in_range() {
        let shop = zone("Shop", 37.0, -77.0, 100.0);
        let eval = evaluate(Coordinate { lat: 37.0 + lat_offset(50.0), lng: -77.0 }, &[shop]);

        assert!(eval.in_range());
        assert_eq!(eval.zone_name(), Some("Shop"));
    }

    #[test]
    fn point_outside_every_zone_is_out_of_range() {
        let zones = vec![zone("Shop", 37.0, -77.0, 100.0), zone("Yard", 38.0, -77.0, 100.0)];
        let eval = evaluate(Coordinate { lat: 37.5, lng: -77.0 }, &zones);

        assert_eq!(eval.status, GeofenceStatus::OutOfRange);
        assert!(eval.matched.is_none());
    }

    #[test]
    fn boundary_is_inclusive() {
        let center = Coordinate { lat: 37.0, lng: -77.0 };
        let edge = Coordinate { lat: 37.0 + lat_offset(100.0), lng: -77.0 };
        let radius = distance_meters(center, edge);
        let shop = GeofenceZone::new("Shop", center, radius).unwrap();

        let eval = evaluate(edge, &[shop]);
        assert!(eval.in_range());
        assert_eq!(eval.matched.map(|m| m.distance_meters), Some(radius));
    }

    #[test]
    fn overlapping_zones_pick_nearest_center() {
        let zones = vec![
            zone("Wide", 37.0, -77.0, 1_000.0),
            zone("Tight", 37.0 + lat_offset(300.0), -77.0, 100.0),
        ];
        let eval = evaluate(Coordinate { lat: 37.0 + lat_offset(280.0), lng: -77.0 }, &zones);

        assert_eq!(eval.zone_name(), Some("Tight"));
    }

    #[test]
    fn identical_zones_resolve_to_first_listed() {
        let zones = vec![zone("First", 37.0, -77.0, 100.0), zone("Second", 37.0, -77.0, 100.0)];
        let eval = evaluate(Coordinate { lat: 37.0, lng: -77.0 }, &zones);

        assert_eq!(eval.zone_name(), Some("First"));
    }

    #[test]
    fn empty_zone_list_is_out_of_range() {
        assert!(!evaluate(Coordinate { lat: 0.0, lng: 0.0 }, &[]).in_range());
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(GeofenceZone::new("Bad", Coordinate { lat: 0.0, lng: 0.0 }, 0.0).is_err());
        assert!(GeofenceZone::new(" ", Coordinate { lat: 0.0, lng: 0.0 }, 10.0).is_err());
    }

    #[test]
    fn default_zones_are_valid() {
        for z in DEFAULT_ZONES.iter() {
            assert!(GeofenceZone::new(z.name.clone(), z.center, z.radius_meters).is_ok());
        }
    }
}
