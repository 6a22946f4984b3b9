//! Buoy position smoothing: haversine distance from the anchor and a filter
//! that hides GPS outliers and jitter.

use serde::Serialize;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFilterSettings {
    pub nominal: GeoPoint,
    pub max_deviation_m: f64,
    pub min_movement_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GpsState {
    Stable,
    Unstable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsReading {
    pub state: GpsState,
    pub displayed: GeoPoint,
    pub deviation_m: f64,
}

/// Holds the last displayed buoy position. Samples too far from the anchor
/// are ignored and the display is pinned to the anchor; plausible samples
/// only move the display when they differ from it by more than the jitter
/// threshold.
#[derive(Debug, Clone)]
pub struct GpsStabilityFilter {
    settings: GpsFilterSettings,
    state: GpsState,
    displayed: GeoPoint,
    deviation_m: f64,
}

impl GpsStabilityFilter {
    pub fn new(settings: GpsFilterSettings) -> Self {
        Self {
            settings,
            state: GpsState::Stable,
            displayed: settings.nominal,
            deviation_m: 0.0,
        }
    }

    pub fn observe(&mut self, sample: GeoPoint) -> GpsReading {
        let deviation = haversine_m(self.settings.nominal, sample);
        self.deviation_m = deviation;
        if deviation > self.settings.max_deviation_m {
            self.state = GpsState::Unstable;
            self.displayed = self.settings.nominal;
        } else {
            self.state = GpsState::Stable;
            if haversine_m(self.displayed, sample) > self.settings.min_movement_m {
                self.displayed = sample;
            }
        }
        self.current()
    }

    pub fn current(&self) -> GpsReading {
        GpsReading {
            state: self.state,
            displayed: self.displayed,
            deviation_m: self.deviation_m,
        }
    }
}
