use geo::Coord;
use serde::{Deserialize, Serialize};

/// One raw GPS fix as delivered by the location provider (~0.5–1 Hz).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawFix {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub speed_mps: f64,
    pub bearing_deg: f64,
}

impl RawFix {
    /// All numeric fields finite. Fixes failing this never reach the filter.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.accuracy_m.is_finite()
            && self.speed_mps.is_finite()
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Smoothed location produced by the filter, superseded on every update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilteredLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// False when the fix was passed through or rejected instead of filtered.
    pub is_smoothed: bool,
    /// Always in [0, 1].
    pub confidence: f64,
}

impl FilteredLocation {
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    pub fn with_confidence(&self, confidence: f64) -> Self {
        FilteredLocation {
            confidence: confidence.clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}
