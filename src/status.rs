use crate::announcer::{AnnouncementTier, TurnInstruction};
use crate::types::FilteredLocation;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Read-only snapshot published after every processed fix. Consumed by the
/// UI layer and the trip-telemetry collaborator; never mutated in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavStatus {
    pub timestamp: f64,
    /// State machine name: idle, routing, navigating, rerouting, arrived.
    pub state: String,
    pub location: Option<FilteredLocation>,
    pub off_route: bool,
    pub instruction: Option<TurnInstruction>,
    /// Set only on updates where an announcement fired.
    pub announcement: Option<AnnouncementTier>,
    pub remaining_distance_m: f64,
    pub remaining_distance_text: String,
    pub eta_s: f64,
    pub eta_text: String,
    pub fixes_processed: u64,
    pub reroutes: u64,
}

impl NavStatus {
    pub fn idle() -> Self {
        NavStatus {
            timestamp: current_timestamp(),
            state: "idle".to_string(),
            location: None,
            off_route: false,
            instruction: None,
            announcement: None,
            remaining_distance_m: 0.0,
            remaining_distance_text: format_distance(0.0),
            eta_s: 0.0,
            eta_text: format_duration(0.0),
            fixes_processed: 0,
            reroutes: 0,
        }
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Meters below 1 km (rounded to 10 m), kilometers with one decimal above.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{} m", (meters / 10.0).round() as i64 * 10)
    }
}

/// Seconds below a minute, minutes below an hour, hours+minutes above.
pub fn format_duration(seconds: f64) -> String {
    let s = seconds.max(0.0).round() as i64;
    if s < 60 {
        format!("{s} s")
    } else if s < 3600 {
        format!("{} min", (s + 30) / 60)
    } else {
        format!("{} h {} min", s / 3600, (s % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_distance_meters() {
        assert_eq!(format_distance(150.0), "150 m");
        assert_eq!(format_distance(5.0), "10 m");
        assert_eq!(format_distance(994.0), "990 m");
    }

    #[test]
    fn test_format_distance_km() {
        assert_eq!(format_distance(2500.0), "2.5 km");
        assert_eq!(format_distance(1000.0), "1.0 km");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42.0), "42 s");
        assert_eq!(format_duration(90.0), "2 min");
        assert_eq!(format_duration(600.0), "10 min");
        assert_eq!(format_duration(3900.0), "1 h 5 min");
        assert_eq!(format_duration(-5.0), "0 s");
    }

    #[test]
    fn test_idle_snapshot_serializes() {
        let status = NavStatus::idle();
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"state\":\"idle\""));
    }
}
