use crate::config::AnnounceConfig;
use crate::geodesy::haversine_m;
use crate::progress::RouteProgressTracker;
use crate::routing::{RouteLeg, RouteStep, TurnDirection};
use geo::Coord;
use serde::{Deserialize, Serialize};

/// Announcement urgency, ordered from farthest to closest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementTier {
    Early,
    Approaching,
    Upcoming,
    Immediate,
}

impl AnnouncementTier {
    fn rank(self) -> u8 {
        match self {
            AnnouncementTier::Early => 0,
            AnnouncementTier::Approaching => 1,
            AnnouncementTier::Upcoming => 2,
            AnnouncementTier::Immediate => 3,
        }
    }
}

/// The instruction shown/spoken for the upcoming maneuver. Recomputed on
/// every update; never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnInstruction {
    pub direction: TurnDirection,
    pub distance_to_maneuver_m: f64,
    pub street_name: String,
    /// Index of the active step within its leg.
    pub step_index: usize,
    /// True once this is the arrival maneuver and it is within pass radius.
    pub is_complete: bool,
}

/// Selects the current instruction and debounces its announcements.
///
/// While traversing step `i` the announced maneuver is the one at the end of
/// that step (the turn onto step `i+1`); the final step announces its own
/// arrival maneuver. Each maneuver is announced at most once per tier, with
/// the IMMEDIATE tier latched once the maneuver is nearly reached.
pub struct TurnAnnouncer {
    config: AnnounceConfig,
    tracked_step: Option<usize>,
    last_announced_distance: Option<f64>,
    immediate_latched: bool,
}

impl TurnAnnouncer {
    pub fn new(config: AnnounceConfig) -> Self {
        TurnAnnouncer {
            config,
            tracked_step: None,
            last_announced_distance: None,
            immediate_latched: false,
        }
    }

    /// Maneuver announced while traversing `step_index`: the next step's
    /// entry maneuver, or the step's own (arrival) maneuver on the last step.
    fn announced_step(leg: &RouteLeg, step_index: usize) -> Option<(&RouteStep, usize)> {
        match leg.steps.get(step_index + 1) {
            Some(next) => Some((next, step_index + 1)),
            None => leg.steps.get(step_index).map(|s| (s, step_index)),
        }
    }

    /// Build the instruction for the active step.
    ///
    /// Distance to the maneuver uses the active step's own geometry when it
    /// has one (projection + remaining distance along the step), otherwise
    /// the direct great-circle distance to the maneuver point.
    pub fn current_instruction(
        &self,
        location: Coord<f64>,
        leg: &RouteLeg,
        step_index: usize,
    ) -> Option<TurnInstruction> {
        let active = leg.steps.get(step_index)?;
        let (announced, _) = Self::announced_step(leg, step_index)?;

        let distance_m = if active.geometry.coords().count() >= 2 {
            let proj = RouteProgressTracker::closest_point_on_route(location, &active.geometry)?;
            RouteProgressTracker::remaining_distance(
                location,
                &active.geometry,
                proj.segment_index + 1,
            )
        } else {
            haversine_m(location, announced.maneuver.location)
        };

        let direction = announced.maneuver.direction();
        let street_name = if announced.name.is_empty() {
            active.name.clone()
        } else {
            announced.name.clone()
        };

        Some(TurnInstruction {
            direction,
            distance_to_maneuver_m: distance_m,
            street_name,
            step_index,
            is_complete: direction == TurnDirection::Arrive
                && distance_m <= self.config.step_pass_radius_m,
        })
    }

    /// Advance the step cursor: starting at `previous_index`, skip every step
    /// whose announced maneuver is already within pass radius. The index
    /// never regresses within a leg.
    pub fn advance_step_index(
        &self,
        location: Coord<f64>,
        leg: &RouteLeg,
        previous_index: usize,
    ) -> usize {
        let mut index = previous_index;
        while index + 1 < leg.steps.len() {
            let Some((announced, _)) = Self::announced_step(leg, index) else {
                break;
            };
            let d = haversine_m(location, announced.maneuver.location);
            if d > self.config.step_pass_radius_m {
                break;
            }
            log::debug!("maneuver at step {index} passed ({d:.0}m), advancing");
            index += 1;
        }
        index
    }

    fn tier_for(&self, distance_m: f64) -> AnnouncementTier {
        if distance_m < self.config.immediate_m {
            AnnouncementTier::Immediate
        } else if distance_m < self.config.upcoming_m {
            AnnouncementTier::Upcoming
        } else if distance_m < self.config.approaching_m {
            AnnouncementTier::Approaching
        } else {
            AnnouncementTier::Early
        }
    }

    /// Decide whether to announce now. Fires at most once per tier as the
    /// distance shrinks, and never again after the IMMEDIATE latch.
    pub fn should_announce(&mut self, step_index: usize, distance_m: f64) -> Option<AnnouncementTier> {
        if self.tracked_step != Some(step_index) {
            // New maneuver: forget the previous one's announcements
            self.tracked_step = Some(step_index);
            self.last_announced_distance = None;
            self.immediate_latched = false;
        }

        if self.immediate_latched {
            return None;
        }

        let tier = self.tier_for(distance_m);
        let fired = match self.last_announced_distance {
            None => true,
            Some(last) => tier.rank() > self.tier_for(last).rank(),
        };

        if distance_m < self.config.latch_m {
            self.immediate_latched = true;
        }

        if fired {
            self.last_announced_distance = Some(distance_m);
            Some(tier)
        } else {
            None
        }
    }

    /// Forget all announcement state. Called when a new route is installed.
    pub fn reset(&mut self) {
        self.tracked_step = None;
        self.last_announced_distance = None;
        self.immediate_latched = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Maneuver;
    use geo::LineString;

    fn c(lon: f64, lat: f64) -> Coord<f64> {
        Coord { x: lon, y: lat }
    }

    fn step(name: &str, kind: &str, modifier: Option<&str>, location: Coord<f64>) -> RouteStep {
        RouteStep {
            name: name.to_string(),
            distance_m: 500.0,
            duration_s: 60.0,
            geometry: LineString::new(Vec::new()),
            maneuver: Maneuver {
                kind: kind.to_string(),
                modifier: modifier.map(|m| m.to_string()),
                location,
                bearing_before: 0.0,
                bearing_after: 0.0,
            },
        }
    }

    /// Leg heading north along lon 0: depart at 0.0, right turn at 0.01 deg
    /// (~1.1 km), arrive at 0.02 deg.
    fn leg() -> RouteLeg {
        RouteLeg {
            distance_m: 2200.0,
            duration_s: 240.0,
            steps: vec![
                step("First Avenue", "depart", None, c(0.0, 0.0)),
                step("Main Street", "turn", Some("right"), c(0.0, 0.01)),
                step("", "arrive", None, c(0.0, 0.02)),
            ],
        }
    }

    fn announcer() -> TurnAnnouncer {
        TurnAnnouncer::new(AnnounceConfig::default())
    }

    #[test]
    fn test_instruction_announces_next_maneuver() {
        let leg = leg();
        // Traversing step 0, halfway to the turn
        let inst = announcer()
            .current_instruction(c(0.0, 0.005), &leg, 0)
            .unwrap();

        assert_eq!(inst.direction, TurnDirection::Right);
        assert_eq!(inst.street_name, "Main Street");
        assert_eq!(inst.step_index, 0);
        assert!(!inst.is_complete);
        // ~0.005 deg of latitude
        assert!((inst.distance_to_maneuver_m - 556.0).abs() < 10.0);
    }

    #[test]
    fn test_instruction_uses_step_geometry_when_present() {
        let mut leg = leg();
        // Dogleg geometry on step 0: east then north, ~2.2km total
        leg.steps[0].geometry =
            LineString::new(vec![c(0.0, 0.0), c(0.01, 0.0), c(0.01, 0.01)]);

        let inst = announcer()
            .current_instruction(c(0.0, 0.0), &leg, 0)
            .unwrap();
        // Along-geometry distance, not the 1.1km straight line
        assert!(inst.distance_to_maneuver_m > 2000.0, "got {}", inst.distance_to_maneuver_m);
    }

    #[test]
    fn test_last_step_announces_arrival() {
        let leg = leg();
        let inst = announcer()
            .current_instruction(c(0.0, 0.0199), &leg, 2)
            .unwrap();
        assert_eq!(inst.direction, TurnDirection::Arrive);
        assert!(inst.is_complete, "within pass radius of the arrival point");
    }

    #[test]
    fn test_advance_skips_passed_maneuvers() {
        let a = announcer();
        let leg = leg();

        // Far from the turn: stay on step 0
        assert_eq!(a.advance_step_index(c(0.0, 0.005), &leg, 0), 0);

        // Within 30m of the turn at 0.01 deg: step 0 is done
        assert_eq!(a.advance_step_index(c(0.0, 0.00999), &leg, 0), 1);

        // Index never regresses even when the old maneuver is far again
        assert_eq!(a.advance_step_index(c(0.0, 0.005), &leg, 1), 1);
    }

    #[test]
    fn test_one_announcement_per_tier() {
        let mut a = announcer();

        // 350m -> APPROACHING
        assert_eq!(a.should_announce(0, 350.0), Some(AnnouncementTier::Approaching));
        // Shrinking within the tier: silent
        assert_eq!(a.should_announce(0, 320.0), None);
        // 120m -> UPCOMING
        assert_eq!(a.should_announce(0, 120.0), Some(AnnouncementTier::Upcoming));
        assert_eq!(a.should_announce(0, 110.0), None);
        // 40m -> IMMEDIATE, and latches
        assert_eq!(a.should_announce(0, 40.0), Some(AnnouncementTier::Immediate));
        assert_eq!(a.should_announce(0, 20.0), None);
        assert_eq!(a.should_announce(0, 10.0), None);
    }

    #[test]
    fn test_early_tier_fires_once() {
        let mut a = announcer();
        assert_eq!(a.should_announce(0, 1500.0), Some(AnnouncementTier::Early));
        assert_eq!(a.should_announce(0, 900.0), None);
        assert_eq!(a.should_announce(0, 700.0), Some(AnnouncementTier::Approaching));
    }

    #[test]
    fn test_new_step_resets_debounce() {
        let mut a = announcer();
        assert_eq!(a.should_announce(0, 40.0), Some(AnnouncementTier::Immediate));
        assert_eq!(a.should_announce(0, 20.0), None, "latched");

        // Next maneuver: full tier ladder available again
        assert_eq!(a.should_announce(1, 350.0), Some(AnnouncementTier::Approaching));
    }

    #[test]
    fn test_distance_growth_does_not_reannounce() {
        let mut a = announcer();
        assert_eq!(a.should_announce(0, 120.0), Some(AnnouncementTier::Upcoming));
        // GPS wobble back out of the tier boundary, then in again
        assert_eq!(a.should_announce(0, 310.0), None);
        assert_eq!(a.should_announce(0, 290.0), None);
    }

    #[test]
    fn test_reset_clears_tracking() {
        let mut a = announcer();
        a.should_announce(0, 40.0);
        a.reset();
        assert_eq!(a.should_announce(0, 350.0), Some(AnnouncementTier::Approaching));
    }
}
