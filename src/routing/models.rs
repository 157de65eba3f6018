use super::polyline;
use crate::geodesy::bearing_diff_deg;
use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

/// Classified turn direction used for instruction display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    Depart,
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
    SlightRight,
    Right,
    SharpRight,
    UTurn,
    Merge,
    RoundaboutExit,
    Arrive,
}

impl TurnDirection {
    pub fn as_text(&self) -> &'static str {
        match self {
            TurnDirection::Depart => "depart",
            TurnDirection::Straight => "continue straight",
            TurnDirection::SlightLeft => "keep slightly left",
            TurnDirection::Left => "turn left",
            TurnDirection::SharpLeft => "turn sharp left",
            TurnDirection::SlightRight => "keep slightly right",
            TurnDirection::Right => "turn right",
            TurnDirection::SharpRight => "turn sharp right",
            TurnDirection::UTurn => "make a U-turn",
            TurnDirection::Merge => "merge",
            TurnDirection::RoundaboutExit => "take the roundabout exit",
            TurnDirection::Arrive => "arrive at destination",
        }
    }
}

/// One maneuver as announced at a step boundary.
#[derive(Clone, Debug)]
pub struct Maneuver {
    /// Raw maneuver type from the backend ("turn", "depart", "merge", ...).
    pub kind: String,
    /// Raw modifier ("left", "slight right", ...), absent for some types.
    pub modifier: Option<String>,
    /// Maneuver location in degrees.
    pub location: Coord<f64>,
    pub bearing_before: f64,
    pub bearing_after: f64,
}

impl Maneuver {
    /// Classify into a display direction. The backend's modifier string wins;
    /// when absent the bearing change decides.
    pub fn direction(&self) -> TurnDirection {
        match self.kind.as_str() {
            "depart" => return TurnDirection::Depart,
            "arrive" => return TurnDirection::Arrive,
            "merge" => return TurnDirection::Merge,
            "roundabout" | "rotary" | "exit roundabout" => {
                return TurnDirection::RoundaboutExit
            }
            _ => {}
        }

        match self.modifier.as_deref() {
            Some("uturn") => TurnDirection::UTurn,
            Some("sharp left") => TurnDirection::SharpLeft,
            Some("left") => TurnDirection::Left,
            Some("slight left") => TurnDirection::SlightLeft,
            Some("sharp right") => TurnDirection::SharpRight,
            Some("right") => TurnDirection::Right,
            Some("slight right") => TurnDirection::SlightRight,
            Some("straight") => TurnDirection::Straight,
            _ => classify_by_bearing(self.bearing_before, self.bearing_after),
        }
    }
}

/// Fall back to the bearing change when no modifier is given.
fn classify_by_bearing(before: f64, after: f64) -> TurnDirection {
    let angle = bearing_diff_deg(before, after);
    let abs = angle.abs();

    if abs > 170.0 {
        TurnDirection::UTurn
    } else if abs > 120.0 {
        if angle > 0.0 { TurnDirection::SharpRight } else { TurnDirection::SharpLeft }
    } else if abs > 60.0 {
        if angle > 0.0 { TurnDirection::Right } else { TurnDirection::Left }
    } else if abs > 20.0 {
        if angle > 0.0 { TurnDirection::SlightRight } else { TurnDirection::SlightLeft }
    } else {
        TurnDirection::Straight
    }
}

/// One routing step: the road followed until the next maneuver.
#[derive(Clone, Debug)]
pub struct RouteStep {
    pub name: String,
    pub distance_m: f64,
    pub duration_s: f64,
    /// Step geometry; may be empty when the backend omits per-step overview.
    pub geometry: LineString<f64>,
    pub maneuver: Maneuver,
}

#[derive(Clone, Debug)]
pub struct RouteLeg {
    pub distance_m: f64,
    pub duration_s: f64,
    pub steps: Vec<RouteStep>,
}

/// A complete route as accepted by a navigation session. Immutable once
/// installed; replaced wholesale by a successful reroute.
#[derive(Clone, Debug)]
pub struct Route {
    pub geometry: LineString<f64>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub legs: Vec<RouteLeg>,
}

impl Route {
    /// Average speed over the whole route, if the duration is usable.
    pub fn average_speed_mps(&self) -> Option<f64> {
        if self.total_duration_s > 0.0 {
            Some(self.total_distance_m / self.total_duration_s)
        } else {
            None
        }
    }

    /// Final route point (the destination as routed).
    pub fn destination(&self) -> Option<Coord<f64>> {
        self.geometry.coords().last().copied()
    }

    pub fn step(&self, leg_index: usize, step_index: usize) -> Option<&RouteStep> {
        self.legs.get(leg_index)?.steps.get(step_index)
    }
}

/// Parse a routing-service route response body (JSON) into the first route.
/// Used by hosts that fetch or cache route JSON themselves.
pub fn route_from_json(json: &str) -> Result<Route, String> {
    let response: RouteResponse =
        serde_json::from_str(json).map_err(|e| format!("malformed route response: {e}"))?;
    if response.code != "Ok" {
        return Err(format!("route response code {}", response.code));
    }
    response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| "route response contains no routes".to_string())?
        .into_route()
}

// ---- wire model -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct RouteResponse {
    pub code: String,
    #[serde(default)]
    pub routes: Vec<WireRoute>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRoute {
    pub distance: f64,
    pub duration: f64,
    pub geometry: String,
    #[serde(default)]
    pub legs: Vec<WireLeg>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireLeg {
    pub distance: f64,
    pub duration: f64,
    #[serde(default)]
    pub steps: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireStep {
    #[serde(default)]
    pub name: String,
    pub distance: f64,
    pub duration: f64,
    #[serde(default)]
    pub geometry: Option<String>,
    pub maneuver: WireManeuver,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireManeuver {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub modifier: Option<String>,
    /// [lon, lat]
    pub location: [f64; 2],
    #[serde(default)]
    pub bearing_before: f64,
    #[serde(default)]
    pub bearing_after: f64,
}

impl WireRoute {
    /// Decode the wire route into the domain model.
    pub(crate) fn into_route(self) -> Result<Route, String> {
        let geometry = polyline::decode(&self.geometry, 1e5)?;
        if geometry.coords().count() < 2 {
            return Err("route geometry has fewer than 2 points".to_string());
        }

        let mut legs = Vec::with_capacity(self.legs.len());
        for leg in self.legs {
            let mut steps = Vec::with_capacity(leg.steps.len());
            for step in leg.steps {
                let step_geometry = match &step.geometry {
                    Some(encoded) => polyline::decode(encoded, 1e5)?,
                    None => LineString::new(Vec::new()),
                };
                steps.push(RouteStep {
                    name: step.name,
                    distance_m: step.distance,
                    duration_s: step.duration,
                    geometry: step_geometry,
                    maneuver: Maneuver {
                        kind: step.maneuver.kind,
                        modifier: step.maneuver.modifier,
                        location: Coord {
                            x: step.maneuver.location[0],
                            y: step.maneuver.location[1],
                        },
                        bearing_before: step.maneuver.bearing_before,
                        bearing_after: step.maneuver.bearing_after,
                    },
                });
            }
            legs.push(RouteLeg {
                distance_m: leg.distance,
                duration_s: leg.duration,
                steps,
            });
        }

        Ok(Route {
            geometry,
            total_distance_m: self.distance,
            total_duration_s: self.duration,
            legs,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NearestResponse {
    pub code: String,
    #[serde(default)]
    pub waypoints: Vec<WireWaypoint>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireWaypoint {
    #[serde(default)]
    pub name: String,
    /// [lon, lat]
    pub location: [f64; 2],
    pub distance: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MatchResponse {
    pub code: String,
    #[serde(default)]
    pub tracepoints: Vec<Option<WireTracepoint>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTracepoint {
    /// [lon, lat]
    pub location: [f64; 2],
}
