use crate::geodesy::{haversine_m, initial_bearing_deg, project_onto_segment};
use crate::routing::Route;
use geo::{Coord, LineString};

/// Closest-point projection of a fix onto a route polyline.
#[derive(Clone, Copy, Debug)]
pub struct RouteProjection {
    /// Index of the segment (geometry[i] -> geometry[i+1]) that won.
    pub segment_index: usize,
    /// Closest point on that segment, in degrees.
    pub point: Coord<f64>,
    /// Distance from the fix to `point` in meters.
    pub distance_m: f64,
}

/// Pure geometry over an active route: projection, remaining distance,
/// bearings and ETA. Holds no state; every answer is derived from the
/// arguments alone.
pub struct RouteProgressTracker;

impl RouteProgressTracker {
    /// Project `point` onto every consecutive segment of `geometry`, keep
    /// the minimum-distance clamp. O(n) in the number of vertices.
    ///
    /// Returns `None` for a geometry with fewer than 2 points.
    pub fn closest_point_on_route(
        point: Coord<f64>,
        geometry: &LineString<f64>,
    ) -> Option<RouteProjection> {
        let coords: Vec<Coord<f64>> = geometry.coords().copied().collect();
        if coords.len() < 2 {
            return None;
        }

        let mut best: Option<RouteProjection> = None;
        for (i, pair) in coords.windows(2).enumerate() {
            let proj = project_onto_segment(point, pair[0], pair[1]);
            let candidate = RouteProjection {
                segment_index: i,
                point: proj.point,
                distance_m: proj.distance_m,
            };
            match &best {
                Some(b) if b.distance_m <= candidate.distance_m => {}
                _ => best = Some(candidate),
            }
        }
        best
    }

    /// Meters left to travel: distance from `point` to `geometry[from_index]`
    /// plus the polyline length from there to the end.
    ///
    /// `from_index` is the next vertex ahead of the agent (typically the
    /// winning segment's index + 1).
    pub fn remaining_distance(
        point: Coord<f64>,
        geometry: &LineString<f64>,
        from_index: usize,
    ) -> f64 {
        let coords: Vec<Coord<f64>> = geometry.coords().copied().collect();
        if coords.is_empty() {
            return 0.0;
        }
        let from_index = from_index.min(coords.len() - 1);

        let mut total = haversine_m(point, coords[from_index]);
        for pair in coords[from_index..].windows(2) {
            total += haversine_m(pair[0], pair[1]);
        }
        total
    }

    /// Initial bearing along the route at `segment_index`, for arrow
    /// orientation. `None` when the segment does not exist.
    pub fn bearing_at_segment(geometry: &LineString<f64>, segment_index: usize) -> Option<f64> {
        let coords: Vec<Coord<f64>> = geometry.coords().copied().collect();
        let a = coords.get(segment_index)?;
        let b = coords.get(segment_index + 1)?;
        Some(initial_bearing_deg(*a, *b))
    }

    /// Estimated seconds to arrival.
    ///
    /// Instantaneous speed is blended with a baseline (traffic-aware average
    /// when supplied, else the route's own average) as their arithmetic
    /// mean; below walking speed the baseline alone is used. With no usable
    /// baseline at all the route's total duration is the best answer left.
    pub fn estimate_eta_s(
        remaining_m: f64,
        speed_mps: f64,
        route: &Route,
        traffic_speed_mps: Option<f64>,
    ) -> f64 {
        let baseline = traffic_speed_mps
            .filter(|s| *s > 0.0)
            .or_else(|| route.average_speed_mps());

        match baseline {
            Some(base) => {
                let effective = if speed_mps >= 1.0 {
                    (speed_mps + base) / 2.0
                } else {
                    base
                };
                if effective > 0.0 {
                    remaining_m / effective
                } else {
                    route.total_duration_s
                }
            }
            None => route.total_duration_s,
        }
    }
}
