use geo::Coord;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const METERS_PER_DEG_LAT: f64 = 111_000.0;

/// Great-circle (haversine) distance between two coordinates in meters.
///
/// Coordinates follow the `geo` convention: `x` = longitude, `y` = latitude.
pub fn haversine_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d_lat = (b.y - a.y).to_radians();
    let d_lon = (b.x - a.x).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.y.to_radians().cos() * b.y.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees [0, 360).
pub fn initial_bearing_deg(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let d_lon = (b.x - a.x).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Signed difference `to - from` between two bearings, normalized to
/// [-180, 180]. Positive means a turn to the right.
pub fn bearing_diff_deg(from: f64, to: f64) -> f64 {
    let mut diff = to - from;
    while diff > 180.0 {
        diff -= 360.0;
    }
    while diff < -180.0 {
        diff += 360.0;
    }
    diff
}

/// Result of projecting a point onto a single polyline segment.
#[derive(Clone, Copy, Debug)]
pub struct SegmentProjection {
    /// Closest point on the segment, in degrees.
    pub point: Coord<f64>,
    /// Distance from the query point to `point` in meters.
    pub distance_m: f64,
    /// Clamped projection parameter in [0, 1] (0 = segment start).
    pub t: f64,
}

/// Project `point` perpendicularly onto the segment `start`→`end`, clamping
/// the projection parameter to [0, 1].
///
/// Uses a local cartesian approximation around the query point (valid at
/// segment scale); degenerate zero-length segments project onto `start`.
pub fn project_onto_segment(
    point: Coord<f64>,
    start: Coord<f64>,
    end: Coord<f64>,
) -> SegmentProjection {
    let lat_to_m = METERS_PER_DEG_LAT;
    let lon_to_m = METERS_PER_DEG_LAT * point.y.to_radians().cos();

    // Query point and segment end relative to segment start, in meters
    let x0 = (point.x - start.x) * lon_to_m;
    let y0 = (point.y - start.y) * lat_to_m;
    let x1 = (end.x - start.x) * lon_to_m;
    let y1 = (end.y - start.y) * lat_to_m;

    let length_sq = x1 * x1 + y1 * y1;
    if length_sq < 1e-9 {
        // Degenerate segment (start == end)
        return SegmentProjection {
            point: start,
            distance_m: (x0 * x0 + y0 * y0).sqrt(),
            t: 0.0,
        };
    }

    // t = (p - start) · (end - start) / |end - start|², clamped to the segment
    let t = ((x0 * x1 + y0 * y1) / length_sq).clamp(0.0, 1.0);

    let cx = x1 * t;
    let cy = y1 * t;
    let dx = x0 - cx;
    let dy = y0 - cy;

    SegmentProjection {
        point: Coord {
            x: start.x + cx / lon_to_m,
            y: start.y + cy / lat_to_m,
        },
        distance_m: (dx * dx + dy * dy).sqrt(),
        t,
    }
}
