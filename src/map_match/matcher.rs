use crate::config::MatcherConfig;
use crate::routing::RoutingBackend;
use geo::Coord;
use std::sync::Arc;

/// Result of snapping one fix to the road network.
#[derive(Clone, Debug)]
pub struct SnapResult {
    /// Snapped point when `snapped`, else the original query point.
    pub point: Coord<f64>,
    /// Road name discovered by the query, kept for diagnostics even when
    /// the snap was rejected for distance.
    pub road_name: Option<String>,
    /// Distance from the query point to the nearest road, when known.
    pub distance_m: Option<f64>,
    /// 0.0-1.0; decays linearly with snap distance.
    pub confidence: f64,
    pub snapped: bool,
}

impl SnapResult {
    fn unmatched(point: Coord<f64>, confidence: f64) -> Self {
        SnapResult {
            point,
            road_name: None,
            distance_m: None,
            confidence,
            snapped: false,
        }
    }
}

/// Snaps fixes to the road network through the routing backend.
///
/// A nearest-road hit farther than `snap_threshold_m` is treated as
/// off-network: the original point is kept and only the diagnostics are
/// reported. A backend failure degrades the same way; map matching is never
/// a hard error.
pub struct RoadMatcher<B: RoutingBackend> {
    backend: Arc<B>,
    config: MatcherConfig,
}

impl<B: RoutingBackend> RoadMatcher<B> {
    pub fn new(backend: Arc<B>, config: MatcherConfig) -> Self {
        RoadMatcher { backend, config }
    }

    /// Snap a single point to the nearest road.
    pub async fn snap(&self, point: Coord<f64>) -> SnapResult {
        let nearest = match self.backend.nearest_road(point).await {
            Ok(n) => n,
            Err(e) => {
                log::warn!("nearest-road query failed: {e}");
                return SnapResult::unmatched(point, 0.0);
            }
        };

        let threshold = self.config.snap_threshold_m;
        if nearest.distance_m > threshold {
            // Too far from any road to trust the snap; keep the raw point
            // but surface what was found.
            log::debug!(
                "snap rejected: nearest road {} at {:.0}m",
                nearest.name.as_deref().unwrap_or("(unnamed)"),
                nearest.distance_m
            );
            return SnapResult {
                point,
                road_name: nearest.name,
                distance_m: Some(nearest.distance_m),
                confidence: 0.3,
                snapped: false,
            };
        }

        let confidence = (1.0 - nearest.distance_m / threshold).clamp(0.0, 1.0);
        SnapResult {
            point: nearest.point,
            road_name: nearest.name,
            distance_m: Some(nearest.distance_m),
            confidence,
            snapped: true,
        }
    }

    /// Match a whole trajectory. Unmatched points keep their original
    /// coordinates, so the output always has the input's length and order.
    pub async fn match_path(&self, points: &[Coord<f64>]) -> Vec<Coord<f64>> {
        match self.backend.match_trace(points).await {
            Ok(matched) => points
                .iter()
                .zip(matched)
                .map(|(original, snapped)| snapped.unwrap_or(*original))
                .collect(),
            Err(e) => {
                log::warn!("trajectory match failed, keeping raw path: {e}");
                points.to_vec()
            }
        }
    }
}
