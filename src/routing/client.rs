use super::models::{MatchResponse, NearestResponse, Route, RouteResponse};
use geo::Coord;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors from the routing backend. None of these are fatal to a session:
/// callers degrade to the best data already in hand.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no route found")]
    NoRoute,

    #[error("no road segment near the query point")]
    NoSegment,

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("malformed response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RoutingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RoutingError::Timeout
        } else {
            RoutingError::Transport(e.to_string())
        }
    }
}

/// Nearest-road query result.
#[derive(Clone, Debug)]
pub struct NearestRoad {
    /// Point on the road network, in degrees.
    pub point: Coord<f64>,
    /// Road name when the network carries one.
    pub name: Option<String>,
    /// Distance from the query point to `point` in meters.
    pub distance_m: f64,
}

/// Routing service collaborator consumed by the navigation core.
///
/// Implementations must be cheap to share behind an `Arc`: the reroute
/// arbiter clones the handle into a spawned request task.
pub trait RoutingBackend: Send + Sync + 'static {
    /// Snap a point to the nearest road edge.
    fn nearest_road(
        &self,
        point: Coord<f64>,
    ) -> impl Future<Output = Result<NearestRoad, RoutingError>> + Send;

    /// Compute a turn-by-turn route between two points.
    fn compute_route(
        &self,
        origin: Coord<f64>,
        destination: Coord<f64>,
    ) -> impl Future<Output = Result<Route, RoutingError>> + Send;

    /// Match a trajectory against the road network. The result has the same
    /// length and order as the input; unmatched points are `None`.
    fn match_trace(
        &self,
        points: &[Coord<f64>],
    ) -> impl Future<Output = Result<Vec<Option<Coord<f64>>>, RoutingError>> + Send;
}

/// HTTP client for an OSRM-protocol routing service.
///
/// # Endpoints
/// - `route/v1` with `overview=full&geometries=polyline&steps=true`
/// - `nearest/v1` with `number=1`
/// - `match/v1` with `overview=false`
///
/// # Error handling
/// - transport timeout: `Timeout` (the session treats it as a failed reroute)
/// - non-2xx status: `Http(code)`
/// - `code != "Ok"` in the body: `NoRoute` / `NoSegment`
pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
    profile: String,
}

impl OsrmClient {
    pub const PUBLIC_BASE_URL: &'static str = "https://router.project-osrm.org";

    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("nav_engine_rs/0.1.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        OsrmClient {
            client,
            base_url: base_url.into(),
            profile: "driving".to_string(),
        }
    }

    fn route_url(&self, origin: Coord<f64>, destination: Coord<f64>) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=polyline&steps=true",
            self.base_url, self.profile, origin.x, origin.y, destination.x, destination.y
        )
    }

    fn nearest_url(&self, point: Coord<f64>) -> String {
        format!(
            "{}/nearest/v1/{}/{},{}?number=1",
            self.base_url, self.profile, point.x, point.y
        )
    }

    fn match_url(&self, points: &[Coord<f64>]) -> String {
        let coords = points
            .iter()
            .map(|p| format!("{},{}", p.x, p.y))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/match/v1/{}/{}?overview=false",
            self.base_url, self.profile, coords
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, RoutingError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Http(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| RoutingError::InvalidResponse(e.to_string()))
    }

    async fn fetch_route(
        &self,
        origin: Coord<f64>,
        destination: Coord<f64>,
    ) -> Result<Route, RoutingError> {
        let url = self.route_url(origin, destination);
        log::debug!("requesting route: {url}");

        let body: RouteResponse = self.get_json(&url).await?;
        if body.code != "Ok" {
            log::warn!("route request returned code {}", body.code);
            return Err(RoutingError::NoRoute);
        }

        let wire = body.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
        wire.into_route().map_err(RoutingError::InvalidGeometry)
    }

    async fn fetch_nearest(&self, point: Coord<f64>) -> Result<NearestRoad, RoutingError> {
        let body: NearestResponse = self.get_json(&self.nearest_url(point)).await?;
        if body.code != "Ok" {
            return Err(RoutingError::NoSegment);
        }

        let wp = body.waypoints.into_iter().next().ok_or(RoutingError::NoSegment)?;
        Ok(NearestRoad {
            point: Coord {
                x: wp.location[0],
                y: wp.location[1],
            },
            name: if wp.name.is_empty() { None } else { Some(wp.name) },
            distance_m: wp.distance,
        })
    }

    async fn fetch_match(
        &self,
        points: &[Coord<f64>],
    ) -> Result<Vec<Option<Coord<f64>>>, RoutingError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let body: MatchResponse = self.get_json(&self.match_url(points)).await?;
        if body.code != "Ok" {
            return Err(RoutingError::NoSegment);
        }
        if body.tracepoints.len() != points.len() {
            return Err(RoutingError::InvalidResponse(format!(
                "tracepoint count {} != input count {}",
                body.tracepoints.len(),
                points.len()
            )));
        }

        Ok(body
            .tracepoints
            .into_iter()
            .map(|tp| {
                tp.map(|tp| Coord {
                    x: tp.location[0],
                    y: tp.location[1],
                })
            })
            .collect())
    }
}

impl Default for OsrmClient {
    fn default() -> Self {
        Self::new(Self::PUBLIC_BASE_URL)
    }
}

impl RoutingBackend for OsrmClient {
    fn nearest_road(
        &self,
        point: Coord<f64>,
    ) -> impl Future<Output = Result<NearestRoad, RoutingError>> + Send {
        self.fetch_nearest(point)
    }

    fn compute_route(
        &self,
        origin: Coord<f64>,
        destination: Coord<f64>,
    ) -> impl Future<Output = Result<Route, RoutingError>> + Send {
        self.fetch_route(origin, destination)
    }

    fn match_trace(
        &self,
        points: &[Coord<f64>],
    ) -> impl Future<Output = Result<Vec<Option<Coord<f64>>>, RoutingError>> + Send {
        self.fetch_match(points)
    }
}
