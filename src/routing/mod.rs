pub mod client;
pub mod models;
pub mod polyline;

pub use client::{NearestRoad, OsrmClient, RoutingBackend, RoutingError};
pub use models::{route_from_json, Maneuver, Route, RouteLeg, RouteStep, TurnDirection};
