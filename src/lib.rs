pub mod announcer;
pub mod config;
pub mod filters;
pub mod geodesy;
pub mod map_match;
pub mod progress;
pub mod reroute;
pub mod routing;
pub mod session;
pub mod status;
pub mod types;

pub use announcer::{AnnouncementTier, TurnAnnouncer, TurnInstruction};
pub use config::NavConfig;
pub use filters::LocationFilter;
pub use map_match::RoadMatcher;
pub use progress::RouteProgressTracker;
pub use reroute::{RerouteArbiter, RerouteOutcome};
pub use routing::{OsrmClient, Route, RoutingBackend, RoutingError};
pub use session::{NavigationSession, NavigationState, SessionError};
pub use status::NavStatus;
pub use types::{FilteredLocation, RawFix};
