use crate::announcer::{AnnouncementTier, TurnAnnouncer, TurnInstruction};
use crate::config::NavConfig;
use crate::filters::LocationFilter;
use crate::geodesy::haversine_m;
use crate::map_match::RoadMatcher;
use crate::progress::RouteProgressTracker;
use crate::reroute::{RerouteArbiter, RerouteOutcome};
use crate::routing::{Route, RoutingBackend, RoutingError};
use crate::status::{self, NavStatus};
use crate::types::{FilteredLocation, RawFix};
use geo::Coord;
use std::sync::Arc;
use thiserror::Error;

/// Session state machine. Transitions are the only mutation path; exactly
/// one instance is live per session.
#[derive(Debug)]
pub enum NavigationState {
    Idle,
    Routing,
    Navigating(Route),
    /// A replanning request is in flight; guidance continues on the held
    /// (stale) route until it resolves.
    Rerouting(Route),
    Arrived,
}

impl NavigationState {
    pub fn name(&self) -> &'static str {
        match self {
            NavigationState::Idle => "idle",
            NavigationState::Routing => "routing",
            NavigationState::Navigating(_) => "navigating",
            NavigationState::Rerouting(_) => "rerouting",
            NavigationState::Arrived => "arrived",
        }
    }

    pub fn active_route(&self) -> Option<&Route> {
        match self {
            NavigationState::Navigating(route) | NavigationState::Rerouting(route) => Some(route),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation already active")]
    AlreadyActive,

    #[error("no active navigation")]
    NotNavigating,

    #[error("route request failed: {0}")]
    RouteRequest(#[from] RoutingError),
}

/// One turn-by-turn navigation session.
///
/// Owns every stateful component (filter, matcher, arbiter, announcer) —
/// nothing is shared process-wide. Fixes are processed strictly one at a
/// time by the single owner; the only work running off this path is the
/// reroute request task, which reports back through the arbiter's channel.
pub struct NavigationSession<B: RoutingBackend> {
    backend: Arc<B>,
    config: NavConfig,
    filter: LocationFilter,
    matcher: RoadMatcher<B>,
    arbiter: RerouteArbiter<B>,
    announcer: TurnAnnouncer,
    state: NavigationState,
    destination: Option<Coord<f64>>,
    leg_index: usize,
    step_index: usize,
    traffic_speed_mps: Option<f64>,
    last_filtered: Option<FilteredLocation>,
    last_instruction: Option<TurnInstruction>,
    last_announcement: Option<AnnouncementTier>,
    remaining_m: f64,
    eta_s: f64,
    fixes_processed: u64,
    reroutes: u64,
}

impl<B: RoutingBackend> NavigationSession<B> {
    pub fn new(backend: Arc<B>, config: NavConfig) -> Self {
        NavigationSession {
            filter: LocationFilter::new(config.filter.clone()),
            matcher: RoadMatcher::new(Arc::clone(&backend), config.matcher.clone()),
            arbiter: RerouteArbiter::new(Arc::clone(&backend), config.reroute.clone()),
            announcer: TurnAnnouncer::new(config.announce.clone()),
            backend,
            config,
            state: NavigationState::Idle,
            destination: None,
            leg_index: 0,
            step_index: 0,
            traffic_speed_mps: None,
            last_filtered: None,
            last_instruction: None,
            last_announcement: None,
            remaining_m: 0.0,
            eta_s: 0.0,
            fixes_processed: 0,
            reroutes: 0,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn is_off_route(&self) -> bool {
        self.arbiter.is_off_route()
    }

    /// Traffic-aware average speed for ETA blending, when the host has one.
    pub fn set_traffic_speed(&mut self, speed_mps: Option<f64>) {
        self.traffic_speed_mps = speed_mps.filter(|s| s.is_finite() && *s > 0.0);
    }

    /// Request the initial route and enter guidance.
    ///
    /// Idle → Routing → Navigating on success; back to Idle on failure with
    /// the error surfaced to the caller.
    pub async fn start(
        &mut self,
        origin: Coord<f64>,
        destination: Coord<f64>,
    ) -> Result<(), SessionError> {
        if !matches!(self.state, NavigationState::Idle) {
            return Err(SessionError::AlreadyActive);
        }

        self.state = NavigationState::Routing;
        log::info!(
            "routing from {:.5},{:.5} to {:.5},{:.5}",
            origin.y, origin.x, destination.y, destination.x
        );

        match self.backend.compute_route(origin, destination).await {
            Ok(route) => {
                self.destination = Some(route.destination().unwrap_or(destination));
                self.install_route(route);
                Ok(())
            }
            Err(e) => {
                log::warn!("initial route request failed: {e}");
                self.state = NavigationState::Idle;
                Err(SessionError::RouteRequest(e))
            }
        }
    }

    /// Begin guidance on a route the host already computed (e.g. the one
    /// picked from a set of alternatives). Idle → Navigating directly.
    pub fn start_with_route(&mut self, route: Route) -> Result<(), SessionError> {
        if !matches!(self.state, NavigationState::Idle) {
            return Err(SessionError::AlreadyActive);
        }
        let Some(destination) = route.destination() else {
            return Err(SessionError::RouteRequest(RoutingError::InvalidGeometry(
                "route has no geometry".to_string(),
            )));
        };
        self.destination = Some(destination);
        self.install_route(route);
        Ok(())
    }

    /// Process one fix through the full pipeline and publish a snapshot:
    /// filter → (optional) road snap → arrival → reroute arbitration →
    /// progress → instruction/announcement.
    pub async fn process_fix(&mut self, fix: &RawFix) -> NavStatus {
        self.fixes_processed += 1;
        self.last_announcement = None;

        let Some(filtered) =
            self.filter
                .process(fix.latitude, fix.longitude, fix.accuracy_m, fix.speed_mps)
        else {
            return self.snapshot();
        };
        self.last_filtered = Some(filtered.clone());

        if self.state.active_route().is_none() {
            // Idle/Routing/Arrived: keep smoothing, nothing to navigate
            return self.snapshot();
        }
        let Some(destination) = self.destination else {
            return self.snapshot();
        };

        let mut location = filtered.coord();
        if self.config.matcher.snap_in_session {
            let snap = self.matcher.snap(location).await;
            if snap.snapped {
                location = snap.point;
            }
        }

        // Arrival is terminal and must fire exactly once; entering it drops
        // any in-flight replanning on the floor.
        if self.arbiter.is_arrived(location, destination) {
            log::info!("arrived at destination");
            self.arbiter.cancel();
            self.state = NavigationState::Arrived;
            self.last_instruction = None;
            self.remaining_m = 0.0;
            self.eta_s = 0.0;
            return self.snapshot();
        }

        let outcome = {
            let route = self.state.active_route().expect("active route checked above");
            self.arbiter
                .check(location, route, destination, fix.speed_mps)
        };

        match outcome {
            RerouteOutcome::Success(new_route) => {
                self.reroutes += 1;
                self.install_route(new_route);
            }
            RerouteOutcome::Failed(reason) => {
                log::warn!("continuing on stale route after reroute failure: {reason}");
                self.demote_to_navigating();
            }
            RerouteOutcome::InProgress => self.promote_to_rerouting(),
            RerouteOutcome::NotNeeded => {
                // A request issued earlier may still be pending even though
                // we are back within tolerance; stay in Rerouting until it
                // resolves so its completion is handled.
                if !self.arbiter.has_request_in_flight() {
                    self.demote_to_navigating();
                }
            }
        }

        {
            let route = self.state.active_route().expect("still navigating");

            let remaining = match RouteProgressTracker::closest_point_on_route(
                location,
                &route.geometry,
            ) {
                Some(p) => RouteProgressTracker::remaining_distance(
                    location,
                    &route.geometry,
                    p.segment_index + 1,
                ),
                None => 0.0,
            };
            self.remaining_m = remaining;
            self.eta_s = RouteProgressTracker::estimate_eta_s(
                remaining,
                fix.speed_mps,
                route,
                self.traffic_speed_mps,
            );

            advance_cursor(
                &self.announcer,
                route,
                location,
                self.config.announce.step_pass_radius_m,
                &mut self.leg_index,
                &mut self.step_index,
            );

            self.last_instruction = route
                .legs
                .get(self.leg_index)
                .and_then(|leg| self.announcer.current_instruction(location, leg, self.step_index));

            if let Some(instruction) = &self.last_instruction {
                let key = global_step_key(route, self.leg_index, self.step_index);
                self.last_announcement = self
                    .announcer
                    .should_announce(key, instruction.distance_to_maneuver_m);
                if let Some(tier) = self.last_announcement {
                    log::info!(
                        "announce {:?}: {} in {}",
                        tier,
                        instruction.direction.as_text(),
                        status::format_distance(instruction.distance_to_maneuver_m)
                    );
                }
            }
        }

        self.snapshot()
    }

    /// Issue a manual reroute from the last known location.
    pub fn force_reroute(&mut self) -> Result<(), SessionError> {
        if self.state.active_route().is_none() {
            return Err(SessionError::NotNavigating);
        }
        let (Some(location), Some(destination)) = (
            self.last_filtered.as_ref().map(|f| f.coord()),
            self.destination,
        ) else {
            return Err(SessionError::NotNavigating);
        };

        self.arbiter.force_reroute(location, destination);
        self.promote_to_rerouting();
        Ok(())
    }

    /// Stop from any state: cancel in-flight replanning, reset the filter
    /// and return to Idle. Nothing delivered after this point can mutate
    /// the session.
    pub fn stop(&mut self) {
        log::info!(
            "stopping navigation ({} fixes processed, {} reroutes)",
            self.fixes_processed,
            self.reroutes
        );
        self.arbiter.cancel();
        self.filter.reset();
        self.announcer.reset();
        self.state = NavigationState::Idle;
        self.destination = None;
        self.leg_index = 0;
        self.step_index = 0;
        self.last_filtered = None;
        self.last_instruction = None;
        self.last_announcement = None;
        self.remaining_m = 0.0;
        self.eta_s = 0.0;
    }

    /// Current read-only snapshot for the UI / telemetry consumers.
    pub fn snapshot(&self) -> NavStatus {
        NavStatus {
            timestamp: status::current_timestamp(),
            state: self.state.name().to_string(),
            location: self.last_filtered.clone(),
            off_route: self.arbiter.is_off_route(),
            instruction: self.last_instruction.clone(),
            announcement: self.last_announcement,
            remaining_distance_m: self.remaining_m,
            remaining_distance_text: status::format_distance(self.remaining_m),
            eta_s: self.eta_s,
            eta_text: status::format_duration(self.eta_s),
            fixes_processed: self.fixes_processed,
            reroutes: self.reroutes,
        }
    }

    fn install_route(&mut self, route: Route) {
        log::info!(
            "route installed: {:.0}m, {:.0}s, {} legs",
            route.total_distance_m,
            route.total_duration_s,
            route.legs.len()
        );
        self.leg_index = 0;
        self.step_index = 0;
        self.announcer.reset();
        self.state = NavigationState::Navigating(route);
    }

    fn promote_to_rerouting(&mut self) {
        let state = std::mem::replace(&mut self.state, NavigationState::Idle);
        self.state = match state {
            NavigationState::Navigating(route) => NavigationState::Rerouting(route),
            other => other,
        };
    }

    fn demote_to_navigating(&mut self) {
        let state = std::mem::replace(&mut self.state, NavigationState::Idle);
        self.state = match state {
            NavigationState::Rerouting(route) => NavigationState::Navigating(route),
            other => other,
        };
    }
}

/// Move the (leg, step) cursor forward past completed maneuvers. A leg is
/// left behind once its final maneuver is within pass radius; the cursor
/// never moves backwards.
fn advance_cursor(
    announcer: &TurnAnnouncer,
    route: &Route,
    location: Coord<f64>,
    pass_radius_m: f64,
    leg_index: &mut usize,
    step_index: &mut usize,
) {
    loop {
        let Some(leg) = route.legs.get(*leg_index) else {
            return;
        };
        *step_index = announcer.advance_step_index(location, leg, *step_index);

        let at_last_step = *step_index + 1 >= leg.steps.len();
        let more_legs = *leg_index + 1 < route.legs.len();
        if at_last_step && more_legs {
            if let Some(last_step) = leg.steps.last() {
                if haversine_m(location, last_step.maneuver.location) <= pass_radius_m {
                    log::debug!("leg {} complete, advancing", *leg_index);
                    *leg_index += 1;
                    *step_index = 0;
                    continue;
                }
            }
        }
        return;
    }
}

/// Stable per-maneuver key across legs for announcement tracking.
fn global_step_key(route: &Route, leg_index: usize, step_index: usize) -> usize {
    route
        .legs
        .iter()
        .take(leg_index)
        .map(|leg| leg.steps.len())
        .sum::<usize>()
        + step_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Maneuver, NearestRoad, RouteLeg, RouteStep};
    use geo::LineString;
    use std::future::Future;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    fn c(lon: f64, lat: f64) -> Coord<f64> {
        Coord { x: lon, y: lat }
    }

    fn step(name: &str, kind: &str, modifier: Option<&str>, location: Coord<f64>) -> RouteStep {
        RouteStep {
            name: name.to_string(),
            distance_m: 1100.0,
            duration_s: 110.0,
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

    /// Route straight north along lon 0 from 0.0 to 0.02 deg (~2.2 km).
    fn north_route() -> Route {
        Route {
            geometry: LineString::new(vec![c(0.0, 0.0), c(0.0, 0.01), c(0.0, 0.02)]),
            total_distance_m: 2224.0,
            total_duration_s: 240.0,
            legs: vec![RouteLeg {
                distance_m: 2224.0,
                duration_s: 240.0,
                steps: vec![
                    step("First Avenue", "depart", None, c(0.0, 0.0)),
                    step("Main Street", "turn", Some("right"), c(0.0, 0.01)),
                    step("", "arrive", None, c(0.0, 0.02)),
                ],
            }],
        }
    }

    /// Detour variant with a distinct geometry so tests can tell them apart.
    fn detour_route() -> Route {
        let mut route = north_route();
        route.geometry =
            LineString::new(vec![c(0.001, 0.0), c(0.001, 0.01), c(0.0, 0.02)]);
        route.total_distance_m = 2500.0;
        route
    }

    fn fix(lat: f64, lon: f64, speed: f64) -> RawFix {
        RawFix {
            timestamp: 0.0,
            latitude: lat,
            longitude: lon,
            accuracy_m: 5.0,
            speed_mps: speed,
            bearing_deg: 0.0,
        }
    }

    struct ScriptedBackend {
        routes: Mutex<Vec<oneshot::Receiver<Result<Route, RoutingError>>>>,
    }

    impl ScriptedBackend {
        /// Backend with `n` pre-wired route replies; senders are returned in
        /// the order `compute_route` will consume them.
        fn with_slots(n: usize) -> (Arc<Self>, Vec<oneshot::Sender<Result<Route, RoutingError>>>) {
            let mut senders = Vec::new();
            let mut receivers = Vec::new();
            for _ in 0..n {
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                receivers.push(rx);
            }
            receivers.reverse();
            (
                Arc::new(ScriptedBackend {
                    routes: Mutex::new(receivers),
                }),
                senders,
            )
        }
    }

    impl RoutingBackend for ScriptedBackend {
        fn nearest_road(
            &self,
            point: Coord<f64>,
        ) -> impl Future<Output = Result<NearestRoad, RoutingError>> + Send {
            async move {
                Ok(NearestRoad {
                    point,
                    name: Some("Somewhere Road".to_string()),
                    distance_m: 2.0,
                })
            }
        }

        fn compute_route(
            &self,
            _origin: Coord<f64>,
            _destination: Coord<f64>,
        ) -> impl Future<Output = Result<Route, RoutingError>> + Send {
            let rx = self.routes.lock().unwrap().pop();
            async move {
                match rx {
                    Some(rx) => rx.await.unwrap_or(Err(RoutingError::NoRoute)),
                    None => Err(RoutingError::NoRoute),
                }
            }
        }

        fn match_trace(
            &self,
            _points: &[Coord<f64>],
        ) -> impl Future<Output = Result<Vec<Option<Coord<f64>>>, RoutingError>> + Send {
            async move { Ok(Vec::new()) }
        }
    }

    async fn drain_tasks() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Session config with a near-unity filter gain: these tests assert on
    /// geometry, not on smoothing lag (the filter has its own tests).
    fn test_config() -> NavConfig {
        let mut config = NavConfig::default();
        config.filter.base_process_noise = 1e6;
        config
    }

    async fn started_session(
        slots: usize,
    ) -> (
        NavigationSession<ScriptedBackend>,
        Vec<oneshot::Sender<Result<Route, RoutingError>>>,
    ) {
        let (backend, mut senders) = ScriptedBackend::with_slots(slots);
        let mut session = NavigationSession::new(backend, test_config());
        senders.remove(0).send(Ok(north_route())).unwrap();
        session.start(c(0.0, 0.0), c(0.0, 0.02)).await.unwrap();
        (session, senders)
    }

    #[tokio::test]
    async fn test_start_success_enters_navigating() {
        let (session, _senders) = started_session(1).await;
        assert!(matches!(session.state(), NavigationState::Navigating(_)));
        assert_eq!(session.snapshot().state, "navigating");
    }

    #[tokio::test]
    async fn test_start_failure_returns_to_idle() {
        let (backend, mut senders) = ScriptedBackend::with_slots(1);
        let mut session = NavigationSession::new(backend, test_config());
        senders.remove(0).send(Err(RoutingError::NoRoute)).unwrap();

        let result = session.start(c(0.0, 0.0), c(0.0, 0.02)).await;
        assert!(matches!(result, Err(SessionError::RouteRequest(_))));
        assert!(matches!(session.state(), NavigationState::Idle));
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let (mut session, _senders) = started_session(1).await;
        let result = session.start(c(0.0, 0.0), c(0.0, 0.02)).await;
        assert!(matches!(result, Err(SessionError::AlreadyActive)));
    }

    #[tokio::test]
    async fn test_fix_produces_instruction_and_progress() {
        let (mut session, _senders) = started_session(1).await;

        let status = session.process_fix(&fix(0.005, 0.0, 10.0)).await;
        assert_eq!(status.state, "navigating");
        assert!(!status.off_route);

        let instruction = status.instruction.unwrap();
        assert_eq!(instruction.direction.as_text(), "turn right");
        assert_eq!(instruction.street_name, "Main Street");

        // Halfway up the first 2.2km: about 1.7km remaining
        assert!(status.remaining_distance_m > 1500.0 && status.remaining_distance_m < 1800.0);
        assert!(status.eta_s > 0.0);
    }

    #[tokio::test]
    async fn test_remaining_distance_decreases_along_route() {
        let (mut session, _senders) = started_session(1).await;

        let first = session.process_fix(&fix(0.002, 0.0, 20.0)).await;
        let second = session.process_fix(&fix(0.006, 0.0, 20.0)).await;
        assert!(second.remaining_distance_m < first.remaining_distance_m);
    }

    #[tokio::test]
    async fn test_step_index_advances_past_turn() {
        let (mut session, _senders) = started_session(1).await;

        let status = session.process_fix(&fix(0.005, 0.0, 20.0)).await;
        assert_eq!(status.instruction.unwrap().step_index, 0);

        // Just before the turn maneuver at 0.01 deg
        let status = session.process_fix(&fix(0.00999, 0.0, 20.0)).await;
        assert_eq!(status.instruction.unwrap().step_index, 1);
    }

    #[tokio::test]
    async fn test_announcement_tiers_fire_once() {
        let (mut session, _senders) = started_session(1).await;

        // ~780m before the turn: APPROACHING
        let status = session.process_fix(&fix(0.003, 0.0, 20.0)).await;
        assert_eq!(status.announcement, Some(AnnouncementTier::Approaching));

        // Within the same tier: silent
        let status = session.process_fix(&fix(0.0035, 0.0, 20.0)).await;
        assert_eq!(status.announcement, None);

        // ~220m: UPCOMING
        let status = session.process_fix(&fix(0.008, 0.0, 20.0)).await;
        assert_eq!(status.announcement, Some(AnnouncementTier::Upcoming));

        // ~90m: IMMEDIATE
        let status = session.process_fix(&fix(0.0092, 0.0, 20.0)).await;
        assert_eq!(status.announcement, Some(AnnouncementTier::Immediate));
    }

    #[tokio::test]
    async fn test_reroute_success_installs_new_route() {
        let (mut session, mut senders) = started_session(2).await;

        // ~60m east of the polyline at 10 m/s: off route, request issued
        let status = session.process_fix(&fix(0.005, 0.00054, 10.0)).await;
        assert_eq!(status.state, "rerouting");
        assert_eq!(status.reroutes, 0);

        senders.remove(0).send(Ok(detour_route())).unwrap();
        drain_tasks().await;

        let status = session.process_fix(&fix(0.005, 0.00054, 10.0)).await;
        assert_eq!(status.state, "navigating");
        assert_eq!(status.reroutes, 1);
        assert!(!status.off_route);
        // Cursor reset for the new route
        assert_eq!(status.instruction.unwrap().step_index, 0);
    }

    #[tokio::test]
    async fn test_reroute_failure_keeps_stale_route_flagged() {
        let (mut session, mut senders) = started_session(2).await;

        session.process_fix(&fix(0.005, 0.00054, 10.0)).await;
        senders.remove(0).send(Err(RoutingError::Timeout)).unwrap();
        drain_tasks().await;

        let status = session.process_fix(&fix(0.005, 0.00054, 10.0)).await;
        assert_eq!(status.state, "navigating");
        assert!(status.off_route, "failure must surface as the off-route flag");
        assert_eq!(status.reroutes, 0);
        // Guidance continues on the stale route
        assert!(status.instruction.is_some());
    }

    #[tokio::test]
    async fn test_arrival_fires_once() {
        let (mut session, _senders) = started_session(1).await;

        // ~11m from the destination
        let status = session.process_fix(&fix(0.0199, 0.0, 5.0)).await;
        assert_eq!(status.state, "arrived");
        assert_eq!(status.remaining_distance_m, 0.0);
        assert!(status.instruction.is_none());

        // Subsequent fixes do not re-trigger anything
        let status = session.process_fix(&fix(0.01995, 0.0, 1.0)).await;
        assert_eq!(status.state, "arrived");
        assert!(status.announcement.is_none());
    }

    #[tokio::test]
    async fn test_stop_cancels_inflight_reroute() {
        let (mut session, mut senders) = started_session(3).await;

        // Go off route so a request is spawned, then stop before it resolves
        session.process_fix(&fix(0.005, 0.00054, 10.0)).await;
        session.stop();
        assert!(matches!(session.state(), NavigationState::Idle));

        // The orphaned completion arrives after the stop: it must not
        // resurrect anything in the next navigation. (The send can fail if
        // the cancelled task already dropped its receiver; both are fine.)
        let _ = senders.remove(0).send(Ok(detour_route()));
        drain_tasks().await;

        senders.remove(0).send(Ok(north_route())).unwrap();
        session.start(c(0.0, 0.0), c(0.0, 0.02)).await.unwrap();

        let status = session.process_fix(&fix(0.002, 0.0, 10.0)).await;
        assert_eq!(status.state, "navigating");
        assert_eq!(status.reroutes, 0, "stale completion must not count as a reroute");
        assert!(!status.off_route);
    }

    #[tokio::test]
    async fn test_stop_resets_filter_state() {
        let (mut session, _senders) = started_session(1).await;
        session.process_fix(&fix(0.005, 0.0, 10.0)).await;
        session.stop();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, "idle");
        assert!(snapshot.location.is_none());
        assert!(snapshot.instruction.is_none());
    }

    #[tokio::test]
    async fn test_malformed_fix_keeps_finite_snapshot() {
        let (mut session, _senders) = started_session(1).await;
        session.process_fix(&fix(0.005, 0.0, 10.0)).await;

        let status = session.process_fix(&fix(f64::NAN, 0.0, 10.0)).await;
        let location = status.location.unwrap();
        assert!(location.latitude.is_finite());
        assert!(location.longitude.is_finite());
    }

    #[tokio::test]
    async fn test_force_reroute_requires_active_navigation() {
        let (backend, _senders) = ScriptedBackend::with_slots(1);
        let mut session = NavigationSession::new(backend, test_config());
        assert!(matches!(
            session.force_reroute(),
            Err(SessionError::NotNavigating)
        ));
    }

    #[tokio::test]
    async fn test_force_reroute_supersedes_pending_request() {
        let (mut session, mut senders) = started_session(3).await;

        // Automatic request from going off route (slot 1)
        session.process_fix(&fix(0.005, 0.00054, 10.0)).await;
        // Manual reroute supersedes it (slot 2)
        session.force_reroute().unwrap();

        // The superseded completion resolves first and must be discarded
        senders.remove(0).send(Ok(north_route())).unwrap();
        drain_tasks().await;
        let status = session.process_fix(&fix(0.005, 0.00054, 10.0)).await;
        assert_eq!(status.reroutes, 0);
        assert_eq!(status.state, "rerouting");

        // The live request resolves and installs
        senders.remove(0).send(Ok(detour_route())).unwrap();
        drain_tasks().await;
        let status = session.process_fix(&fix(0.005, 0.00054, 10.0)).await;
        assert_eq!(status.reroutes, 1);
        assert_eq!(status.state, "navigating");
    }

    #[tokio::test]
    async fn test_multi_leg_cursor_advances() {
        let (backend, mut senders) = ScriptedBackend::with_slots(1);
        let mut session = NavigationSession::new(backend, test_config());

        // Two legs: north to a waypoint at 0.01, then on to 0.02
        let mut route = north_route();
        let second_leg = RouteLeg {
            distance_m: 1112.0,
            duration_s: 120.0,
            steps: vec![
                step("Main Street", "depart", None, c(0.0, 0.01)),
                step("", "arrive", None, c(0.0, 0.02)),
            ],
        };
        route.legs[0] = RouteLeg {
            distance_m: 1112.0,
            duration_s: 120.0,
            steps: vec![
                step("First Avenue", "depart", None, c(0.0, 0.0)),
                step("", "arrive", None, c(0.0, 0.01)),
            ],
        };
        route.legs.push(second_leg);

        senders.remove(0).send(Ok(route)).unwrap();
        session.start(c(0.0, 0.0), c(0.0, 0.02)).await.unwrap();

        // Mid first leg
        session.process_fix(&fix(0.005, 0.0, 20.0)).await;
        assert_eq!(session.leg_index, 0);

        // At the waypoint: first leg complete, cursor moves to leg 1 step 0
        session.process_fix(&fix(0.00999, 0.0, 20.0)).await;
        assert_eq!(session.leg_index, 1);
        assert_eq!(session.step_index, 0);
    }
}
