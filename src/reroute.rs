use crate::config::RerouteConfig;
use crate::geodesy::haversine_m;
use crate::progress::RouteProgressTracker;
use crate::routing::{Route, RoutingBackend, RoutingError};
use geo::Coord;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outcome of one off-route check.
#[derive(Debug)]
pub enum RerouteOutcome {
    /// Within tolerance of the active route.
    NotNeeded,
    /// A replanning request is outstanding; no duplicate was issued.
    InProgress,
    /// Replanning finished; the new route should replace the active one.
    Success(Route),
    /// Replanning failed; keep navigating the stale route, flagged off-route.
    Failed(String),
}

struct PendingRequest {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Off-route detection and debounced asynchronous replanning.
///
/// At most one reroute request is in flight. Every request carries a
/// monotonically increasing generation id; completions are delivered over a
/// channel polled on the next check, and any completion whose generation is
/// not the latest issued one is discarded. Cancelling bumps the generation,
/// so a completion that raced the cancellation can never resurface.
pub struct RerouteArbiter<B: RoutingBackend> {
    backend: Arc<B>,
    config: RerouteConfig,
    generation: u64,
    pending: Option<PendingRequest>,
    completions_tx: mpsc::UnboundedSender<(u64, Result<Route, RoutingError>)>,
    completions_rx: mpsc::UnboundedReceiver<(u64, Result<Route, RoutingError>)>,
    off_route: bool,
}

impl<B: RoutingBackend> RerouteArbiter<B> {
    pub fn new(backend: Arc<B>, config: RerouteConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        RerouteArbiter {
            backend,
            config,
            generation: 0,
            pending: None,
            completions_tx,
            completions_rx,
            off_route: false,
        }
    }

    /// True when `location` is within the arrival radius of `destination`.
    pub fn is_arrived(&self, location: Coord<f64>, destination: Coord<f64>) -> bool {
        haversine_m(location, destination) <= self.config.arrival_radius_m
    }

    /// Off-route tolerance in meters: grows with speed, capped.
    pub fn adaptive_threshold(&self, speed_mps: f64) -> f64 {
        (self.config.base_threshold_m + self.config.threshold_per_mps * speed_mps.max(0.0))
            .min(self.config.max_threshold_m)
    }

    pub fn is_off_route(&self) -> bool {
        self.off_route
    }

    pub fn has_request_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// One arbitration step for the current fix.
    ///
    /// Resolves any completed request first, then applies the off-route
    /// policy: within tolerance clears the flag; beyond tolerance either
    /// reports the outstanding request or issues a new one.
    pub fn check(
        &mut self,
        location: Coord<f64>,
        route: &Route,
        destination: Coord<f64>,
        speed_mps: f64,
    ) -> RerouteOutcome {
        if let Some(outcome) = self.poll_completions() {
            return outcome;
        }

        let distance_m = RouteProgressTracker::closest_point_on_route(location, &route.geometry)
            .map(|p| p.distance_m)
            .unwrap_or(f64::INFINITY);

        if distance_m <= self.adaptive_threshold(speed_mps) {
            self.off_route = false;
            return RerouteOutcome::NotNeeded;
        }

        if self.pending.is_some() {
            return RerouteOutcome::InProgress;
        }

        log::info!(
            "off route by {distance_m:.0}m (threshold {:.0}m), requesting reroute",
            self.adaptive_threshold(speed_mps)
        );
        self.spawn_request(location, destination);
        RerouteOutcome::InProgress
    }

    /// Issue a request immediately, superseding any outstanding one. Used for
    /// manual reroutes; the superseded request's completion becomes stale.
    pub fn force_reroute(&mut self, location: Coord<f64>, destination: Coord<f64>) {
        log::info!("manual reroute requested");
        self.spawn_request(location, destination);
    }

    /// Abort any in-flight request and invalidate its completion.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::debug!("cancelling reroute request (generation {})", pending.generation);
            pending.handle.abort();
        }
        // Anything already queued is now stale
        self.generation += 1;
        self.off_route = false;
    }

    fn spawn_request(&mut self, location: Coord<f64>, destination: Coord<f64>) {
        self.generation += 1;
        let generation = self.generation;
        let backend = Arc::clone(&self.backend);
        let tx = self.completions_tx.clone();

        let handle = tokio::spawn(async move {
            let result = backend.compute_route(location, destination).await;
            // Receiver gone means the session stopped; nothing to deliver
            let _ = tx.send((generation, result));
        });

        self.pending = Some(PendingRequest { generation, handle });
    }

    /// Drain completed requests. The newest-generation completion resolves
    /// the pending request; anything older is discarded without effect.
    fn poll_completions(&mut self) -> Option<RerouteOutcome> {
        while let Ok((generation, result)) = self.completions_rx.try_recv() {
            if generation != self.generation {
                log::debug!(
                    "discarding stale reroute response (generation {generation}, latest {})",
                    self.generation
                );
                continue;
            }

            self.pending = None;
            match result {
                Ok(route) => {
                    log::info!(
                        "reroute succeeded: {:.0}m, {:.0}s",
                        route.total_distance_m,
                        route.total_duration_s
                    );
                    self.off_route = false;
                    return Some(RerouteOutcome::Success(route));
                }
                Err(e) => {
                    log::warn!("reroute failed: {e}");
                    self.off_route = true;
                    return Some(RerouteOutcome::Failed(e.to_string()));
                }
            }
        }
        None
    }
}
