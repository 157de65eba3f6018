use crate::config::FilterConfig;
use crate::geodesy::haversine_m;
use crate::types::FilteredLocation;
use geo::Coord;

/// Scalar Kalman state for one coordinate axis.
#[derive(Clone, Copy, Debug, Default)]
struct KalmanAxis {
    estimate: f64,
    error_covariance: f64,
    initialized: bool,
}

impl KalmanAxis {
    /// One predict/correct cycle. First measurement initializes the estimate
    /// directly with the measurement noise as covariance.
    fn update(&mut self, measurement: f64, measurement_noise: f64, process_noise: f64) -> f64 {
        if !self.initialized {
            self.estimate = measurement;
            self.error_covariance = measurement_noise;
            self.initialized = true;
            return self.estimate;
        }

        let predicted_error = self.error_covariance + process_noise;
        let gain = predicted_error / (predicted_error + measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.error_covariance = (1.0 - gain) * predicted_error;
        self.estimate
    }

    fn reset(&mut self) {
        *self = KalmanAxis::default();
    }
}

/// GPS fix smoother: independent per-axis Kalman filtering behind an
/// accuracy gate, outlier jump rejection and stationary suppression.
///
/// # Rejection policy (in order)
/// 1. Accuracy worse than `max_accuracy_m`: the fix is ignored and the last
///    known location returned with degraded confidence.
/// 2. Jump beyond `outlier_jump_m` at low speed: GPS multipath spike, the
///    last known location is returned and the filter state left untouched.
/// 3. Movement under `stationary_distance_m` at near-zero speed: jitter
///    around a standstill, the last location is returned unchanged.
///
/// Anything else runs the Kalman update, with measurement noise derived from
/// the reported accuracy and process noise scaled up with speed.
pub struct LocationFilter {
    lat_axis: KalmanAxis,
    lon_axis: KalmanAxis,
    last_location: Option<FilteredLocation>,
    config: FilterConfig,
    rejected_count: u64,
    processed_count: u64,
}

impl LocationFilter {
    pub fn new(config: FilterConfig) -> Self {
        LocationFilter {
            lat_axis: KalmanAxis::default(),
            lon_axis: KalmanAxis::default(),
            last_location: None,
            config,
            rejected_count: 0,
            processed_count: 0,
        }
    }

    /// Smooth one fix. Returns `None` only before the first usable fix.
    ///
    /// The returned location never contains non-finite coordinates: malformed
    /// input is rejected before it can touch the axis state.
    pub fn process(
        &mut self,
        latitude: f64,
        longitude: f64,
        accuracy_m: f64,
        speed_mps: f64,
    ) -> Option<FilteredLocation> {
        if !(latitude.is_finite()
            && longitude.is_finite()
            && accuracy_m.is_finite()
            && speed_mps.is_finite())
        {
            log::warn!("rejecting malformed fix (non-finite field)");
            self.rejected_count += 1;
            return self.last_location.clone();
        }

        // Gate 1: accuracy too poor to use at all
        if accuracy_m > self.config.max_accuracy_m {
            log::debug!("fix rejected: accuracy {accuracy_m:.0}m");
            self.rejected_count += 1;
            return self.last_location.as_ref().map(|l| l.with_confidence(0.3));
        }

        if let Some(last) = &self.last_location {
            let d = haversine_m(
                Coord { x: longitude, y: latitude },
                last.coord(),
            );

            // Gate 2: large jump at a speed that cannot explain it
            if d > self.config.outlier_jump_m && speed_mps < self.config.outlier_speed_mps {
                log::debug!("fix rejected: {d:.0}m jump at {speed_mps:.1} m/s");
                self.rejected_count += 1;
                return Some(last.with_confidence(0.2));
            }

            // Gate 3: stationary jitter
            if d < self.config.stationary_distance_m
                && speed_mps < self.config.stationary_speed_mps
            {
                return Some(last.with_confidence(0.9));
            }
        }

        let measurement_noise = (accuracy_m * accuracy_m).max(1.0);
        let process_noise = self.config.base_process_noise * (1.0 + 0.1 * speed_mps);

        let was_initialized = self.lat_axis.initialized;
        let lat = self.lat_axis.update(latitude, measurement_noise, process_noise);
        let lon = self.lon_axis.update(longitude, measurement_noise, process_noise);

        let avg_error = (self.lat_axis.error_covariance + self.lon_axis.error_covariance) / 2.0;
        let confidence = (1.0 / (1.0 + avg_error / (accuracy_m + 1.0))).clamp(0.0, 1.0);

        let location = FilteredLocation {
            latitude: lat,
            longitude: lon,
            is_smoothed: was_initialized,
            confidence,
        };

        self.processed_count += 1;
        self.last_location = Some(location.clone());
        Some(location)
    }

    /// Last filtered location, if any fix has been accepted yet.
    pub fn last_location(&self) -> Option<&FilteredLocation> {
        self.last_location.as_ref()
    }

    /// Clear all state. Called when the upstream provider session restarts.
    pub fn reset(&mut self) {
        self.lat_axis.reset();
        self.lon_axis.reset();
        self.last_location = None;
        log::debug!(
            "filter reset after {} processed / {} rejected fixes",
            self.processed_count,
            self.rejected_count
        );
        self.processed_count = 0;
        self.rejected_count = 0;
    }
}
