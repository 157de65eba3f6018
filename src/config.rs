use serde::{Deserialize, Serialize};

/// Tuning parameters for one navigation session.
///
/// Every field has a default; a session can run from `NavConfig::default()`
/// or from a JSON override supplied by the host application.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NavConfig {
    pub filter: FilterConfig,
    pub matcher: MatcherConfig,
    pub reroute: RerouteConfig,
    pub announce: AnnounceConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Base process noise; scaled up with speed before each update.
    pub base_process_noise: f64,
    /// Fixes worse than this accuracy are not trusted at all.
    pub max_accuracy_m: f64,
    /// Jump distance treated as an outlier when below `outlier_speed_mps`.
    pub outlier_jump_m: f64,
    pub outlier_speed_mps: f64,
    /// Movement below this distance and speed is treated as stationary noise.
    pub stationary_distance_m: f64,
    pub stationary_speed_mps: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            base_process_noise: 3.0,
            max_accuracy_m: 50.0,
            outlier_jump_m: 50.0,
            outlier_speed_mps: 15.0,
            stationary_distance_m: 3.0,
            stationary_speed_mps: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Beyond this distance to the nearest road the fix is left unsnapped.
    pub snap_threshold_m: f64,
    /// Snap each filtered fix inside the session update path. Off by default
    /// so the only network await on the fix path is the reroute task.
    pub snap_in_session: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            snap_threshold_m: 50.0,
            snap_in_session: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RerouteConfig {
    /// Off-route tolerance at standstill.
    pub base_threshold_m: f64,
    /// Tolerance gained per m/s of speed.
    pub threshold_per_mps: f64,
    /// Tolerance ceiling regardless of speed.
    pub max_threshold_m: f64,
    /// Distance to destination that counts as arrived.
    pub arrival_radius_m: f64,
}

impl Default for RerouteConfig {
    fn default() -> Self {
        RerouteConfig {
            base_threshold_m: 25.0,
            threshold_per_mps: 2.0,
            max_threshold_m: 100.0,
            arrival_radius_m: 30.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    /// Tier boundaries, nearest first.
    pub immediate_m: f64,
    pub upcoming_m: f64,
    pub approaching_m: f64,
    /// Below this distance the IMMEDIATE announcement is latched.
    pub latch_m: f64,
    /// A maneuver closer than this is considered passed when advancing steps.
    pub step_pass_radius_m: f64,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        AnnounceConfig {
            immediate_m: 100.0,
            upcoming_m: 300.0,
            approaching_m: 800.0,
            latch_m: 50.0,
            step_pass_radius_m: 30.0,
        }
    }
}
