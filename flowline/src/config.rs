//! Run settings.

use std::time::Duration;

use crate::time::TimeUnit;

/// How simulation time relates to wall-clock time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacingMode {
    /// Simulation time follows wall-clock time, scaled by the speed factor.
    #[default]
    RealTime,
    /// Simulation time advances as fast as possible.
    Turbo,
}

/// Settings of a run.
///
/// The defaults suit an interactive real-time display.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Pacing mode.
    pub pacing: PacingMode,
    /// Wall-clock meaning of one unit of simulation time.
    pub time_unit: TimeUnit,
    /// Initial speed factor, clamped to `[0.1, 5.0]`.
    pub speed: f64,
    /// Simulation time at which the run ends, if any.
    pub duration: Option<f64>,
    /// Simulation time between two ticks.
    pub tick_interval: f64,
    /// Whether transits and operator walks are animated in real-time mode.
    pub animations: bool,
    /// Number of interpolation steps of an operator walk.
    pub animation_steps: usize,
    /// Whether buffer bookkeeping is checked after every mutation.
    pub debug_mode: bool,
    /// Simulation time advanced between two synchronizations in real-time
    /// mode.
    pub real_time_step: f64,
    /// Simulation time advanced between two checks for pause or stop in
    /// turbo mode.
    pub turbo_step: f64,
    /// Polling period of a paused run.
    pub pause_poll: Duration,
    /// Longest uninterruptible sleep in real-time mode.
    pub max_sleep_slice: Duration,
}

impl SimConfig {
    /// Default real-time settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether visual-only delays are simulated.
    pub(crate) fn animate(&self) -> bool {
        self.animations && self.pacing == PacingMode::RealTime
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pacing: PacingMode::RealTime,
            time_unit: TimeUnit::default(),
            speed: 1.0,
            duration: None,
            tick_interval: 0.2,
            animations: true,
            animation_steps: 7,
            debug_mode: false,
            real_time_step: 0.1,
            turbo_step: 100.0,
            pause_poll: Duration::from_millis(50),
            max_sleep_slice: Duration::from_millis(50),
        }
    }
}
