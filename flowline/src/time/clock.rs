use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::atomic::AtomicCell;

use crate::time::TimeUnit;

/// Lowest accepted speed factor.
pub const MIN_SPEED: f64 = 0.1;
/// Highest accepted speed factor.
pub const MAX_SPEED: f64 = 5.0;

/// A type that can be used to pace a simulation.
///
/// This trait abstracts over different types of clocks, such as
/// as-fast-as-possible and real-time clocks.
pub trait Clock: Send {
    /// Blocks until the wall clock catches up with the specified simulation
    /// time.
    fn synchronize(&mut self, deadline: f64) -> SyncStatus;
}

/// The outcome of a synchronization request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// The clock is synchronized.
    Synchronized,
    /// The wait was cut short by a stop request.
    Interrupted,
}

/// A dummy [`Clock`] that ignores synchronization.
///
/// Choosing this clock effectively makes the simulation run as fast as
/// possible (turbo mode).
#[derive(Copy, Clone, Debug, Default)]
pub struct NoClock {}

impl NoClock {
    /// Constructs a new `NoClock` object.
    pub fn new() -> Self {
        Self {}
    }
}

impl Clock for NoClock {
    /// Returns immediately with status `SyncStatus::Synchronized`.
    fn synchronize(&mut self, _: f64) -> SyncStatus {
        SyncStatus::Synchronized
    }
}

/// Playback flags shared between a controller and its pacing clock.
#[derive(Debug)]
pub(crate) struct Playback {
    paused: AtomicBool,
    stopped: AtomicBool,
    speed: AtomicCell<f64>,
}

impl Playback {
    pub(crate) fn new(speed: f64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            speed: AtomicCell::new(clamp_speed(speed)),
        }
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn set_stopped(&self, stopped: bool) {
        self.stopped.store(stopped, Ordering::Release);
    }

    pub(crate) fn speed(&self) -> f64 {
        self.speed.load()
    }

    /// Sets the speed factor and returns the value actually retained.
    pub(crate) fn set_speed(&self, speed: f64) -> f64 {
        let speed = clamp_speed(speed);
        self.speed.store(speed);

        speed
    }
}

/// Clamps a speed factor to `[MIN_SPEED, MAX_SPEED]`.
pub(crate) fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        1.0
    } else {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

/// A real-time [`Clock`] driven by the system's monotonic clock.
///
/// Each simulated unit lasts [`TimeUnit::seconds_per_unit`] wall-clock
/// seconds divided by the current speed factor. Waits are split into short
/// slices so that pause, speed changes and stop requests take effect within a
/// bounded latency.
#[derive(Debug)]
pub struct RealTimeClock {
    unit: TimeUnit,
    playback: Arc<Playback>,
    last: Option<f64>,
    max_slice: Duration,
    pause_poll: Duration,
}

impl RealTimeClock {
    pub(crate) fn new(
        unit: TimeUnit,
        playback: Arc<Playback>,
        max_slice: Duration,
        pause_poll: Duration,
    ) -> Self {
        Self {
            unit,
            playback,
            last: None,
            max_slice,
            pause_poll,
        }
    }
}

impl Clock for RealTimeClock {
    /// Initializes the time reference and returns immediately on the first
    /// call, otherwise blocks until the wall clock has caught up with the
    /// simulated time elapsed since the previous call.
    fn synchronize(&mut self, deadline: f64) -> SyncStatus {
        let last = match self.last.replace(deadline) {
            Some(last) => last,
            None => return SyncStatus::Synchronized,
        };

        // Remaining wait, expressed in wall-clock seconds at 1x speed.
        let mut remaining = (deadline - last).max(0.0) * self.unit.seconds_per_unit();

        loop {
            if self.playback.is_stopped() {
                return SyncStatus::Interrupted;
            }
            if self.playback.is_paused() {
                spin_sleep::sleep(self.pause_poll);
                continue;
            }
            if remaining <= f64::EPSILON {
                return SyncStatus::Synchronized;
            }

            let speed = self.playback.speed();
            let slice = (remaining / speed).min(self.max_slice.as_secs_f64());
            spin_sleep::sleep(Duration::from_secs_f64(slice));
            remaining -= slice * speed;
        }
    }
}
