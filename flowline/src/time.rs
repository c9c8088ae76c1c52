//! Simulation time and wall-clock pacing.
//!
//! Simulated time is an abstract, non-negative real number. A [`TimeUnit`]
//! gives it a meaning in wall-clock terms, which only matters when the
//! simulation is paced in real time by a [`Clock`].

mod clock;

use std::cmp::Ordering;
use std::fmt;

pub use clock::{Clock, NoClock, RealTimeClock, SyncStatus, MAX_SPEED, MIN_SPEED};

pub(crate) use clock::{clamp_speed, Playback};

/// The wall-clock meaning of one unit of simulated time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeUnit {
    /// One simulated unit lasts 10ms of wall-clock time at 1x speed.
    Centiseconds,
    /// One simulated unit lasts 1s of wall-clock time at 1x speed.
    #[default]
    Seconds,
    /// One simulated unit lasts 1 minute of wall-clock time at 1x speed.
    Minutes,
    /// One simulated unit lasts 1 hour of wall-clock time at 1x speed.
    Hours,
}

impl TimeUnit {
    /// Number of wall-clock seconds in one simulated unit at 1x speed.
    pub fn seconds_per_unit(self) -> f64 {
        match self {
            Self::Centiseconds => 0.01,
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
        }
    }
}

/// A totally ordered simulation timestamp.
///
/// Timestamps are finite and non-negative by construction, so the total order
/// of `f64` coincides with the numeric order.
#[derive(Copy, Clone, Default, PartialEq)]
pub(crate) struct SimTime(f64);

impl SimTime {
    pub(crate) const ZERO: Self = Self(0.0);

    /// Wraps a timestamp, saturating non-finite or negative values to zero.
    pub(crate) fn new(t: f64) -> Self {
        if t.is_finite() && t > 0.0 {
            Self(t)
        } else {
            Self(0.0)
        }
    }

    pub(crate) fn as_f64(self) -> f64 {
        self.0
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}
