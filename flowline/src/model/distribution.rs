use rand::Rng;
use rand_distr::{Distribution as _, Normal, SkewNormal};

/// Smallest value returned when sampling a random distribution.
///
/// A zero or negative interval would make a source generate items at an
/// infinite rate.
pub const MIN_SAMPLE: f64 = 0.01;

/// A probability distribution of durations, in simulated time units.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Distribution {
    /// Always the same value.
    Constant(f64),
    /// Gaussian distribution, floored at [`MIN_SAMPLE`].
    Normal {
        /// Mean.
        mean: f64,
        /// Standard deviation.
        std_dev: f64,
    },
    /// Skew-normal distribution, floored at [`MIN_SAMPLE`].
    SkewNormal {
        /// Location parameter.
        location: f64,
        /// Scale parameter.
        scale: f64,
        /// Shape (skewness) parameter; zero gives a Gaussian distribution.
        shape: f64,
    },
}

impl Distribution {
    /// Draws a value from the thread-local random source.
    pub fn sample(&self) -> f64 {
        self.sample_with(&mut rand::thread_rng())
    }

    /// Draws a value from the provided random source.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Constant(value) => value,
            Self::Normal { mean, std_dev } => match Normal::new(mean, std_dev) {
                Ok(normal) => normal.sample(rng).max(MIN_SAMPLE),
                Err(_) => mean.max(MIN_SAMPLE),
            },
            Self::SkewNormal {
                location,
                scale,
                shape,
            } => match SkewNormal::new(location, scale, shape) {
                Ok(skew) => skew.sample(rng).max(MIN_SAMPLE),
                Err(_) => location.max(MIN_SAMPLE),
            },
        }
    }

    /// Returns the central value of the distribution.
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Constant(value) => value,
            Self::Normal { mean, .. } => mean,
            Self::SkewNormal { location, .. } => location,
        }
    }

    /// Checks that the parameters are usable.
    pub(crate) fn check(&self) -> Result<(), &'static str> {
        match *self {
            Self::Constant(value) => {
                if !value.is_finite() || value < 0.0 {
                    return Err("constant value must be finite and non-negative");
                }
            }
            Self::Normal { mean, std_dev } => {
                if !mean.is_finite() {
                    return Err("mean must be finite");
                }
                if !std_dev.is_finite() || std_dev < 0.0 {
                    return Err("standard deviation must be finite and non-negative");
                }
            }
            Self::SkewNormal {
                location,
                scale,
                shape,
            } => {
                if !location.is_finite() || !shape.is_finite() {
                    return Err("location and shape must be finite");
                }
                if !scale.is_finite() || scale <= 0.0 {
                    return Err("scale must be finite and positive");
                }
            }
        }

        Ok(())
    }

    /// Checks that the parameters are usable for a generation interval.
    pub(crate) fn check_interval(&self) -> Result<(), &'static str> {
        self.check()?;
        if let Self::Constant(value) = *self {
            if value <= 0.0 {
                return Err("a constant interval must be positive");
            }
        }

        Ok(())
    }
}

impl Default for Distribution {
    fn default() -> Self {
        Self::Constant(1.0)
    }
}
