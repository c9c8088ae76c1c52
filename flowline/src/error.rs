//! Error types.

use std::error::Error;
use std::fmt;

/// An error detected while validating a flow model, before any process runs.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Two elements share the same identifier.
    DuplicateId(String),
    /// A connection or operator refers to a node that does not exist.
    UnknownNode {
        /// The referring element.
        referrer: String,
        /// The missing node.
        node: String,
    },
    /// A node has a number of inputs or outputs its kind does not allow.
    Arity {
        /// The faulty node.
        node: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A distribution has unusable parameters.
    InvalidDistribution {
        /// The element owning the distribution.
        owner: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A connection has a capacity of zero.
    ZeroCapacity {
        /// The faulty connection.
        connection: String,
    },
    /// A connection holds more initial items than its capacity.
    CapacityBelowInitial {
        /// The faulty connection.
        connection: String,
        /// The declared capacity.
        capacity: usize,
        /// The declared initial occupancy.
        initial_count: usize,
    },
    /// A generic node has a negative or non-finite output multiplier.
    InvalidMultiplier {
        /// The faulty node.
        node: String,
        /// The declared multiplier.
        value: f64,
    },
    /// A source has a batch size of zero.
    InvalidBatchSize {
        /// The faulty node.
        node: String,
    },
    /// A source has an item type policy that cannot produce any item.
    InvalidTypePolicy {
        /// The faulty node.
        node: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A combination cannot ever be satisfied or produces nothing.
    InvalidCombination {
        /// The node owning the combination.
        node: String,
        /// The faulty combination.
        combination: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A wait-N requirement names a connection that is not an input of the
    /// node.
    UnknownRequiredInput {
        /// The faulty node.
        node: String,
        /// The connection that is not one of its inputs.
        connection: String,
    },
    /// An operator is assigned to a node that is not a generic node.
    NotAMachine {
        /// The faulty operator.
        operator: String,
        /// The node it is assigned to.
        node: String,
    },
    /// An operator has no assigned machine.
    NoAssignedMachines {
        /// The faulty operator.
        operator: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(fmt, "identifier '{id}' is used more than once"),
            Self::UnknownNode { referrer, node } => {
                write!(fmt, "'{referrer}' refers to unknown node '{node}'")
            }
            Self::Arity { node, reason } => write!(fmt, "node '{node}': {reason}"),
            Self::InvalidDistribution { owner, reason } => {
                write!(fmt, "invalid distribution for '{owner}': {reason}")
            }
            Self::ZeroCapacity { connection } => {
                write!(fmt, "connection '{connection}' has a capacity of zero")
            }
            Self::CapacityBelowInitial {
                connection,
                capacity,
                initial_count,
            } => write!(
                fmt,
                "connection '{connection}' has capacity {capacity} but {initial_count} initial items"
            ),
            Self::InvalidMultiplier { node, value } => {
                write!(fmt, "node '{node}' has an invalid output multiplier ({value})")
            }
            Self::InvalidBatchSize { node } => {
                write!(fmt, "source '{node}' has a batch size of zero")
            }
            Self::InvalidTypePolicy { node, reason } => {
                write!(fmt, "source '{node}' has an invalid item type policy: {reason}")
            }
            Self::InvalidCombination {
                node,
                combination,
                reason,
            } => write!(
                fmt,
                "combination '{combination}' of node '{node}' is invalid: {reason}"
            ),
            Self::UnknownRequiredInput { node, connection } => write!(
                fmt,
                "node '{node}' waits on '{connection}' which is not one of its inputs"
            ),
            Self::NotAMachine { operator, node } => write!(
                fmt,
                "operator '{operator}' is assigned to '{node}' which is not a processing node"
            ),
            Self::NoAssignedMachines { operator } => {
                write!(fmt, "operator '{operator}' has no assigned machine")
            }
        }
    }
}

impl Error for ConfigError {}

/// An error returned by the lifecycle commands of a
/// [`Controller`](crate::Controller).
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum SimulationError {
    /// `start` was requested while a run is in progress.
    AlreadyRunning,
    /// The command requires a run in progress.
    NotRunning,
    /// The flow model failed validation.
    Config(ConfigError),
    /// Waiting for the end of a run that has no duration.
    Unbounded,
    /// The simulation thread could not be spawned.
    SpawnFailed,
    /// The simulation thread panicked.
    WorkerPanicked,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => fmt.write_str("the simulation is already running"),
            Self::NotRunning => fmt.write_str("the simulation is not running"),
            Self::Config(e) => write!(fmt, "invalid flow model: {e}"),
            Self::Unbounded => fmt.write_str("the run has no duration and never ends on its own"),
            Self::SpawnFailed => fmt.write_str("the simulation thread could not be spawned"),
            Self::WorkerPanicked => fmt.write_str("the simulation thread panicked"),
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// An error returned when a buffer operation cannot complete.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer was closed while waiting.
    Closed,
}

impl fmt::Display for BufferError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => fmt.write_str("the buffer was closed"),
        }
    }
}

impl Error for BufferError {}

/// An error returned when a resource cannot be acquired.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResourceError {
    /// The resource was closed while waiting.
    Closed,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => fmt.write_str("the resource was closed"),
        }
    }
}

impl Error for ResourceError {}
