//! Support for structured logging.
//!
//! # Overview
//!
//! Every node process runs inside a [`tracing::Span`] with the following
//! metadata:
//!
//! - name: `node`,
//! - target: `flowline`,
//! - verbosity level: [`Level::INFO`](tracing::Level::INFO),
//! - fields `id` and `kind`, holding the node identifier and its kind
//!   (`source`, `sink`, `splitter`, `merger` or `generic`).
//!
//! Operator walks and control run inside a nested `operator` span at the
//! [`Level::DEBUG`](tracing::Level::DEBUG) level, with an `id` field.
//!
//! Events follow these conventions:
//!
//! - `error`: buffer bookkeeping inconsistencies, only checked in debug
//!   mode,
//! - `warn`: panicking hooks and clamped settings,
//! - `info`: lifecycle commands,
//! - `debug`: item-level events such as generation, transfer, consumption and
//!   recipe matches,
//! - `trace`: scheduler steps and race losers.
//!
//! # Configuration
//!
//! Events are stamped with the wall clock time by default. The
//! [`SimulationTime`] timer stamps events emitted while a session is being
//! stepped with the simulation time instead:
//!
//! ```
//! use flowline::tracing::SimulationTime;
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
//!     .with_timer(SimulationTime::with_system_timer())
//!     .init();
//! ```
//!
//! which gives for instance:
//!
//! ```text
//! [12.000000]  DEBUG node{id="node_2" kind="generic"}: flowline::process::generic: processing item="node_0_item_11" duration=1.7
//! 2024-09-10T14:39:24.670921Z  INFO flowline::controller: run paused time=12.3
//! ```
//!
//! # Event filtering examples
//!
//! The following `RUST_LOG` directive only lets warnings through, except for
//! the debug events of node `node_2`:
//!
//! ```text
//! $ RUST_LOG="warn,[node{id=node_2}]=debug" cargo run --example assembly_line
//! ```

use std::fmt;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};

use crate::scheduler::Scheduler;

/// A timer that can be used in conjunction with the
/// [`tracing-subscriber`][tracing_subscriber] crate to log events using the
/// simulation time instead of (or on top of) the wall clock time.
///
/// See the [module-level documentation][crate::tracing] for more details.
#[derive(Default, Debug)]
pub struct SimulationTime<const VERBOSE: bool, T> {
    sys_timer: T,
}

impl SimulationTime<false, SystemTime> {
    /// Constructs a new simulation timer which falls back to the [`SystemTime`]
    /// timer for events generated outside the simulator.
    pub fn with_system_timer() -> Self {
        Self::default()
    }
}

impl SimulationTime<true, SystemTime> {
    /// Constructs a new simulation timer which prepends a [`SystemTime`]
    /// timestamp to all tracing events, as well as a simulation timestamp for
    /// simulation events.
    pub fn with_system_timer_always() -> Self {
        Self::default()
    }
}

impl<T: FormatTime> SimulationTime<false, T> {
    /// Constructs a new simulation timer which falls back to the provided
    /// timer for tracing events generated outside the simulator.
    pub fn with_custom_timer(sys_timer: T) -> Self {
        Self { sys_timer }
    }
}

impl<T: FormatTime> SimulationTime<true, T> {
    /// Constructs a new simulation timer which prepends a timestamp generated
    /// with the provided timer to all tracing events, as well as a simulation
    /// timestamp for simulation events.
    pub fn with_custom_timer_always(sys_timer: T) -> Self {
        Self { sys_timer }
    }
}

impl<const VERBOSE: bool, T: FormatTime> FormatTime for SimulationTime<VERBOSE, T> {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        match Scheduler::current_time() {
            Some(time) => {
                if VERBOSE {
                    self.sys_timer.format_time(w)?;
                    w.write_char(' ')?;
                }
                write!(w, "[{time:.6}]")
            }
            None => self.sys_timer.format_time(w),
        }
    }
}
