//! Optional callbacks notified of simulation events.
//!
//! Hooks are best-effort observers: a panicking hook is caught, logged and
//! otherwise ignored, so that it never takes a node process down with it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::buffer::BufferLevel;
use crate::item::Item;

/// Power state of a machine, as shown to the host.
///
/// A machine is ON while it is processing actual items with its operator, if
/// any, standing at it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MachineState {
    /// The machine is working.
    On,
    /// The machine is idle.
    Off,
}

/// Phase of an operator narration event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperatorPhase {
    /// Placed at its first machine at the start of a run.
    Init,
    /// Leaving `from` towards the location of the event.
    Traveling {
        /// Machine the operator leaves.
        from: String,
    },
    /// Reached the machine.
    Arrived,
    /// Started controlling the machine.
    Controlling,
    /// Released the machine.
    Released,
}

impl OperatorPhase {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Traveling { .. } => "traveling",
            Self::Arrived => "arrived",
            Self::Controlling => "controlling",
            Self::Released => "released",
        }
    }
}

/// An operator narration event.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorEvent {
    /// Simulation time.
    pub time: f64,
    /// Operator identifier.
    pub operator: String,
    /// Machine the event refers to.
    pub location: String,
    /// What happened.
    pub phase: OperatorPhase,
}

/// Optional callbacks attached by the host.
///
/// Every callback runs on the simulation thread, synchronously with the
/// event it reports, and should return quickly.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// use flowline::Hooks;
///
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let hooks = Hooks::new().on_tick({
///     let ticks = ticks.clone();
///     move || {
///         ticks.fetch_add(1, Ordering::Relaxed);
///     }
/// });
/// # drop(hooks);
/// ```
#[derive(Default)]
pub struct Hooks {
    on_tick: Option<Box<dyn Fn() + Send + Sync>>,
    on_generated: Option<ItemHook>,
    on_node_active: Option<Box<dyn Fn(f64, &str, bool) + Send + Sync>>,
    on_machine_state: Option<Box<dyn Fn(f64, &str, MachineState) + Send + Sync>>,
    on_arrival: Option<ItemHook>,
    on_departure: Option<ItemHook>,
    on_buffer_level: Option<Box<dyn Fn(f64, &str, &BufferLevel) + Send + Sync>>,
    on_operator: Option<Box<dyn Fn(&OperatorEvent) + Send + Sync>>,
    on_wip: Option<Box<dyn Fn(f64, usize) + Send + Sync>>,
}

type ItemHook = Box<dyn Fn(f64, &str, &Item) + Send + Sync>;

impl Hooks {
    /// Creates a holder with no callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called periodically so the host can refresh its view.
    pub fn on_tick(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_tick = Some(Box::new(f));
        self
    }

    /// Called with `(time, source, item)` for each generated item.
    pub fn on_generated(mut self, f: impl Fn(f64, &str, &Item) + Send + Sync + 'static) -> Self {
        self.on_generated = Some(Box::new(f));
        self
    }

    /// Called with `(time, node, active)` on activation changes.
    pub fn on_node_active(mut self, f: impl Fn(f64, &str, bool) + Send + Sync + 'static) -> Self {
        self.on_node_active = Some(Box::new(f));
        self
    }

    /// Called with `(time, machine, state)` on machine ON/OFF transitions.
    pub fn on_machine_state(
        mut self,
        f: impl Fn(f64, &str, MachineState) + Send + Sync + 'static,
    ) -> Self {
        self.on_machine_state = Some(Box::new(f));
        self
    }

    /// Called with `(time, node, item)` when a node takes an item from one of
    /// its inputs.
    pub fn on_arrival(mut self, f: impl Fn(f64, &str, &Item) + Send + Sync + 'static) -> Self {
        self.on_arrival = Some(Box::new(f));
        self
    }

    /// Called with `(time, node, item)` when a node emits an item.
    pub fn on_departure(mut self, f: impl Fn(f64, &str, &Item) + Send + Sync + 'static) -> Self {
        self.on_departure = Some(Box::new(f));
        self
    }

    /// Called with `(time, connection, level)` after each buffer mutation and
    /// at periodic sampling.
    pub fn on_buffer_level(
        mut self,
        f: impl Fn(f64, &str, &BufferLevel) + Send + Sync + 'static,
    ) -> Self {
        self.on_buffer_level = Some(Box::new(f));
        self
    }

    /// Called for each operator narration event.
    pub fn on_operator(mut self, f: impl Fn(&OperatorEvent) + Send + Sync + 'static) -> Self {
        self.on_operator = Some(Box::new(f));
        self
    }

    /// Called with `(time, items in buffers)` at periodic sampling.
    pub fn on_wip(mut self, f: impl Fn(f64, usize) + Send + Sync + 'static) -> Self {
        self.on_wip = Some(Box::new(f));
        self
    }

    pub(crate) fn tick(&self) {
        if let Some(f) = &self.on_tick {
            guard("tick", f);
        }
    }

    pub(crate) fn generated(&self, time: f64, node: &str, item: &Item) {
        if let Some(f) = &self.on_generated {
            guard("generated", || f(time, node, item));
        }
    }

    pub(crate) fn node_active(&self, time: f64, node: &str, active: bool) {
        if let Some(f) = &self.on_node_active {
            guard("node_active", || f(time, node, active));
        }
    }

    pub(crate) fn machine_state(&self, time: f64, node: &str, state: MachineState) {
        if let Some(f) = &self.on_machine_state {
            guard("machine_state", || f(time, node, state));
        }
    }

    pub(crate) fn arrival(&self, time: f64, node: &str, item: &Item) {
        if let Some(f) = &self.on_arrival {
            guard("arrival", || f(time, node, item));
        }
    }

    pub(crate) fn departure(&self, time: f64, node: &str, item: &Item) {
        if let Some(f) = &self.on_departure {
            guard("departure", || f(time, node, item));
        }
    }

    pub(crate) fn buffer_level(&self, time: f64, conn: &str, level: &BufferLevel) {
        if let Some(f) = &self.on_buffer_level {
            guard("buffer_level", || f(time, conn, level));
        }
    }

    pub(crate) fn operator(&self, event: &OperatorEvent) {
        if let Some(f) = &self.on_operator {
            guard("operator", || f(event));
        }
    }

    pub(crate) fn wip(&self, time: f64, wip: usize) {
        if let Some(f) = &self.on_wip {
            guard("wip", || f(time, wip));
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

/// Runs a hook, swallowing and logging any panic.
fn guard(name: &'static str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic payload");
        tracing::warn!(hook = name, panic = message, "hook panicked");
    }
}
