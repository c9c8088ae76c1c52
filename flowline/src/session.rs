//! Simulation sessions.
//!
//! A [`Session`] owns everything a single run needs: the executor running one
//! process per node, the virtual clock, and a reference to the shared
//! [`FlowState`]. It is created by [`SimInit::init`] and advanced explicitly
//! with [`step`](Session::step), [`step_by`](Session::step_by) or
//! [`step_until`](Session::step_until); dropping it interrupts every process.
//!
//! For paced runs on a background thread, see
//! [`Controller`](crate::controller::Controller).
//!
//! # Example
//!
//! ```
//! use flowline::model::{Distribution, FlowModel, NodeKind, SourceConfig};
//! use flowline::{PacingMode, SimInit};
//!
//! let mut model = FlowModel::new();
//! let source = model.add_node(
//!     "source",
//!     NodeKind::Source(SourceConfig::new(Distribution::Constant(2.0)).with_limit(5)),
//! );
//! let sink = model.add_node("sink", NodeKind::Sink);
//! model.add_connection(&source, &sink);
//!
//! let mut session = SimInit::new(model).pacing(PacingMode::Turbo).init()?;
//! session.step_until(20.0);
//!
//! assert_eq!(session.statistics().total_received(), 5);
//! # Ok::<(), flowline::ConfigError>(())
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PacingMode, SimConfig};
use crate::controller::Controller;
use crate::error::ConfigError;
use crate::executor::Executor;
use crate::hooks::{Hooks, OperatorEvent, OperatorPhase};
use crate::model::FlowModel;
use crate::observe::{FlowSnapshot, FlowState};
use crate::process::{self, Context};
use crate::scheduler::Scheduler;
use crate::stats::StatsReport;
use crate::time::TimeUnit;

/// Builder of a simulation session or controller.
pub struct SimInit {
    model: FlowModel,
    hooks: Hooks,
    config: SimConfig,
}

impl SimInit {
    /// Creates a builder with default settings.
    pub fn new(model: FlowModel) -> Self {
        Self {
            model,
            hooks: Hooks::new(),
            config: SimConfig::default(),
        }
    }

    /// Attaches host callbacks.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replaces all settings.
    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the pacing mode.
    pub fn pacing(mut self, pacing: PacingMode) -> Self {
        self.config.pacing = pacing;
        self
    }

    /// Sets the wall-clock meaning of one time unit.
    pub fn time_unit(mut self, time_unit: TimeUnit) -> Self {
        self.config.time_unit = time_unit;
        self
    }

    /// Sets the initial speed factor.
    pub fn speed(mut self, speed: f64) -> Self {
        self.config.speed = speed;
        self
    }

    /// Ends paced runs at the specified simulation time.
    pub fn duration(mut self, duration: f64) -> Self {
        self.config.duration = Some(duration);
        self
    }

    /// Sets the simulation time between two ticks.
    pub fn tick_interval(mut self, tick_interval: f64) -> Self {
        self.config.tick_interval = tick_interval;
        self
    }

    /// Enables or disables visual-only animations.
    pub fn animations(mut self, animations: bool) -> Self {
        self.config.animations = animations;
        self
    }

    /// Sets the number of interpolation steps of operator walks.
    pub fn animation_steps(mut self, steps: usize) -> Self {
        self.config.animation_steps = steps;
        self
    }

    /// Enables the buffer bookkeeping checks.
    pub fn debug_mode(mut self, debug_mode: bool) -> Self {
        self.config.debug_mode = debug_mode;
        self
    }

    /// Sets the longest uninterruptible sleep in real-time mode.
    pub fn max_sleep_slice(mut self, slice: Duration) -> Self {
        self.config.max_sleep_slice = slice;
        self
    }

    /// Validates the model and builds a session at time zero, ready to be
    /// stepped.
    pub fn init(self) -> Result<Session, ConfigError> {
        let state = Arc::new(FlowState::new(self.model)?);

        Ok(Session::new(state, Arc::new(self.hooks), self.config))
    }

    /// Validates the model and builds a controller for paced runs on a
    /// background thread.
    pub fn into_controller(self) -> Result<Controller, ConfigError> {
        let state = Arc::new(FlowState::new(self.model)?);

        Ok(Controller::new(state, Arc::new(self.hooks), self.config))
    }
}

impl fmt::Debug for SimInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimInit")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A single run of a flow.
pub struct Session {
    executor: Executor,
    scheduler: Scheduler,
    ctx: Arc<Context>,
}

impl Session {
    /// Resets the shared state to its initial conditions, spawns all
    /// processes and runs them up to their first suspension point.
    pub(crate) fn new(state: Arc<FlowState>, hooks: Arc<Hooks>, config: SimConfig) -> Self {
        state.reset(config.debug_mode);
        state.set_running(true);

        let executor = Executor::new();
        let scheduler = Scheduler::new();
        let ctx = Arc::new(Context {
            state,
            hooks,
            scheduler: scheduler.clone(),
            spawner: executor.spawner(),
            config,
        });

        let mut session = Self {
            executor,
            scheduler,
            ctx,
        };
        session.start();

        session
    }

    fn start(&mut self) {
        tracing::info!(
            nodes = self.ctx.state.nodes.len(),
            connections = self.ctx.state.buffers.len(),
            operators = self.ctx.state.operators.len(),
            "session started"
        );
        for operator in &self.ctx.state.operators {
            if let Some(position) = operator.position() {
                self.ctx.hooks.operator(&OperatorEvent {
                    time: 0.0,
                    operator: operator.id().to_string(),
                    location: position,
                    phase: OperatorPhase::Init,
                });
            }
        }

        process::spawn_all(&self.ctx, &self.executor);
        let executor = &mut self.executor;
        self.scheduler.enter(|| executor.run());
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.scheduler.now()
    }

    /// Returns the shared state, which can be read from any thread.
    pub fn state(&self) -> &Arc<FlowState> {
        &self.ctx.state
    }

    /// Takes a copy of the observable state.
    pub fn snapshot(&self) -> FlowSnapshot {
        self.ctx.state.snapshot()
    }

    /// Returns a copy of all statistics.
    pub fn statistics(&self) -> StatsReport {
        self.ctx.state.statistics()
    }

    /// Advances simulation time to that of the next scheduled wake-up and
    /// runs every process due at that time.
    ///
    /// Returns `false` if nothing is scheduled anymore.
    pub fn step(&mut self) -> bool {
        let Some(deadline) = self.scheduler.next_deadline() else {
            return false;
        };
        self.fire(deadline);

        true
    }

    /// Advances simulation time by `delta`, as if by calling
    /// [`step`](Session::step) repeatedly.
    pub fn step_by(&mut self, delta: f64) {
        self.step_until(self.time() + delta);
    }

    /// Runs every wake-up scheduled up to and including `target`, then sets
    /// the simulation time to `target`.
    ///
    /// Targets in the past are ignored.
    pub fn step_until(&mut self, target: f64) {
        if !(target >= self.time()) {
            return;
        }
        while let Some(deadline) = self.scheduler.next_deadline() {
            if deadline > target {
                break;
            }
            self.fire(deadline);
        }
        self.scheduler.set_time(target);
        self.ctx.state.set_time(self.scheduler.now());
    }

    fn fire(&mut self, deadline: f64) {
        let (executor, scheduler) = (&mut self.executor, &self.scheduler);
        scheduler.enter(|| {
            scheduler.fire_next(deadline);
            executor.run();
        });
        self.ctx.state.set_time(deadline);
    }

    /// Stops every process.
    ///
    /// All pending waits fail and every process unwinds, releasing what it
    /// holds. The shared state keeps its last values until the next session
    /// resets it.
    pub(crate) fn interrupt(&mut self) {
        if !self.ctx.state.is_running() {
            return;
        }
        self.ctx.state.set_running(false);
        self.ctx.state.close();

        let executor = &mut self.executor;
        self.scheduler.enter(|| executor.run());
        tracing::info!(time = self.ctx.state.time(), "session interrupted");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.interrupt();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("time", &self.time())
            .field("tasks", &self.executor.task_count())
            .field("timers", &self.scheduler.pending_timers())
            .finish_non_exhaustive()
    }
}
