//! Paced runs on a background thread.
//!
//! A [`Controller`] owns the shared state of a flow and runs one
//! [`Session`] at a time on a dedicated worker thread, either as fast as
//! possible or synchronized with the wall clock. The host thread only
//! issues lifecycle commands and reads the shared state; it never mutates
//! the state of a running session.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::{PacingMode, SimConfig};
use crate::error::SimulationError;
use crate::hooks::Hooks;
use crate::observe::{FlowSnapshot, FlowState};
use crate::session::Session;
use crate::stats::StatsReport;
use crate::time::{clamp_speed, Clock, NoClock, Playback, RealTimeClock, SyncStatus};

/// Lifecycle manager of paced runs.
///
/// # Example
///
/// ```no_run
/// use flowline::model::{Distribution, FlowModel, NodeKind, SourceConfig};
/// use flowline::SimInit;
///
/// let mut model = FlowModel::new();
/// let source = model.add_node(
///     "source",
///     NodeKind::Source(SourceConfig::new(Distribution::Constant(1.0))),
/// );
/// let sink = model.add_node("sink", NodeKind::Sink);
/// model.add_connection(&source, &sink);
///
/// let mut controller = SimInit::new(model).duration(60.0).into_controller()?;
/// controller.start()?;
/// controller.set_speed(4.0);
/// controller.wait()?;
///
/// println!("{} items received", controller.statistics().total_received());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Controller {
    state: Arc<FlowState>,
    hooks: Arc<Hooks>,
    config: SimConfig,
    playback: Arc<Playback>,
    worker: Option<Worker>,
}

struct Worker {
    handle: JoinHandle<()>,
    finished: Arc<AtomicBool>,
}

impl Controller {
    pub(crate) fn new(state: Arc<FlowState>, hooks: Arc<Hooks>, config: SimConfig) -> Self {
        let speed = clamp_speed(config.speed);
        if speed != config.speed {
            tracing::warn!(requested = config.speed, speed, "speed factor clamped");
        }

        Self {
            state,
            hooks,
            config,
            playback: Arc::new(Playback::new(speed)),
            worker: None,
        }
    }

    /// Starts a new run from the initial conditions.
    ///
    /// A run that ended on its own is cleaned up first. An error is returned
    /// if a run is still in progress.
    pub fn start(&mut self) -> Result<(), SimulationError> {
        if self.is_running() {
            return Err(SimulationError::AlreadyRunning);
        }
        self.join()?;

        self.playback.set_paused(false);
        self.playback.set_stopped(false);

        let session = Session::new(self.state.clone(), self.hooks.clone(), self.config.clone());
        let finished = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new()
            .name("flowline-sim".into())
            .spawn({
                let config = self.config.clone();
                let playback = self.playback.clone();
                let finished = finished.clone();
                move || {
                    run_paced(session, &config, &playback);
                    finished.store(true, Ordering::Release);
                }
            })
            .map_err(|_| SimulationError::SpawnFailed)?;

        tracing::info!(pacing = ?self.config.pacing, speed = self.playback.speed(), "run started");
        self.worker = Some(Worker { handle, finished });

        Ok(())
    }

    /// Freezes simulation time until [`resume`](Controller::resume) is
    /// called.
    pub fn pause(&self) -> Result<(), SimulationError> {
        if !self.is_running() {
            return Err(SimulationError::NotRunning);
        }
        self.playback.set_paused(true);
        tracing::info!(time = self.state.time(), "run paused");

        Ok(())
    }

    /// Resumes a paused run.
    pub fn resume(&self) -> Result<(), SimulationError> {
        if !self.is_running() {
            return Err(SimulationError::NotRunning);
        }
        self.playback.set_paused(false);
        tracing::info!(time = self.state.time(), "run resumed");

        Ok(())
    }

    /// Changes the speed factor of real-time runs and returns the value
    /// actually applied, clamped to `[0.1, 5.0]`.
    ///
    /// The change takes effect immediately, even within a run.
    pub fn set_speed(&self, speed: f64) -> f64 {
        let applied = self.playback.set_speed(speed);
        if applied != speed {
            tracing::warn!(requested = speed, speed = applied, "speed factor clamped");
        }
        tracing::info!(speed = applied, "speed changed");

        applied
    }

    /// Returns the current speed factor.
    pub fn speed(&self) -> f64 {
        self.playback.speed()
    }

    /// Stops the run, if any, and resets the shared state to the initial
    /// conditions.
    pub fn stop(&mut self) -> Result<(), SimulationError> {
        self.playback.set_stopped(true);
        let joined = self.join();
        self.playback.set_paused(false);
        self.state.reset(self.config.debug_mode);
        tracing::info!("run stopped");

        joined
    }

    /// Blocks until the run ends on its own, which only happens if a
    /// duration was set.
    ///
    /// The final state is left untouched.
    pub fn wait(&mut self) -> Result<(), SimulationError> {
        match &self.worker {
            Some(_) if self.config.duration.is_none() => Err(SimulationError::Unbounded),
            _ => self.join(),
        }
    }

    /// Whether a run is in progress, paused or not.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.finished.load(Ordering::Acquire))
    }

    /// Whether the run is paused.
    pub fn is_paused(&self) -> bool {
        self.is_running() && self.playback.is_paused()
    }

    /// Simulation time of the latest completed step.
    pub fn time(&self) -> f64 {
        self.state.time()
    }

    /// Returns the shared state.
    pub fn state(&self) -> &Arc<FlowState> {
        &self.state
    }

    /// Takes a copy of the observable state.
    pub fn snapshot(&self) -> FlowSnapshot {
        self.state.snapshot()
    }

    /// Returns a copy of all statistics.
    pub fn statistics(&self) -> StatsReport {
        self.state.statistics()
    }

    fn join(&mut self) -> Result<(), SimulationError> {
        match self.worker.take() {
            Some(worker) => worker.handle.join().map_err(|_| SimulationError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.playback.set_stopped(true);
        let _ = self.join();
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("running", &self.is_running())
            .field("time", &self.time())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Steps a session until it reaches its duration or is stopped.
fn run_paced(mut session: Session, config: &SimConfig, playback: &Arc<Playback>) {
    let (mut clock, step): (Box<dyn Clock>, f64) = match config.pacing {
        PacingMode::Turbo => (Box::new(NoClock::new()), config.turbo_step),
        PacingMode::RealTime => (
            Box::new(RealTimeClock::new(
                config.time_unit,
                playback.clone(),
                config.max_sleep_slice,
                config.pause_poll,
            )),
            config.real_time_step,
        ),
    };
    let step = if step.is_finite() && step > 0.0 { step } else { 0.1 };
    clock.synchronize(session.time());

    loop {
        if playback.is_stopped() {
            break;
        }
        if playback.is_paused() {
            spin_sleep::sleep(config.pause_poll);
            continue;
        }

        let now = session.time();
        let mut target = now + step;
        if let Some(duration) = config.duration {
            if now >= duration {
                tracing::info!(time = now, "run completed");
                break;
            }
            target = target.min(duration);
        }

        session.step_until(target);
        if clock.synchronize(target) == SyncStatus::Interrupted {
            break;
        }
    }
}
