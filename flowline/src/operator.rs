//! Operator allocation and travel.
//!
//! An operator is a capacity-1 resource with a position. A generic node that
//! needs an operator claims one with [`wait_for_operator`], which walks the
//! operator over to the machine if necessary; busy time is counted from the
//! arrival to the [release](OperatorClaim::release) of the claim.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::hooks::{OperatorEvent, OperatorPhase};
use crate::model::Operator;
use crate::observe::FlowState;
use crate::process::{Context, Interrupted};
use crate::resource::{Permit, Resource};
use crate::scheduler::Scheduler;
use crate::stats::OperatorReport;
use crate::util::lock;

/// Runtime state of an operator.
#[derive(Debug)]
pub(crate) struct OperatorState {
    def: Operator,
    resource: Arc<Resource>,
    inner: Mutex<OperatorRuntime>,
}

#[derive(Debug, Default)]
struct OperatorRuntime {
    position: Option<String>,
    motion: Option<Motion>,
    available: bool,
    busy_since: Option<f64>,
    busy_time: f64,
    travel_time: f64,
    travel_samples: BTreeMap<(String, String), Vec<f64>>,
}

/// An operator walking between two machines.
#[derive(Clone, Debug, PartialEq)]
pub struct Motion {
    /// Machine left.
    pub from: String,
    /// Machine headed for.
    pub to: String,
    /// Fraction of the route covered, from 0 to 1.
    pub progress: f64,
}

/// Observable state of an operator.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorSnapshot {
    /// Operator identifier.
    pub id: String,
    /// Machine where the operator stands or last stood.
    pub position: Option<String>,
    /// Current walk, if any.
    pub motion: Option<Motion>,
    /// Whether the operator is at a machine and ready to control it.
    pub available: bool,
    /// Whether the operator is claimed by a machine.
    pub busy: bool,
}

impl OperatorState {
    pub(crate) fn new(def: Operator) -> Self {
        let state = Self {
            def,
            resource: Arc::new(Resource::new(1)),
            inner: Mutex::new(OperatorRuntime::default()),
        };
        state.reset();

        state
    }

    pub(crate) fn id(&self) -> &str {
        &self.def.id
    }

    /// Whether nobody holds the operator.
    pub(crate) fn is_idle(&self) -> bool {
        self.resource.count() == 0
    }

    pub(crate) fn position(&self) -> Option<String> {
        lock(&self.inner).position.clone()
    }

    pub(crate) fn snapshot(&self) -> OperatorSnapshot {
        let inner = lock(&self.inner);

        OperatorSnapshot {
            id: self.def.id.clone(),
            position: inner.position.clone(),
            motion: inner.motion.clone(),
            available: inner.available,
            busy: self.resource.count() > 0,
        }
    }

    /// Busy and travel totals at time `now`, including an ongoing claim.
    pub(crate) fn report(&self, now: f64) -> OperatorReport {
        let inner = lock(&self.inner);
        let ongoing = inner.busy_since.map_or(0.0, |since| (now - since).max(0.0));
        let busy_time = inner.busy_time + ongoing;

        OperatorReport {
            busy_time,
            travel_time: inner.travel_time,
            utilization: if now > 0.0 { busy_time / now } else { 0.0 },
            travel_samples: inner.travel_samples.clone(),
        }
    }

    /// Puts the operator back at its first machine, free and with no
    /// recorded activity.
    ///
    /// This initial placement is not a travel.
    pub(crate) fn reset(&self) {
        self.resource.reset();
        *lock(&self.inner) = OperatorRuntime {
            position: self.def.assigned_machines.first().cloned(),
            available: true,
            ..OperatorRuntime::default()
        };
    }

    pub(crate) fn close(&self) {
        self.resource.close();
    }

    fn set_motion(&self, motion: Option<Motion>) {
        lock(&self.inner).motion = motion;
    }
}

/// Picks the operator for a machine, preferring an idle one among those
/// assigned to it.
///
/// Returns `None` if no operator is assigned to the machine.
pub(crate) fn find_operator_for_machine(state: &FlowState, machine: &str) -> Option<usize> {
    let mut assigned = state
        .operators
        .iter()
        .enumerate()
        .filter(|(_, o)| o.def.assigned_machines.iter().any(|m| m == machine));

    let first = assigned.next()?;
    if first.1.is_idle() {
        return Some(first.0);
    }

    assigned
        .find(|(_, o)| o.is_idle())
        .map_or(Some(first.0), |(idx, _)| Some(idx))
}

/// Claims an operator and brings it to `machine`.
///
/// Waits for the operator to be free, then for the travel time if it stands
/// elsewhere. The returned claim counts busy time from the arrival.
pub(crate) async fn wait_for_operator(
    ctx: &Context,
    operator: usize,
    machine: &str,
) -> Result<OperatorClaim, Interrupted> {
    let operator = ctx.state.operators[operator].clone();
    let permit = operator.resource.acquire().await?;
    lock(&operator.inner).available = false;

    match operator.position() {
        Some(from) if from != machine => {
            let travel = operator.def.travel_time(&from, machine).sample();
            {
                let mut inner = lock(&operator.inner);
                inner.travel_time += travel;
                if operator.def.route(&from, machine).is_some_and(|r| r.probe) {
                    inner
                        .travel_samples
                        .entry((from.clone(), machine.to_string()))
                        .or_default()
                        .push(travel);
                }
            }
            tracing::debug!(operator = operator.id(), from = %from, to = machine, travel, "operator leaves");
            narrate(ctx, &operator, machine, OperatorPhase::Traveling { from: from.clone() });

            if ctx.animate() && ctx.config.animation_steps > 1 {
                let steps = ctx.config.animation_steps;
                for step in 0..steps {
                    operator.set_motion(Some(Motion {
                        from: from.clone(),
                        to: machine.to_string(),
                        progress: step as f64 / steps as f64,
                    }));
                    ctx.scheduler.timeout(travel / steps as f64).await;
                }
            } else {
                ctx.scheduler.timeout(travel).await;
            }

            {
                let mut inner = lock(&operator.inner);
                inner.motion = None;
                inner.position = Some(machine.to_string());
            }
            narrate(ctx, &operator, machine, OperatorPhase::Arrived);
        }
        Some(_) => {}
        None => {
            lock(&operator.inner).position = Some(machine.to_string());
            narrate(ctx, &operator, machine, OperatorPhase::Init);
        }
    }

    let now = ctx.now();
    {
        let mut inner = lock(&operator.inner);
        inner.available = true;
        inner.busy_since = Some(now);
    }
    narrate(ctx, &operator, machine, OperatorPhase::Controlling);

    Ok(OperatorClaim {
        operator,
        machine: machine.to_string(),
        scheduler: ctx.scheduler.clone(),
        _permit: permit,
    })
}

fn narrate(ctx: &Context, operator: &OperatorState, location: &str, phase: OperatorPhase) {
    ctx.hooks.operator(&OperatorEvent {
        time: ctx.now(),
        operator: operator.id().to_string(),
        location: location.to_string(),
        phase,
    });
}

/// Exclusive use of an operator standing at a machine.
///
/// Busy time is accrued exactly once, when the claim is released or
/// dropped.
#[derive(Debug)]
pub(crate) struct OperatorClaim {
    operator: Arc<OperatorState>,
    machine: String,
    scheduler: Scheduler,
    _permit: Permit,
}

impl OperatorClaim {
    /// Whether the operator currently stands at `machine`.
    pub(crate) fn is_at(&self, machine: &str) -> bool {
        lock(&self.operator.inner).position.as_deref() == Some(machine)
    }

    /// Accrues busy time, reports the release and frees the operator.
    pub(crate) fn release(self, ctx: &Context) {
        self.accrue();
        narrate(ctx, &self.operator, &self.machine, OperatorPhase::Released);
    }

    fn accrue(&self) {
        let now = self.scheduler.now();
        let mut inner = lock(&self.operator.inner);
        if let Some(since) = inner.busy_since.take() {
            inner.busy_time += (now - since).max(0.0);
        }
    }
}

impl Drop for OperatorClaim {
    fn drop(&mut self) {
        self.accrue();
    }
}
