//! State shared between a running session and the host.
//!
//! The host reads this state asynchronously from its own thread, typically
//! from the per-tick callback; every read is a consistent copy of one
//! element but elements may be mutually stale.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_event::Event;
use crossbeam_utils::atomic::AtomicCell;

use crate::buffer::Buffer;
use crate::error::ConfigError;
use crate::model::{FlowModel, NodeKind};
use crate::operator::OperatorState;
use crate::resource::Resource;
use crate::stats::{Statistics, StatsReport};
use crate::util::lock;

pub use crate::operator::{Motion, OperatorSnapshot};

/// Runtime state of one node.
#[derive(Debug)]
pub(crate) struct NodeState {
    pub(crate) id: String,
    pub(crate) is_sink: bool,
    active: AtomicBool,
    machine_on: AtomicBool,
    /// Bumped on each activation, so that delayed deactivations can tell
    /// whether they are stale.
    activation: AtomicU64,
    /// Processing permit of generic nodes.
    pub(crate) resource: Option<Arc<Resource>>,
}

impl NodeState {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) -> u64 {
        self.active.store(active, Ordering::Release);
        if active {
            self.activation.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.activation.load(Ordering::Acquire)
        }
    }

    pub(crate) fn activation(&self) -> u64 {
        self.activation.load(Ordering::Acquire)
    }

    pub(crate) fn set_machine_on(&self, on: bool) {
        self.machine_on.store(on, Ordering::Release);
    }

    fn reset(&self) {
        self.active.store(false, Ordering::Release);
        self.machine_on.store(false, Ordering::Release);
        if let Some(resource) = &self.resource {
            resource.reset();
        }
    }
}

/// An item token moving along a connection, for the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Transit {
    /// Connection identifier.
    pub connection: String,
    /// Item identifier.
    pub item: String,
    /// Progress along the connection, from 0 to 1.
    pub progress: f64,
}

/// A copy of the observable state of a flow.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowSnapshot {
    /// Simulation time.
    pub time: f64,
    /// Node states, in declaration order.
    pub nodes: Vec<NodeSnapshot>,
    /// Buffer states, in declaration order.
    pub buffers: Vec<BufferSnapshot>,
    /// Operator states, in declaration order.
    pub operators: Vec<OperatorSnapshot>,
    /// Items in transit.
    pub transits: Vec<Transit>,
    /// Highlighted connections, with the time the highlight ends.
    pub highlights: BTreeMap<String, f64>,
}

impl FlowSnapshot {
    /// Total population of all buffers.
    pub fn wip(&self) -> usize {
        self.buffers.iter().map(|b| b.population).sum()
    }

    /// Returns a node state by identifier.
    pub fn node(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns a buffer state by connection identifier.
    pub fn buffer(&self, id: &str) -> Option<&BufferSnapshot> {
        self.buffers.iter().find(|b| b.id == id)
    }
}

/// Observable state of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// Node identifier.
    pub id: String,
    /// Whether the node is inside a processing step.
    pub active: bool,
    /// Whether the machine is shown as working.
    pub machine_on: bool,
}

/// Observable state of a buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferSnapshot {
    /// Connection identifier.
    pub id: String,
    /// Bookkeeping population.
    pub population: usize,
    /// Bookkeeping population by type.
    pub type_counts: BTreeMap<String, usize>,
    /// Capacity, if bounded.
    pub capacity: Option<usize>,
}

/// Everything a session mutates and a host observes.
///
/// A `FlowState` outlives sessions: each new session resets it to the
/// initial conditions of the model.
pub struct FlowState {
    pub(crate) model: FlowModel,
    pub(crate) buffers: Vec<Arc<Buffer>>,
    pub(crate) nodes: Vec<NodeState>,
    pub(crate) operators: Vec<Arc<OperatorState>>,
    pub(crate) stats: Statistics,
    /// Notified whenever items become available in any buffer.
    pub(crate) activity: Arc<Event>,
    /// Index of the target node of each connection.
    pub(crate) targets: Vec<usize>,
    running: AtomicBool,
    time: AtomicCell<f64>,
    transits: Mutex<Vec<Transit>>,
    highlights: Mutex<BTreeMap<String, f64>>,
}

impl FlowState {
    /// Validates a model and builds its initial state.
    pub fn new(model: FlowModel) -> Result<Self, ConfigError> {
        model.validate()?;

        let activity = Arc::new(Event::new());
        let buffers = model
            .connections()
            .iter()
            .map(|c| {
                let type_name = c
                    .initial_type
                    .as_ref()
                    .map(|t| model.item_type_name(Some(t)));
                Arc::new(Buffer::new(c, type_name, activity.clone()))
            })
            .collect();
        let nodes = model
            .nodes()
            .iter()
            .map(|n| NodeState {
                id: n.id.clone(),
                is_sink: matches!(n.kind, NodeKind::Sink),
                active: AtomicBool::new(false),
                machine_on: AtomicBool::new(false),
                activation: AtomicU64::new(0),
                resource: match &n.kind {
                    NodeKind::Generic(generic) => Some(Arc::new(Resource::new(generic.capacity))),
                    _ => None,
                },
            })
            .collect();
        let operators = model
            .operators()
            .iter()
            .map(|o| Arc::new(OperatorState::new(o.clone())))
            .collect();
        let targets = model
            .connections()
            .iter()
            .map(|c| {
                model
                    .nodes()
                    .iter()
                    .position(|n| n.id == c.to)
                    .unwrap_or_default()
            })
            .collect();
        let probes = model
            .connections()
            .iter()
            .filter_map(|c| c.probe.map(|mode| (c.id.clone(), mode)))
            .collect();

        let state = Self {
            model,
            buffers,
            nodes,
            operators,
            stats: Statistics::new(probes),
            activity,
            targets,
            running: AtomicBool::new(false),
            time: AtomicCell::new(0.0),
            transits: Mutex::new(Vec::new()),
            highlights: Mutex::new(BTreeMap::new()),
        };
        state.reset(false);

        Ok(state)
    }

    /// The flow model.
    pub fn model(&self) -> &FlowModel {
        &self.model
    }

    /// Simulation time of the latest completed step.
    pub fn time(&self) -> f64 {
        self.time.load()
    }

    /// Returns the buffer of a connection.
    pub fn buffer(&self, connection: &str) -> Option<&Buffer> {
        self.buffers
            .iter()
            .find(|b| b.id() == connection)
            .map(|b| &**b)
    }

    /// Whether a node is currently active.
    pub fn is_active(&self, node: &str) -> bool {
        self.nodes
            .iter()
            .any(|n| n.id == node && n.is_active())
    }

    /// Total population of all buffers.
    pub fn wip(&self) -> usize {
        self.buffers.iter().map(|b| b.population()).sum()
    }

    /// Total number of bookkeeping inconsistencies detected in
    /// instrumentation mode.
    pub fn consistency_violations(&self) -> usize {
        self.buffers.iter().map(|b| b.violations()).sum()
    }

    /// Takes a copy of the observable state.
    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            time: self.time(),
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSnapshot {
                    id: n.id.clone(),
                    active: n.is_active(),
                    machine_on: n.machine_on.load(Ordering::Acquire),
                })
                .collect(),
            buffers: self
                .buffers
                .iter()
                .map(|b| {
                    let level = b.level();
                    BufferSnapshot {
                        id: b.id().to_string(),
                        population: level.population,
                        type_counts: level.type_counts,
                        capacity: b.capacity(),
                    }
                })
                .collect(),
            operators: self.operators.iter().map(|o| o.snapshot()).collect(),
            transits: lock(&self.transits).clone(),
            highlights: lock(&self.highlights).clone(),
        }
    }

    /// Returns a copy of all statistics.
    pub fn statistics(&self) -> StatsReport {
        let time = self.time();
        let mut report = self.stats.report();
        report.time = time;
        report.operators = self
            .operators
            .iter()
            .map(|o| (o.id().to_string(), o.report(time)))
            .collect();

        report
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn set_time(&self, time: f64) {
        self.time.store(time);
    }

    pub(crate) fn highlight(&self, connection: &str, until: f64) {
        lock(&self.highlights).insert(connection.to_string(), until);
    }

    pub(crate) fn set_transit(&self, connection: &str, item: &str, progress: Option<f64>) {
        let mut transits = lock(&self.transits);
        transits.retain(|t| !(t.connection == connection && t.item == item));
        if let Some(progress) = progress {
            transits.push(Transit {
                connection: connection.to_string(),
                item: item.to_string(),
                progress,
            });
        }
    }

    /// Restores the initial conditions: buffers refilled with their initial
    /// items, nodes inactive, operators at their first machine, no
    /// statistics and clock at zero.
    pub(crate) fn reset(&self, instrumented: bool) {
        self.set_running(false);
        self.stats.clear();
        for buffer in &self.buffers {
            buffer.reset(instrumented);
        }
        for node in &self.nodes {
            node.reset();
        }
        for operator in &self.operators {
            operator.reset();
        }
        lock(&self.transits).clear();
        lock(&self.highlights).clear();
        self.time.store(0.0);
    }

    /// Makes every pending buffer and resource wait fail.
    pub(crate) fn close(&self) {
        for buffer in &self.buffers {
            buffer.close();
        }
        for resource in self.nodes.iter().filter_map(|n| n.resource.as_ref()) {
            resource.close();
        }
        for operator in &self.operators {
            operator.close();
        }
    }
}

impl fmt::Debug for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowState")
            .field("time", &self.time())
            .field("running", &self.is_running())
            .field("buffers", &self.buffers)
            .finish_non_exhaustive()
    }
}
