//! Node processes.
//!
//! Each node of the flow runs as one long-lived task on the session's
//! executor. Processes share a [`Context`] giving access to the virtual
//! clock, the shared state and the hooks, and unwind with [`Interrupted`]
//! as soon as the buffers or resources they wait on are closed.

mod generic;
mod merger;
mod sink;
mod source;
mod splitter;
mod sync;
mod ticker;

use std::sync::Arc;

use tracing::Instrument;

use crate::buffer::BufferLevel;
use crate::config::SimConfig;
use crate::error::{BufferError, ResourceError};
use crate::executor::{Executor, Spawner};
use crate::hooks::{Hooks, MachineState};
use crate::item::Item;
use crate::model::NodeKind;
use crate::observe::FlowState;
use crate::scheduler::Scheduler;
use crate::stats::{BufferSample, SampleCause};

/// Visual duration of a transit along a connection.
const TRANSIT_TIME: f64 = 0.3;
/// Number of progress updates of a transit.
const TRANSIT_STEPS: usize = 5;
/// Visual duration of a connection highlight.
pub(crate) const HIGHLIGHT_TIME: f64 = 0.3;
/// Offset of consumption samples, so they sort after a same-instant put.
const CONSUMPTION_OFFSET: f64 = 0.001;

/// A process stopped because the session is being torn down.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Interrupted;

impl From<BufferError> for Interrupted {
    fn from(_: BufferError) -> Self {
        Interrupted
    }
}

impl From<ResourceError> for Interrupted {
    fn from(_: ResourceError) -> Self {
        Interrupted
    }
}

pub(crate) type ProcessResult = Result<(), Interrupted>;

/// Everything a process needs to interact with the rest of the session.
#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) state: Arc<FlowState>,
    pub(crate) hooks: Arc<Hooks>,
    pub(crate) scheduler: Scheduler,
    pub(crate) spawner: Spawner,
    pub(crate) config: SimConfig,
}

impl Context {
    pub(crate) fn now(&self) -> f64 {
        self.scheduler.now()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub(crate) fn animate(&self) -> bool {
        self.config.animate()
    }

    pub(crate) fn node_id(&self, node: usize) -> &str {
        &self.state.nodes[node].id
    }

    /// Marks a node active or inactive and notifies the host.
    pub(crate) fn set_active(&self, node: usize, active: bool) -> u64 {
        let state = &self.state.nodes[node];
        let token = state.set_active(active);
        self.hooks.node_active(self.now(), &state.id, active);

        token
    }

    /// Switches a machine ON or OFF and notifies the host.
    pub(crate) fn set_machine(&self, node: usize, machine: MachineState) {
        let state = &self.state.nodes[node];
        state.set_machine_on(machine == MachineState::On);
        self.hooks.machine_state(self.now(), &state.id, machine);
    }

    /// Deactivates a node after a delay, unless it was reactivated in the
    /// meantime.
    pub(crate) fn deactivate_later(self: &Arc<Self>, node: usize, token: u64, delay: f64) {
        let ctx = self.clone();
        self.spawner.spawn(async move {
            ctx.scheduler.timeout(delay).await;
            if ctx.state.nodes[node].activation() == token {
                ctx.set_active(node, false);
            }
        });
    }

    pub(crate) fn highlight(&self, conn: usize) {
        self.state
            .highlight(self.state.buffers[conn].id(), self.now() + HIGHLIGHT_TIME);
    }

    /// Puts an item into a connection, reports the new level and records
    /// the departure from `node`.
    pub(crate) async fn transfer(self: &Arc<Self>, node: usize, conn: usize, item: Item) -> ProcessResult {
        let buffer = &self.state.buffers[conn];
        let type_key = item.type_key().to_string();
        let transit = self.animate().then(|| item.id.clone());

        let level = buffer.put(item).await?;
        let now = self.now();
        tracing::debug!(conn = buffer.id(), population = level.population, "item transferred");

        let feeds_sink = self.state.nodes[self.state.targets[conn]].is_sink;
        self.state.stats.record_buffer(
            buffer.id(),
            BufferSample {
                time: now,
                population: level.population,
                type_counts: level.type_counts.clone(),
                cause: SampleCause::Put,
            },
            feeds_sink,
        );
        self.hooks.buffer_level(now, buffer.id(), &level);
        self.state.stats.record_departure(self.node_id(node), now, &type_key);

        if let Some(item_id) = transit {
            self.animate_transit(conn, item_id);
        }

        Ok(())
    }

    /// Takes the oldest item of a connection and records its arrival at
    /// `node`.
    pub(crate) async fn receive(&self, node: usize, conn: usize) -> Result<Item, Interrupted> {
        let (item, level) = self.state.buffers[conn].get().await?;
        self.record_consumption(conn, &level);
        self.record_arrival(node, &item);

        Ok(item)
    }

    /// Records a consumption sample for a connection.
    pub(crate) fn record_consumption(&self, conn: usize, level: &BufferLevel) {
        let buffer = &self.state.buffers[conn];
        let feeds_sink = self.state.nodes[self.state.targets[conn]].is_sink;
        let now = self.now();

        tracing::debug!(conn = buffer.id(), population = level.population, "item consumed");
        self.state.stats.record_buffer(
            buffer.id(),
            BufferSample {
                time: now + CONSUMPTION_OFFSET,
                population: level.population,
                type_counts: level.type_counts.clone(),
                cause: SampleCause::Consumed,
            },
            feeds_sink,
        );
        self.hooks.buffer_level(now, buffer.id(), level);
    }

    pub(crate) fn record_arrival(&self, node: usize, item: &Item) {
        let now = self.now();
        let id = self.node_id(node);
        self.state.stats.record_arrival(id, now, item.type_key());
        self.hooks.arrival(now, id, item);
    }

    /// Returns items popped by a lost race to the front of their buffer
    /// without blocking the caller.
    ///
    /// The buffers refuse pops until their item is back.
    pub(crate) fn return_losers(&self, losers: Vec<(usize, Item)>) {
        if losers.is_empty() {
            return;
        }
        let buffers: Vec<_> = losers
            .into_iter()
            .map(|(conn, item)| {
                let buffer = self.state.buffers[conn].clone();
                buffer.hold_for_return();
                (buffer, item)
            })
            .collect();
        self.spawner.spawn(async move {
            for (buffer, item) in buffers {
                tracing::trace!(conn = buffer.id(), item = %item.id, "returning race loser");
                buffer.restore_front(item);
            }
        });
    }

    fn animate_transit(self: &Arc<Self>, conn: usize, item_id: String) {
        let ctx = self.clone();
        self.spawner.spawn(async move {
            let conn_id = ctx.state.buffers[conn].id().to_string();
            for step in 0..=TRANSIT_STEPS {
                let progress = step as f64 / TRANSIT_STEPS as f64;
                ctx.state.set_transit(&conn_id, &item_id, Some(progress));
                ctx.scheduler.timeout(TRANSIT_TIME / TRANSIT_STEPS as f64).await;
            }
            ctx.state.set_transit(&conn_id, &item_id, None);
        });
    }
}

/// Spawns the processes of every node plus the ticker.
pub(crate) fn spawn_all(ctx: &Arc<Context>, executor: &Executor) {
    for (idx, node) in ctx.state.model.nodes().iter().enumerate() {
        let span = tracing::info_span!("node", id = %node.id, kind = node.kind.label());
        let task = {
            let ctx = ctx.clone();
            let kind = node.kind.clone();
            async move {
                let result = match kind {
                    NodeKind::Source(config) => source::run(ctx, idx, config).await,
                    NodeKind::Sink => sink::run(ctx, idx).await,
                    NodeKind::Splitter(mode) => splitter::run(ctx, idx, mode).await,
                    NodeKind::Merger => merger::run(ctx, idx).await,
                    NodeKind::Generic(config) => generic::run(ctx, idx, config).await,
                };
                if result.is_err() {
                    tracing::trace!("process interrupted");
                }
            }
        };
        executor.spawn_and_forget(task.instrument(span));
    }

    executor.spawn_and_forget(ticker::run(ctx.clone()));
}
