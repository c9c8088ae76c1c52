//! Routing of items to one output among several.

use std::sync::Arc;

use rand::Rng;

use super::{Context, ProcessResult};
use crate::model::{AvailabilityCheck, SplitMode};

/// Forwards each received item to exactly one output chosen by `mode`.
pub(super) async fn run(ctx: Arc<Context>, node: usize, mode: SplitMode) -> ProcessResult {
    let node_id = ctx.node_id(node).to_string();
    let input = ctx.state.model.input_indices(&node_id)[0];
    let outputs = ctx.state.model.output_indices(&node_id);
    let mut next = 0;

    while ctx.is_running() {
        let item = ctx.receive(node, input).await?;
        ctx.set_active(node, true);

        let choice = match mode {
            SplitMode::RoundRobin => {
                let choice = next % outputs.len();
                next += 1;
                choice
            }
            SplitMode::FirstAvailable(AvailabilityCheck::ByBuffer) => outputs
                .iter()
                .position(|&conn| ctx.state.buffers[conn].has_space())
                .unwrap_or(0),
            SplitMode::FirstAvailable(AvailabilityCheck::ByNodeState) => outputs
                .iter()
                .position(|&conn| !ctx.state.nodes[ctx.state.targets[conn]].is_active())
                .unwrap_or(0),
            SplitMode::Random => rand::thread_rng().gen_range(0..outputs.len()),
        };
        let conn = outputs[choice];

        tracing::debug!(item = %item.id, conn = ctx.state.buffers[conn].id(), "item routed");
        ctx.highlight(conn);
        let routed = item.derive(format!("{node_id}_split_{}", item.id));
        ctx.transfer(node, conn, routed).await?;

        ctx.set_active(node, false);
    }

    Ok(())
}
