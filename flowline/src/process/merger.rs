//! Merging of several inputs into one output.

use std::sync::Arc;

use super::sync::race;
use super::{Context, ProcessResult};
use crate::model::TieBreak;

/// Forwards items from whichever input has one, lowest input first when
/// several are ready.
pub(super) async fn run(ctx: Arc<Context>, node: usize) -> ProcessResult {
    let node_id = ctx.node_id(node).to_string();
    let inputs = ctx.state.model.input_indices(&node_id);
    let output = ctx.state.model.output_indices(&node_id)[0];

    while ctx.is_running() {
        let (conn, item) = race(&ctx, node, &inputs, TieBreak::Order).await?;
        ctx.set_active(node, true);
        ctx.highlight(conn);

        tracing::debug!(item = %item.id, conn = ctx.state.buffers[conn].id(), "item merged");
        let merged = item.derive(format!("{node_id}_merge_{}", item.id));
        ctx.transfer(node, output, merged).await?;

        ctx.set_active(node, false);
    }

    Ok(())
}
