//! Item disposal.

use std::sync::Arc;

use super::{Context, ProcessResult};
use crate::stats::TimeProbeKind;

/// How long a sink stays visibly active after a reception.
const DWELL_TIME: f64 = 0.25;

/// Receives and counts items from the single input.
///
/// The active flag is held for a short dwell after each reception, which
/// never slows down the reception itself.
pub(super) async fn run(ctx: Arc<Context>, node: usize) -> ProcessResult {
    let node_id = ctx.node_id(node).to_string();
    let input = ctx.state.model.input_indices(&node_id)[0];
    let mut last_reception = ctx.now();

    while ctx.is_running() {
        let item = ctx.receive(node, input).await?;
        let now = ctx.now();

        tracing::debug!(item = %item.id, "item received");
        let token = ctx.set_active(node, true);
        ctx.state.stats.record_received(&node_id);
        ctx.state
            .stats
            .record_time_sample(&node_id, TimeProbeKind::InterEvents, now - last_reception);
        last_reception = now;

        ctx.deactivate_later(node, token, DWELL_TIME);
    }

    Ok(())
}
