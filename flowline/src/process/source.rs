//! Item generation.

use std::sync::Arc;

use super::{Context, ProcessResult};
use crate::item::Item;
use crate::model::{Draw, SourceConfig, TypeGenerator};
use crate::stats::TimeProbeKind;

/// Generates batches of items at sampled intervals and pushes every item to
/// all outputs.
///
/// The first batch is generated after one interval, never at time zero. The
/// process ends when the limit is reached or the type policy is exhausted.
pub(super) async fn run(ctx: Arc<Context>, node: usize, config: SourceConfig) -> ProcessResult {
    let node_id = ctx.node_id(node).to_string();
    let outputs = ctx.state.model.output_indices(&node_id);
    let mut generator = TypeGenerator::new(config.type_policy.clone());
    let mut produced = 0;
    let mut last_generation = ctx.now();

    ctx.scheduler.timeout(config.interval.sample()).await;

    while ctx.is_running() && (config.limit == 0 || produced < config.limit) {
        let batch = if config.limit == 0 {
            config.batch_size
        } else {
            config.batch_size.min(config.limit - produced)
        };

        ctx.set_active(node, true);
        for _ in 0..batch {
            let item_type = match generator.draw() {
                Draw::Item(item_type) => item_type,
                Draw::Exhausted => {
                    tracing::debug!(produced, "type policy exhausted");
                    ctx.set_active(node, false);
                    return Ok(());
                }
            };

            let now = ctx.now();
            let type_name = item_type
                .as_deref()
                .map(|t| ctx.state.model.item_type_name(Some(t)));
            let item = Item::new(format!("{node_id}_item_{produced}"), now).with_type(item_type, type_name);
            produced += 1;

            tracing::debug!(item = %item.id, item_type = item.type_key(), "item generated");
            ctx.state.stats.record_generated(&node_id, now, item.type_key());
            ctx.state
                .stats
                .record_time_sample(&node_id, TimeProbeKind::InterEvents, now - last_generation);
            last_generation = now;
            ctx.hooks.generated(now, &node_id, &item);

            for &conn in &outputs {
                ctx.transfer(node, conn, item.clone()).await?;
            }
        }

        ctx.set_active(node, false);
        ctx.scheduler.timeout(config.interval.sample()).await;
    }

    Ok(())
}
