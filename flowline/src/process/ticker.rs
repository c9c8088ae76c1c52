//! Periodic refresh of the host's view.

use std::sync::Arc;

use super::Context;
use crate::stats::{BufferSample, SampleCause};

/// Wakes up every tick interval to notify the host; every second tick,
/// samples all buffers and the work in progress.
pub(super) async fn run(ctx: Arc<Context>) {
    let interval = ctx.config.tick_interval;
    if !(interval.is_finite() && interval > 0.0) {
        tracing::warn!(interval, "ticker disabled by a non-positive tick interval");
        return;
    }
    let mut ticks: u64 = 0;

    while ctx.is_running() {
        ctx.scheduler.timeout(interval).await;
        ticks += 1;
        let now = ctx.now();
        ctx.state.set_time(now);

        if ticks % 2 == 0 {
            let mut wip = 0;
            for (conn, buffer) in ctx.state.buffers.iter().enumerate() {
                let level = buffer.level();
                wip += level.population;
                let feeds_sink = ctx.state.nodes[ctx.state.targets[conn]].is_sink;
                ctx.hooks.buffer_level(now, buffer.id(), &level);
                ctx.state.stats.record_buffer(
                    buffer.id(),
                    BufferSample {
                        time: now,
                        population: level.population,
                        type_counts: level.type_counts,
                        cause: SampleCause::Tick,
                    },
                    feeds_sink,
                );
            }
            ctx.state.stats.record_wip(now, wip);
            ctx.hooks.wip(now, wip);
        }

        ctx.hooks.tick();
    }
}
