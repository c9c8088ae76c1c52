//! Example: a small assembly line with a shared operator.
//!
//! This example demonstrates in particular:
//!
//! * typed sources and recipes,
//! * a shared operator with travel times,
//! * simulation-time log timestamps,
//! * paced runs driven by a controller.
//!
//! ```text
//!  ┌──────────┐      ┌─────────┐      ┌──────────┐      ┌───────┐      ┌────────┐
//!  │ Frames   ├─────►│         │      │          │      │       │      │        │
//!  └──────────┘      │  Cut    ├─────►│ Assembly ├─────►│ Check ├─────►│ Output │
//!  ┌──────────┐      │         │      │          │      │       │      │        │
//!  │ Panels   ├─────►│         │      └──────────┘      └───────┘      └────────┘
//!  └──────────┘      └─────────┘
//! ```
//!
//! Run with `RUST_LOG=info` for lifecycle events or `RUST_LOG=debug` for
//! item-level events.

use std::thread;
use std::time::Duration;

use flowline::model::{
    Combination, Distribution, FlowModel, GenericConfig, Ingredient, ItemType, NodeKind,
    SourceConfig, SyncMode, WaitN,
};
use flowline::stats::{ProbeMode, TimeProbeKind};
use flowline::time::TimeUnit;
use flowline::tracing::SimulationTime;
use flowline::{Hooks, PacingMode, SimInit, SimulationError};

fn build_model() -> (FlowModel, String, String) {
    let mut model = FlowModel::new();

    // Nodes.
    let frames = model.add_node(
        "frames",
        NodeKind::Source(
            SourceConfig::new(Distribution::Normal {
                mean: 2.0,
                std_dev: 0.4,
            })
            .with_single_type(ItemType::new("frame").with_name("Frame")),
        ),
    );
    let panels = model.add_node(
        "panels",
        NodeKind::Source(
            SourceConfig::new(Distribution::Constant(1.0))
                .with_single_type(ItemType::new("panel").with_name("Panel")),
        ),
    );
    let cut = model.add_node(
        "cut",
        NodeKind::Generic(GenericConfig::new(Distribution::SkewNormal {
            location: 0.4,
            scale: 0.2,
            shape: 3.0,
        })),
    );
    let assembly = model.add_node(
        "assembly",
        NodeKind::Generic(
            GenericConfig::new(Distribution::Constant(1.2))
                .with_sync(SyncMode::WaitN(WaitN::default()))
                .with_combinations(vec![Combination::new(
                    "cabinet",
                    vec![Ingredient::new("frame", 1), Ingredient::new("panel", 2)],
                    "cabinet",
                    1,
                )]),
        ),
    );
    let check = model.add_node(
        "check",
        NodeKind::Generic(GenericConfig::new(Distribution::Normal {
            mean: 0.8,
            std_dev: 0.1,
        })),
    );
    let output = model.add_node("output", NodeKind::Sink);

    // Connections.
    model.add_connection(&frames, &cut);
    model.add_connection(&panels, &cut);
    let queue = model.add_connection(&cut, &assembly);
    model.add_connection(&assembly, &check);
    model.add_connection(&check, &output);
    if let Some(queue) = model.connection_mut(&queue) {
        queue.capacity = Some(6);
        queue.probe = Some(ProbeMode::Buffer);
    }

    // One operator runs both the assembly and the check stations.
    let op = model.add_operator("alice", &[&assembly, &check]);
    if let Some(operator) = model.operator_mut(&op) {
        operator.set_route(&assembly, &check, Distribution::Constant(0.5), true);
        operator.set_route(&check, &assembly, Distribution::Constant(0.5), true);
    }

    (model, queue, assembly)
}

fn main() -> Result<(), SimulationError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_timer(SimulationTime::with_system_timer())
        .init();

    let (model, queue, assembly) = build_model();
    let hooks = Hooks::new().on_generated(|time, _, item| {
        if item.type_key() == "frame" {
            println!("t={time:.2}: new frame {}", item.id);
        }
    });

    // A short real-time run: 1 unit lasts 10ms at 1x speed.
    let mut controller = SimInit::new(model.clone())
        .hooks(hooks)
        .time_unit(TimeUnit::Centiseconds)
        .duration(200.0)
        .into_controller()?;
    controller.start()?;
    thread::sleep(Duration::from_millis(300));
    controller.pause()?;
    println!("paused at t={:.2}, wip={}", controller.time(), controller.snapshot().wip());
    thread::sleep(Duration::from_millis(200));
    controller.resume()?;
    controller.set_speed(2.0);
    controller.wait()?;

    let stats = controller.statistics();
    println!(
        "real-time run: {} cabinets out of {} parts at t={}",
        stats.total_received(),
        stats.total_generated(),
        stats.time
    );

    // The same flow over a full shift, as fast as possible.
    let mut controller = SimInit::new(model)
        .pacing(PacingMode::Turbo)
        .duration(8.0 * 3600.0)
        .animations(false)
        .into_controller()?;
    controller.start()?;
    controller.wait()?;

    let stats = controller.statistics();
    println!("turbo run: {} cabinets", stats.total_received());
    let cycle = stats
        .time_probes
        .get(&assembly)
        .and_then(|probes| probes.get(&TimeProbeKind::Processing))
        .and_then(|probe| probe.summary());
    if let Some(summary) = cycle {
        println!("assembly cycle: {:.2} ± {:.2}", summary.mean, summary.std_dev);
    }
    if let Some(probe) = stats.buffer_probes.get(&queue) {
        println!("queue passing: {}", probe.items_passing);
    }
    for (id, report) in &stats.operators {
        println!(
            "{id}: busy {:.1}, travel {:.1}, utilization {:.0}%",
            report.busy_time,
            report.travel_time,
            report.utilization * 100.0
        );
    }

    Ok(())
}
