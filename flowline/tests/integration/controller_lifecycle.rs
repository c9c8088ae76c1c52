//! Paced runs on the worker thread.

use std::thread;
use std::time::Duration;

use flowline::model::{Distribution, FlowModel, GenericConfig, NodeKind, SourceConfig};
use flowline::time::TimeUnit;
use flowline::{Controller, Hooks, PacingMode, SimInit, SimulationError};

use crate::common::item_log;

/// `source -> machine -> sink`, with `initial` items waiting at the machine.
fn line(limit: usize, initial: usize) -> (FlowModel, String, String) {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(SourceConfig::new(Distribution::Constant(1.0)).with_limit(limit)),
    );
    let machine = model.add_node(
        "machine",
        NodeKind::Generic(GenericConfig::new(Distribution::Constant(1.0))),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    let input = model.add_connection(&source, &machine);
    model.add_connection(&machine, &sink);
    model.connection_mut(&input).unwrap().initial_count = initial;

    (model, input, machine)
}

fn turbo_controller(model: FlowModel, duration: f64) -> Controller {
    SimInit::new(model)
        .pacing(PacingMode::Turbo)
        .duration(duration)
        .into_controller()
        .unwrap()
}

#[test]
fn pause_freezes_time() {
    let (model, ..) = line(0, 0);
    let (on_generated, generated) = item_log();
    let mut controller = SimInit::new(model)
        .hooks(Hooks::new().on_generated(on_generated))
        .time_unit(TimeUnit::Centiseconds)
        .duration(30.0)
        .into_controller()
        .unwrap();

    controller.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    controller.pause().unwrap();
    assert!(controller.is_paused());

    // Let the worker finish its current step.
    thread::sleep(Duration::from_millis(30));
    let t1 = controller.time();
    thread::sleep(Duration::from_millis(100));
    let t2 = controller.time();
    assert_eq!(t1, t2);
    assert!(t1 < 30.0);

    controller.resume().unwrap();
    assert!(!controller.is_paused());
    controller.wait().unwrap();

    assert!(!controller.is_running());
    assert_eq!(controller.time(), 30.0);
    let times: Vec<f64> = generated.lock().unwrap().iter().map(|(t, ..)| *t).collect();
    let expected: Vec<f64> = (1..=30).map(f64::from).collect();
    assert_eq!(times, expected);
}

#[test]
fn speed_is_clamped() {
    let (model, ..) = line(0, 0);
    let controller = SimInit::new(model).speed(20.0).into_controller().unwrap();
    assert_eq!(controller.speed(), 5.0);

    assert_eq!(controller.set_speed(10.0), 5.0);
    assert_eq!(controller.set_speed(0.0), 0.1);
    assert_eq!(controller.set_speed(2.5), 2.5);
    assert_eq!(controller.speed(), 2.5);
}

#[test]
fn stop_restores_initial_conditions() {
    let (model, input, machine) = line(10, 3);
    let mut controller = turbo_controller(model, 1000.0);

    controller.start().unwrap();
    controller.wait().unwrap();
    let stats = controller.statistics();
    assert_eq!(stats.total_generated(), 10);
    assert_eq!(stats.total_received(), 13);
    assert_eq!(controller.state().buffer(&input).unwrap().population(), 0);

    controller.stop().unwrap();
    assert_eq!(controller.time(), 0.0);
    assert_eq!(controller.state().buffer(&input).unwrap().population(), 3);
    assert!(!controller.state().is_active(&machine));
    assert_eq!(controller.statistics().total_generated(), 0);
    assert_eq!(controller.snapshot().wip(), 3);

    // A new run starts from scratch.
    controller.start().unwrap();
    controller.wait().unwrap();
    assert_eq!(controller.statistics().total_received(), 13);
}

#[test]
fn stop_interrupts_a_running_flow() {
    let (model, input, _) = line(0, 2);
    let mut controller = SimInit::new(model)
        .time_unit(TimeUnit::Centiseconds)
        .into_controller()
        .unwrap();

    controller.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(controller.is_running());
    assert!(controller.time() > 0.0);

    controller.stop().unwrap();
    assert!(!controller.is_running());
    assert_eq!(controller.time(), 0.0);
    assert_eq!(controller.state().buffer(&input).unwrap().population(), 2);
    assert_eq!(controller.state().consistency_violations(), 0);
}

#[test]
fn lifecycle_errors() {
    let (model, ..) = line(0, 0);
    let mut controller = SimInit::new(model)
        .time_unit(TimeUnit::Centiseconds)
        .into_controller()
        .unwrap();

    assert_eq!(controller.pause(), Err(SimulationError::NotRunning));
    assert_eq!(controller.resume(), Err(SimulationError::NotRunning));

    controller.start().unwrap();
    assert_eq!(controller.start(), Err(SimulationError::AlreadyRunning));
    assert_eq!(controller.wait(), Err(SimulationError::Unbounded));

    controller.stop().unwrap();
    assert!(!controller.is_running());
}
