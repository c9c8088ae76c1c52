//! Operators shared between machines.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use flowline::hooks::{MachineState, OperatorEvent, OperatorPhase};
use flowline::model::{Distribution, FlowModel, GenericConfig, NodeKind, SourceConfig};
use flowline::Hooks;

use crate::common::turbo_session;

/// Builds `source -> machine -> sink` and returns the machine.
fn add_line(model: &mut FlowModel, name: &str, limit: usize, processing: f64) -> String {
    let source = model.add_node(
        format!("{name} source"),
        NodeKind::Source(SourceConfig::new(Distribution::Constant(1.0)).with_limit(limit)),
    );
    let machine = model.add_node(
        name,
        NodeKind::Generic(GenericConfig::new(Distribution::Constant(processing))),
    );
    let sink = model.add_node(format!("{name} sink"), NodeKind::Sink);
    model.add_connection(&source, &machine);
    model.add_connection(&machine, &sink);

    machine
}

#[test]
fn shared_operator_runs_one_machine_at_a_time() {
    let mut model = FlowModel::new();
    let m1 = add_line(&mut model, "m1", 4, 1.0);
    let m2 = add_line(&mut model, "m2", 4, 1.0);
    let op = model.add_operator("alice", &[&m1, &m2]);
    let operator = model.operator_mut(&op).unwrap();
    operator.set_route(&m1, &m2, Distribution::Constant(2.0), true);
    operator.set_route(&m2, &m1, Distribution::Constant(2.0), true);

    let running: Arc<Mutex<BTreeSet<String>>> = Arc::default();
    let overlaps = Arc::new(Mutex::new(0));
    let events: Arc<Mutex<Vec<OperatorEvent>>> = Arc::default();
    let hooks = Hooks::new()
        .on_machine_state({
            let running = running.clone();
            let overlaps = overlaps.clone();
            move |_, machine, state| {
                let mut running = running.lock().unwrap();
                match state {
                    MachineState::On => {
                        running.insert(machine.to_string());
                        if running.len() > 1 {
                            *overlaps.lock().unwrap() += 1;
                        }
                    }
                    MachineState::Off => {
                        running.remove(machine);
                    }
                }
            }
        })
        .on_operator({
            let events = events.clone();
            move |event| events.lock().unwrap().push(event.clone())
        });

    let mut session = turbo_session(model, hooks);
    session.step_until(100.0);

    assert_eq!(*overlaps.lock().unwrap(), 0);
    let stats = session.statistics();
    assert_eq!(stats.total_received(), 8);

    let report = &stats.operators[&op];
    assert!(report.travel_time > 0.0);
    assert!(report.busy_time + report.travel_time <= stats.time);
    assert!(report.utilization <= 1.0);
    assert_eq!(report.busy_time, 8.0);
    let to_m2 = &report.travel_samples[&(m1.clone(), m2.clone())];
    assert!(!to_m2.is_empty());
    assert!(to_m2.iter().all(|&t| t == 2.0));

    let events = events.lock().unwrap();
    assert_eq!(events[0].phase, OperatorPhase::Init);
    assert_eq!(events[0].location, m1);
    let released = events
        .iter()
        .filter(|e| e.phase == OperatorPhase::Released)
        .count();
    assert_eq!(released, 8);
    assert!(events
        .iter()
        .any(|e| matches!(&e.phase, OperatorPhase::Traveling { from } if *from == m1)));

    // Only the initial placement is free: every relocation, the first one
    // included, is charged and sampled.
    let walks = |from: &str| {
        events
            .iter()
            .filter(|e| matches!(&e.phase, OperatorPhase::Traveling { from: f } if f == from))
            .count()
    };
    let to_m1 = report
        .travel_samples
        .get(&(m2.clone(), m1.clone()))
        .map_or(0, Vec::len);
    assert_eq!(to_m2.len(), walks(&m1));
    assert_eq!(to_m1, walks(&m2));
    assert_eq!(report.travel_time, 2.0 * (walks(&m1) + walks(&m2)) as f64);
}

#[test]
fn dedicated_operator_never_travels() {
    let mut model = FlowModel::new();
    let machine = add_line(&mut model, "press", 3, 0.5);
    let op = model.add_operator("bob", &[&machine]);

    let mut session = turbo_session(model, Hooks::new());
    session.step_until(10.0);

    let stats = session.statistics();
    let report = &stats.operators[&op];
    assert_eq!(report.travel_time, 0.0);
    assert_eq!(report.busy_time, 1.5);
    assert_eq!(report.utilization, 0.15);
    assert!(report.travel_samples.is_empty());

    let snapshot = session.snapshot();
    assert_eq!(snapshot.operators[0].position.as_deref(), Some(machine.as_str()));
    assert!(snapshot.operators[0].available);
}
