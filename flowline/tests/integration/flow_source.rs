//! Item generation.

use std::sync::{Arc, Mutex};

use flowline::model::{Distribution, FlowModel, ItemType, NodeKind, SourceConfig, TypePolicy};
use flowline::Hooks;

use crate::common::{item_log, turbo_session};

fn source_to_sink(config: SourceConfig) -> (FlowModel, String, String) {
    let mut model = FlowModel::new();
    let source = model.add_node("source", NodeKind::Source(config));
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&source, &sink);

    (model, source, sink)
}

#[test]
fn source_batch_timing() {
    let config = SourceConfig::new(Distribution::Constant(5.0))
        .with_batch_size(3)
        .with_limit(9);
    let (model, source, _) = source_to_sink(config);
    let (on_generated, generated) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_generated(on_generated));
    session.step_until(100.0);

    let generated = generated.lock().unwrap();
    let times: Vec<f64> = generated.iter().map(|(t, _, _)| *t).collect();
    assert_eq!(times, [5.0, 5.0, 5.0, 10.0, 10.0, 10.0, 15.0, 15.0, 15.0]);
    assert!(generated.iter().all(|(_, node, _)| *node == source));
    assert!(generated
        .iter()
        .all(|(t, _, item)| item.created_at == *t));

    let stats = session.statistics();
    assert_eq!(stats.total_generated(), 9);
    assert_eq!(stats.total_received(), 9);
}

#[test]
fn nothing_is_generated_at_time_zero() {
    let (model, ..) = source_to_sink(SourceConfig::new(Distribution::Constant(1.0)));
    let mut session = turbo_session(model, Hooks::new());

    session.step_until(0.5);
    assert_eq!(session.statistics().total_generated(), 0);

    session.step_until(1.0);
    assert_eq!(session.statistics().total_generated(), 1);
}

#[test]
fn finite_sequence_ends_generation() {
    let config = SourceConfig::new(Distribution::Constant(1.0)).with_types(
        vec![ItemType::new("A"), ItemType::new("B").with_name("Bolt"), ItemType::new("C")],
        TypePolicy::Sequence {
            types: vec!["A".into(), "B".into(), "C".into()],
            looping: false,
        },
    );
    let (model, _, sink) = source_to_sink(config);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(50.0);

    let received = crate::common::items_at(&arrivals, &sink);
    let types: Vec<_> = received.iter().map(|i| i.type_key().to_string()).collect();
    assert_eq!(types, ["A", "B", "C"]);
    assert_eq!(received[1].item_type_name.as_deref(), Some("Bolt"));

    let stats = session.statistics();
    assert_eq!(stats.total_generated(), 3);
    assert_eq!(stats.item_types.generated.get("B"), Some(&1));
    assert!(!session.state().is_active(&session.state().model().nodes()[0].id));
}

#[test]
fn finite_random_draw_uses_every_unit() {
    let config = SourceConfig::new(Distribution::Normal {
        mean: 1.0,
        std_dev: 0.5,
    })
    .with_types(
        vec![ItemType::new("A"), ItemType::new("B")],
        TypePolicy::RandomFinite(vec![("A".into(), 2), ("B".into(), 3)]),
    );
    let (model, ..) = source_to_sink(config);

    let mut session = turbo_session(model, Hooks::new());
    session.step_until(1000.0);

    let stats = session.statistics();
    assert_eq!(stats.total_generated(), 5);
    assert_eq!(stats.item_types.generated.get("A"), Some(&2));
    assert_eq!(stats.item_types.generated.get("B"), Some(&3));
    assert_eq!(stats.total_received(), 5);
}

#[test]
fn inter_generation_probe() {
    let config = SourceConfig::new(Distribution::Constant(2.0)).with_limit(4);
    let (model, source, _) = source_to_sink(config);

    let mut session = turbo_session(model, Hooks::new());
    session.step_until(20.0);

    let stats = session.statistics();
    let probe = &stats.time_probes[&source][&flowline::stats::TimeProbeKind::InterEvents];
    let summary = probe.summary().unwrap();
    assert_eq!(summary.count, 4);
    assert_eq!(summary.mean, 2.0);
    assert_eq!(summary.std_dev, 0.0);
}

#[test]
fn source_activates_once_per_batch() {
    let config = SourceConfig::new(Distribution::Constant(5.0))
        .with_batch_size(3)
        .with_limit(6);
    let (model, source, _) = source_to_sink(config);
    let toggles: Arc<Mutex<Vec<(f64, bool)>>> = Arc::default();
    let hooks = Hooks::new().on_node_active({
        let toggles = toggles.clone();
        let source = source.clone();
        move |time, node, active| {
            if node == source {
                toggles.lock().unwrap().push((time, active));
            }
        }
    });

    let mut session = turbo_session(model, hooks);
    session.step_until(20.0);

    assert_eq!(
        *toggles.lock().unwrap(),
        [(5.0, true), (5.0, false), (10.0, true), (10.0, false)]
    );
    assert_eq!(session.statistics().total_generated(), 6);
}
