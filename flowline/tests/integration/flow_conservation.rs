//! Item conservation and buffer bookkeeping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flowline::model::{
    Distribution, FlowModel, GenericConfig, ItemType, NodeKind, SourceConfig, SplitMode,
    SyncMode, TieBreak, TypePolicy,
};
use flowline::stats::{ProbeMode, SampleCause};
use flowline::Hooks;

use crate::common::{item_log, items_at, turbo_session};

#[test]
fn every_generated_item_is_received() {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(
            SourceConfig::new(Distribution::Constant(1.0))
                .with_batch_size(2)
                .with_limit(20),
        ),
    );
    let machine = model.add_node(
        "machine",
        NodeKind::Generic(GenericConfig::new(Distribution::Constant(0.4))),
    );
    let splitter = model.add_node("splitter", NodeKind::Splitter(SplitMode::Random));
    let sink_a = model.add_node("a", NodeKind::Sink);
    let sink_b = model.add_node("b", NodeKind::Sink);
    let input = model.add_connection(&source, &machine);
    model.add_connection(&machine, &splitter);
    model.add_connection(&splitter, &sink_a);
    model.add_connection(&splitter, &sink_b);
    model.connection_mut(&input).unwrap().capacity = Some(2);

    let mut session = turbo_session(model, Hooks::new());
    session.step_until(100.0);

    let stats = session.statistics();
    assert_eq!(stats.total_generated(), 20);
    assert_eq!(stats.processed[&machine], 20);
    assert_eq!(stats.total_received(), 20);
    assert_eq!(session.snapshot().wip(), 0);
    assert_eq!(session.state().consistency_violations(), 0);
    assert_eq!(stats.waiting_times[&machine].len(), 20);
}

#[test]
fn multiplier_scales_units() {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(SourceConfig::new(Distribution::Constant(1.0)).with_limit(5)),
    );
    let machine = model.add_node(
        "machine",
        NodeKind::Generic(GenericConfig::new(Distribution::Constant(0.5)).with_multiplier(2.0)),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&source, &machine);
    model.add_connection(&machine, &sink);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(20.0);

    // One token per cycle carries the whole quantity.
    let received = items_at(&arrivals, &sink);
    assert_eq!(received.len(), 5);
    assert_eq!(received.iter().map(|i| i.quantity).sum::<usize>(), 10);
    assert_eq!(session.statistics().total_received(), 5);
}

/// Runs `limit` items through a machine with the given multiplier and
/// returns the tokens received by the sink.
fn run_multiplied(multiplier: f64, limit: usize) -> (Vec<flowline::item::Item>, u64) {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(SourceConfig::new(Distribution::Constant(1.0)).with_limit(limit)),
    );
    let machine = model.add_node(
        "machine",
        NodeKind::Generic(
            GenericConfig::new(Distribution::Constant(0.5)).with_multiplier(multiplier),
        ),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&source, &machine);
    model.add_connection(&machine, &sink);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(limit as f64 + 10.0);

    let processed = session.statistics().processed.get(&machine).copied().unwrap_or(0);

    (items_at(&arrivals, &sink), processed)
}

#[test]
fn whole_multipliers_emit_no_extra_unit() {
    let (tokens, processed) = run_multiplied(0.0, 5);
    assert!(tokens.is_empty());
    assert_eq!(processed, 5);

    let (tokens, processed) = run_multiplied(1.0, 5);
    assert_eq!(tokens.len(), 5);
    assert!(tokens.iter().all(|t| t.quantity == 1));
    assert_eq!(processed, 5);
}

#[test]
fn fractional_multiplier_adds_an_extra_unit_by_chance() {
    let (tokens, processed) = run_multiplied(1.5, 400);
    assert_eq!(processed, 400);
    assert!(tokens.iter().all(|t| t.quantity == 1));

    // 200 extra units expected, with a standard deviation of 10.
    let extra = tokens.len() - 400;
    assert!((140..=260).contains(&extra), "{extra} extra units");
}

#[test]
fn output_type_mapping() {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(
            SourceConfig::new(Distribution::Constant(1.0))
                .with_limit(2)
                .with_single_type(ItemType::new("raw")),
        ),
    );
    let mut config = GenericConfig::new(Distribution::Constant(3.0));
    config
        .processing_time_by_type
        .insert("raw".into(), Distribution::Constant(0.5));
    config
        .output_type_by_type
        .insert("raw".into(), "finished".into());
    let machine = model.add_node("machine", NodeKind::Generic(config));
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&source, &machine);
    model.add_connection(&machine, &sink);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(10.0);

    let received = items_at(&arrivals, &sink);
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|i| i.type_key() == "finished"));
    let times: Vec<f64> = arrivals
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, node, _)| *node == sink)
        .map(|(t, ..)| *t)
        .collect();
    assert_eq!(times, [1.5, 2.5]);
}

#[test]
fn races_keep_bookkeeping_consistent() {
    let mut model = FlowModel::new();
    let sources: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|t| {
            model.add_node(
                format!("source {t}"),
                NodeKind::Source(
                    SourceConfig::new(Distribution::Normal {
                        mean: 0.5,
                        std_dev: 0.3,
                    })
                    .with_batch_size(2)
                    .with_limit(40)
                    .with_types(vec![ItemType::new(t)], TypePolicy::Single(t.into())),
                ),
            )
        })
        .collect();
    let merger = model.add_node("merger", NodeKind::Merger);
    let machine = model.add_node(
        "machine",
        NodeKind::Generic(
            GenericConfig::new(Distribution::Constant(0.1))
                .with_sync(SyncMode::FirstAvailable(TieBreak::Random)),
        ),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    for (k, source) in sources.iter().enumerate() {
        let to = if k == 0 { &merger } else { &machine };
        let conn = model.add_connection(source, to);
        model.connection_mut(&conn).unwrap().capacity = Some(3);
        model.connection_mut(&conn).unwrap().probe = Some(ProbeMode::Buffer);
    }
    model.add_connection(&merger, &machine);
    model.add_connection(&machine, &sink);

    let mut session = turbo_session(model, Hooks::new());
    session.step_until(500.0);

    let state = session.state();
    assert_eq!(state.consistency_violations(), 0);
    for connection in state.model().connections() {
        let buffer = state.buffer(&connection.id).unwrap();
        assert!(buffer.check_invariant());
        assert_eq!(buffer.population(), buffer.queued());
    }

    let stats = session.statistics();
    assert_eq!(stats.total_generated(), 120);
    assert_eq!(stats.total_received(), 120);
    for t in ["A", "B", "C"] {
        assert_eq!(stats.item_types.arrivals[&sink].get(t), Some(&40));
    }
    for probe in stats.buffer_probes.values() {
        assert_eq!(probe.items_passing, 40);
        assert!(probe
            .samples
            .iter()
            .any(|s| s.cause == SampleCause::Consumed));
    }
}

#[test]
fn panicking_hook_is_isolated() {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(SourceConfig::new(Distribution::Constant(1.0)).with_limit(3)),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&source, &sink);

    let calls = Arc::new(AtomicUsize::new(0));
    let hooks = Hooks::new().on_generated({
        let calls = calls.clone();
        move |_, _, _| {
            calls.fetch_add(1, Ordering::Relaxed);
            panic!("faulty hook");
        }
    });

    let mut session = turbo_session(model, hooks);
    session.step_until(10.0);

    assert_eq!(calls.load(Ordering::Relaxed), 3);
    assert_eq!(session.statistics().total_received(), 3);
}
