//! Ordering guarantees of buffers and routing nodes.

use flowline::model::{
    AvailabilityCheck, Distribution, FlowModel, GenericConfig, NodeKind, SourceConfig, SplitMode,
    SyncMode, TieBreak,
};
use flowline::Hooks;

use crate::common::{item_log, items_at, turbo_session};

#[test]
fn buffer_is_fifo() {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(
            SourceConfig::new(Distribution::Constant(1.0))
                .with_batch_size(10)
                .with_limit(10),
        ),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&source, &sink);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(10.0);

    let ids: Vec<_> = items_at(&arrivals, &sink).into_iter().map(|i| i.id).collect();
    let expected: Vec<_> = (0..10).map(|n| format!("{source}_item_{n}")).collect();
    assert_eq!(ids, expected);
}

#[test]
fn round_robin_splitter_is_cyclic() {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(SourceConfig::new(Distribution::Constant(1.0)).with_limit(6)),
    );
    let splitter = model.add_node("splitter", NodeKind::Splitter(SplitMode::RoundRobin));
    model.add_connection(&source, &splitter);
    let sinks: Vec<_> = (0..3)
        .map(|k| {
            let sink = model.add_node(format!("sink {k}"), NodeKind::Sink);
            model.add_connection(&splitter, &sink);
            sink
        })
        .collect();
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(20.0);

    for (k, sink) in sinks.iter().enumerate() {
        let parents: Vec<_> = items_at(&arrivals, sink)
            .into_iter()
            .map(|i| i.parent_id.unwrap())
            .collect();
        assert_eq!(
            parents,
            [format!("{source}_item_{k}"), format!("{source}_item_{}", k + 3)]
        );
        assert_eq!(session.statistics().received[sink], 2);
    }
}

#[test]
fn first_available_splitter_skips_full_buffers() {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(
            SourceConfig::new(Distribution::Constant(1.0))
                .with_batch_size(3)
                .with_limit(3),
        ),
    );
    let splitter = model.add_node(
        "splitter",
        NodeKind::Splitter(SplitMode::FirstAvailable(AvailabilityCheck::ByBuffer)),
    );
    let machine = model.add_node(
        "machine",
        NodeKind::Generic(flowline::model::GenericConfig::new(Distribution::Constant(100.0))),
    );
    let overflow = model.add_node("overflow", NodeKind::Sink);
    let done = model.add_node("done", NodeKind::Sink);
    model.add_connection(&source, &splitter);
    let to_machine = model.add_connection(&splitter, &machine);
    model.add_connection(&splitter, &overflow);
    model.add_connection(&machine, &done);
    model.connection_mut(&to_machine).unwrap().capacity = Some(1);

    let mut session = turbo_session(model, Hooks::new());
    session.step_until(10.0);

    // The whole batch reaches the splitter before the machine takes the
    // first item out of its input buffer, so the next two overflow.
    let stats = session.statistics();
    assert_eq!(stats.received.get(&overflow), Some(&2));
    assert_eq!(stats.received.get(&done), None);
    assert_eq!(session.state().buffer(&to_machine).unwrap().population(), 0);
    assert!(session.state().is_active(&machine));
}

/// Adds a source that stays silent during the test, feeding `to` through a
/// connection preloaded with `initial` items.
fn preloaded_input(model: &mut FlowModel, name: &str, to: &str, initial: usize) -> String {
    let source = model.add_node(
        name,
        NodeKind::Source(SourceConfig::new(Distribution::Constant(1000.0))),
    );
    let conn = model.add_connection(&source, to);
    model.connection_mut(&conn).unwrap().initial_count = initial;

    conn
}

fn ids_from(items: &[flowline::item::Item], conn: &str) -> Vec<String> {
    items
        .iter()
        .map(|i| i.id.clone())
        .filter(|id| id.starts_with(&format!("{conn}_")))
        .collect()
}

#[test]
fn merger_keeps_the_order_of_each_input() {
    let mut model = FlowModel::new();
    let merger = model.add_node("merger", NodeKind::Merger);
    let first = preloaded_input(&mut model, "first", &merger, 3);
    let second = preloaded_input(&mut model, "second", &merger, 3);
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&merger, &sink);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(10.0);

    let merged = items_at(&arrivals, &merger);
    assert_eq!(merged.len(), 6);
    for conn in [&first, &second] {
        let expected: Vec<_> = (0..3).map(|n| format!("{conn}_init_{n}")).collect();
        assert_eq!(ids_from(&merged, conn), expected);
    }
    // The lowest input wins whenever both are ready.
    assert_eq!(merged[0].id, format!("{first}_init_0"));

    let received = items_at(&arrivals, &sink);
    assert_eq!(received.len(), 6);
    assert!(received
        .iter()
        .zip(&merged)
        .all(|(out, ins)| out.parent_id.as_deref() == Some(ins.id.as_str())));
    assert_eq!(session.state().consistency_violations(), 0);
}

fn two_input_machine(tie_break: TieBreak) -> Vec<String> {
    let mut model = FlowModel::new();
    let machine = model.add_node(
        "machine",
        NodeKind::Generic(
            GenericConfig::new(Distribution::Constant(1.0))
                .with_sync(SyncMode::FirstAvailable(tie_break)),
        ),
    );
    let a = preloaded_input(&mut model, "a", &machine, 2);
    let b = preloaded_input(&mut model, "b", &machine, 2);
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&machine, &sink);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(10.0);

    assert_eq!(session.statistics().total_received(), 4);
    assert_eq!(session.state().consistency_violations(), 0);
    let renamed = |id: String| id.replace(&a, "a").replace(&b, "b");

    items_at(&arrivals, &machine)
        .into_iter()
        .map(|i| renamed(i.id))
        .collect()
}

#[test]
fn first_available_by_order_prefers_the_lowest_input() {
    assert_eq!(
        two_input_machine(TieBreak::Order),
        ["a_init_0", "a_init_1", "b_init_0", "b_init_1"]
    );
}

#[test]
fn first_available_round_robin_alternates_inputs() {
    assert_eq!(
        two_input_machine(TieBreak::RoundRobin),
        ["a_init_0", "b_init_0", "a_init_1", "b_init_1"]
    );
}

#[test]
fn first_available_splitter_skips_busy_nodes() {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(SourceConfig::new(Distribution::Constant(1.0)).with_limit(3)),
    );
    let splitter = model.add_node(
        "splitter",
        NodeKind::Splitter(SplitMode::FirstAvailable(AvailabilityCheck::ByNodeState)),
    );
    let machine = model.add_node(
        "machine",
        NodeKind::Generic(GenericConfig::new(Distribution::Constant(100.0))),
    );
    let overflow = model.add_node("overflow", NodeKind::Sink);
    let done = model.add_node("done", NodeKind::Sink);
    model.add_connection(&source, &splitter);
    let to_machine = model.add_connection(&splitter, &machine);
    model.add_connection(&splitter, &overflow);
    model.add_connection(&machine, &done);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(10.0);

    // The machine starts processing the first item at once and stays busy.
    let at_machine = items_at(&arrivals, &machine);
    assert_eq!(at_machine.len(), 1);
    assert_eq!(
        at_machine[0].parent_id.as_deref(),
        Some(format!("{source}_item_0").as_str())
    );
    let stats = session.statistics();
    assert_eq!(stats.received.get(&overflow), Some(&2));
    assert_eq!(stats.received.get(&done), None);
    assert_eq!(session.state().buffer(&to_machine).unwrap().population(), 0);
}
