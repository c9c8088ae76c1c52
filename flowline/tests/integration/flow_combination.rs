//! Multi-input collection: recipes and fixed counts per input.

use std::collections::BTreeMap;

use flowline::model::{
    Combination, Distribution, FlowModel, GenericConfig, Ingredient, ItemType, NodeKind,
    SourceConfig, SyncMode, WaitN,
};
use flowline::stats::{ProbeMode, SampleCause};
use flowline::Hooks;

use crate::common::{item_log, items_at, turbo_session};

fn typed_source(model: &mut FlowModel, type_id: &str, limit: usize) -> String {
    model.add_node(
        format!("source {type_id}"),
        NodeKind::Source(
            SourceConfig::new(Distribution::Constant(1.0))
                .with_limit(limit)
                .with_single_type(ItemType::new(type_id)),
        ),
    )
}

#[test]
fn recipe_consumes_only_its_ingredients() {
    let mut model = FlowModel::new();
    let a = typed_source(&mut model, "A", 2);
    let b = typed_source(&mut model, "B", 1);
    let d = typed_source(&mut model, "D", 1);
    let assembly = model.add_node(
        "assembly",
        NodeKind::Generic(
            GenericConfig::new(Distribution::Constant(0.5))
                .with_sync(SyncMode::WaitN(WaitN::default()))
                .with_combinations(vec![Combination::new(
                    "c",
                    vec![Ingredient::new("A", 2), Ingredient::new("B", 1)],
                    "C",
                    1,
                )]),
        ),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&a, &assembly);
    model.add_connection(&b, &assembly);
    let from_d = model.add_connection(&d, &assembly);
    model.add_connection(&assembly, &sink);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(10.0);

    let received = items_at(&arrivals, &sink);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].type_key(), "C");
    assert_eq!(received[0].quantity, 1);

    // The second A arrives at t=2, so the recipe completes at t=2.5.
    let times: Vec<f64> = arrivals
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, node, _)| *node == sink)
        .map(|(t, ..)| *t)
        .collect();
    assert_eq!(times, [2.5]);

    let stats = session.statistics();
    assert_eq!(stats.processed[&assembly], 1);
    assert_eq!(stats.item_types.arrivals[&assembly].get("A"), Some(&2));
    assert_eq!(stats.item_types.arrivals[&assembly].get("D"), None);
    assert_eq!(session.state().buffer(&from_d).unwrap().population(), 1);
    assert_eq!(session.state().consistency_violations(), 0);
}

#[test]
fn first_satisfiable_recipe_wins() {
    let mut model = FlowModel::new();
    let a = typed_source(&mut model, "A", 1);
    let b = typed_source(&mut model, "B", 1);
    let assembly = model.add_node(
        "assembly",
        NodeKind::Generic(
            GenericConfig::new(Distribution::Constant(0.5))
                .with_sync(SyncMode::WaitN(WaitN::default()))
                .with_combinations(vec![
                    Combination::new("big", vec![Ingredient::new("A", 2)], "X", 1),
                    Combination::new("small", vec![Ingredient::new("B", 1)], "Y", 2),
                    Combination::new("other", vec![Ingredient::new("A", 1)], "Z", 1),
                ]),
        ),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    model.add_connection(&a, &assembly);
    model.add_connection(&b, &assembly);
    model.add_connection(&assembly, &sink);
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(10.0);

    // Both items are queued at t=1 before the assembly looks at them: the
    // "small" recipe comes first in declaration order among the satisfiable
    // ones, then "other" takes the remaining A.
    let received: Vec<String> = items_at(&arrivals, &sink)
        .iter()
        .map(|i| i.type_key().to_string())
        .collect();
    assert_eq!(received, ["Y", "Z"]);
    assert_eq!(session.statistics().processed[&assembly], 3);
}

#[test]
fn wait_n_takes_fixed_counts() {
    let mut model = FlowModel::new();
    let left = typed_source(&mut model, "L", 4);
    let right = typed_source(&mut model, "R", 2);
    let joiner = model.add_node("joiner", NodeKind::Generic(GenericConfig::default()));
    let sink = model.add_node("sink", NodeKind::Sink);
    let from_left = model.add_connection(&left, &joiner);
    let from_right = model.add_connection(&right, &joiner);
    model.add_connection(&joiner, &sink);
    if let Some(node) = model.node_mut(&joiner) {
        if let NodeKind::Generic(config) = &mut node.kind {
            config.sync = SyncMode::WaitN(WaitN {
                required: BTreeMap::from([(from_left.clone(), 2), (from_right.clone(), 1)]),
                output_quantity: 3,
                output_type: Some("Z".into()),
            });
        }
    }
    let (on_arrival, arrivals) = item_log();

    let mut session = turbo_session(model, Hooks::new().on_arrival(on_arrival));
    session.step_until(20.0);

    let received = items_at(&arrivals, &sink);
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|i| i.quantity == 3 && i.type_key() == "Z"));

    let stats = session.statistics();
    assert_eq!(stats.processed[&joiner], 6);
    assert_eq!(stats.generated[&left], 4);
    let state = session.state();
    assert_eq!(state.buffer(&from_left).unwrap().population(), 0);
    assert_eq!(state.buffer(&from_right).unwrap().population(), 0);
}

#[test]
fn wait_n_never_drains_a_branch_partially() {
    let mut model = FlowModel::new();
    let left = typed_source(&mut model, "L", 3);
    let right = typed_source(&mut model, "R", 1);
    let joiner = model.add_node("joiner", NodeKind::Generic(GenericConfig::default()));
    let sink = model.add_node("sink", NodeKind::Sink);
    let from_left = model.add_connection(&left, &joiner);
    let from_right = model.add_connection(&right, &joiner);
    model.add_connection(&joiner, &sink);
    model.connection_mut(&from_left).unwrap().probe = Some(ProbeMode::Buffer);
    model.connection_mut(&from_right).unwrap().probe = Some(ProbeMode::Buffer);
    if let Some(node) = model.node_mut(&joiner) {
        if let NodeKind::Generic(config) = &mut node.kind {
            config.sync = SyncMode::WaitN(WaitN {
                required: BTreeMap::from([(from_left.clone(), 2)]),
                ..WaitN::default()
            });
        }
    }

    let mut session = turbo_session(model, Hooks::new());

    // At t=1 the right branch could deliver but the left one is short.
    session.step_until(1.5);
    let state = session.state();
    assert_eq!(state.buffer(&from_left).unwrap().population(), 1);
    assert_eq!(state.buffer(&from_right).unwrap().population(), 1);
    assert_eq!(session.statistics().processed.get(&joiner), None);

    // The right branch is now empty, so the third left item stays queued.
    session.step_until(20.0);
    let state = session.state();
    assert_eq!(state.buffer(&from_left).unwrap().population(), 1);
    assert_eq!(state.buffer(&from_right).unwrap().population(), 0);
    let stats = session.statistics();
    assert_eq!(stats.processed[&joiner], 3);
    assert_eq!(stats.received[&sink], 1);

    // One consumption sample per removed item, each with its own level.
    let consumed = |conn: &str| -> Vec<usize> {
        stats.buffer_probes[conn]
            .samples
            .iter()
            .filter(|s| s.cause == SampleCause::Consumed)
            .map(|s| s.population)
            .collect()
    };
    assert_eq!(consumed(&from_left), [1, 0]);
    assert_eq!(consumed(&from_right), [0]);
}
