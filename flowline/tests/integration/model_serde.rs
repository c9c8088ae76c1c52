//! Flow models and settings loaded from JSON.

use flowline::model::{
    Combination, Distribution, FlowModel, GenericConfig, Ingredient, ItemType, NodeKind,
    SourceConfig, SplitMode, SyncMode, TypePolicy, WaitN,
};
use flowline::stats::ProbeMode;
use flowline::{PacingMode, SimConfig, SimInit};

fn sample_model() -> FlowModel {
    let mut model = FlowModel::new();
    let source = model.add_node(
        "source",
        NodeKind::Source(
            SourceConfig::new(Distribution::Normal {
                mean: 2.0,
                std_dev: 0.5,
            })
            .with_batch_size(2)
            .with_types(
                vec![ItemType::new("A").with_name("Part A"), ItemType::new("B")],
                TypePolicy::RandomInfinite(vec![("A".into(), 0.7), ("B".into(), 0.3)]),
            ),
        ),
    );
    let splitter = model.add_node("splitter", NodeKind::Splitter(SplitMode::RoundRobin));
    let assembly = model.add_node(
        "assembly",
        NodeKind::Generic(
            GenericConfig::new(Distribution::Constant(1.5))
                .with_sync(SyncMode::WaitN(WaitN::default()))
                .with_combinations(vec![Combination::new(
                    "ab",
                    vec![Ingredient::new("A", 1), Ingredient::new("B", 1)],
                    "AB",
                    1,
                )]),
        ),
    );
    let sink = model.add_node("sink", NodeKind::Sink);
    let first = model.add_connection(&source, &splitter);
    model.add_connection(&splitter, &assembly);
    model.add_connection(&splitter, &assembly);
    model.add_connection(&assembly, &sink);
    let connection = model.connection_mut(&first).unwrap();
    connection.capacity = Some(5);
    connection.probe = Some(ProbeMode::Cumulative);
    model.add_operator("alice", &[&assembly]);

    model
}

#[test]
fn model_round_trip() {
    let model = sample_model();
    let json = serde_json::to_string_pretty(&model).unwrap();
    let loaded: FlowModel = serde_json::from_str(&json).unwrap();

    assert_eq!(loaded, model);
    assert!(loaded.validate().is_ok());
    assert!(SimInit::new(loaded).init().is_ok());
}

#[test]
fn config_round_trip() {
    let config = SimConfig {
        pacing: PacingMode::Turbo,
        duration: Some(120.0),
        ..SimConfig::new()
    };
    let json = serde_json::to_string(&config).unwrap();
    let loaded: SimConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn invalid_model_is_rejected() {
    let mut model = sample_model();
    let first = model.connections()[0].id.clone();
    model.connection_mut(&first).unwrap().initial_count = 6;
    let json = serde_json::to_string(&model).unwrap();
    let loaded: FlowModel = serde_json::from_str(&json).unwrap();

    assert!(loaded.validate().is_err());
    assert!(SimInit::new(loaded).init().is_err());
}
