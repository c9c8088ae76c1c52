//! Helpers shared by the integration tests.

use std::sync::{Arc, Mutex};

use flowline::item::Item;
use flowline::model::FlowModel;
use flowline::{Hooks, PacingMode, Session, SimInit};

/// Builds a checked, as-fast-as-possible session.
pub(crate) fn turbo_session(model: FlowModel, hooks: Hooks) -> Session {
    SimInit::new(model)
        .hooks(hooks)
        .pacing(PacingMode::Turbo)
        .debug_mode(true)
        .init()
        .unwrap()
}

/// Item events recorded by a hook, as `(time, node, item)`.
pub(crate) type ItemLog = Arc<Mutex<Vec<(f64, String, Item)>>>;

/// Returns a hook callback appending to a new log, and that log.
pub(crate) fn item_log() -> (impl Fn(f64, &str, &Item) + Send + Sync + 'static, ItemLog) {
    let log: ItemLog = Arc::default();
    let callback = {
        let log = log.clone();
        move |time: f64, node: &str, item: &Item| {
            log.lock().unwrap().push((time, node.to_string(), item.clone()));
        }
    };

    (callback, log)
}

/// Items of a log recorded at a given node.
pub(crate) fn items_at(log: &ItemLog, node: &str) -> Vec<Item> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(_, n, _)| n == node)
        .map(|(_, _, item)| item.clone())
        .collect()
}
