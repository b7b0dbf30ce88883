use std::sync::{Arc, Mutex};

use bookit::{
    Dispatcher, FeatureConfig, State, Store, WatcherBus,
    component::{ComponentEnv, Container},
    testing::FakeServices,
};
use serde_json::json;

// ==========================
// STATE FIXTURES
// ==========================

/// Two resource categories: Tech (Beamer, Mic) and Furniture (Chair).
pub fn resources_state() -> State {
    serde_json::from_value(json!({
        "collections": {
            "categories": [
                {"id": 1, "name": "Tech", "description": "", "sortorder": 0, "active": 1},
                {"id": 2, "name": "Furniture", "description": "", "sortorder": 1, "active": 1}
            ],
            "items": [
                {"id": 7, "name": "Beamer", "categoryid": 1, "sortorder": 0, "active": 1,
                 "amount": 2},
                {"id": 8, "name": "Mic", "categoryid": 1, "sortorder": 1, "active": 1, "amount": 5},
                {"id": 9, "name": "Chair", "categoryid": 2, "sortorder": 0, "active": 1,
                 "amount": 40}
            ]
        }
    }))
    .expect("valid resources fixture")
}

/// Four resource categories with ids 1..=4 in that order, no items.
pub fn four_categories() -> State {
    let categories: Vec<_> = (1..=4)
        .map(|id| {
            json!({"id": id, "name": format!("Category {id}"), "sortorder": id - 1, "active": 1})
        })
        .collect();
    serde_json::from_value(json!({
        "collections": {"categories": categories, "items": []}
    }))
    .expect("valid category fixture")
}

/// Checklist with ordered item lists and room/role restrictions.
pub fn checklist_state() -> State {
    serde_json::from_value(json!({
        "collections": {
            "checklistcategories": [
                {"id": 1, "name": "Before", "sortorder": 0, "active": 1, "items": [11, 10]},
                {"id": 2, "name": "After", "sortorder": 1, "active": 1, "items": [12]}
            ],
            "checklistitems": [
                {"id": 10, "name": "Book room", "categoryid": 1, "sortorder": 0, "active": 1,
                 "roomids": [3], "roleids": [], "duedate": 1_700_000_000},
                {"id": 11, "name": "Order catering", "categoryid": 1, "sortorder": 1, "active": 1,
                 "roomids": [4], "roleids": [6]},
                {"id": 12, "name": "Return keys", "categoryid": 2, "sortorder": 0, "active": 1,
                 "roomids": [4], "roleids": []}
            ]
        }
    }))
    .expect("valid checklist fixture")
}

// ==========================
// WIRING
// ==========================

/// A dispatcher over a fresh store, wired to fakes.
///
/// The fakes' snapshot source serves `state` as the authoritative state.
pub fn setup(config: FeatureConfig, state: State) -> (Dispatcher, FakeServices) {
    let fakes = FakeServices::new(state.clone());
    let dispatcher = Dispatcher::for_feature(Store::new(state), fakes.services.clone(), config)
        .expect("preset configuration is valid");
    (dispatcher, fakes)
}

pub fn setup_resources() -> (Dispatcher, FakeServices) {
    setup(FeatureConfig::resources(), resources_state())
}

/// A mounted component tree for `config` over `state`.
pub async fn mounted(config: FeatureConfig, state: State) -> (Container, Dispatcher, FakeServices) {
    let (dispatcher, fakes) = setup(config, state);
    let container = Container::new(ComponentEnv::new(dispatcher.clone())).expect("valid container");
    container.mount().await.expect("mount succeeds");
    (container, dispatcher, fakes)
}

// ==========================
// EVENT RECORDING
// ==========================

/// Record the key of every event published on `bus`, in delivery order.
pub fn record_events(bus: &WatcherBus) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    bus.watch_matching(
        |_| true,
        move |event| sink.lock().unwrap().push(event.key.to_string()),
    );
    log
}

/// Drain the recorded keys.
pub fn take(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}
