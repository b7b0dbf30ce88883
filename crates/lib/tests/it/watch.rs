use std::sync::{Arc, Mutex};

use bookit::{Store, constants::ACTIVE_FILTERS};
use serde_json::json;

use crate::helpers::resources_state;

fn collect(store: &Store, key: &str) -> Arc<Mutex<Vec<(Option<i64>, String)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    store
        .bus()
        .watch(key, move |event| {
            sink.lock().unwrap().push((event.id, event.key.to_string()));
        })
        .unwrap();
    log
}

#[test]
fn test_keys_route_to_their_watchers() {
    let store = Store::new(resources_state());
    let any_item = collect(&store, "items");
    let created = collect(&store, "items:created");
    let amounts = collect(&store, "items.amount:updated");
    let everything = collect(&store, "state:updated");

    store
        .write(|state| {
            if let Some(item) = state.record_mut("items", 7) {
                item.set("amount", 3);
                item.set("name", "Projector");
            }
            state.collection_mut("items").remove(9);
            Ok(())
        })
        .unwrap();

    assert_eq!(
        *any_item.lock().unwrap(),
        vec![
            (Some(9), "items:deleted".to_owned()),
            (Some(7), "items:updated".to_owned())
        ]
    );
    assert!(created.lock().unwrap().is_empty());
    assert_eq!(
        *amounts.lock().unwrap(),
        vec![(Some(7), "items.amount:updated".to_owned())]
    );
    assert_eq!(everything.lock().unwrap().len(), 1);
}

#[test]
fn test_no_events_for_a_write_without_changes() {
    let store = Store::new(resources_state());
    let everything = collect(&store, "state:updated");
    store
        .write(|state| {
            if let Some(item) = state.record_mut("items", 7) {
                item.set("name", "Beamer");
            }
            Ok(())
        })
        .unwrap();
    assert!(everything.lock().unwrap().is_empty());
}

#[test]
fn test_filter_object_reports_changed_keys() {
    let store = Store::new(resources_state());
    let rooms = collect(&store, "activeFilters.room:updated");
    let filters = collect(&store, ACTIVE_FILTERS);

    let values = [json!({"room": 3}), json!({"room": 3, "role": 1}), json!({"room": 4, "role": 1})];
    for value in values {
        store
            .write(|state| {
                state.set_scalar(ACTIVE_FILTERS, value);
                Ok(())
            })
            .unwrap();
    }

    assert_eq!(rooms.lock().unwrap().len(), 1);
    let kinds: Vec<String> = filters.lock().unwrap().iter().map(|(_, key)| key.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            "activeFilters:created",
            "activeFilters:updated",
            "activeFilters:updated"
        ]
    );
}

#[test]
fn test_unsubscribed_watcher_stops_receiving() {
    let store = Store::new(resources_state());
    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    let subscription = store
        .bus()
        .watch("items.name:updated", move |_| *sink.lock().unwrap() += 1)
        .unwrap();
    let watchers = store.bus().len();

    let rename = |name: &'static str| {
        store
            .write(|state| {
                if let Some(item) = state.record_mut("items", 8) {
                    item.set("name", name);
                }
                Ok(())
            })
            .unwrap();
    };
    rename("Microphone");
    subscription.unsubscribe();
    rename("Mic");

    assert_eq!(*count.lock().unwrap(), 1);
    assert_eq!(store.bus().len(), watchers - 1);
}
