use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
};

use bookit::{
    EventKey, FeatureConfig, State, Store, UpdateAction, UpdateRecord, watch::ChangeKind,
};
use serde_json::{Map, json};

use crate::helpers::{record_events, resources_state, take};

fn counter(state: &State) -> i64 {
    state.scalar("counter").and_then(|v| v.as_i64()).unwrap_or(0)
}

#[test]
fn test_concurrent_writers_are_serialized() {
    let store = Store::default();
    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..25 {
                    store
                        .write(|state| {
                            let next = counter(state) + 1;
                            state.set_scalar("counter", next);
                            Ok(())
                        })
                        .unwrap();
                }
            });
        }
    });
    assert_eq!(counter(&store.snapshot()), 200);
    assert_eq!(store.version(), 200);
}

#[test]
fn test_readers_never_observe_half_a_write() {
    let store = Store::default();
    store
        .write(|state| {
            state.set_scalar("a", 0);
            state.set_scalar("b", 0);
            Ok(())
        })
        .unwrap();

    let torn = Arc::new(AtomicUsize::new(0));
    let watcher_store = store.clone();
    let watcher_torn = torn.clone();
    store.bus().watch("state:updated", move |_| {
        let snapshot = watcher_store.snapshot();
        if snapshot.scalar("a") != snapshot.scalar("b") {
            watcher_torn.fetch_add(1, Ordering::SeqCst);
        }
    })
    .unwrap();

    let done = AtomicBool::new(false);
    thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                let snapshot = store.snapshot();
                if snapshot.scalar("a") != snapshot.scalar("b") {
                    torn.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
        for writer in 0..4 {
            let store = &store;
            scope.spawn(move || {
                for n in 1..=50 {
                    let value = writer * 100 + n;
                    let mut guard = store.begin_write().unwrap();
                    guard.set_scalar("a", value);
                    thread::yield_now();
                    guard.set_scalar("b", value);
                    guard.commit();
                }
            });
        }
        // Stop the reader once every write has landed
        scope.spawn(|| {
            while store.version() < 201 {
                thread::yield_now();
            }
            done.store(true, Ordering::SeqCst);
        });
    });

    assert_eq!(torn.load(Ordering::SeqCst), 0);
}

#[test]
fn test_watcher_may_write_after_commit() {
    let store = Store::default();
    let echo_store = store.clone();
    store
        .bus()
        .watch("counter", move |event| {
            let value = event.value.clone().unwrap_or_default();
            echo_store
                .write(|state| {
                    state.set_scalar("echo", value);
                    Ok(())
                })
                .unwrap();
        })
        .unwrap();

    store
        .write(|state| {
            state.set_scalar("counter", 3);
            Ok(())
        })
        .unwrap();
    assert_eq!(store.get("echo"), Some(json!(3)));
    assert_eq!(store.version(), 2);
}

#[test]
fn test_only_changed_fields_fire() {
    let store = Store::new(resources_state());
    let log = record_events(store.bus());

    store
        .write(|state| {
            if let Some(item) = state.record_mut("items", 8) {
                item.set("amount", 6);
                item.set("name", "Mic");
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(
        take(&log),
        vec!["items:updated", "items.amount:updated", "state:updated"]
    );
}

#[test]
fn test_field_event_carries_previous_and_new_value() {
    let store = Store::new(resources_state());
    let mut fields = Map::new();
    fields.insert("id".to_owned(), json!(9));
    fields.insert("amount".to_owned(), json!(39.5));
    let changes = store
        .process_updates(
            &FeatureConfig::resources(),
            &[UpdateRecord::new("items", UpdateAction::Update, fields)],
        )
        .unwrap();

    let event = changes
        .events()
        .iter()
        .find(|e| e.key == EventKey::field("items", "amount"))
        .expect("amount event");
    assert_eq!(event.id, Some(9));
    assert_eq!(event.previous, Some(json!(40)));
    assert_eq!(event.value, Some(json!(39.5)));
    assert_eq!(
        event.record.as_ref().and_then(|r| r.get_str("name")),
        Some("Chair")
    );
}

#[test]
fn test_process_updates_is_one_write_section() {
    let store = Store::new(resources_state());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (watcher_store, sink) = (store.clone(), seen.clone());
    store
        .bus()
        .watch("items:created", move |event| {
            // Both records are visible when the first event fires
            let snapshot = watcher_store.snapshot();
            sink.lock().unwrap().push((
                event.id,
                snapshot.record("items", 20).is_some() && snapshot.record("items", 21).is_some(),
            ));
        })
        .unwrap();

    let updates: Vec<UpdateRecord> = serde_json::from_value(json!([
        {"name": "items", "action": "create",
         "fields": {"id": 20, "name": "Laptop", "categoryid": 1}},
        {"name": "items", "action": "create",
         "fields": {"id": 21, "name": "Cable", "categoryid": 1}},
        {"name": "items", "action": "delete", "fields": {"id": 7}}
    ]))
    .unwrap();
    let changes = store
        .process_updates(&FeatureConfig::resources(), &updates)
        .unwrap();

    assert_eq!(store.version(), 1);
    assert!(changes.contains_for(&EventKey::named("items", ChangeKind::Deleted), 7));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(Some(20), true), (Some(21), true)]
    );
}

#[test]
fn test_category_delete_update_removes_its_items() {
    let store = Store::new(resources_state());
    let log = record_events(store.bus());
    let updates: Vec<UpdateRecord> = serde_json::from_value(json!([
        {"name": "categories", "action": "delete", "fields": {"id": 1}}
    ]))
    .unwrap();

    let changes = store
        .process_updates(&FeatureConfig::resources(), &updates)
        .unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.record("categories", 1).is_none());
    assert!(snapshot.record("items", 7).is_none());
    assert!(snapshot.record("items", 8).is_none());
    assert!(snapshot.record("items", 9).is_some());
    assert!(snapshot.check_integrity(&FeatureConfig::resources()).is_ok());
    assert!(changes.contains_for(&EventKey::named("items", ChangeKind::Deleted), 7));
    assert_eq!(
        take(&log),
        vec!["categories:deleted", "items:deleted", "items:deleted", "state:updated"]
    );
}

#[test]
fn test_update_with_missing_category_is_rejected() {
    let store = Store::new(resources_state());
    let log = record_events(store.bus());
    let updates: Vec<UpdateRecord> = serde_json::from_value(json!([
        {"name": "items", "action": "update", "fields": {"id": 7, "amount": 3}},
        {"name": "items", "action": "create",
         "fields": {"id": 50, "name": "Tripod", "categoryid": 99}}
    ]))
    .unwrap();

    let err = store
        .process_updates(&FeatureConfig::resources(), &updates)
        .unwrap_err();

    assert!(err.is_integrity_error(), "{err}");
    assert_eq!(err.module(), "state");
    // The valid update in the same list is discarded too
    assert_eq!(store.record("items", 7).unwrap().get_i64("amount"), Some(2));
    assert!(store.record("items", 50).is_none());
    assert_eq!(store.version(), 0);
    assert!(take(&log).is_empty());

    // Moving an item to a missing category is rejected the same way
    let mut fields = Map::new();
    fields.insert("id".to_owned(), json!(9));
    fields.insert("categoryid".to_owned(), json!(99));
    let err = store
        .process_updates(
            &FeatureConfig::resources(),
            &[UpdateRecord::new("items", UpdateAction::Put, fields)],
        )
        .unwrap_err();
    assert!(err.is_integrity_error());
    assert_eq!(store.record("items", 9).unwrap().get_i64("categoryid"), Some(2));
    assert!(store.begin_write().is_ok());
}

#[test]
fn test_replace_reports_differences_only() {
    let store = Store::new(resources_state());
    let mut next = resources_state();
    if let Some(category) = next.record_mut("categories", 2) {
        category.set("name", "Chairs & Tables");
    }
    let changes = store.replace(next).unwrap();
    let keys: Vec<String> = changes.events().iter().map(|e| e.key.to_string()).collect();
    assert_eq!(
        keys,
        vec!["categories:updated", "categories.name:updated", "state:updated"]
    );
}
