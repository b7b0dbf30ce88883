use bookit::{
    FeatureConfig,
    constants::{ACTIVE_FILTERS, ACTIVE_ROOM},
    mutation::names,
};
use serde_json::json;

use crate::helpers::{
    checklist_state, four_categories, record_events, setup, setup_resources, take,
};

#[tokio::test]
async fn test_create_category_inserts_server_record() {
    let (dispatcher, fakes) = setup_resources();
    let log = record_events(dispatcher.store().bus());
    let method = dispatcher.config().methods.create_category.clone();
    fakes.remote.respond(&method, json!({"id": 5}));

    dispatcher
        .dispatch(
            names::CREATE_CATEGORY,
            json!({"name": "A/V", "sortorder": 0, "active": 1}),
        )
        .await
        .unwrap();

    let record = dispatcher.store().record("categories", 5).expect("created");
    assert_eq!(
        record.to_value(),
        json!({"id": 5, "name": "A/V", "sortorder": 0, "active": 1})
    );
    assert!(take(&log).contains(&"categories:created".to_owned()));
    assert_eq!(fakes.remote.calls_to(&method)[0].args["name"], json!("A/V"));
}

#[tokio::test]
async fn test_failed_create_leaves_state_untouched() {
    let (dispatcher, fakes) = setup_resources();
    fakes
        .remote
        .fail(&dispatcher.config().methods.create_item, "nopermissions");
    let before = dispatcher.store().snapshot();

    let err = dispatcher
        .dispatch(names::CREATE_ITEM, json!({"name": "Laptop", "categoryid": 1}))
        .await
        .unwrap_err();
    assert!(err.is_remote_failure());
    assert_eq!(dispatcher.store().snapshot(), before);
    assert_eq!(dispatcher.store().version(), 0);
}

#[tokio::test]
async fn test_create_item_under_missing_category_is_ignored() {
    let (dispatcher, fakes) = setup_resources();
    dispatcher
        .dispatch(names::CREATE_ITEM, json!({"name": "Laptop", "categoryid": 99}))
        .await
        .unwrap();
    assert!(fakes.remote.calls().is_empty());
    assert_eq!(dispatcher.store().version(), 0);
}

#[tokio::test]
async fn test_move_item_to_other_category() {
    let (dispatcher, fakes) = setup_resources();
    let log = record_events(dispatcher.store().bus());

    dispatcher
        .dispatch(names::REORDER_ITEMS, json!({"id": 7, "targetparentid": 2}))
        .await
        .unwrap();

    let store = dispatcher.store();
    assert_eq!(store.record("items", 7).unwrap().get_i64("categoryid"), Some(2));
    assert_eq!(store.record("items", 7).unwrap().get_i64("sortorder"), Some(1));
    // The item left behind closes the gap
    assert_eq!(store.record("items", 8).unwrap().get_i64("sortorder"), Some(0));

    let events = take(&log);
    assert!(events.contains(&"items.categoryid:updated".to_owned()));
    assert_eq!(store.version(), 1);

    let calls = fakes.remote.calls_to(&dispatcher.config().methods.reorder_items);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args["targetparentid"], json!(2));
    assert_eq!(calls[0].args["order"], json!([9, 7]));
}

#[tokio::test]
async fn test_reorder_categories() {
    let (dispatcher, fakes) = setup(FeatureConfig::resources(), four_categories());
    dispatcher
        .dispatch(names::REORDER_CATEGORIES, json!({"id": 1, "targetid": 3}))
        .await
        .unwrap();

    let snapshot = dispatcher.store().snapshot();
    let order: Vec<i64> = snapshot
        .collection("categories")
        .unwrap()
        .sorted_by("sortorder")
        .iter()
        .map(|r| r.id())
        .collect();
    assert_eq!(order, vec![2, 3, 1, 4]);

    let calls = fakes
        .remote
        .calls_to(&dispatcher.config().methods.reorder_categories);
    assert_eq!(calls[0].args["order"], json!([2, 3, 1, 4]));
}

#[tokio::test]
async fn test_drop_on_predecessor_changes_nothing() {
    let (dispatcher, fakes) = setup(FeatureConfig::resources(), four_categories());
    dispatcher
        .dispatch(names::REORDER_CATEGORIES, json!({"id": 3, "targetid": 2}))
        .await
        .unwrap();
    assert_eq!(dispatcher.store().version(), 0);
    assert!(fakes.remote.calls().is_empty());
}

#[tokio::test]
async fn test_reorder_with_stale_ids_is_noop() {
    let (dispatcher, fakes) = setup_resources();
    for payload in [
        json!({"id": 70, "targetid": 8}),
        json!({"id": 7, "targetparentid": 99}),
    ] {
        assert!(dispatcher.dispatch_reported(names::REORDER_ITEMS, payload).await);
    }
    assert_eq!(dispatcher.store().version(), 0);
    assert!(fakes.remote.calls().is_empty());
    assert!(fakes.notifier.exceptions().is_empty());
}

#[tokio::test]
async fn test_rejected_reorder_reloads_authoritative_state() {
    let (dispatcher, fakes) = setup(FeatureConfig::resources(), four_categories());
    fakes
        .remote
        .fail(&dispatcher.config().methods.reorder_categories, "conflict");

    let ok = dispatcher
        .dispatch_reported(names::REORDER_CATEGORIES, json!({"id": 4, "targetid": 1}))
        .await;

    assert!(!ok);
    assert_eq!(fakes.snapshots.fetches(), 1);
    assert_eq!(*dispatcher.store().snapshot(), four_categories());
    // Optimistic write, then the reload
    assert_eq!(dispatcher.store().version(), 2);
    let exceptions = fakes.notifier.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert!(exceptions[0].contains("conflict"));
}

#[tokio::test]
async fn test_delete_category_cascades() {
    let (dispatcher, fakes) = setup_resources();
    let log = record_events(dispatcher.store().bus());

    dispatcher
        .dispatch(names::DELETE_CATEGORY, json!({"id": 1}))
        .await
        .unwrap();

    let store = dispatcher.store();
    assert!(store.record("categories", 1).is_none());
    assert!(store.record("items", 7).is_none());
    assert!(store.record("items", 8).is_none());
    assert!(store.record("items", 9).is_some());
    assert_eq!(store.version(), 1);

    let events = take(&log);
    assert_eq!(
        events.iter().filter(|e| *e == "items:deleted").count(),
        2
    );
    assert!(events.contains(&"categories:deleted".to_owned()));
    assert_eq!(
        fakes.remote.calls_to(&dispatcher.config().methods.delete_category)[0].args,
        json!({"id": 1})
    );
}

#[tokio::test]
async fn test_toggle_and_update_item() {
    let (dispatcher, fakes) = setup_resources();
    dispatcher
        .dispatch(names::TOGGLE_ITEM_ACTIVE, json!({"id": 7}))
        .await
        .unwrap();
    assert_eq!(
        fakes.remote.calls_to(&dispatcher.config().methods.update_item)[0].args,
        json!({"id": 7, "active": 0})
    );

    let changes_before = dispatcher.store().version();
    dispatcher
        .dispatch(names::UPDATE_ITEM, json!({"id": 8, "categoryid": 2, "amount": 1}))
        .await
        .unwrap();

    let store = dispatcher.store();
    assert_eq!(store.record("items", 7).unwrap().get_i64("active"), Some(0));
    let mic = store.record("items", 8).unwrap();
    assert_eq!(mic.get_i64("categoryid"), Some(2));
    assert_eq!(mic.get_i64("amount"), Some(1));
    assert_eq!(store.version(), changes_before + 1);
}

#[tokio::test]
async fn test_filters_and_selection() {
    let (dispatcher, _fakes) = setup_resources();
    let log = record_events(dispatcher.store().bus());

    dispatcher
        .dispatch(names::SET_ACTIVE_FILTER, json!({"name": "room", "value": 3}))
        .await
        .unwrap();
    dispatcher
        .dispatch(names::SET_ACTIVE_ROOM, json!({"value": 4}))
        .await
        .unwrap();

    let store = dispatcher.store();
    assert_eq!(store.get(ACTIVE_FILTERS), Some(json!({"room": 3})));
    assert_eq!(store.get(ACTIVE_ROOM), Some(json!(4)));
    assert_eq!(
        take(&log),
        vec![
            "activeFilters:created",
            "state:updated",
            "activeRoom:created",
            "state:updated"
        ]
    );
}

#[tokio::test]
async fn test_unknown_and_invalid_payloads() {
    let (dispatcher, _fakes) = setup_resources();
    let err = dispatcher.dispatch("renameEverything", json!({})).await.unwrap_err();
    assert!(err.is_unknown_mutation());
    assert!(err.is_programming_error());

    let err = dispatcher
        .dispatch(names::DELETE_ITEM, json!({"name": "Beamer"}))
        .await
        .unwrap_err();
    assert!(err.is_invalid_data());
}

#[tokio::test]
async fn test_checklist_item_joins_parent_list() {
    let (dispatcher, fakes) = setup(FeatureConfig::checklist(), checklist_state());
    fakes
        .remote
        .respond(&dispatcher.config().methods.create_item, json!(13));

    dispatcher
        .dispatch(names::CREATE_ITEM, json!({"name": "Print badges", "categoryid": 2}))
        .await
        .unwrap();
    let store = dispatcher.store();
    assert!(store.record("checklistitems", 13).is_some());
    assert_eq!(
        store.record("checklistcategories", 2).unwrap().get("items"),
        Some(&json!([12, 13]))
    );

    dispatcher
        .dispatch(names::DELETE_ITEM, json!({"id": 11}))
        .await
        .unwrap();
    assert_eq!(
        store.record("checklistcategories", 1).unwrap().get("items"),
        Some(&json!([10]))
    );
    assert!(
        !store
            .snapshot()
            .collection("checklistitems")
            .unwrap()
            .contains(11)
    );
}
