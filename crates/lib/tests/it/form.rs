use bookit::{
    form::{FormError, FormSubmission},
    mutation::names,
};
use serde_json::json;

use crate::helpers::{record_events, setup_resources, take};

async fn apply(payload: serde_json::Value) -> bookit::Result<bookit::Dispatcher> {
    let (dispatcher, _fakes) = setup_resources();
    let updates = FormSubmission::parse(payload)?.into_updates("items")?;
    dispatcher
        .dispatch(names::PROCESS_UPDATES, serde_json::to_value(updates)?)
        .await?;
    Ok(dispatcher)
}

#[tokio::test]
async fn test_canonical_result_updates_entities_and_scalars() {
    let (dispatcher, _fakes) = setup_resources();
    let log = record_events(dispatcher.store().bus());
    let payload = json!([
        {"name": "items", "action": "create",
         "fields": {"id": 30, "name": "Laptop", "categoryid": 2, "sortorder": 1}},
        {"name": "items", "action": "update", "fields": {"id": 7, "amount": 3}},
        {"name": "activeFilters", "action": "put", "fields": {"room": 2}}
    ]);
    let updates = FormSubmission::parse(payload)
        .unwrap()
        .into_updates("items")
        .unwrap();
    dispatcher
        .dispatch(names::PROCESS_UPDATES, serde_json::to_value(updates).unwrap())
        .await
        .unwrap();

    let store = dispatcher.store();
    assert_eq!(store.record("items", 30).unwrap().get_str("name"), Some("Laptop"));
    assert_eq!(store.record("items", 7).unwrap().get_i64("amount"), Some(3));
    assert_eq!(store.get("activeFilters"), Some(json!({"room": 2})));
    assert_eq!(store.version(), 1);
    assert_eq!(
        take(&log),
        vec![
            "items:created",
            "items:updated",
            "items.amount:updated",
            "activeFilters:created",
            "state:updated"
        ]
    );
}

#[tokio::test]
async fn test_legacy_result_encoded_as_string() {
    let payload = json!(r#"{"result": true, "data": "{\"id\": 8, \"name\": \"Microphone\"}"}"#);
    let dispatcher = apply(payload).await.unwrap();
    let record = dispatcher.store().record("items", 8).unwrap();
    assert_eq!(record.get_str("name"), Some("Microphone"));
    // Put merges, the other fields stay
    assert_eq!(record.get_i64("amount"), Some(5));
}

#[tokio::test]
async fn test_legacy_delete() {
    let dispatcher = apply(json!({"result": true, "action": "delete", "data": {"id": 9}}))
        .await
        .unwrap();
    assert!(dispatcher.store().record("items", 9).is_none());
}

#[tokio::test]
async fn test_rejected_and_malformed_results() {
    let err = apply(json!({"result": false, "message": "Name taken"}))
        .await
        .unwrap_err();
    match &err {
        bookit::Error::Form(form_err @ FormError::Rejected { message }) => {
            assert!(form_err.is_rejected());
            assert_eq!(message, "Name taken");
        }
        other => panic!("unexpected error: {other}"),
    }

    for payload in [json!(42), json!("not json"), json!([{"action": "put"}])] {
        let err = apply(payload).await.unwrap_err();
        assert!(err.is_invalid_data(), "{err}");
        assert_eq!(err.module(), "form");
    }
}

#[tokio::test]
async fn test_result_with_missing_category_leaves_state_untouched() {
    let (dispatcher, _fakes) = setup_resources();
    let log = record_events(dispatcher.store().bus());
    let payload = json!([
        {"name": "items", "action": "create",
         "fields": {"id": 50, "name": "Tripod", "categoryid": 99}}
    ]);
    let updates = FormSubmission::parse(payload)
        .unwrap()
        .into_updates("items")
        .unwrap();

    let err = dispatcher
        .dispatch(names::PROCESS_UPDATES, serde_json::to_value(updates).unwrap())
        .await
        .unwrap_err();

    assert!(err.is_integrity_error(), "{err}");
    let store = dispatcher.store();
    assert!(store.record("items", 50).is_none());
    assert_eq!(store.version(), 0);
    assert!(take(&log).is_empty());
}

#[tokio::test]
async fn test_category_delete_result_removes_its_items() {
    let (dispatcher, _fakes) = setup_resources();
    dispatcher
        .dispatch(
            names::PROCESS_UPDATES,
            json!([{"name": "categories", "action": "delete", "fields": {"id": 1}}]),
        )
        .await
        .unwrap();

    let store = dispatcher.store();
    assert!(store.record("categories", 1).is_none());
    assert!(store.record("items", 7).is_none());
    assert!(store.record("items", 8).is_none());
    assert_eq!(store.record("items", 9).unwrap().get_i64("categoryid"), Some(2));
}
