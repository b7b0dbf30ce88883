use std::time::Duration;

use bookit::{
    FeatureConfig,
    component::{ComponentEnv, ComponentError, Container, Gesture, Lifecycle},
    mutation::names,
    reorder::ReorderRequest,
    testing::form_put,
};
use serde_json::json;

use crate::helpers::{checklist_state, mounted, resources_state, setup_resources};

const CATEGORY_TEMPLATE: &str = "mod_bookit/resources/category";
const ITEM_TEMPLATE: &str = "mod_bookit/resources/item";
const CONTAINER_TEMPLATE: &str = "mod_bookit/resources/container";

#[tokio::test]
async fn test_mount_renders_every_component_once() {
    let (container, dispatcher, fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;

    assert_eq!(container.lifecycle(), Lifecycle::Rendered);
    assert_eq!(container.category_ids(), vec![1, 2]);
    assert_eq!(container.item_ids(1), vec![7, 8]);
    assert_eq!(container.fragment().children, vec![1, 2]);
    assert_eq!(fakes.templates.render_count(CONTAINER_TEMPLATE), 1);
    assert_eq!(fakes.templates.render_count(CATEGORY_TEMPLATE), 2);
    assert_eq!(fakes.templates.render_count(ITEM_TEMPLATE), 3);

    let beamer = container.item(7).unwrap();
    assert_eq!(beamer.renders(), 1);
    assert_eq!(beamer.fragment().fields.get("amount").map(String::as_str), Some("2"));
    assert!(!container.needs_flush());
    // Container watchers plus one per entity component
    assert_eq!(dispatcher.store().bus().len(), 2 + 5);
}

#[tokio::test]
async fn test_field_change_patches_in_place() {
    let (container, dispatcher, fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    let renders_before = fakes.templates.renders().len();

    dispatcher
        .dispatch(names::UPDATE_ITEM, json!({"id": 7, "name": "Projector"}))
        .await
        .unwrap();

    let beamer = container.item(7).unwrap();
    assert_eq!(beamer.lifecycle(), Lifecycle::Patched);
    assert_eq!(beamer.patches(), 1);
    assert_eq!(beamer.renders(), 1);
    assert_eq!(beamer.fragment().fields.get("name").map(String::as_str), Some("Projector"));
    assert!(!container.needs_flush());
    assert_eq!(fakes.templates.renders().len(), renders_before);
    // Siblings are untouched
    assert_eq!(container.item(8).unwrap().patches(), 0);
}

#[tokio::test]
async fn test_write_from_earlier_watcher_leaves_latest_value() {
    let (dispatcher, _fakes) = setup_resources();
    // Registered before the components, so it sees every field event first
    let store = dispatcher.store().clone();
    dispatcher
        .store()
        .bus()
        .watch("items.name:updated", move |event| {
            if event.value == Some(json!("projector")) {
                let id = event.id.unwrap();
                store
                    .write(|state| {
                        if let Some(record) = state.record_mut("items", id) {
                            record.set("name", "Projector");
                        }
                        Ok(())
                    })
                    .unwrap();
            }
        })
        .unwrap();
    let container = Container::new(ComponentEnv::new(dispatcher.clone())).unwrap();
    container.mount().await.unwrap();

    dispatcher
        .dispatch(names::UPDATE_ITEM, json!({"id": 7, "name": "projector"}))
        .await
        .unwrap();

    assert_eq!(
        dispatcher.store().record("items", 7).unwrap().get_str("name"),
        Some("Projector")
    );
    assert_eq!(dispatcher.store().version(), 2);
    let beamer = container.item(7).unwrap();
    assert_eq!(beamer.fragment().fields.get("name").map(String::as_str), Some("Projector"));
    assert_eq!(beamer.patches(), 2);
}

#[tokio::test]
async fn test_move_rerenders_only_affected_components() {
    let (container, dispatcher, fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;

    dispatcher
        .dispatch(names::REORDER_ITEMS, json!({"id": 7, "targetparentid": 2}))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), container.changed())
        .await
        .expect("structural change notified");
    assert!(container.needs_flush());
    container.flush().await.unwrap();

    assert_eq!(container.item_ids(1), vec![8]);
    assert_eq!(container.item_ids(2), vec![9, 7]);
    assert_eq!(container.item(7).unwrap().renders(), 2);
    assert_eq!(container.item(8).unwrap().renders(), 2);
    assert_eq!(container.item(9).unwrap().renders(), 1);
    assert_eq!(container.category(1).unwrap().fragment().children, vec![8]);
    assert_eq!(container.category(2).unwrap().fragment().children, vec![9, 7]);
    assert_eq!(fakes.templates.render_count(CONTAINER_TEMPLATE), 1);
    assert!(!container.needs_flush());
}

#[tokio::test]
async fn test_removed_components_unsubscribe() {
    let (container, dispatcher, _fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    let bus = dispatcher.store().bus().clone();
    let chair = container.item(9).unwrap();

    dispatcher
        .dispatch(names::DELETE_CATEGORY, json!({"id": 2}))
        .await
        .unwrap();
    container.flush().await.unwrap();

    assert_eq!(container.category_ids(), vec![1]);
    assert!(container.item(9).is_none());
    assert_eq!(chair.lifecycle(), Lifecycle::Removed);
    assert_eq!(bus.len(), 2 + 3);

    let err = chair.handle(Gesture::Edit).await.unwrap_err();
    assert!(matches!(err, bookit::Error::Component(ref e) if e.is_removed()));

    container.remove();
    container.remove();
    assert!(bus.is_empty());
    assert_eq!(container.lifecycle(), Lifecycle::Removed);
    assert!(container.flush().await.is_err());
}

#[tokio::test]
async fn test_room_selection_hides_items_and_empty_categories() {
    let (container, dispatcher, _fakes) =
        mounted(FeatureConfig::checklist(), checklist_state()).await;
    assert_eq!(container.item_ids(1), vec![11, 10]);
    let hidden = |id| container.item(id).unwrap().is_hidden();

    dispatcher
        .dispatch(names::SET_ACTIVE_ROOM, json!(4))
        .await
        .unwrap();
    assert!(hidden(10));
    assert!(!hidden(11));
    assert!(!hidden(12));

    assert!(container.handle(Gesture::SelectRoom(Some(3))).await.unwrap());
    assert!(!hidden(10));
    assert!(hidden(11));
    assert!(hidden(12));
    assert!(container.category(2).unwrap().is_hidden());
    assert!(!container.category(1).unwrap().is_hidden());

    assert!(container.handle(Gesture::SelectRoom(None)).await.unwrap());
    assert!(![10, 11, 12].into_iter().any(hidden));
    assert!(!container.category(2).unwrap().is_hidden());
}

#[tokio::test]
async fn test_role_filter_uses_the_same_rule() {
    let (container, _dispatcher, _fakes) =
        mounted(FeatureConfig::checklist(), checklist_state()).await;
    assert!(container.handle(Gesture::SelectRole(Some(5))).await.unwrap());
    // Only item 11 is restricted by role
    assert!(container.item(11).unwrap().is_hidden());
    assert!(!container.item(10).unwrap().is_hidden());
    assert!(!container.item(12).unwrap().is_hidden());
}

#[tokio::test]
async fn test_checklist_due_date_display() {
    let (container, _dispatcher, _fakes) =
        mounted(FeatureConfig::checklist(), checklist_state()).await;
    let fields = container.item(10).unwrap().fragment().fields;
    assert_eq!(fields.get("duedate").map(String::as_str), Some("2023-11-14"));
    assert!(container.item(11).unwrap().fragment().fields.get("duedate").is_none());
}

#[tokio::test]
async fn test_edit_gesture_applies_form_result() {
    let (container, dispatcher, fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    fakes
        .forms
        .submit(form_put("items", json!({"id": 8, "name": "Microphone"})));

    let mic = container.item(8).unwrap();
    assert!(mic.handle(Gesture::Edit).await.unwrap());

    let opened = fakes.forms.opened();
    assert_eq!(opened[0].title, "[edititem,mod_bookit]");
    assert_eq!(opened[0].form_class, dispatcher.config().forms.item);
    assert_eq!(opened[0].args, json!({"id": 8}));
    assert_eq!(
        dispatcher.store().record("items", 8).unwrap().get_str("name"),
        Some("Microphone")
    );
    assert_eq!(mic.patches(), 1);
    assert_eq!(mic.renders(), 1);

    // Queue is empty: the next form is cancelled
    assert!(!mic.handle(Gesture::Edit).await.unwrap());
}

#[tokio::test]
async fn test_rejected_form_is_reported() {
    let (container, _dispatcher, fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    fakes
        .forms
        .submit(json!({"result": false, "message": "Name taken"}));

    assert!(!container.item(7).unwrap().handle(Gesture::Edit).await.unwrap());
    let exceptions = fakes.notifier.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert!(exceptions[0].contains("Name taken"));
}

#[tokio::test]
async fn test_delete_gesture_asks_first() {
    let (container, dispatcher, fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    let method = dispatcher.config().methods.delete_item.clone();
    let mic = container.item(8).unwrap();

    fakes.notifier.answer_confirmations(false);
    assert!(!mic.handle(Gesture::Delete).await.unwrap());
    assert!(fakes.remote.calls_to(&method).is_empty());
    assert_eq!(
        fakes.notifier.confirmations()[0].message,
        "[confirmdeleteitem,mod_bookit]"
    );

    fakes.notifier.answer_confirmations(true);
    assert!(mic.handle(Gesture::Delete).await.unwrap());
    assert_eq!(fakes.remote.calls_to(&method).len(), 1);
    assert!(container.needs_flush());
    container.flush().await.unwrap();
    assert!(container.item(8).is_none());
    assert_eq!(mic.lifecycle(), Lifecycle::Removed);
}

#[tokio::test]
async fn test_toggle_gesture_patches_category() {
    let (container, dispatcher, _fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    let tech = container.category(1).unwrap();
    assert!(tech.handle(Gesture::ToggleActive).await.unwrap());
    assert_eq!(
        dispatcher.store().record("categories", 1).unwrap().get_i64("active"),
        Some(0)
    );
    assert_eq!(tech.patches(), 1);
    assert_eq!(tech.fragment().fields.get("active").map(String::as_str), Some("0"));
}

#[tokio::test]
async fn test_create_gestures() {
    let (container, _dispatcher, fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    fakes.forms.submit(form_put(
        "categories",
        json!({"id": 3, "name": "Rooms", "sortorder": 2, "active": 1}),
    ));
    assert!(container.handle(Gesture::Create).await.unwrap());
    container.flush().await.unwrap();
    assert_eq!(container.category_ids(), vec![1, 2, 3]);
    assert_eq!(fakes.templates.render_count(CONTAINER_TEMPLATE), 2);

    fakes.forms.cancel();
    let tech = container.category(1).unwrap();
    assert!(!tech.handle(Gesture::Create).await.unwrap());
    let opened = fakes.forms.opened();
    assert_eq!(opened[1].args, json!({"categoryid": 1}));
    assert_eq!(opened[1].title, "[additem,mod_bookit]");
}

#[tokio::test]
async fn test_drop_gesture_reorders() {
    let (container, _dispatcher, _fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    let chair = container.item(9).unwrap();
    assert!(chair.handle(Gesture::Drop(ReorderRequest::new(9, 7))).await.unwrap());
    container.flush().await.unwrap();
    assert_eq!(container.item_ids(1), vec![7, 9, 8]);
    assert!(container.item_ids(2).is_empty());
}

#[tokio::test]
async fn test_rejected_drop_restores_tree() {
    let (container, dispatcher, fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    fakes
        .remote
        .fail(&dispatcher.config().methods.reorder_items, "locked");

    let chair = container.item(9).unwrap();
    assert!(!chair.handle(Gesture::Drop(ReorderRequest::new(9, 7))).await.unwrap());
    assert_eq!(fakes.snapshots.fetches(), 1);
    container.flush().await.unwrap();
    assert_eq!(container.item_ids(1), vec![7, 8]);
    assert_eq!(container.item_ids(2), vec![9]);
}

#[tokio::test]
async fn test_unsupported_gesture() {
    let (container, _dispatcher, _fakes) =
        mounted(FeatureConfig::resources(), resources_state()).await;
    let err = container.handle(Gesture::Edit).await.unwrap_err();
    assert!(matches!(
        err,
        bookit::Error::Component(ComponentError::UnsupportedGesture { gesture: "edit", .. })
    ));
}
