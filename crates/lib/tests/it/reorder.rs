use bookit::{
    FeatureConfig,
    mutation::names,
    reorder::{DragSession, DropTarget, category_order, item_order},
};

use crate::helpers::{checklist_state, setup, setup_resources};

fn drag(id: i64, target: DropTarget) -> serde_json::Value {
    let mut session = DragSession::new();
    session.press(id, 10, 10);
    assert!(session.motion(10, 40));
    session.hover(target);
    let request = session.release().expect("drag ended over a target");
    serde_json::to_value(request).unwrap()
}

#[tokio::test]
async fn test_drag_item_onto_item_of_other_category() {
    let (dispatcher, fakes) = setup_resources();
    let payload = drag(9, DropTarget::Entity { id: 7, parent: None });
    dispatcher.dispatch(names::REORDER_ITEMS, payload).await.unwrap();

    let snapshot = dispatcher.store().snapshot();
    let config = dispatcher.config();
    assert_eq!(item_order(&snapshot, config, 1), vec![7, 9, 8]);
    assert!(item_order(&snapshot, config, 2).is_empty());

    let calls = fakes.remote.calls_to(&config.methods.reorder_items);
    assert_eq!(calls[0].args["targetid"], serde_json::json!(7));
    assert_eq!(calls[0].args["targetparentid"], serde_json::json!(1));
}

#[tokio::test]
async fn test_drag_category_after_its_successor() {
    let (dispatcher, _fakes) = setup_resources();
    let payload = drag(1, DropTarget::Entity { id: 2, parent: None });
    dispatcher.dispatch(names::REORDER_CATEGORIES, payload).await.unwrap();
    assert_eq!(
        category_order(&dispatcher.store().snapshot(), dispatcher.config()),
        vec![2, 1]
    );
}

#[test]
fn test_click_without_drag_dispatches_nothing() {
    let mut session = DragSession::new();
    session.press(7, 0, 0);
    assert!(!session.motion(2, 3));
    session.hover(DropTarget::Parent(2));
    assert!(session.release().is_none());
}

#[tokio::test]
async fn test_checklist_drop_into_other_category_updates_lists() {
    let (dispatcher, fakes) = setup(FeatureConfig::checklist(), checklist_state());
    let payload = drag(10, DropTarget::Parent(2));
    dispatcher.dispatch(names::REORDER_ITEMS, payload).await.unwrap();

    let store = dispatcher.store();
    let item = store.record("checklistitems", 10).unwrap();
    assert_eq!(item.get_i64("categoryid"), Some(2));
    assert_eq!(
        store.record("checklistcategories", 2).unwrap().get("items"),
        Some(&serde_json::json!([12, 10]))
    );
    assert_eq!(
        store.record("checklistcategories", 1).unwrap().get("items"),
        Some(&serde_json::json!([11]))
    );
    assert_eq!(
        fakes.remote.calls_to(&dispatcher.config().methods.reorder_items)[0].args["order"],
        serde_json::json!([12, 10])
    );
}

#[tokio::test]
async fn test_checklist_reorder_within_category() {
    let (dispatcher, _fakes) = setup(FeatureConfig::checklist(), checklist_state());
    let payload = drag(11, DropTarget::Entity { id: 10, parent: Some(1) });
    dispatcher.dispatch(names::REORDER_ITEMS, payload).await.unwrap();
    assert_eq!(
        item_order(&dispatcher.store().snapshot(), dispatcher.config(), 1),
        vec![10, 11]
    );
}
