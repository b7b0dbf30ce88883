use bookit::{
    FeatureConfig, Store,
    bootstrap::{Snapshot, load_state},
    state::{ChecklistItem, Item},
};
use serde_json::json;

fn write_snapshot(dir: &tempfile::TempDir, snapshot: serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&snapshot).unwrap()).unwrap();
    path
}

#[test]
fn test_load_resources_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_snapshot(
        &dir,
        json!({
            "rows": [
                {"data-region": "category", "data-categoryid": "2", "data-name": "Furniture",
                 "data-active": "1"},
                {"data-region": "item", "data-itemid": "9", "data-item-categoryid": "2",
                 "data-name": "Chair", "data-item-amount": "40", "data-item-amountirrelevant": "0"},
                {"data-region": "category", "data-categoryid": "1", "data-name": "Tech",
                 "data-active": "0"},
                {"data-region": "item", "data-itemid": "7", "data-item-categoryid": "1",
                 "data-name": "Beamer"}
            ],
            "scalars": {"activeRoom": 0}
        }),
    );

    let snapshot = Snapshot::from_path(&path).unwrap();
    let store = Store::new(load_state(&FeatureConfig::resources(), &snapshot).unwrap());

    let chair: Item = store.entity(9).unwrap().expect("chair loaded");
    assert_eq!(chair.amount, 40);
    assert!(!chair.amountirrelevant);
    assert_eq!(chair.categoryid, 2);

    // Document order becomes the display order
    let snapshot = store.snapshot();
    assert_eq!(snapshot.record("categories", 2).unwrap().get_i64("sortorder"), Some(0));
    assert_eq!(snapshot.record("categories", 1).unwrap().get_i64("sortorder"), Some(1));
    assert_eq!(snapshot.record("categories", 1).unwrap().get_bool("active"), Some(false));
    assert_eq!(store.get("activeRoom"), Some(json!(0)));
}

#[test]
fn test_load_checklist_with_due_dates() {
    let snapshot: Snapshot = serde_json::from_value(json!({
        "rows": [
            {"data-region": "category", "data-categoryid": "1", "data-name": "Before",
             "data-items": "11,10"},
            {"data-region": "item", "data-itemid": "10", "data-item-categoryid": "1",
             "data-name": "Book room", "data-item-duedate": "1700000000",
             "data-item-roomids": "3, 4"},
            {"data-region": "item", "data-itemid": "11", "data-item-categoryid": "1",
             "data-name": "Catering"}
        ]
    }))
    .unwrap();
    let state = load_state(&FeatureConfig::checklist(), &snapshot).unwrap();

    let item: ChecklistItem = state.entity(10).unwrap().unwrap();
    assert_eq!(
        item.due_date().map(|d| d.format("%Y-%m-%d").to_string()),
        Some("2023-11-14".to_owned())
    );
    assert_eq!(state.record("checklistitems", 10).unwrap().get("roomids"), Some(&json!([3, 4])));
    assert_eq!(
        state.record("checklistcategories", 1).unwrap().get("items"),
        Some(&json!([11, 10]))
    );
}

#[test]
fn test_duplicate_rows_are_rejected() {
    let snapshot: Snapshot = serde_json::from_value(json!({
        "rows": [
            {"data-region": "category", "data-categoryid": "1", "data-name": "Tech"},
            {"data-region": "category", "data-categoryid": "1", "data-name": "Tech again"}
        ]
    }))
    .unwrap();
    let err = load_state(&FeatureConfig::resources(), &snapshot).unwrap_err();
    assert!(err.is_integrity_error());
    assert_eq!(err.module(), "bootstrap");
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Snapshot::from_path(dir.path().join("absent.json")).unwrap_err();
    assert!(err.is_io_error());
}
