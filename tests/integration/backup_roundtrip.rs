//! Backup export/import round trips and failure semantics.

use super::test_utils::{harness, unit, Harness, RecordingRegistry};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ensemble::error::ImportError;
use ensemble::store::{KeyValueStore, KEY_CONTEXTS};

async fn populated(h: &Harness) {
    {
        let directory = h.ensemble.directory();
        let mut directory = directory.lock().await;
        directory.create("Work", "work.png", true).unwrap();
        directory.create("Play", "play.png", false).unwrap();
        directory.add_member("Work", "x");
        directory.add_member("Work", "y");
        directory.add_member("Play", "y");
        directory.save().await.unwrap();
    }
    let inventory = h.ensemble.inventory();
    let mut inventory = inventory.lock().await;
    inventory.add_always_active("z");
    inventory.save().await.unwrap();
}

fn universe() -> Vec<ensemble::types::Unit> {
    vec![
        unit("x", "Xray", false),
        unit("y", "Yank", false),
        unit("z", "Zoo", true),
    ]
}

#[tokio::test]
async fn import_of_export_reproduces_configuration() {
    let h = harness(RecordingRegistry::new(universe())).await;
    populated(&h).await;

    let blob = h.ensemble.export_backup().await.unwrap();
    let original_contexts = {
        let directory = h.ensemble.directory();
        let directory = directory.lock().await;
        directory.contexts().to_vec()
    };

    // Wipe everything, then restore.
    {
        let directory = h.ensemble.directory();
        let mut directory = directory.lock().await;
        directory.set_all(Vec::new());
        directory.save().await.unwrap();
        let inventory = h.ensemble.inventory();
        let mut inventory = inventory.lock().await;
        inventory.set_always_active(Vec::new());
        inventory.save().await.unwrap();
    }

    let report = h.ensemble.import_backup(&blob).await.unwrap();
    assert!(report.missing_unit_ids.is_empty());

    let directory = h.ensemble.directory();
    let directory = directory.lock().await;
    assert_eq!(directory.contexts(), original_contexts.as_slice());
    let inventory = h.ensemble.inventory();
    assert_eq!(
        inventory.lock().await.always_active_ids(),
        ["z".to_string()]
    );
}

#[tokio::test]
async fn export_builds_name_dictionary_from_inventory() {
    let h = harness(RecordingRegistry::new(universe())).await;
    populated(&h).await;
    {
        // Reference an id the registry no longer knows.
        let directory = h.ensemble.directory();
        let mut directory = directory.lock().await;
        directory.add_member("Play", "ghost");
        directory.save().await.unwrap();
    }

    let blob = h.ensemble.export_backup().await.unwrap();
    let decoded: serde_json::Value =
        serde_json::from_slice(&BASE64.decode(blob).unwrap()).unwrap();

    assert_eq!(decoded["version"], 1);
    let names = decoded["nameDictionary"].as_object().unwrap();
    assert_eq!(names["x"], "Xray");
    assert_eq!(names["y"], "Yank");
    assert_eq!(names["z"], "Zoo");
    assert_eq!(names["ghost"], "");
}

#[tokio::test]
async fn import_reports_missing_unit_ids() {
    let h = harness(RecordingRegistry::new(universe())).await;
    populated(&h).await;
    let blob = h.ensemble.export_backup().await.unwrap();

    // Shrink the universe before importing.
    h.registry.remove_unit("y");
    h.ensemble.notify_configuration_changed().await;

    let report = h.ensemble.import_backup(&blob).await.unwrap();
    assert_eq!(report.missing_unit_ids, vec!["y".to_string()]);

    // Missing references are kept, not dropped: membership survives for
    // a unit that may be reinstalled later.
    let directory = h.ensemble.directory();
    let directory = directory.lock().await;
    assert!(directory.is_member("Work", "y"));
}

#[tokio::test]
async fn malformed_import_leaves_state_untouched() {
    let h = harness(RecordingRegistry::new(universe())).await;
    populated(&h).await;
    let persisted_before = h.store.get(KEY_CONTEXTS).await.unwrap();

    let garbage_base64 = "@@@ not base64 @@@";
    assert!(matches!(
        h.ensemble.import_backup(garbage_base64).await,
        Err(ImportError::Decode(_))
    ));

    let garbage_json = BASE64.encode("{\"version\": 1");
    assert!(matches!(
        h.ensemble.import_backup(&garbage_json).await,
        Err(ImportError::Parse(_))
    ));

    let incomplete = BASE64.encode(r#"{"version":1,"contexts":[],"alwaysActive":[]}"#);
    assert!(matches!(
        h.ensemble.import_backup(&incomplete).await,
        Err(ImportError::MissingField("nameDictionary"))
    ));

    let directory = h.ensemble.directory();
    let directory = directory.lock().await;
    assert_eq!(directory.contexts().len(), 2);
    assert!(directory.is_member("Work", "x"));
    assert_eq!(h.store.get(KEY_CONTEXTS).await.unwrap(), persisted_before);
}
