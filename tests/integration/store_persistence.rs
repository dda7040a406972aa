//! Durable persistence through the sled-backed store.

use super::test_utils::{unit, RecordingRegistry};
use ensemble::api::Ensemble;
use ensemble::config::NewUnitPolicy;
use ensemble::store::SledStore;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn configuration_survives_process_restart() {
    let temp_dir = TempDir::new().unwrap();
    let registry = Arc::new(RecordingRegistry::new(vec![unit("x", "Xray", false)]));

    {
        let store = Arc::new(SledStore::new(temp_dir.path()).unwrap());
        let (ensemble, _events) =
            Ensemble::new(registry.clone(), store.clone(), "self".to_string());
        ensemble.init().await;

        {
            let directory = ensemble.directory();
            let mut directory = directory.lock().await;
            directory.create("Work", "work.png", false).unwrap();
            directory.add_member("Work", "x");
            directory.save().await.unwrap();
        }
        {
            let inventory = ensemble.inventory();
            let mut inventory = inventory.lock().await;
            inventory.add_always_active("x");
            inventory.save().await.unwrap();
        }
        let config = ensemble.config();
        let mut options = config.options();
        options.new_unit_policy = NewUnitPolicy::AddToAll;
        options.toggle_delay_ms = 42;
        config.set_options(options);
        config.save().await.unwrap();
        store.flush().unwrap();
    }

    // A second process over the same database sees everything.
    let store = Arc::new(SledStore::new(temp_dir.path()).unwrap());
    let (ensemble, _events) = Ensemble::new(registry, store, "self".to_string());
    ensemble.init().await;

    let directory = ensemble.directory();
    let directory = directory.lock().await;
    assert!(directory.is_member("Work", "x"));
    let inventory = ensemble.inventory();
    assert!(inventory.lock().await.is_always_active("x"));
    let options = ensemble.config().options();
    assert_eq!(options.new_unit_policy, NewUnitPolicy::AddToAll);
    assert_eq!(options.toggle_delay_ms, 42);
}

#[tokio::test]
async fn later_write_wins_whole_document() {
    // Two surfaces over one database: the last save fully overwrites the
    // context document. Accepted last-write-wins behavior.
    let temp_dir = TempDir::new().unwrap();
    let registry = Arc::new(RecordingRegistry::new(Vec::new()));
    let store = Arc::new(SledStore::new(temp_dir.path()).unwrap());

    let (panel, _panel_events) =
        Ensemble::new(registry.clone(), store.clone(), "self".to_string());
    let (editor, _editor_events) = Ensemble::new(registry, store, "self".to_string());
    panel.init().await;
    editor.init().await;

    {
        let directory = panel.directory();
        let mut directory = directory.lock().await;
        directory.create("FromPanel", "a.png", false).unwrap();
        directory.save().await.unwrap();
    }
    {
        let directory = editor.directory();
        let mut directory = directory.lock().await;
        directory.create("FromEditor", "b.png", false).unwrap();
        directory.save().await.unwrap();
    }

    // The panel reloads and sees only the editor's document.
    panel.notify_configuration_changed().await;
    let directory = panel.directory();
    let directory = directory.lock().await;
    assert!(directory.exists("FromEditor"));
    assert!(!directory.exists("FromPanel"));
}
