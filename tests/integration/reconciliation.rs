//! End-to-end reconciliation behavior: phase ordering, sequencing,
//! throttling, and the single-flight guard.

use super::test_utils::{drain_events, harness, unit, zero_delay, Harness, RecordingRegistry};
use ensemble::directory::ContextStatus;
use ensemble::error::EngineError;
use ensemble::events::{CoreEvent, FeedbackKind};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn work_context(h: &Harness, members: &[&str]) {
    let directory = h.ensemble.directory();
    let mut directory = directory.lock().await;
    directory.create("Work", "work.png", false).unwrap();
    for member in members {
        directory.add_member("Work", member);
    }
    directory.save().await.unwrap();
}

async fn always_active(h: &Harness, ids: &[&str]) {
    let inventory = h.ensemble.inventory();
    let mut inventory = inventory.lock().await;
    for id in ids {
        inventory.add_always_active(id);
    }
    inventory.save().await.unwrap();
}

#[tokio::test]
async fn switch_applies_disable_phase_first() {
    let h = harness(RecordingRegistry::new(vec![
        unit("w", "writer", true),
        unit("x", "xray", false),
        unit("y", "yank", false),
        unit("z", "zoo", false),
    ]))
    .await;
    zero_delay(&h).await;
    work_context(&h, &["x", "y"]).await;
    always_active(&h, &["z"]).await;

    let report = h.ensemble.switch_context("Work").await.unwrap();
    assert_eq!(report.disabled, 1);
    assert_eq!(report.enabled, 3);

    let calls = h.registry.calls();
    assert_eq!(calls.len(), 4);
    // The only disable call comes before every enable call.
    assert_eq!(calls[0], ("w".to_string(), false));
    let enabled: HashSet<String> = calls[1..]
        .iter()
        .map(|(id, enable)| {
            assert!(*enable);
            id.clone()
        })
        .collect();
    let expected: HashSet<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
    assert_eq!(enabled, expected);

    assert_eq!(h.registry.enabled_ids().len(), 3);
}

#[tokio::test]
async fn toggles_never_overlap() {
    let h = harness(
        RecordingRegistry::new(vec![
            unit("a", "able", true),
            unit("b", "baker", true),
            unit("c", "charlie", false),
            unit("d", "dog", false),
        ])
        .with_toggle_duration(Duration::from_millis(5)),
    )
    .await;
    zero_delay(&h).await;
    work_context(&h, &["c", "d"]).await;

    h.ensemble.switch_context("Work").await.unwrap();
    assert_eq!(h.registry.calls().len(), 4);
    assert!(!h.registry.overlapped());
}

#[tokio::test]
async fn delay_separates_consecutive_toggles() {
    let h = harness(RecordingRegistry::new(vec![
        unit("a", "able", false),
        unit("b", "baker", false),
        unit("c", "charlie", false),
    ]))
    .await;
    let config = h.ensemble.config();
    let mut options = config.options();
    options.toggle_delay_ms = 20;
    config.set_options(options);
    config.save().await.unwrap();

    let started = Instant::now();
    let report = h.ensemble.enable_all().await.unwrap();
    assert_eq!(report.enabled, 3);
    // Two gaps between three sequential calls.
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn second_request_while_busy_is_rejected() {
    let h = harness(
        RecordingRegistry::new(vec![unit("a", "able", true), unit("b", "baker", true)])
            .with_toggle_duration(Duration::from_millis(40)),
    )
    .await;
    zero_delay(&h).await;

    let ensemble = Arc::new(h.ensemble);
    let first = tokio::spawn({
        let ensemble = ensemble.clone();
        async move { ensemble.disable_all().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(matches!(
        ensemble.disable_all().await,
        Err(EngineError::Busy)
    ));

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.disabled, 2);
    assert!(!h.registry.overlapped());

    // Guard released: a fresh request goes through (and finds nothing
    // left to disable).
    let after = ensemble.disable_all().await.unwrap();
    assert_eq!(after.disabled, 0);
}

#[tokio::test]
async fn unknown_context_succeeds_trivially() {
    let h = harness(RecordingRegistry::new(vec![unit("a", "able", true)])).await;
    zero_delay(&h).await;

    let report = h.ensemble.switch_context("Nowhere").await.unwrap();
    assert_eq!(report.disabled, 0);
    assert_eq!(report.enabled, 0);
    assert!(h.registry.calls().is_empty());
}

#[tokio::test]
async fn deactivate_spares_always_active_members() {
    let h = harness(RecordingRegistry::new(vec![
        unit("x", "xray", true),
        unit("y", "yank", true),
        unit("z", "zoo", true),
    ]))
    .await;
    zero_delay(&h).await;
    work_context(&h, &["x", "y", "z"]).await;
    always_active(&h, &["z"]).await;

    h.ensemble.deactivate_context("Work").await.unwrap();

    let calls = h.registry.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(_, enable)| !enable));
    assert!(!calls.iter().any(|(id, _)| id == "z"));
    assert_eq!(h.registry.enabled_ids(), vec!["z".to_string()]);
}

#[tokio::test]
async fn reconciliation_emits_feedback() {
    let h = harness(RecordingRegistry::new(vec![unit("a", "able", false)])).await;
    zero_delay(&h).await;
    drain_events(&h);

    h.ensemble.enable_all().await.unwrap();
    assert!(drain_events(&h)
        .contains(&CoreEvent::Feedback(FeedbackKind::Reconciling)));
}

#[tokio::test]
async fn statuses_follow_switch() {
    let h = harness(RecordingRegistry::new(vec![
        unit("x", "xray", false),
        unit("y", "yank", false),
        unit("w", "writer", true),
    ]))
    .await;
    zero_delay(&h).await;
    work_context(&h, &["x", "y"]).await;

    h.ensemble.switch_context("Work").await.unwrap();

    let statuses = h.ensemble.context_statuses().await.unwrap();
    assert_eq!(statuses, vec![("Work".to_string(), ContextStatus::Enabled)]);
}
