mod common;

use beproductive_core::{
    AuthContext, FeatureKind, GoalSpan, ItemCollectionManager, ItemDraft, ItemPayload,
    LocalStore, Location, RemoteStore,
};
use common::{at, free, ids, note_record, premium, titles, wait_for, Harness, USER};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn load_orders_pinned_first_then_by_recency() {
    let harness = Harness::new().await;
    harness.seed_local_note("local-1", "Note a", true, 1).await;
    harness.seed_local_note("local-2", "Note b", false, 5).await;
    harness.seed_remote_note("c", "Note c", true, 3).await;

    let manager = harness.manager(FeatureKind::Notes, premium());
    let outcome = manager.load_all().await;

    assert!(outcome.warnings.is_empty());
    assert_eq!(ids(&outcome.items), vec!["c", "local-1", "local-2"]);
    assert_eq!(outcome.items[0].location, Location::Remote);
    assert_eq!(outcome.items[1].location, Location::Local);
}

#[tokio::test]
async fn remote_pushes_reach_the_view() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;
    assert!(manager.is_subscribed());
    let mut rx = manager.subscribe();

    harness.seed_remote_note("r1", "From tablet", false, 50).await;
    let foreign = note_record("Someone else", false, 60)
        .to_document_fields("user-2")
        .unwrap();
    harness
        .remote
        .inner
        .set_doc(FeatureKind::Notes.collection(), "r2", foreign)
        .await
        .unwrap();

    let view = wait_for(&mut rx, |items| items.iter().any(|item| item.id == "r1")).await;
    assert_eq!(titles(&view), vec!["From tablet"]);
}

#[tokio::test]
async fn remote_pushes_leave_local_items_alone() {
    let harness = Harness::new().await;
    harness.seed_local_note("local-1", "Offline note", false, 10).await;
    harness.seed_remote_note("r1", "Cloud note", false, 20).await;

    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;
    let mut rx = manager.subscribe();

    harness
        .remote
        .inner
        .delete_doc(FeatureKind::Notes.collection(), "r1")
        .await
        .unwrap();

    let view = wait_for(&mut rx, |items| items.iter().all(|item| item.id != "r1")).await;
    assert_eq!(ids(&view), vec!["local-1"]);
}

#[tokio::test]
async fn unsubscribe_stops_following_the_remote_store() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;
    assert_eq!(harness.remote.inner.active_subscriptions(), 1);

    manager.unsubscribe();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!manager.is_subscribed());
    assert_eq!(harness.remote.inner.active_subscriptions(), 0);

    harness.seed_remote_note("r1", "Late arrival", false, 5).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(manager.get("r1").is_none());
}

#[tokio::test]
async fn dropping_the_manager_releases_the_live_query() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;
    assert_eq!(harness.remote.inner.active_subscriptions(), 1);

    drop(manager);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.remote.inner.active_subscriptions(), 0);
}

#[tokio::test]
async fn load_fails_soft_on_corrupt_files_and_remote_errors() {
    let harness = Harness::new().await;
    harness.seed_local_note("local-1", "Healthy", false, 10).await;
    harness
        .local
        .write_text("note-local-2.json", "{ not json")
        .await
        .unwrap();
    harness.remote.fail_query.store(true, Ordering::SeqCst);

    let manager = harness.manager(FeatureKind::Notes, premium());
    let outcome = manager.load_all().await;

    assert_eq!(ids(&outcome.items), vec!["local-1"]);
    assert_eq!(outcome.warnings.len(), 2);
    assert!(outcome
        .warnings
        .iter()
        .any(|warning| warning.location == Location::Local && warning.message.contains("local-2")));
    assert!(outcome
        .warnings
        .iter()
        .any(|warning| warning.location == Location::Remote));
    assert!(!manager.is_subscribed());
}

#[tokio::test]
async fn failing_local_listing_keeps_previous_local_items() {
    let harness = Harness::new().await;
    harness.seed_local_note("local-1", "Kept", false, 10).await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    harness.local.fail_list.store(true, Ordering::SeqCst);
    let outcome = manager.load_all().await;

    assert_eq!(ids(&outcome.items), vec!["local-1"]);
    assert_eq!(outcome.warnings.len(), 1);
}

#[tokio::test]
async fn signed_out_session_only_sees_local_items() {
    let harness = Harness::new().await;
    harness.seed_local_note("local-1", "Device note", false, 10).await;
    harness.seed_remote_note("r1", "Cloud note", false, 20).await;

    let manager = harness.manager(FeatureKind::Notes, AuthContext::anonymous());
    let outcome = manager.load_all().await;

    assert_eq!(ids(&outcome.items), vec!["local-1"]);
    assert_eq!(harness.remote.inner.active_subscriptions(), 0);
}

#[tokio::test]
async fn local_only_manager_works_without_remote_store() {
    let harness = Harness::new().await;
    let local: Arc<dyn LocalStore> = harness.local.clone();
    let manager = ItemCollectionManager::new(
        FeatureKind::Notes,
        free(),
        Default::default(),
        local,
        None,
    );
    manager.load_all().await;

    let note = manager
        .create(ItemDraft::note("Offline only", ""), Location::Local)
        .await
        .unwrap();
    assert_eq!(ids(&manager.items()), vec![note.id]);
}

#[tokio::test]
async fn goals_round_trip_through_both_stores() {
    let harness = Harness::new().await;
    let target = at(2_000_000_000);
    let manager = harness.manager(FeatureKind::Goals, premium());
    manager.load_all().await;

    let local = manager
        .create(ItemDraft::goal("Run marathon", target, false), Location::Local)
        .await
        .unwrap();
    let remote = manager
        .create(ItemDraft::goal("Quit sugar", at(1_600_000_000), true), Location::Remote)
        .await
        .unwrap();
    assert!(local.id.starts_with("local-"));

    let reloaded = harness.manager(FeatureKind::Goals, premium());
    let outcome = reloaded.load_all().await;
    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.items.len(), 2);

    let remote_doc = harness
        .remote
        .get_doc(FeatureKind::Goals.collection(), &remote.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remote_doc.fields.get("userId").unwrap(), USER);
    assert_eq!(remote_doc.fields.get("isCounter").unwrap(), true);

    let goal = reloaded.get(&local.id).unwrap();
    let ItemPayload::Goal { date, is_counter } = goal.payload else {
        panic!("expected goal payload");
    };
    assert_eq!(date, target);
    let span = GoalSpan::between(at(2_000_000_000 - 86_400), date, is_counter);
    assert_eq!(span.days, 1);
    assert!(!span.is_completed(is_counter));
}
