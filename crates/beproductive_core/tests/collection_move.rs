mod common;

use beproductive_core::model::record::local_file_name;
use beproductive_core::{
    BulkOperation, CoreError, FeatureKind, ItemDraft, ItemPatch, LocalStore, Location,
    RemoteStore,
};
use common::{premium, Harness};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn move_round_trip_preserves_content() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    let original = manager
        .create(ItemDraft::note("Travel plans", "Lisbon"), Location::Local)
        .await
        .unwrap();
    let original = manager.toggle_pin(&original.id).await.unwrap();

    let remote = manager
        .move_location(&original.id, Location::Remote)
        .await
        .unwrap();
    assert_eq!(remote.location, Location::Remote);
    assert_ne!(remote.id, original.id);
    assert!(remote.content_eq(&original));
    assert_eq!(remote.timestamp, original.timestamp);
    assert!(manager.get(&original.id).is_none());
    assert!(harness
        .local
        .read_text(&local_file_name(FeatureKind::Notes, &original.id))
        .await
        .is_err());

    let back = manager
        .move_location(&remote.id, Location::Local)
        .await
        .unwrap();
    assert_eq!(back.location, Location::Local);
    assert!(back.content_eq(&original));
    assert!(back.pinned);
    assert!(harness
        .remote
        .get_doc(FeatureKind::Notes.collection(), &remote.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(manager.items().len(), 1);
}

#[tokio::test]
async fn moving_to_the_same_location_is_a_no_op() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    let note = manager
        .create(ItemDraft::note("Stay put", ""), Location::Local)
        .await
        .unwrap();
    let same = manager
        .move_location(&note.id, Location::Local)
        .await
        .unwrap();
    assert_eq!(same, note);
}

#[tokio::test]
async fn failed_remote_recreate_restores_the_local_item() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    let note = manager
        .create(ItemDraft::note("Fragile note", "keep me"), Location::Local)
        .await
        .unwrap();
    harness.remote.fail_add.store(true, Ordering::SeqCst);

    let err = manager
        .move_location(&note.id, Location::Remote)
        .await
        .unwrap_err();
    let CoreError::PartialFailure(partial) = &err else {
        panic!("expected partial failure, got {err}");
    };
    assert_eq!(partial.operation, BulkOperation::Move);
    assert_eq!(partial.failed_ids, vec![note.id.clone()]);

    let restored = manager.get(&note.id).unwrap();
    assert_eq!(restored.location, Location::Local);
    assert!(restored.content_eq(&note));
    let raw = harness
        .local
        .read_text(&local_file_name(FeatureKind::Notes, &note.id))
        .await
        .unwrap();
    assert!(raw.contains("keep me"));
    assert!(err
        .notification(FeatureKind::Notes)
        .message
        .starts_with("1 of 1 note could not be moved"));
}

#[tokio::test]
async fn failed_local_recreate_restores_the_remote_document() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    let note = manager
        .create(ItemDraft::note("Cloud only", ""), Location::Remote)
        .await
        .unwrap();
    harness.local.fail_writes.store(true, Ordering::SeqCst);

    let err = manager
        .move_location(&note.id, Location::Local)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PartialFailure(_)));

    let restored = manager.get(&note.id).unwrap();
    assert_eq!(restored.location, Location::Remote);
    assert!(harness
        .remote
        .get_doc(FeatureKind::Notes.collection(), &note.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn failed_restore_drops_the_item_from_the_view() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    let note = manager
        .create(ItemDraft::note("Unlucky note", ""), Location::Local)
        .await
        .unwrap();
    harness.remote.fail_add.store(true, Ordering::SeqCst);
    harness.local.fail_writes.store(true, Ordering::SeqCst);

    let err = manager
        .move_location(&note.id, Location::Remote)
        .await
        .unwrap_err();
    let CoreError::PartialFailure(partial) = err else {
        panic!("expected partial failure");
    };
    assert!(partial.detail.contains("restore"));
    assert!(manager.get(&note.id).is_none());
}

#[tokio::test]
async fn origin_delete_failure_leaves_item_untouched() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    let note = manager
        .create(ItemDraft::note("Locked note", ""), Location::Remote)
        .await
        .unwrap();
    harness.remote.fail_doc(note.id.clone());

    let err = manager
        .move_location(&note.id, Location::Local)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Remote(_)));
    assert_eq!(manager.get(&note.id).unwrap(), note);
}

#[tokio::test]
async fn update_writes_to_the_owning_store_only() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    let note = manager
        .create(ItemDraft::note("Draft title", "v1"), Location::Remote)
        .await
        .unwrap();
    let updated = manager
        .update(
            &note.id,
            ItemPatch {
                title: Some("Final title".to_string()),
                ..ItemPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Final title");
    assert!(updated.timestamp >= note.timestamp);

    let doc = harness
        .remote
        .get_doc(FeatureKind::Notes.collection(), &note.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.fields.get("title").unwrap(), "Final title");
    assert!(harness.local.list("note-").await.unwrap().is_empty());

    let err = manager
        .update("local-404", ItemPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn failed_update_leaves_view_unchanged() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;

    let note = manager
        .create(ItemDraft::note("Original", ""), Location::Local)
        .await
        .unwrap();
    harness.local.fail_writes.store(true, Ordering::SeqCst);

    let err = manager
        .update(
            &note.id,
            ItemPatch {
                title: Some("Changed".to_string()),
                ..ItemPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::StoreIo(_)));
    assert_eq!(manager.get(&note.id).unwrap().title, "Original");
}

#[tokio::test]
async fn clearing_a_remote_category_reaches_the_document() {
    let harness = Harness::new().await;
    let manager = harness.manager(FeatureKind::Notes, premium());
    manager.load_all().await;
    manager.create_category("Work").await.unwrap();

    let note = manager
        .create(
            ItemDraft::note("Quarterly plan", "").with_category("Work"),
            Location::Remote,
        )
        .await
        .unwrap();
    let updated = manager
        .update(
            &note.id,
            ItemPatch {
                category: Some(None),
                ..ItemPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.category, None);

    let doc = harness
        .remote
        .get_doc(FeatureKind::Notes.collection(), &note.id)
        .await
        .unwrap()
        .unwrap();
    assert!(doc.fields.get("category").map_or(true, |value| value.is_null()));

    let fresh = harness.manager(FeatureKind::Notes, premium());
    fresh.load_all().await;
    assert_eq!(fresh.get(&note.id).unwrap().category, None);
    fresh.unsubscribe();

    let report = manager.delete_category("Work").await.unwrap();
    assert!(report.items.succeeded.is_empty());
    assert!(manager.get(&note.id).is_some());
}
