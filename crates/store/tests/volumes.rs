//! Integration tests for volumes, quota slices and the orphan reaper

mod support;

use fsl_store::models::{GroupVolumePatch, NewVolume, SliceFilter, UserVolumePatch};
use fsl_store::types::ByteCount;
use fsl_store::{StoreError, DEFAULT_VOLUME_NAME};

#[tokio::test]
async fn test_default_volume_exists_at_boot() {
    let (store, temp) = support::setup_store().await;
    let volumes = store
        .select_volumes(Some(DEFAULT_VOLUME_NAME), None)
        .await
        .unwrap();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].capacity, ByteCount::from_gb(20.0));
    assert!(temp.path().join("volumes").join(DEFAULT_VOLUME_NAME).is_dir());

    // reopening is idempotent
    let again = support::open(&temp, true).await;
    assert_eq!(again.select_volumes(None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_volume_rules() {
    let (store, temp) = support::setup_store().await;

    let v = store
        .create_volume(NewVolume {
            name: "v1".into(),
            path: Some("/tmp/v1".into()),
            dynamic: false,
            capacity: Some(1.0),
        })
        .await
        .unwrap();
    assert_eq!(v.capacity, ByteCount::from_gb(1.0));
    assert_eq!(v.usage, ByteCount::ZERO);
    assert_eq!(
        v.path,
        temp.path().join("volumes").join("v1").display().to_string()
    );

    let over = support::volume(&store, "huge", 1000.0).await;
    assert_eq!(over.capacity, ByteCount::from_gb(20.0));

    let dup = store.create_volume(NewVolume::named("v1", 1.0)).await;
    assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));

    let bad = store.create_volume(NewVolume::named("bad name", 1.0)).await;
    assert!(matches!(bad, Err(StoreError::BadInput(_))));

    let json = serde_json::to_value(&v).unwrap();
    assert_eq!(json["capacity"], 1.0);
    assert_eq!(json["usage"], 0.0);
    assert!(json.get("createdAt").is_some());
}

#[tokio::test]
async fn test_remove_volume() {
    let (store, temp) = support::setup_store().await;
    support::volume(&store, "v1", 1.0).await;
    support::put(&store, "v1", "a", 1000, b"x").await;

    let busy = store.remove_volume("v1").await;
    assert!(matches!(busy, Err(StoreError::BadInput(_))));

    store.remove("v1", "a", None).await.unwrap();
    store.remove_volume("v1").await.unwrap();
    assert!(!temp.path().join("volumes/v1").exists());
    assert!(matches!(
        store.select_volumes(Some("v1"), None).await,
        Err(StoreError::Empty)
    ));

    assert!(matches!(
        store.remove_volume(DEFAULT_VOLUME_NAME).await,
        Err(StoreError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_slice_patch_and_delete() {
    let (store, _temp) = support::setup_store().await;
    let v = support::volume(&store, "v1", 1.0).await;

    let uv = store
        .patch_user_volume(&UserVolumePatch {
            vid: v.vid,
            uid: 1000,
            quota: Some(ByteCount::from_gb(0.5)),
            usage: None,
        })
        .await
        .unwrap();
    assert_eq!(uv.quota, ByteCount::from_gb(0.5));

    let bad = store
        .patch_user_volume(&UserVolumePatch {
            vid: v.vid,
            uid: 1000,
            quota: None,
            usage: Some(ByteCount::from_gb(0.9)),
        })
        .await;
    assert!(matches!(bad, Err(StoreError::BadInput(_))));

    let missing = store
        .patch_user_volume(&UserVolumePatch {
            vid: 9999,
            uid: 1000,
            quota: None,
            usage: None,
        })
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));

    store
        .patch_group_volume(&GroupVolumePatch {
            vid: v.vid,
            gid: 1000,
            quota: Some(ByteCount::new(3)),
            usage: None,
        })
        .await
        .unwrap();
    // group quota applies to uploads charged to gid 1000
    let denied = store
        .insert(
            support::upload("v1", "a", 1000),
            bytes::Bytes::from_static(b"12345"),
        )
        .await;
    assert!(matches!(denied, Err(StoreError::QuotaExceeded(_))));

    assert!(store
        .delete_user_volumes(&SliceFilter::default())
        .await
        .is_err());
    let removed = store
        .delete_user_volumes(&SliceFilter {
            vids: vec![],
            owners: vec![1000],
        })
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(matches!(
        store.select_user_volumes(&SliceFilter::default()).await,
        Err(StoreError::Empty)
    ));
}

#[tokio::test]
async fn test_reaper_finds_unreferenced_payloads() {
    let (store, temp) = support::setup_store().await;
    support::volume(&store, "v1", 1.0).await;
    support::put(&store, "v1", "kept", 1000, b"x").await;
    std::fs::write(temp.path().join("volumes/v1/leaked"), b"y").unwrap();

    let orphans = store.orphans().await.unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].to_string(), "v1/leaked");

    let reaped = store.reap().await.unwrap();
    assert_eq!(reaped, orphans);
    assert!(!temp.path().join("volumes/v1/leaked").exists());
    assert!(temp.path().join("volumes/v1/kept").exists());
    assert!(store.orphans().await.unwrap().is_empty());
}
