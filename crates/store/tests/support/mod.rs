//! Shared setup for store integration tests
#![allow(dead_code)]

use bytes::Bytes;
use fsl_store::models::{NewVolume, Resource, Volume};
use fsl_store::{Database, FsLite, Owner, PoolConfig, StoreConfig, Upload};
use tempfile::TempDir;

/// A store over a file database and a local payload root, both in a tempdir.
pub async fn setup_store() -> (FsLite, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir, true).await;
    (store, temp_dir)
}

/// Same, without a payload backend.
pub async fn setup_metadata_only() -> (FsLite, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir, false).await;
    (store, temp_dir)
}

pub async fn open(temp_dir: &TempDir, local: bool) -> FsLite {
    let db = Database::connect(
        &temp_dir.path().join("fslite.db"),
        PoolConfig {
            max_open: 4,
            max_idle: 1,
            ..PoolConfig::default()
        },
    )
    .await
    .unwrap();
    let config = StoreConfig {
        volumes_root: local.then(|| temp_dir.path().join("volumes")),
        ..StoreConfig::default()
    };
    FsLite::open(db, config).await.unwrap()
}

pub async fn volume(store: &FsLite, name: &str, capacity_gb: f64) -> Volume {
    store
        .create_volume(NewVolume::named(name, capacity_gb))
        .await
        .unwrap()
}

pub fn upload(vname: &str, name: &str, uid: i64) -> Upload {
    Upload {
        vname: vname.into(),
        name: name.into(),
        owner: Owner { uid, gid: uid },
    }
}

pub async fn put(store: &FsLite, vname: &str, name: &str, uid: i64, data: &'static [u8]) -> Resource {
    store
        .insert(upload(vname, name, uid), Bytes::from_static(data))
        .await
        .unwrap()
}
