//! The volume side of the store: boot, volume CRUD and quota slice admin.

use std::path::PathBuf;
use std::sync::Arc;

use crate::database::Database;
use crate::models::quota_slice::{self, QuotaSlice};
use crate::models::{
    validate_volume_name, GroupVolume, GroupVolumePatch, NewVolume, Resource, SliceFilter,
    UserVolume, UserVolumePatch, Volume,
};
use crate::payload::Payload;
use crate::types::ByteCount;
use crate::{Result, StoreError};

pub const DEFAULT_VOLUME_NAME: &str = "default_ku_space_volume";
pub const DEFAULT_VOLUME_CAP_GB: f64 = 20.0;
pub const MAX_VOLUME_CAP_GB: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root of the local payload backend; `None` stores metadata only.
    pub volumes_root: Option<PathBuf>,
    pub default_volume: String,
    pub default_capacity_gb: f64,
    pub max_capacity_gb: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            volumes_root: None,
            default_volume: DEFAULT_VOLUME_NAME.to_string(),
            default_capacity_gb: DEFAULT_VOLUME_CAP_GB,
            max_capacity_gb: MAX_VOLUME_CAP_GB,
        }
    }
}

/// Volumes, resources and their payloads over one metadata pool.
#[derive(Debug, Clone)]
pub struct FsLite {
    pub(crate) db: Database,
    pub(crate) payload: Payload,
    config: Arc<StoreConfig>,
}

impl FsLite {
    /// Attach the payload backend and make sure the default volume exists.
    pub async fn open(db: Database, config: StoreConfig) -> Result<Self> {
        let payload = match &config.volumes_root {
            Some(root) => Payload::local(root).await?,
            None => Payload::None,
        };
        let store = Self {
            db,
            payload,
            config: Arc::new(config),
        };

        let default = NewVolume::named(
            store.config.default_volume.clone(),
            store.config.default_capacity_gb,
        );
        match store.create_volume(default).await {
            Ok(v) => tracing::info!("created default volume {} ({} GB)", v.name, v.capacity.as_gb()),
            Err(StoreError::AlreadyExists(_)) => {
                store.payload.make_volume(&store.config.default_volume).await?;
            }
            Err(e) => return Err(e),
        }
        Ok(store)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub async fn create_volume(&self, new: NewVolume) -> Result<Volume> {
        validate_volume_name(&new.name)?;
        let capacity =
            new.effective_capacity(self.config.default_capacity_gb, self.config.max_capacity_gb);

        // with a payload backend the directory is authoritative for the path
        let path = match self.payload.volume_dir(&new.name) {
            Some(dir) => dir.display().to_string(),
            None => new.path.clone().unwrap_or_default(),
        };

        let volume = Volume::create(&new.name, &path, new.dynamic, capacity, &*self.db).await?;
        if let Err(e) = self.payload.make_volume(&volume.name).await {
            Volume::delete(volume.vid, &*self.db).await?;
            return Err(e);
        }
        Ok(volume)
    }

    pub async fn volume(&self, name: &str) -> Result<Volume> {
        Volume::by_name(name, &*self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("volume {}", name)))
    }

    /// `Empty` when nothing matches.
    pub async fn select_volumes(&self, name: Option<&str>, vid: Option<i64>) -> Result<Vec<Volume>> {
        let volumes = Volume::select(name, vid, &*self.db).await?;
        if volumes.is_empty() {
            return Err(StoreError::Empty);
        }
        Ok(volumes)
    }

    /// Only empty volumes can go; the default volume never does.
    pub async fn remove_volume(&self, name: &str) -> Result<Volume> {
        if name == self.config.default_volume {
            return Err(StoreError::Forbidden("the default volume cannot be deleted".into()));
        }
        let volume = self.volume(name).await?;

        let mut tx = self.db.begin().await?;
        if Resource::count_in_volume(volume.vid, &mut *tx).await? > 0 {
            return Err(StoreError::BadInput(format!("volume {} is not empty", name)));
        }
        let slices = SliceFilter {
            vids: vec![volume.vid],
            owners: Vec::new(),
        };
        quota_slice::delete::<UserVolume, _>(&slices, &mut *tx).await?;
        quota_slice::delete::<GroupVolume, _>(&slices, &mut *tx).await?;
        Volume::delete(volume.vid, &mut *tx).await?;
        tx.commit().await?;

        self.payload.drop_volume(name).await?;
        Ok(volume)
    }

    async fn select_slices<T: QuotaSlice>(&self, filter: &SliceFilter) -> Result<Vec<T>> {
        let rows = quota_slice::select::<T, _>(filter, &*self.db).await?;
        if rows.is_empty() {
            return Err(StoreError::Empty);
        }
        Ok(rows)
    }

    /// Upsert a slice and overwrite the given fields.
    async fn patch_slice<T: QuotaSlice>(
        &self,
        vid: i64,
        owner: i64,
        quota: Option<ByteCount>,
        usage: Option<ByteCount>,
    ) -> Result<T> {
        if quota.is_some_and(|q| q < ByteCount::ZERO) || usage.is_some_and(|u| u < ByteCount::ZERO)
        {
            return Err(StoreError::BadInput("quota and usage must be >= 0".into()));
        }
        if Volume::select(None, Some(vid), &*self.db).await?.is_empty() {
            return Err(StoreError::NotFound(format!("volume {}", vid)));
        }

        let mut tx = self.db.begin().await?;
        quota_slice::ensure::<T, _>(vid, owner, &mut *tx).await?;
        quota_slice::set::<T, _>(vid, owner, quota, usage, &mut *tx).await?;
        let (q, u): (i64, i64) = sqlx::query_as(&format!(
            "SELECT quota_bytes, usage_bytes FROM {} WHERE vid = ?1 AND {} = ?2",
            T::TABLE,
            T::OWNER
        ))
        .bind(vid)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;
        if q > 0 && u > q {
            return Err(StoreError::BadInput(format!(
                "usage {} exceeds quota {}",
                ByteCount::new(u),
                ByteCount::new(q)
            )));
        }
        let row = quota_slice::get::<T, _>(vid, owner, &mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} {}/{}", T::TABLE, vid, owner)))?;
        tx.commit().await?;
        Ok(row)
    }

    /// A bare delete would wipe every slice, so an empty filter is refused.
    async fn delete_slices<T: QuotaSlice>(&self, filter: &SliceFilter) -> Result<u64> {
        if filter.is_empty() {
            return Err(StoreError::BadInput("at least one id filter is required".into()));
        }
        quota_slice::delete::<T, _>(filter, &*self.db).await
    }

    pub async fn select_user_volumes(&self, filter: &SliceFilter) -> Result<Vec<UserVolume>> {
        self.select_slices(filter).await
    }

    pub async fn patch_user_volume(&self, patch: &UserVolumePatch) -> Result<UserVolume> {
        self.patch_slice(patch.vid, patch.uid, patch.quota, patch.usage)
            .await
    }

    pub async fn delete_user_volumes(&self, filter: &SliceFilter) -> Result<u64> {
        self.delete_slices::<UserVolume>(filter).await
    }

    pub async fn select_group_volumes(&self, filter: &SliceFilter) -> Result<Vec<GroupVolume>> {
        self.select_slices(filter).await
    }

    pub async fn patch_group_volume(&self, patch: &GroupVolumePatch) -> Result<GroupVolume> {
        self.patch_slice(patch.vid, patch.gid, patch.quota, patch.usage)
            .await
    }

    pub async fn delete_group_volumes(&self, filter: &SliceFilter) -> Result<u64> {
        self.delete_slices::<GroupVolume>(filter).await
    }
}
