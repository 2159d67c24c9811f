//! Capacity and quota-slice accounting for byte-moving mutations.
//!
//! All counters are bytes. [`claim`] and [`release`] run on the caller's
//! connection so they commit or roll back together with the resource row.

use sqlx::SqliteConnection;

use crate::models::quota_slice::{self, GroupVolume, UserVolume};
use crate::models::Volume;
use crate::types::ByteCount;
use crate::{Result, StoreError};

/// Who a claim is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: i64,
    pub gid: i64,
}

/// Reserve `size` on the volume, the owner's user slice (created on first
/// use) and the owner's group slice (only if one was provisioned).
pub(crate) async fn claim(
    conn: &mut SqliteConnection,
    volume: &Volume,
    owner: Owner,
    size: ByteCount,
) -> Result<()> {
    if !Volume::try_claim(volume.vid, size, &mut *conn).await? {
        return Err(StoreError::QuotaExceeded(format!(
            "{} has no room for {}",
            volume.name, size
        )));
    }

    quota_slice::ensure::<UserVolume, _>(volume.vid, owner.uid, &mut *conn).await?;
    if !quota_slice::try_claim::<UserVolume, _>(volume.vid, owner.uid, size, &mut *conn).await? {
        return Err(StoreError::QuotaExceeded(format!(
            "uid {} quota on {}",
            owner.uid, volume.name
        )));
    }

    let group = quota_slice::get::<GroupVolume, _>(volume.vid, owner.gid, &mut *conn).await?;
    if group.is_some()
        && !quota_slice::try_claim::<GroupVolume, _>(volume.vid, owner.gid, size, &mut *conn)
            .await?
    {
        return Err(StoreError::QuotaExceeded(format!(
            "gid {} quota on {}",
            owner.gid, volume.name
        )));
    }
    Ok(())
}

/// Inverse of [`claim`]; every counter clamps at zero.
pub(crate) async fn release(
    conn: &mut SqliteConnection,
    vid: i64,
    owner: Owner,
    size: ByteCount,
) -> Result<()> {
    Volume::release(vid, size, &mut *conn).await?;
    quota_slice::release::<UserVolume, _>(vid, owner.uid, size, &mut *conn).await?;
    quota_slice::release::<GroupVolume, _>(vid, owner.gid, size, &mut *conn).await?;
    Ok(())
}

/// Read-only version of [`claim`] used to refuse an upload before any
/// payload bytes are written.
pub(crate) async fn precheck(
    conn: &mut SqliteConnection,
    volume: &Volume,
    owner: Owner,
    size: ByteCount,
) -> Result<()> {
    let fits = |usage: ByteCount, limit: ByteCount| usage.bytes() + size.bytes() <= limit.bytes();

    if !fits(volume.usage, volume.capacity) {
        return Err(StoreError::QuotaExceeded(format!(
            "{} has no room for {}",
            volume.name, size
        )));
    }
    if let Some(uv) = quota_slice::get::<UserVolume, _>(volume.vid, owner.uid, &mut *conn).await? {
        if uv.quota != ByteCount::ZERO && !fits(uv.usage, uv.quota) {
            return Err(StoreError::QuotaExceeded(format!(
                "uid {} quota on {}",
                owner.uid, volume.name
            )));
        }
    }
    if let Some(gv) = quota_slice::get::<GroupVolume, _>(volume.vid, owner.gid, &mut *conn).await? {
        if gv.quota != ByteCount::ZERO && !fits(gv.usage, gv.quota) {
            return Err(StoreError::QuotaExceeded(format!(
                "gid {} quota on {}",
                owner.gid, volume.name
            )));
        }
    }
    Ok(())
}

/// Move `size` of accounted usage from one owner to another. The receiving
/// slices are bound by their quotas like any other claim.
pub(crate) async fn transfer(
    conn: &mut SqliteConnection,
    vid: i64,
    from: Owner,
    to: Owner,
    size: ByteCount,
) -> Result<()> {
    if from.uid != to.uid {
        quota_slice::release::<UserVolume, _>(vid, from.uid, size, &mut *conn).await?;
        quota_slice::ensure::<UserVolume, _>(vid, to.uid, &mut *conn).await?;
        if !quota_slice::try_claim::<UserVolume, _>(vid, to.uid, size, &mut *conn).await? {
            return Err(StoreError::QuotaExceeded(format!(
                "uid {} quota on vid {}",
                to.uid, vid
            )));
        }
    }
    if from.gid != to.gid {
        quota_slice::release::<GroupVolume, _>(vid, from.gid, size, &mut *conn).await?;
        let group = quota_slice::get::<GroupVolume, _>(vid, to.gid, &mut *conn).await?;
        if group.is_some()
            && !quota_slice::try_claim::<GroupVolume, _>(vid, to.gid, size, &mut *conn).await?
        {
            return Err(StoreError::QuotaExceeded(format!(
                "gid {} quota on vid {}",
                to.gid, vid
            )));
        }
    }
    Ok(())
}
