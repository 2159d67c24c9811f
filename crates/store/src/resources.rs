//! Resource manager: metadata rows, quota and payload kept consistent per call.
//!
//! Inserts write the payload first and then commit the quota claim and the
//! row in one transaction; a failed commit removes the payload again. Deletes
//! commit the row removal and release before touching the payload. A crash
//! between the two steps can leak a payload file, which [`FsLite::orphans`]
//! finds.

use bytes::Bytes;
use common::auth::Identity;
use time::OffsetDateTime;

use crate::fslite::FsLite;
use crate::models::{validate_resource_name, Resource, ResourceQuery, Volume};
use crate::payload::{PayloadReader, PayloadStat};
use crate::permissions::check;
use crate::quota::{self, Owner};
use crate::types::{Access, ByteCount, Perms, ResourceKind};
use crate::{Result, StoreError};

/// Where a new resource goes and who owns it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub vname: String,
    pub name: String,
    pub owner: Owner,
}

/// Split `<vol>/<name>`.
pub fn parse_location(location: &str) -> Result<(&str, &str)> {
    match location.split_once('/') {
        Some((vname, name)) if !vname.is_empty() && !name.is_empty() => Ok((vname, name)),
        _ => Err(StoreError::BadInput(format!(
            "expected <volume>/<name>, got '{}'",
            location
        ))),
    }
}

impl FsLite {
    async fn resource(&self, vname: &str, name: &str) -> Result<Resource> {
        Resource::by_location(vname, name, &*self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", vname, name)))
    }

    async fn resource_by_rid(&self, rid: i64) -> Result<Resource> {
        Resource::by_rid(rid, &*self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("resource {}", rid)))
    }

    /// `Empty` when nothing matches.
    pub async fn select_resources(&self, query: &ResourceQuery) -> Result<Vec<Resource>> {
        let rows = Resource::select(query, &*self.db).await?;
        if rows.is_empty() {
            return Err(StoreError::Empty);
        }
        Ok(rows)
    }

    pub async fn insert(&self, upload: Upload, data: Bytes) -> Result<Resource> {
        validate_resource_name(&upload.name)?;
        let volume = self.volume(&upload.vname).await?;
        if Resource::by_location(&volume.name, &upload.name, &*self.db)
            .await?
            .is_some()
        {
            return Err(StoreError::AlreadyExists(format!(
                "{}/{}",
                volume.name, upload.name
            )));
        }

        let size = ByteCount::new(data.len() as i64);
        {
            let mut conn = self.db.acquire().await?;
            quota::precheck(&mut conn, &volume, upload.owner, size).await?;
        }

        let now = OffsetDateTime::now_utc();
        let row = Resource {
            rid: 0,
            uid: upload.owner.uid,
            gid: upload.owner.gid,
            vid: volume.vid,
            vname: volume.name.clone(),
            size: size.bytes(),
            links: 0,
            perms: Perms::default(),
            path: format!("/{}", upload.name),
            name: upload.name,
            kind: ResourceKind::File,
            created_at: now,
            updated_at: now,
            accessed_at: now,
        };

        self.payload.put(&row.vname, &row.name, data).await?;

        match self.commit_insert(&volume, upload.owner, row).await {
            Ok(row) => Ok(row),
            Err((row, e)) => {
                if let Err(cleanup) = self.payload.delete(&row.vname, &row.name).await {
                    tracing::warn!(
                        "failed to remove payload {} after aborted insert: {}",
                        row.location(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Claim and insert in one transaction; hands the row back on failure
    /// so the caller can compensate.
    async fn commit_insert(
        &self,
        volume: &Volume,
        owner: Owner,
        mut row: Resource,
    ) -> std::result::Result<Resource, (Resource, StoreError)> {
        let result: Result<i64> = async {
            let mut tx = self.db.begin().await?;
            quota::claim(&mut tx, volume, owner, ByteCount::new(row.size)).await?;
            let rid = Resource::insert(&row, &mut *tx).await?;
            tx.commit().await?;
            Ok(rid)
        }
        .await;

        match result {
            Ok(rid) => {
                row.rid = rid;
                Ok(row)
            }
            Err(e) => Err((row, e)),
        }
    }

    pub async fn remove(&self, vname: &str, name: &str, who: Option<&Identity>) -> Result<Resource> {
        let row = self.resource(vname, name).await?;
        check(who, &row, Access::Write)?;

        let mut tx = self.db.begin().await?;
        if !Resource::delete(row.rid, &mut *tx).await? {
            return Err(StoreError::NotFound(row.location()));
        }
        let owner = Owner {
            uid: row.uid,
            gid: row.gid,
        };
        quota::release(&mut tx, row.vid, owner, ByteCount::new(row.size)).await?;
        tx.commit().await?;

        self.payload.delete(&row.vname, &row.name).await?;
        Ok(row)
    }

    /// The copy keeps the source's owner, group and perms.
    pub async fn copy(
        &self,
        src: (&str, &str),
        dst: (&str, &str),
        who: Option<&Identity>,
    ) -> Result<Resource> {
        validate_resource_name(dst.1)?;
        let source = self.resource(src.0, src.1).await?;
        check(who, &source, Access::Read)?;

        let volume = self.volume(dst.0).await?;
        if Resource::by_location(dst.0, dst.1, &*self.db).await?.is_some() {
            return Err(StoreError::AlreadyExists(format!("{}/{}", dst.0, dst.1)));
        }

        let owner = Owner {
            uid: source.uid,
            gid: source.gid,
        };
        let size = ByteCount::new(source.size);
        {
            let mut conn = self.db.acquire().await?;
            quota::precheck(&mut conn, &volume, owner, size).await?;
        }

        let now = OffsetDateTime::now_utc();
        let row = Resource {
            rid: 0,
            vid: volume.vid,
            vname: volume.name.clone(),
            name: dst.1.to_string(),
            path: format!("/{}", dst.1),
            created_at: now,
            updated_at: now,
            accessed_at: now,
            ..source
        };

        self.payload.copy(src, dst).await?;

        match self.commit_insert(&volume, owner, row).await {
            Ok(row) => Ok(row),
            Err((row, e)) => {
                if let Err(cleanup) = self.payload.delete(&row.vname, &row.name).await {
                    tracing::warn!(
                        "failed to remove payload {} after aborted copy: {}",
                        row.location(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Rename within the same volume.
    pub async fn rename(
        &self,
        vname: &str,
        name: &str,
        new_name: &str,
        who: Option<&Identity>,
    ) -> Result<Resource> {
        validate_resource_name(new_name)?;
        let row = self.resource(vname, name).await?;
        check(who, &row, Access::Write)?;
        let location = format!("{}/{}", vname, new_name);

        let mut tx = self.db.begin().await?;
        Resource::rename(row.rid, new_name, &format!("/{}", new_name), &location, &mut *tx).await?;
        self.payload.rename(vname, name, new_name).await?;
        if let Err(e) = tx.commit().await {
            if let Err(undo) = self.payload.rename(vname, new_name, name).await {
                tracing::warn!("failed to restore payload {}/{}: {}", vname, name, undo);
            }
            return Err(e.into());
        }

        self.resource_by_rid(row.rid).await
    }

    pub async fn download(
        &self,
        vname: &str,
        name: &str,
        who: Option<&Identity>,
    ) -> Result<(Resource, PayloadReader)> {
        if !self.payload.is_enabled() {
            return Err(StoreError::NotApplicable);
        }
        let row = self.resource(vname, name).await?;
        check(who, &row, Access::Read)?;
        let reader = self.payload.get(vname, name).await?;
        Resource::touch(row.rid, &*self.db).await?;
        Ok((row, reader))
    }

    pub async fn stat(&self, vname: &str, name: &str, who: Option<&Identity>) -> Result<PayloadStat> {
        if !self.payload.is_enabled() {
            return Err(StoreError::NotApplicable);
        }
        let row = self.resource(vname, name).await?;
        check(who, &row, Access::Read)?;
        self.payload.stat(vname, name).await
    }

    /// Owner or root only.
    pub async fn chperms(&self, rid: i64, perms: &str, who: Option<&Identity>) -> Result<Resource> {
        let perms: Perms = perms.parse().map_err(StoreError::BadInput)?;
        let row = self.resource_by_rid(rid).await?;
        require_owner(who, &row)?;
        if !Resource::set_perms(rid, &perms, &*self.db).await? {
            return Err(StoreError::NotFound(format!("resource {}", rid)));
        }
        self.resource_by_rid(rid).await
    }

    /// Root or service only; accounted usage moves with the resource.
    pub async fn chowner(&self, rid: i64, uid: i64, who: Option<&Identity>) -> Result<Resource> {
        if uid < 0 {
            return Err(StoreError::BadInput(format!("invalid uid {}", uid)));
        }
        if who.is_some_and(|w| w.uid != 0) {
            return Err(StoreError::Forbidden("only root may change owners".into()));
        }
        let row = self.resource_by_rid(rid).await?;
        let from = Owner {
            uid: row.uid,
            gid: row.gid,
        };

        let mut tx = self.db.begin().await?;
        Resource::set_owner(rid, uid, &mut *tx).await?;
        quota::transfer(&mut tx, row.vid, from, Owner { uid, ..from }, ByteCount::new(row.size))
            .await?;
        tx.commit().await?;
        self.resource_by_rid(rid).await
    }

    /// Owner (into one of their groups) or root.
    pub async fn chgroup(&self, rid: i64, gid: i64, who: Option<&Identity>) -> Result<Resource> {
        if gid < 0 {
            return Err(StoreError::BadInput(format!("invalid gid {}", gid)));
        }
        let row = self.resource_by_rid(rid).await?;
        require_owner(who, &row)?;
        if let Some(w) = who.filter(|w| w.uid != 0) {
            if !w.gids.iter().any(|g| i64::from(*g) == gid) {
                return Err(StoreError::Forbidden(format!("not a member of gid {}", gid)));
            }
        }
        let from = Owner {
            uid: row.uid,
            gid: row.gid,
        };

        let mut tx = self.db.begin().await?;
        Resource::set_group(rid, gid, &mut *tx).await?;
        quota::transfer(&mut tx, row.vid, from, Owner { gid, ..from }, ByteCount::new(row.size))
            .await?;
        tx.commit().await?;
        self.resource_by_rid(rid).await
    }
}

fn require_owner(who: Option<&Identity>, row: &Resource) -> Result<()> {
    match who {
        Some(w) if w.uid != 0 && i64::from(w.uid) != row.uid => Err(StoreError::Forbidden(
            format!("not the owner of {}", row.location()),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        assert_eq!(parse_location("v1/hello.txt").unwrap(), ("v1", "hello.txt"));
        assert!(parse_location("hello.txt").is_err());
        assert!(parse_location("/x").is_err());
        assert!(parse_location("v1/").is_err());
    }
}
