//! Per-user and per-group quota slices of a volume.
//!
//! Both tables share one shape, keyed `(vid, <owner>)`, so the queries are
//! written once against [`QuotaSlice`].

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor};
use time::OffsetDateTime;

use crate::types::ByteCount;
use crate::{Result, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserVolume {
    pub vid: i64,
    pub uid: i64,
    #[sqlx(rename = "usage_bytes")]
    pub usage: ByteCount,
    /// zero means unlimited
    #[sqlx(rename = "quota_bytes")]
    pub quota: ByteCount,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroupVolume {
    pub vid: i64,
    pub gid: i64,
    #[sqlx(rename = "usage_bytes")]
    pub usage: ByteCount,
    /// zero means unlimited
    #[sqlx(rename = "quota_bytes")]
    pub quota: ByteCount,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub trait QuotaSlice: for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static {
    const TABLE: &'static str;
    const OWNER: &'static str;
}

impl QuotaSlice for UserVolume {
    const TABLE: &'static str = "user_volumes";
    const OWNER: &'static str = "uid";
}

impl QuotaSlice for GroupVolume {
    const TABLE: &'static str = "group_volumes";
    const OWNER: &'static str = "gid";
}

/// `?uids=&vids=` (or `?gids=&vids=`) selection; empty lists match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceFilter {
    pub vids: Vec<i64>,
    pub owners: Vec<i64>,
}

impl SliceFilter {
    pub fn is_empty(&self) -> bool {
        self.vids.is_empty() && self.owners.is_empty()
    }

    /// Parse comma-separated id lists.
    pub fn parse(vids: Option<&str>, owners: Option<&str>) -> Result<Self> {
        Ok(Self {
            vids: parse_ids(vids)?,
            owners: parse_ids(owners)?,
        })
    }
}

pub fn parse_ids(list: Option<&str>) -> Result<Vec<i64>> {
    list.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| StoreError::BadInput(format!("invalid id '{}'", s)))
        })
        .collect()
}

/// Body of `PATCH /user/volumes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserVolumePatch {
    pub vid: i64,
    pub uid: i64,
    #[serde(default)]
    pub quota: Option<ByteCount>,
    #[serde(default)]
    pub usage: Option<ByteCount>,
}

/// Body of `PATCH /group/volumes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupVolumePatch {
    pub vid: i64,
    pub gid: i64,
    #[serde(default)]
    pub quota: Option<ByteCount>,
    #[serde(default)]
    pub usage: Option<ByteCount>,
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, owner: &str, filter: &SliceFilter) {
    qb.push(" WHERE 1 = 1");
    for (column, ids) in [("vid", &filter.vids), (owner, &filter.owners)] {
        if ids.is_empty() {
            continue;
        }
        qb.push(format!(" AND {} IN (", column));
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        list.push_unseparated(")");
    }
}

/// Create the `(vid, owner)` row with zero usage and unlimited quota if absent.
pub(crate) async fn ensure<'e, T: QuotaSlice, E: SqliteExecutor<'e>>(
    vid: i64,
    owner: i64,
    exec: E,
) -> Result<()> {
    sqlx::query(&format!(
        r#"
        INSERT INTO {} (vid, {}, usage_bytes, quota_bytes, updated_at)
        VALUES (?1, ?2, 0, 0, ?3)
        ON CONFLICT DO NOTHING
        "#,
        T::TABLE,
        T::OWNER
    ))
    .bind(vid)
    .bind(owner)
    .bind(OffsetDateTime::now_utc())
    .execute(exec)
    .await?;
    Ok(())
}

/// Add `size` unless a non-zero quota would be passed. A missing row is
/// reported as denied, so callers `ensure` first when the slice is mandatory.
pub(crate) async fn try_claim<'e, T: QuotaSlice, E: SqliteExecutor<'e>>(
    vid: i64,
    owner: i64,
    size: ByteCount,
    exec: E,
) -> Result<bool> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET usage_bytes = usage_bytes + ?1, updated_at = ?2
        WHERE vid = ?3 AND {} = ?4
          AND (quota_bytes = 0 OR usage_bytes + ?1 <= quota_bytes)
        "#,
        T::TABLE,
        T::OWNER
    ))
    .bind(size)
    .bind(OffsetDateTime::now_utc())
    .bind(vid)
    .bind(owner)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn release<'e, T: QuotaSlice, E: SqliteExecutor<'e>>(
    vid: i64,
    owner: i64,
    size: ByteCount,
    exec: E,
) -> Result<()> {
    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET usage_bytes = MAX(usage_bytes - ?1, 0), updated_at = ?2
        WHERE vid = ?3 AND {} = ?4
        "#,
        T::TABLE,
        T::OWNER
    ))
    .bind(size)
    .bind(OffsetDateTime::now_utc())
    .bind(vid)
    .bind(owner)
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn get<'e, T: QuotaSlice, E: SqliteExecutor<'e>>(
    vid: i64,
    owner: i64,
    exec: E,
) -> Result<Option<T>> {
    Ok(sqlx::query_as::<_, T>(&format!(
        "SELECT vid, {owner}, usage_bytes, quota_bytes, updated_at FROM {table} \
         WHERE vid = ?1 AND {owner} = ?2",
        owner = T::OWNER,
        table = T::TABLE
    ))
    .bind(vid)
    .bind(owner)
    .fetch_optional(exec)
    .await?)
}

pub(crate) async fn select<'e, T: QuotaSlice, E: SqliteExecutor<'e>>(
    filter: &SliceFilter,
    exec: E,
) -> Result<Vec<T>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT vid, {}, usage_bytes, quota_bytes, updated_at FROM {}",
        T::OWNER,
        T::TABLE
    ));
    push_filter(&mut qb, T::OWNER, filter);
    qb.push(format!(" ORDER BY vid, {}", T::OWNER));
    Ok(qb.build_query_as::<T>().fetch_all(exec).await?)
}

/// Overwrite quota and/or usage on an existing row.
pub(crate) async fn set<'e, T: QuotaSlice, E: SqliteExecutor<'e>>(
    vid: i64,
    owner: i64,
    quota: Option<ByteCount>,
    usage: Option<ByteCount>,
    exec: E,
) -> Result<bool> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET quota_bytes = COALESCE(?1, quota_bytes),
            usage_bytes = COALESCE(?2, usage_bytes),
            updated_at = ?3
        WHERE vid = ?4 AND {} = ?5
        "#,
        T::TABLE,
        T::OWNER
    ))
    .bind(quota)
    .bind(usage)
    .bind(OffsetDateTime::now_utc())
    .bind(vid)
    .bind(owner)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete<'e, T: QuotaSlice, E: SqliteExecutor<'e>>(
    filter: &SliceFilter,
    exec: E,
) -> Result<u64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("DELETE FROM {}", T::TABLE));
    push_filter(&mut qb, T::OWNER, filter);
    Ok(qb.build().execute(exec).await?.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        let f = SliceFilter::parse(Some("1, 2"), None).unwrap();
        assert_eq!(f.vids, vec![1, 2]);
        assert!(f.owners.is_empty());
        assert!(SliceFilter::parse(None, None).unwrap().is_empty());
        assert!(SliceFilter::parse(Some("x"), None).is_err());
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let p: UserVolumePatch = serde_json::from_str(r#"{"vid":1,"uid":1000,"quota":2}"#).unwrap();
        assert_eq!(p.quota, Some(ByteCount::from_gb(2.0)));
        assert!(serde_json::from_str::<UserVolumePatch>(r#"{"vid":1,"uid":1,"color":"red"}"#)
            .is_err());
    }
}
