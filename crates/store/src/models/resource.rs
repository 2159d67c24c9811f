use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor};
use time::OffsetDateTime;

use crate::types::{Perms, ResourceKind};
use crate::{Result, StoreError};

/// One stored object.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub rid: i64,
    pub uid: i64,
    pub gid: i64,
    pub vid: i64,
    pub vname: String,
    pub size: i64,
    pub links: i64,
    pub perms: Perms,
    pub name: String,
    pub path: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub accessed_at: OffsetDateTime,
}

impl Default for Resource {
    fn default() -> Self {
        Self {
            rid: 0,
            uid: 0,
            gid: 0,
            vid: 0,
            vname: String::new(),
            size: 0,
            links: 0,
            perms: Perms::default(),
            name: String::new(),
            path: String::new(),
            kind: ResourceKind::File,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            accessed_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

impl Resource {
    /// `<vname>/<name>`
    pub fn location(&self) -> String {
        format!("{}/{}", self.vname, self.name)
    }
}

/// Filter for `GET /resource/get`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceQuery {
    /// name prefix
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rids: Vec<i64>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub uid: Option<i64>,
}

pub fn validate_resource_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() > 255
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '"'])
        || name.chars().any(char::is_control)
    {
        return Err(StoreError::BadInput(format!("invalid resource name '{}'", name)));
    }
    Ok(())
}

const COLUMNS: &str = "rid, uid, gid, vid, vname, size, links, perms, name, path, type, \
                       created_at, updated_at, accessed_at";

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

impl Resource {
    pub(crate) async fn insert<'e, E: SqliteExecutor<'e>>(r: &Resource, exec: E) -> Result<i64> {
        let (rid,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO resources (
                uid, gid, vid, vname, size, links, perms, name, path, type,
                created_at, updated_at, accessed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING rid
            "#,
        )
        .bind(r.uid)
        .bind(r.gid)
        .bind(r.vid)
        .bind(&r.vname)
        .bind(r.size)
        .bind(r.links)
        .bind(&r.perms)
        .bind(&r.name)
        .bind(&r.path)
        .bind(r.kind)
        .bind(r.created_at)
        .bind(r.updated_at)
        .bind(r.accessed_at)
        .fetch_one(exec)
        .await
        .map_err(|e| StoreError::unique(e, r.location()))?;
        Ok(rid)
    }

    pub async fn by_location<'e, E: SqliteExecutor<'e>>(
        vname: &str,
        name: &str,
        exec: E,
    ) -> Result<Option<Resource>> {
        Ok(sqlx::query_as::<_, Resource>(&format!(
            "SELECT {} FROM resources WHERE vname = ?1 AND name = ?2",
            COLUMNS
        ))
        .bind(vname)
        .bind(name)
        .fetch_optional(exec)
        .await?)
    }

    pub async fn by_rid<'e, E: SqliteExecutor<'e>>(rid: i64, exec: E) -> Result<Option<Resource>> {
        Ok(sqlx::query_as::<_, Resource>(&format!(
            "SELECT {} FROM resources WHERE rid = ?1",
            COLUMNS
        ))
        .bind(rid)
        .fetch_optional(exec)
        .await?)
    }

    pub async fn select<'e, E: SqliteExecutor<'e>>(
        query: &ResourceQuery,
        exec: E,
    ) -> Result<Vec<Resource>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM resources WHERE 1 = 1", COLUMNS));

        if let Some(prefix) = query.name.as_deref().filter(|n| !n.is_empty()) {
            qb.push(" AND name LIKE ")
                .push_bind(format!("{}%", escape_like(prefix)))
                .push(" ESCAPE '\\'");
        }
        if let Some(volume) = query.volume.as_deref().filter(|v| !v.is_empty()) {
            qb.push(" AND vname = ").push_bind(volume.to_string());
        }
        if let Some(uid) = query.uid {
            qb.push(" AND uid = ").push_bind(uid);
        }
        if !query.rids.is_empty() {
            qb.push(" AND rid IN (");
            let mut list = qb.separated(", ");
            for rid in &query.rids {
                list.push_bind(*rid);
            }
            list.push_unseparated(")");
        }
        qb.push(" ORDER BY rid");

        Ok(qb.build_query_as::<Resource>().fetch_all(exec).await?)
    }

    pub(crate) async fn delete<'e, E: SqliteExecutor<'e>>(rid: i64, exec: E) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE rid = ?1")
            .bind(rid)
            .execute(exec)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) async fn rename<'e, E: SqliteExecutor<'e>>(
        rid: i64,
        name: &str,
        path: &str,
        location: &str,
        exec: E,
    ) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        sqlx::query(
            r#"
            UPDATE resources
            SET name = ?1, path = ?2, updated_at = ?3, accessed_at = ?3
            WHERE rid = ?4
            "#,
        )
        .bind(name)
        .bind(path)
        .bind(now)
        .bind(rid)
        .execute(exec)
        .await
        .map_err(|e| StoreError::unique(e, location))?;
        Ok(())
    }

    pub(crate) async fn set_perms<'e, E: SqliteExecutor<'e>>(
        rid: i64,
        perms: &Perms,
        exec: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE resources SET perms = ?1, updated_at = ?2, accessed_at = ?2 WHERE rid = ?3
            "#,
        )
        .bind(perms)
        .bind(OffsetDateTime::now_utc())
        .bind(rid)
        .execute(exec)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) async fn set_owner<'e, E: SqliteExecutor<'e>>(
        rid: i64,
        uid: i64,
        exec: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE resources SET uid = ?1, updated_at = ?2, accessed_at = ?2 WHERE rid = ?3
            "#,
        )
        .bind(uid)
        .bind(OffsetDateTime::now_utc())
        .bind(rid)
        .execute(exec)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) async fn set_group<'e, E: SqliteExecutor<'e>>(
        rid: i64,
        gid: i64,
        exec: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE resources SET gid = ?1, updated_at = ?2, accessed_at = ?2 WHERE rid = ?3
            "#,
        )
        .bind(gid)
        .bind(OffsetDateTime::now_utc())
        .bind(rid)
        .execute(exec)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) async fn touch<'e, E: SqliteExecutor<'e>>(rid: i64, exec: E) -> Result<()> {
        sqlx::query("UPDATE resources SET accessed_at = ?1 WHERE rid = ?2")
            .bind(OffsetDateTime::now_utc())
            .bind(rid)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn count_in_volume<'e, E: SqliteExecutor<'e>>(vid: i64, exec: E) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resources WHERE vid = ?1")
            .bind(vid)
            .fetch_one(exec)
            .await?;
        Ok(count)
    }

    /// Every live `(vname, name)` pair.
    pub(crate) async fn locations<'e, E: SqliteExecutor<'e>>(
        exec: E,
    ) -> Result<HashSet<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT vname, name FROM resources")
            .fetch_all(exec)
            .await?;
        Ok(rows.into_iter().collect())
    }
}
