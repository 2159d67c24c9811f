use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor};
use time::OffsetDateTime;

use crate::types::ByteCount;
use crate::{Result, StoreError};

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 63;

/// A named payload namespace with a byte capacity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub vid: i64,
    pub name: String,
    pub path: String,
    pub dynamic: bool,
    #[sqlx(rename = "capacity_bytes")]
    pub capacity: ByteCount,
    #[sqlx(rename = "usage_bytes")]
    pub usage: ByteCount,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Body of `POST /volume/new`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewVolume {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub dynamic: bool,
    /// GB
    #[serde(default)]
    pub capacity: Option<f64>,
}

impl NewVolume {
    pub fn named(name: impl Into<String>, capacity_gb: f64) -> Self {
        Self {
            name: name.into(),
            capacity: Some(capacity_gb),
            ..Self::default()
        }
    }

    /// Capacity outside `(0, max]` falls back to the default.
    pub fn effective_capacity(&self, default_gb: f64, max_gb: f64) -> ByteCount {
        match self.capacity {
            Some(gb) if gb > 0.0 && gb <= max_gb => ByteCount::from_gb(gb),
            _ => ByteCount::from_gb(default_gb),
        }
    }
}

pub fn validate_volume_name(name: &str) -> Result<()> {
    let ok_len = (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.len());
    let ok_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if !ok_len || !ok_chars || name == ".." {
        return Err(StoreError::BadInput(format!(
            "invalid volume name '{}': {}-{} chars of [A-Za-z0-9-._]",
            name, MIN_NAME_LEN, MAX_NAME_LEN
        )));
    }
    Ok(())
}

impl Volume {
    pub async fn create<'e, E: SqliteExecutor<'e>>(
        name: &str,
        path: &str,
        dynamic: bool,
        capacity: ByteCount,
        exec: E,
    ) -> Result<Volume> {
        sqlx::query_as::<_, Volume>(
            r#"
            INSERT INTO volumes (name, path, dynamic, capacity_bytes, usage_bytes, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            RETURNING vid, name, path, dynamic, capacity_bytes, usage_bytes, created_at
            "#,
        )
        .bind(name)
        .bind(path)
        .bind(dynamic)
        .bind(capacity)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(exec)
        .await
        .map_err(|e| StoreError::unique(e, format!("volume {}", name)))
    }

    pub async fn by_name<'e, E: SqliteExecutor<'e>>(name: &str, exec: E) -> Result<Option<Volume>> {
        Ok(sqlx::query_as::<_, Volume>(
            r#"
            SELECT vid, name, path, dynamic, capacity_bytes, usage_bytes, created_at
            FROM volumes
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(exec)
        .await?)
    }

    /// All volumes, optionally narrowed by name and/or vid.
    pub async fn select<'e, E: SqliteExecutor<'e>>(
        name: Option<&str>,
        vid: Option<i64>,
        exec: E,
    ) -> Result<Vec<Volume>> {
        Ok(sqlx::query_as::<_, Volume>(
            r#"
            SELECT vid, name, path, dynamic, capacity_bytes, usage_bytes, created_at
            FROM volumes
            WHERE (?1 IS NULL OR name = ?1) AND (?2 IS NULL OR vid = ?2)
            ORDER BY vid
            "#,
        )
        .bind(name)
        .bind(vid)
        .fetch_all(exec)
        .await?)
    }

    pub async fn delete<'e, E: SqliteExecutor<'e>>(vid: i64, exec: E) -> Result<bool> {
        let result = sqlx::query("DELETE FROM volumes WHERE vid = ?1")
            .bind(vid)
            .execute(exec)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add `size` to usage unless it would pass capacity; false when denied.
    pub(crate) async fn try_claim<'e, E: SqliteExecutor<'e>>(
        vid: i64,
        size: ByteCount,
        exec: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE volumes
            SET usage_bytes = usage_bytes + ?1
            WHERE vid = ?2 AND usage_bytes + ?1 <= capacity_bytes
            "#,
        )
        .bind(size)
        .bind(vid)
        .execute(exec)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) async fn release<'e, E: SqliteExecutor<'e>>(
        vid: i64,
        size: ByteCount,
        exec: E,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE volumes
            SET usage_bytes = MAX(usage_bytes - ?1, 0)
            WHERE vid = ?2
            "#,
        )
        .bind(size)
        .bind(vid)
        .execute(exec)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_names() {
        assert!(validate_volume_name("v1").is_ok());
        assert!(validate_volume_name("default_ku_space_volume").is_ok());
        assert!(validate_volume_name("a.b-c_d").is_ok());
        assert!(validate_volume_name("x").is_err());
        assert!(validate_volume_name("has space").is_err());
        assert!(validate_volume_name("../etc").is_err());
        assert!(validate_volume_name("..").is_err());
        assert!(validate_volume_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_capacity_fallback() {
        let mut v = NewVolume::named("v1", 1.0);
        assert_eq!(v.effective_capacity(20.0, 100.0), ByteCount::from_gb(1.0));
        v.capacity = Some(500.0);
        assert_eq!(v.effective_capacity(20.0, 100.0), ByteCount::from_gb(20.0));
        v.capacity = None;
        assert_eq!(v.effective_capacity(20.0, 100.0), ByteCount::from_gb(20.0));
        v.capacity = Some(-1.0);
        assert_eq!(v.effective_capacity(20.0, 100.0), ByteCount::from_gb(20.0));
    }

    #[test]
    fn test_new_volume_rejects_unknown_fields() {
        let ok: NewVolume =
            serde_json::from_str(r#"{"name":"v1","path":"/tmp/v1","capacity":1}"#).unwrap();
        assert_eq!(ok.capacity, Some(1.0));
        assert!(serde_json::from_str::<NewVolume>(r#"{"name":"v1","owner":3}"#).is_err());
    }
}
