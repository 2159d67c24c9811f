//! Payload backend: resource bytes under `<root>/<volume>/<name>`, or nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{Result, StoreError};

#[cfg(unix)]
const VOLUME_DIR_MODE: u32 = 0o755;

/// An open payload ready to stream.
pub struct PayloadReader {
    pub size: u64,
    pub stream: BoxStream<'static, std::result::Result<Bytes, object_store::Error>>,
}

/// Filesystem metadata of one payload file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStat {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mode: u32,
    pub is_dir: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub mod_time: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct LocalPayload {
    root: PathBuf,
    inner: Arc<dyn ObjectStore>,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Local(LocalPayload),
    /// metadata-only deployments
    None,
}

impl Payload {
    pub async fn local(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let inner = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        Ok(Payload::Local(LocalPayload {
            root: root.to_path_buf(),
            inner: Arc::new(inner),
        }))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Payload::Local(_))
    }

    /// Directory a volume's payloads live in, if any.
    pub fn volume_dir(&self, vname: &str) -> Option<PathBuf> {
        match self {
            Payload::Local(local) => Some(local.root.join(vname)),
            Payload::None => None,
        }
    }

    fn object_path(vname: &str, name: &str) -> ObjectPath {
        ObjectPath::from_iter([vname, name])
    }

    /// Idempotent.
    pub async fn make_volume(&self, vname: &str) -> Result<()> {
        let Some(dir) = self.volume_dir(vname) else {
            return Ok(());
        };
        tokio::fs::create_dir_all(&dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&dir, std::fs::Permissions::from_mode(VOLUME_DIR_MODE))
                .await?;
        }
        Ok(())
    }

    pub async fn drop_volume(&self, vname: &str) -> Result<()> {
        let Some(dir) = self.volume_dir(vname) else {
            return Ok(());
        };
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Exclusive create; an existing file is `AlreadyExists`.
    pub async fn put(&self, vname: &str, name: &str, data: Bytes) -> Result<u64> {
        let size = data.len() as u64;
        let Payload::Local(local) = self else {
            return Ok(size);
        };
        let path = Self::object_path(vname, name);
        let opts = PutOptions::from(PutMode::Create);
        match local.inner.put_opts(&path, PutPayload::from(data), opts).await {
            Ok(_) => Ok(size),
            Err(object_store::Error::AlreadyExists { .. }) => {
                Err(StoreError::AlreadyExists(format!("{}/{}", vname, name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, vname: &str, name: &str) -> Result<PayloadReader> {
        let Payload::Local(local) = self else {
            return Err(StoreError::NotApplicable);
        };
        let path = Self::object_path(vname, name);
        match local.inner.get(&path).await {
            Ok(result) => Ok(PayloadReader {
                size: result.meta.size as u64,
                stream: result.into_stream(),
            }),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StoreError::NotFound(format!("payload {}/{}", vname, name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Missing payloads are not an error.
    pub async fn delete(&self, vname: &str, name: &str) -> Result<()> {
        let Payload::Local(local) = self else {
            return Ok(());
        };
        let path = Self::object_path(vname, name);
        match local.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn copy(&self, src: (&str, &str), dst: (&str, &str)) -> Result<()> {
        let Payload::Local(local) = self else {
            return Ok(());
        };
        let from = Self::object_path(src.0, src.1);
        let to = Self::object_path(dst.0, dst.1);
        match local.inner.copy_if_not_exists(&from, &to).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::AlreadyExists { .. }) => {
                Err(StoreError::AlreadyExists(format!("{}/{}", dst.0, dst.1)))
            }
            Err(object_store::Error::NotFound { .. }) => {
                Err(StoreError::NotFound(format!("payload {}/{}", src.0, src.1)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn rename(&self, vname: &str, from: &str, to: &str) -> Result<()> {
        let Payload::Local(local) = self else {
            return Ok(());
        };
        let src = Self::object_path(vname, from);
        let dst = Self::object_path(vname, to);
        match local.inner.rename_if_not_exists(&src, &dst).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::AlreadyExists { .. }) => {
                Err(StoreError::AlreadyExists(format!("{}/{}", vname, to)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn stat(&self, vname: &str, name: &str) -> Result<PayloadStat> {
        let Payload::Local(local) = self else {
            return Err(StoreError::NotApplicable);
        };
        let path = local.root.join(vname).join(name);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(format!("payload {}/{}", vname, name)))
            }
            Err(e) => return Err(e.into()),
        };

        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode()
        };
        #[cfg(not(unix))]
        let mode = 0;

        Ok(PayloadStat {
            name: name.to_string(),
            path: path.display().to_string(),
            size: meta.len(),
            mode,
            is_dir: meta.is_dir(),
            mod_time: meta.modified().ok().map(OffsetDateTime::from),
        })
    }

    /// Every stored payload as `(vname, name)`.
    pub async fn list(&self) -> Result<Vec<(String, String)>> {
        let Payload::Local(local) = self else {
            return Ok(Vec::new());
        };
        let metas: Vec<_> = local.inner.list(None).try_collect().await?;
        Ok(metas
            .into_iter()
            .filter_map(|m| {
                let mut parts = m.location.parts();
                let vname = parts.next()?.as_ref().to_string();
                let name = parts.next()?.as_ref().to_string();
                parts.next().is_none().then_some((vname, name))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn local() -> (tempfile::TempDir, Payload) {
        let dir = tempfile::tempdir().unwrap();
        let payload = Payload::local(dir.path()).await.unwrap();
        (dir, payload)
    }

    #[tokio::test]
    async fn test_put_is_exclusive() {
        let (dir, payload) = local().await;
        payload.make_volume("v1").await.unwrap();
        payload.make_volume("v1").await.unwrap();

        let size = payload
            .put("v1", "hello.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(size, 5);
        assert!(dir.path().join("v1").join("hello.txt").exists());

        let again = payload
            .put("v1", "hello.txt", Bytes::from_static(b"world"))
            .await;
        assert!(matches!(again, Err(StoreError::AlreadyExists(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_volume_dir_mode() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, payload) = local().await;
        payload.make_volume("v1").await.unwrap();
        let mode = std::fs::metadata(dir.path().join("v1"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn test_get_copy_rename_delete() {
        let (_dir, payload) = local().await;
        payload.make_volume("v1").await.unwrap();
        payload
            .put("v1", "a", Bytes::from_static(b"abc"))
            .await
            .unwrap();

        payload.copy(("v1", "a"), ("v1", "b")).await.unwrap();
        payload.rename("v1", "b", "c").await.unwrap();

        let reader = payload.get("v1", "c").await.unwrap();
        assert_eq!(reader.size, 3);
        let body: Vec<Bytes> = reader.stream.try_collect().await.unwrap();
        assert_eq!(body.concat(), b"abc");

        let stat = payload.stat("v1", "c").await.unwrap();
        assert_eq!(stat.size, 3);
        assert!(!stat.is_dir);

        let mut listed = payload.list().await.unwrap();
        listed.sort();
        assert_eq!(
            listed,
            vec![("v1".into(), "a".into()), ("v1".into(), "c".into())]
        );

        payload.delete("v1", "c").await.unwrap();
        payload.delete("v1", "c").await.unwrap();
        assert!(matches!(
            payload.get("v1", "c").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_none_backend() {
        let payload = Payload::None;
        assert_eq!(
            payload
                .put("v1", "a", Bytes::from_static(b"abcd"))
                .await
                .unwrap(),
            4
        );
        assert!(matches!(
            payload.get("v1", "a").await,
            Err(StoreError::NotApplicable)
        ));
        assert!(matches!(
            payload.stat("v1", "a").await,
            Err(StoreError::NotApplicable)
        ));
        payload.delete("v1", "a").await.unwrap();
    }
}
