use serde::Serialize;

use crate::fslite::FsLite;
use crate::models::Resource;
use crate::Result;

/// A payload file with no metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orphan {
    pub vname: String,
    pub name: String,
}

impl std::fmt::Display for Orphan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.vname, self.name)
    }
}

impl FsLite {
    /// List payloads nothing references, sorted by location.
    pub async fn orphans(&self) -> Result<Vec<Orphan>> {
        let live = Resource::locations(&*self.db).await?;
        let mut orphans: Vec<Orphan> = self
            .payload
            .list()
            .await?
            .into_iter()
            .filter(|loc| !live.contains(loc))
            .map(|(vname, name)| Orphan { vname, name })
            .collect();
        orphans.sort_by(|a, b| (&a.vname, &a.name).cmp(&(&b.vname, &b.name)));
        Ok(orphans)
    }

    /// Delete every orphan and return what was removed.
    pub async fn reap(&self) -> Result<Vec<Orphan>> {
        let orphans = self.orphans().await?;
        for orphan in &orphans {
            tracing::info!("REAP: {}", orphan);
            self.payload.delete(&orphan.vname, &orphan.name).await?;
        }
        Ok(orphans)
    }
}
