use std::path::PathBuf;

use clap::Args;

use store::{Database, DatabaseSetupError, FsLite, PoolConfig, StoreConfig, StoreError};

/// Find payload files that no resource row references.
///
/// Works against the database and volume directories directly, so it can run
/// while the service is down.
#[derive(Args, Debug, Clone)]
pub struct Reap {
    #[arg(long, env = "FSL_DB_PATH")]
    pub db_path: PathBuf,

    #[arg(long, env = "LOCAL_VOLUMES_DEFAULT_PATH", default_value = "data/volumes/fslite")]
    pub volumes_path: PathBuf,

    /// Delete the orphans instead of listing them
    #[arg(long)]
    pub delete: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ReapError {
    #[error("database: {0}")]
    Database(#[from] DatabaseSetupError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Reap {
    type Error = ReapError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let db = Database::connect(&self.db_path, PoolConfig::default()).await?;
        let config = StoreConfig {
            volumes_root: Some(self.volumes_path.clone()),
            ..StoreConfig::default()
        };
        let store = FsLite::open(db, config).await?;

        let orphans = if self.delete {
            store.reap().await?
        } else {
            store.orphans().await?
        };
        store.database().close().await;

        if orphans.is_empty() {
            return Ok("no orphaned payloads".to_string());
        }
        let verb = if self.delete { "removed" } else { "orphaned" };
        let mut lines: Vec<String> = orphans.iter().map(|o| format!("{} {}", verb, o)).collect();
        lines.push(format!("{} payload(s)", orphans.len()));
        Ok(lines.join("\n"))
    }
}
