//! FsLite storage core
//!
//! SQLite holds volumes, resources, quota slices and local admins; resource
//! bytes live in a payload backend (local directories through `object_store`,
//! or nowhere for metadata-only deployments).
//!
//! Accounting is done in whole bytes and only rendered as fractional GB at the
//! JSON boundary, see [`types::ByteCount`].
//!
//! # Example
//!
//! ```rust,no_run
//! use fsl_store::{Database, FsLite, PoolConfig, StoreConfig};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect(Path::new("data/fslite.db"), PoolConfig::default()).await?;
//! let config = StoreConfig {
//!     volumes_root: Some("data/volumes/fslite".into()),
//!     ..StoreConfig::default()
//! };
//! let store = FsLite::open(db, config).await?;
//! let volumes = store.select_volumes(None, None).await?;
//! # Ok(())
//! # }
//! ```

mod database;
mod error;
mod fslite;
pub mod models;
mod payload;
mod permissions;
mod quota;
mod reaper;
mod resources;
pub mod types;

pub use database::{Database, DatabaseSetupError, PoolConfig};
pub use error::{Result, StoreError};
pub use fslite::{FsLite, StoreConfig, DEFAULT_VOLUME_CAP_GB, DEFAULT_VOLUME_NAME, MAX_VOLUME_CAP_GB};
pub use payload::{Payload, PayloadReader, PayloadStat};
pub use permissions::permits;
pub use quota::Owner;
pub use reaper::Orphan;
pub use resources::{parse_location, Upload};
