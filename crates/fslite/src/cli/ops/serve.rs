use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use url::Url;

use fslite::{spawn_service, ServiceConfig};
use store::{PoolConfig, DEFAULT_VOLUME_CAP_GB, DEFAULT_VOLUME_NAME, MAX_VOLUME_CAP_GB};

/// Run the storage service until interrupted.
#[derive(Args, Debug, Clone)]
pub struct Serve {
    #[arg(long, env = "FSL_LISTEN_ADDR", default_value = "0.0.0.0:8079")]
    pub listen_addr: SocketAddr,

    /// `debug` bypasses the authorization gate (testing only)
    #[arg(long, env = "API_GIN_MODE", default_value = "release")]
    pub mode: String,

    /// SQLite metadata database
    #[arg(long, env = "FSL_DB_PATH", default_value = "data/fslite.db")]
    pub db_path: PathBuf,

    #[arg(long, env = "DB_MAX_OPEN_CONNS", default_value_t = 50)]
    pub db_max_open: u32,

    #[arg(long, env = "DB_MAX_IDLE_CONNS", default_value_t = 10)]
    pub db_max_idle: u32,

    /// Connection lifetime in minutes
    #[arg(long, env = "DB_MAX_LIFETIME", default_value_t = 10)]
    pub db_max_lifetime: u64,

    /// Keep resource bytes on local disk
    #[arg(long, env = "FSL_LOCALITY", default_value_t = true, action = clap::ArgAction::Set)]
    pub locality: bool,

    #[arg(long, env = "LOCAL_VOLUMES_DEFAULT_PATH", default_value = "data/volumes/fslite")]
    pub volumes_path: PathBuf,

    #[arg(long, env = "DEFAULT_VOLUME_NAME", default_value = DEFAULT_VOLUME_NAME)]
    pub default_volume: String,

    #[arg(long, env = "DEFAULT_VOLUME_CAP_GB", default_value_t = DEFAULT_VOLUME_CAP_GB)]
    pub default_volume_cap_gb: f64,

    #[arg(long, env = "MAX_VOLUME_CAP_GB", default_value_t = MAX_VOLUME_CAP_GB)]
    pub max_volume_cap_gb: f64,

    #[arg(long, env = "FSL_ACCESS_KEY", default_value = "fsladmin")]
    pub access_key: String,

    #[arg(long, env = "FSL_SECRET_KEY", default_value = "fsladmin", hide_env_values = true)]
    pub secret_key: String,

    #[arg(long, env = "HASH_COST", default_value_t = 4)]
    pub hash_cost: u32,

    #[arg(long, env = "JWT_SECRET_KEY", default_value = "minioth-access", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "JWT_VALIDITY_HOURS", default_value_t = 1)]
    pub jwt_validity_hours: u64,

    /// JWKS document on disk, preferred over --minioth-url
    #[arg(long, env = "JWKS_PATH")]
    pub jwks_path: Option<PathBuf>,

    #[arg(long, env = "MINIOTH_URL")]
    pub minioth_url: Option<Url>,

    #[arg(long = "accept-service-secret", env = "SERVICE_SECRET_KEY", default_value = "", hide_env_values = true)]
    pub accepted_secret: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: tracing::Level,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl From<&Serve> for ServiceConfig {
    fn from(args: &Serve) -> Self {
        ServiceConfig {
            listen_addr: args.listen_addr,
            debug: args.mode.eq_ignore_ascii_case("debug"),
            db_path: Some(args.db_path.clone()),
            pool: PoolConfig {
                max_open: args.db_max_open,
                max_idle: args.db_max_idle,
                max_lifetime: Duration::from_secs(args.db_max_lifetime * 60),
            },
            locality: args.locality,
            volumes_path: args.volumes_path.clone(),
            default_volume: args.default_volume.clone(),
            default_volume_cap_gb: args.default_volume_cap_gb,
            max_volume_cap_gb: args.max_volume_cap_gb,
            access_key: args.access_key.clone(),
            secret_key: args.secret_key.clone(),
            hash_cost: args.hash_cost,
            jwt_secret: args.jwt_secret.clone(),
            jwt_validity: Duration::from_secs(args.jwt_validity_hours * 3600),
            jwks_path: args.jwks_path.clone(),
            minioth_url: args.minioth_url.clone(),
            service_secret: Some(args.accepted_secret.clone()).filter(|s| !s.is_empty()),
            log_level: args.log_level,
            log_dir: args.log_dir.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        spawn_service(&ServiceConfig::from(self)).await;
        Ok("fslite stopped".to_string())
    }
}
