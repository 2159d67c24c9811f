use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::PoolConfig;

/// Which identity backend to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Handler {
    Db,
    Plain,
}

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    pub listen_addr: SocketAddr,
    /// bypass the authorization gate; for local testing only
    pub debug: bool,

    // identity storage
    pub handler: Handler,
    /// sqlite database for the `db` handler,
    ///  if not set then an in-memory database will be used
    pub db_path: Option<PathBuf>,
    /// directory holding mpasswd/mshadow/mgroup for the `plain` handler
    pub plain_dir: PathBuf,
    pub pool: PoolConfig,

    // tokens
    pub jwt_secret: String,
    pub jwt_refresh_key: String,
    pub jwt_validity: Duration,
    /// where the JWKS document is published,
    ///  if not set the document only lives in memory
    pub jwks_path: Option<PathBuf>,
    pub issuer: String,

    // credentials
    pub hash_cost: u32,
    pub password_min_len: usize,
    pub access_key: String,
    pub secret_key: String,
    /// value of `X-Service-Secret` granting service access; empty disables it
    pub service_secret: Option<String>,

    // audit
    pub audit_log: PathBuf,
    pub audit_max_fetch: usize,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            debug: false,
            handler: Handler::Db,
            db_path: None,
            plain_dir: PathBuf::from("data/plain"),
            pool: PoolConfig::default(),
            jwt_secret: "minioth-access".to_string(),
            jwt_refresh_key: "minioth-refresh".to_string(),
            jwt_validity: Duration::from_secs(3600),
            jwks_path: None,
            issuer: "http://localhost:9090".to_string(),
            hash_cost: 4,
            password_min_len: crate::validate::DEFAULT_PASSWORD_MIN_LEN,
            access_key: "root".to_string(),
            secret_key: "root".to_string(),
            service_secret: None,
            audit_log: PathBuf::from("data/logs/minioth/audit.log"),
            audit_max_fetch: 100,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}
