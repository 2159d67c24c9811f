use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use store::{PoolConfig, DEFAULT_VOLUME_CAP_GB, DEFAULT_VOLUME_NAME, MAX_VOLUME_CAP_GB};
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    pub listen_addr: SocketAddr,
    /// bypass the authorization gate; for local testing only
    pub debug: bool,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub db_path: Option<PathBuf>,
    pub pool: PoolConfig,

    // payload configuration
    /// keep resource bytes on disk; metadata only when off
    pub locality: bool,
    pub volumes_path: PathBuf,
    pub default_volume: String,
    pub default_volume_cap_gb: f64,
    pub max_volume_cap_gb: f64,

    // local admins
    pub access_key: String,
    pub secret_key: String,
    pub hash_cost: u32,

    // tokens
    /// shared HS256 secret, also signs local admin tokens
    pub jwt_secret: String,
    pub jwt_validity: Duration,
    /// JWKS document on disk, preferred over `minioth_url`
    pub jwks_path: Option<PathBuf>,
    /// identity provider serving `/.well-known/jwks.json`
    pub minioth_url: Option<Url>,
    /// value of `X-Service-Secret` granting service access
    pub service_secret: Option<String>,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8079)),
            debug: false,
            db_path: None,
            pool: PoolConfig::default(),
            locality: true,
            volumes_path: PathBuf::from("data/volumes/fslite"),
            default_volume: DEFAULT_VOLUME_NAME.to_string(),
            default_volume_cap_gb: DEFAULT_VOLUME_CAP_GB,
            max_volume_cap_gb: MAX_VOLUME_CAP_GB,
            access_key: "fsladmin".to_string(),
            secret_key: "fsladmin".to_string(),
            hash_cost: 4,
            jwt_secret: "minioth-access".to_string(),
            jwt_validity: Duration::from_secs(3600),
            jwks_path: None,
            minioth_url: None,
            service_secret: None,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}
