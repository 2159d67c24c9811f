use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use minioth::backend::PoolConfig;
use minioth::service_config::Handler;
use minioth::{spawn_service, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "minioth")]
#[command(about = "Identity provider issuing tokens for FsLite")]
struct Args {
    #[arg(long, env = "MINIOTH_LISTEN_ADDR", default_value = "0.0.0.0:9090")]
    listen_addr: SocketAddr,

    /// `debug` bypasses the authorization gate (testing only)
    #[arg(long, env = "API_GIN_MODE", default_value = "release")]
    mode: String,

    #[arg(long, env = "MINIOTH_HANDLER", value_enum, default_value = "db")]
    handler: Handler,

    /// SQLite database for the `db` handler
    #[arg(long, env = "MINIOTH_DB_PATH", default_value = "data/minioth.db")]
    db_path: PathBuf,

    /// Directory of mpasswd/mshadow/mgroup for the `plain` handler
    #[arg(long, env = "PLAIN_DATA_DIR", default_value = "data/plain")]
    plain_dir: PathBuf,

    #[arg(long, env = "DB_MAX_OPEN_CONNS", default_value_t = 50)]
    db_max_open: u32,

    #[arg(long, env = "DB_MAX_IDLE_CONNS", default_value_t = 10)]
    db_max_idle: u32,

    /// Connection lifetime in minutes
    #[arg(long, env = "DB_MAX_LIFETIME", default_value_t = 10)]
    db_max_lifetime: u64,

    #[arg(long, env = "JWT_SECRET_KEY", default_value = "minioth-access", hide_env_values = true)]
    jwt_secret: String,

    #[arg(long, env = "JWT_REFRESH_KEY", default_value = "minioth-refresh", hide_env_values = true)]
    jwt_refresh_key: String,

    #[arg(long, env = "JWT_VALIDITY_HOURS", default_value_t = 1)]
    jwt_validity_hours: u64,

    #[arg(long, env = "JWKS_PATH", default_value = "data/jwks/jwks.json")]
    jwks_path: PathBuf,

    #[arg(long, env = "ISSUER", default_value = "http://localhost:9090")]
    issuer: String,

    #[arg(long, env = "HASH_COST", default_value_t = 4)]
    hash_cost: u32,

    #[arg(long, env = "PASSWORD_MIN_LENGTH", default_value_t = 5)]
    password_min_len: usize,

    #[arg(long, env = "MINIOTH_ACCESS_KEY", default_value = "root")]
    access_key: String,

    #[arg(long, env = "MINIOTH_SECRET_KEY", default_value = "root", hide_env_values = true)]
    secret_key: String,

    /// Value of X-Service-Secret granting service access; empty disables it
    #[arg(long, env = "SERVICE_SECRET_KEY", default_value = "", hide_env_values = true)]
    service_secret: String,

    #[arg(long, env = "MINIOTH_AUDIT_LOGS", default_value = "data/logs/minioth/audit.log")]
    audit_log: PathBuf,

    #[arg(long, env = "MINIOTH_AUDIT_LOGS_MAX_FETCH", default_value_t = 100)]
    audit_max_fetch: usize,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: tracing::Level,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl From<Args> for ServiceConfig {
    fn from(args: Args) -> Self {
        ServiceConfig {
            listen_addr: args.listen_addr,
            debug: args.mode.eq_ignore_ascii_case("debug"),
            handler: args.handler,
            db_path: Some(args.db_path),
            plain_dir: args.plain_dir,
            pool: PoolConfig {
                max_open: args.db_max_open,
                max_idle: args.db_max_idle,
                max_lifetime: Duration::from_secs(args.db_max_lifetime * 60),
            },
            jwt_secret: args.jwt_secret,
            jwt_refresh_key: args.jwt_refresh_key,
            jwt_validity: Duration::from_secs(args.jwt_validity_hours * 3600),
            jwks_path: Some(args.jwks_path),
            issuer: args.issuer,
            hash_cost: args.hash_cost,
            password_min_len: args.password_min_len,
            access_key: args.access_key,
            secret_key: args.secret_key,
            service_secret: Some(args.service_secret).filter(|s| !s.is_empty()),
            audit_log: args.audit_log,
            audit_max_fetch: args.audit_max_fetch,
            log_level: args.log_level,
            log_dir: args.log_dir,
        }
    }
}

#[tokio::main]
async fn main() {
    let config = ServiceConfig::from(Args::parse());
    spawn_service(&config).await;
}
