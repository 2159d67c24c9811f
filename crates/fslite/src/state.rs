use std::sync::Arc;
use std::time::Duration;

use common::auth::{Claims, Gate, JwksSource, SharedKeyVerifier, TokenError, TokenParser, TokenUse};
use common::http::health::{DataSource, DataSourceError};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use store::models::Admin;
use store::{Database, DatabaseSetupError, FsLite, StoreConfig, StoreError};

use crate::service_config::Config;

/// Issuer of tokens minted for local admins.
pub const LOCAL_ISSUER: &str = "fslite";

/// Signs HS256 tokens for local admins with the shared secret, so the gate
/// verifies them like any other HS256 token.
pub struct AdminTokens {
    key: EncodingKey,
    validity: Duration,
}

impl AdminTokens {
    pub fn new(secret: &str, validity: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            validity,
        }
    }

    /// Local admins act as uid 0 in the `admin` group.
    pub fn issue(&self, admin: &Admin) -> Result<String, TokenError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: "0".to_string(),
            username: admin.username.clone(),
            groups: "admin".to_string(),
            group_ids: "0".to_string(),
            iss: LOCAL_ISSUER.to_string(),
            iat: now,
            exp: now + self.validity.as_secs() as i64,
            token_use: TokenUse::Access,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct State {
    store: FsLite,
    gate: Gate,
    admin_tokens: Arc<AdminTokens>,
    config: Arc<Config>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        let db = match &config.db_path {
            Some(path) => Database::connect(path, config.pool).await?,
            None => Database::in_memory().await?,
        };

        let store_config = StoreConfig {
            volumes_root: config.locality.then(|| config.volumes_path.clone()),
            default_volume: config.default_volume.clone(),
            default_capacity_gb: config.default_volume_cap_gb,
            max_capacity_gb: config.max_volume_cap_gb,
        };
        let store = FsLite::open(db, store_config).await?;
        if !config.locality {
            tracing::warn!("locality disabled: storing metadata only");
        }

        Admin::seed(
            &config.access_key,
            &config.secret_key,
            config.hash_cost,
            store.database(),
        )
        .await?;

        let source = match (&config.jwks_path, &config.minioth_url) {
            (Some(path), _) => JwksSource::File(path.clone()),
            (None, Some(url)) => JwksSource::Remote(url.clone()),
            (None, None) => JwksSource::None,
        };
        tracing::info!("RS256 keys from {:?}", source);
        let parser: Arc<dyn TokenParser> =
            Arc::new(SharedKeyVerifier::new(config.jwt_secret.clone(), source));
        let gate = Gate::new(parser, config.service_secret.clone(), config.debug);
        if config.debug {
            tracing::warn!("debug mode: authorization gate is bypassed");
        }

        Ok(Self {
            store,
            gate,
            admin_tokens: Arc::new(AdminTokens::new(&config.jwt_secret, config.jwt_validity)),
            config: Arc::new(config.clone()),
        })
    }

    pub fn store(&self) -> &FsLite {
        &self.store
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn admin_tokens(&self) -> &AdminTokens {
        &self.admin_tokens
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait::async_trait]
impl DataSource for State {
    async fn is_ready(&self) -> Result<(), DataSourceError> {
        ping(self.store.database()).await.map_err(|e| {
            tracing::error!("metadata store not ready: {}", e);
            DataSourceError::DependencyFailure
        })
    }
}

async fn ping(db: &Database) -> Result<(), StoreError> {
    db.acquire().await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("failed to setup the database: {0}")]
    DatabaseSetup(#[from] DatabaseSetupError),

    #[error("failed to open the store: {0}")]
    Store(#[from] StoreError),
}
