use std::sync::Arc;

use common::auth::{Gate, TokenError, TokenParser};
use common::http::health::{DataSource, DataSourceError};

use crate::audit::AuditLog;
use crate::backend::{Database, DatabaseSetupError, IdentityBackend, PlainBackend, SqlBackend};
use crate::error::IdentityError;
use crate::minioth::Minioth;
use crate::service_config::{Config, Handler};
use crate::token::{TokenConfig, TokenService, REFRESH_VALIDITY};
use crate::validate::PasswordPolicy;

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct State {
    minioth: Minioth,
    tokens: Arc<TokenService>,
    audit: Arc<AuditLog>,
    gate: Gate,
    config: Arc<Config>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateError> {
        let backend: Arc<dyn IdentityBackend> = match config.handler {
            Handler::Db => {
                let db = match &config.db_path {
                    Some(path) => Database::connect(path, config.pool).await?,
                    None => Database::in_memory().await?,
                };
                Arc::new(SqlBackend::new(db))
            }
            Handler::Plain => Arc::new(PlainBackend::open(&config.plain_dir).await?),
        };
        tracing::info!("identity backend: {:?}", config.handler);

        let policy = PasswordPolicy {
            min_len: config.password_min_len,
        };
        let minioth = Minioth::new(backend, config.hash_cost, policy);
        minioth.seed(&config.access_key, &config.secret_key).await?;

        let tokens = Arc::new(
            TokenService::new(TokenConfig {
                access_secret: config.jwt_secret.clone(),
                refresh_secret: config.jwt_refresh_key.clone(),
                validity: config.jwt_validity,
                refresh_validity: REFRESH_VALIDITY,
                issuer: config.issuer.clone(),
                jwks_path: config.jwks_path.clone(),
            })
            .await?,
        );

        let parser: Arc<dyn TokenParser> = tokens.clone();
        let gate = Gate::new(parser, config.service_secret.clone(), config.debug);
        if config.debug {
            tracing::warn!("debug mode: authorization gate is bypassed");
        }

        Ok(Self {
            minioth,
            tokens,
            audit: Arc::new(AuditLog::new(&config.audit_log, config.audit_max_fetch)),
            gate,
            config: Arc::new(config.clone()),
        })
    }

    pub fn minioth(&self) -> &Minioth {
        &self.minioth
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait::async_trait]
impl DataSource for State {
    async fn is_ready(&self) -> Result<(), DataSourceError> {
        self.minioth.backend().ping().await.map_err(|e| {
            tracing::error!("identity backend not ready: {}", e);
            DataSourceError::DependencyFailure
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to setup the database: {0}")]
    DatabaseSetup(#[from] DatabaseSetupError),

    #[error("failed to setup the identity backend: {0}")]
    Identity(#[from] IdentityError),

    #[error("failed to setup the token service: {0}")]
    Token(#[from] TokenError),
}
