//! Access and refresh token issuing, parsing and key rotation.

mod keys;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use common::auth::{decode_claims, declared_algorithm, Claims, JwkSet, TokenError, TokenParser, TokenUse};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use time::OffsetDateTime;

pub use keys::KeyTable;

use crate::models::User;

/// Header a client sets on login to ask for an RS256 token.
pub const SIGNING_ALG_HEADER: &str = "X-Auth-Signing-Alg";

pub const REFRESH_VALIDITY: Duration = Duration::from_secs(72 * 3600);

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub validity: Duration,
    pub refresh_validity: Duration,
    pub issuer: String,
    pub jwks_path: Option<PathBuf>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: "minioth-access".to_string(),
            refresh_secret: "minioth-refresh".to_string(),
            validity: Duration::from_secs(3600),
            refresh_validity: REFRESH_VALIDITY,
            issuer: "http://localhost:9090".to_string(),
            jwks_path: None,
        }
    }
}

/// `RS256` when asked for by name, `HS256` otherwise.
pub fn requested_algorithm(value: Option<&str>) -> Algorithm {
    match value {
        Some(v) if v.trim().eq_ignore_ascii_case("RS256") => Algorithm::RS256,
        _ => Algorithm::HS256,
    }
}

pub struct TokenService {
    config: TokenConfig,
    keys: KeyTable,
}

impl TokenService {
    pub async fn new(config: TokenConfig) -> Result<Self, TokenError> {
        let keys = KeyTable::bootstrap(config.jwks_path.clone(), config.validity).await?;
        Ok(Self { config, keys })
    }

    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    fn claims(&self, user: &User, validity: Duration, token_use: TokenUse) -> Claims {
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        Claims {
            sub: user.uid.to_string(),
            username: user.username.clone(),
            groups: user.group_names(),
            group_ids: user.group_ids(),
            iss: self.config.issuer.clone(),
            iat,
            exp: iat + validity.as_secs() as i64,
            token_use,
        }
    }

    fn sign(&self, claims: &Claims, alg: Algorithm, secret: &str) -> Result<String, TokenError> {
        let (header, key) = match alg {
            Algorithm::RS256 => {
                let (kid, key) = self
                    .keys
                    .active()
                    .ok_or_else(|| TokenError::Signing("no active signing key".into()))?;
                let mut header = Header::new(Algorithm::RS256);
                header.kid = Some(kid);
                (header, key)
            }
            _ => (
                Header::new(Algorithm::HS256),
                EncodingKey::from_secret(secret.as_bytes()),
            ),
        };
        encode(&header, claims, &key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_access(&self, user: &User, alg: Algorithm) -> Result<String, TokenError> {
        let claims = self.claims(user, self.config.validity, TokenUse::Access);
        self.sign(&claims, alg, &self.config.access_secret)
    }

    /// Refresh tokens are always HS256 under the refresh secret.
    pub fn issue_refresh(&self, user: &User) -> Result<String, TokenError> {
        let claims = self.claims(user, self.config.refresh_validity, TokenUse::Refresh);
        self.sign(&claims, Algorithm::HS256, &self.config.refresh_secret)
    }

    /// Verify a token of either use, returning its claims and algorithm.
    ///
    /// HS256 is tried with the access secret, then the refresh secret.
    pub fn parse_any(&self, token: &str) -> Result<(Claims, Algorithm), TokenError> {
        let (alg, kid) = declared_algorithm(token)?;
        let claims = match alg {
            Algorithm::RS256 => {
                let kid = kid.ok_or_else(|| TokenError::UnknownKey("missing kid".into()))?;
                decode_claims(token, &self.keys.decoding_key(&kid)?, alg)?
            }
            _ => {
                let access = DecodingKey::from_secret(self.config.access_secret.as_bytes());
                match decode_claims(token, &access, alg) {
                    Err(TokenError::InvalidSignature) => {
                        let refresh = DecodingKey::from_secret(self.config.refresh_secret.as_bytes());
                        decode_claims(token, &refresh, alg)?
                    }
                    other => other?,
                }
            }
        };
        Ok((claims, alg))
    }

    pub async fn rotate(&self) -> Result<String, TokenError> {
        self.keys.rotate().await
    }

    pub fn jwks(&self) -> JwkSet {
        self.keys.jwks()
    }
}

#[async_trait]
impl TokenParser for TokenService {
    async fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        self.parse_any(token).map(|(claims, _)| claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Group;

    fn alice() -> User {
        User {
            uid: 1001,
            username: "alice".into(),
            info: String::new(),
            home: String::new(),
            shell: String::new(),
            pgroup: 1001,
            verified: false,
            groups: vec![Group::new(1000, "user"), Group::new(1001, "alice")],
        }
    }

    async fn service() -> TokenService {
        TokenService::new(TokenConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_access_round_trip_both_algorithms() {
        let tokens = service().await;
        for alg in [Algorithm::HS256, Algorithm::RS256] {
            let token = tokens.issue_access(&alice(), alg).unwrap();
            let (claims, parsed_alg) = tokens.parse_any(&token).unwrap();
            assert_eq!(parsed_alg, alg);
            assert_eq!(claims.uid(), Some(1001));
            assert_eq!(claims.groups, "user,alice");
            assert_eq!(claims.group_ids, "1000,1001");
            assert_eq!(claims.exp - claims.iat, 3600);
            assert_eq!(claims.token_use, TokenUse::Access);
        }
    }

    #[tokio::test]
    async fn test_refresh_uses_its_own_secret() {
        let tokens = service().await;
        let refresh = tokens.issue_refresh(&alice()).unwrap();
        let (claims, _) = tokens.parse_any(&refresh).unwrap();
        assert_eq!(claims.token_use, TokenUse::Refresh);
        assert_eq!(claims.exp - claims.iat, 72 * 3600);

        let other = TokenService::new(TokenConfig {
            refresh_secret: "something-else".into(),
            ..TokenConfig::default()
        })
        .await
        .unwrap();
        assert!(matches!(
            other.parse_any(&refresh),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_rs256_survives_rotation() {
        let tokens = service().await;
        let before = tokens.issue_access(&alice(), Algorithm::RS256).unwrap();
        tokens.rotate().await.unwrap();
        assert_eq!(tokens.jwks().keys.len(), 2);
        assert!(tokens.parse(&before).await.is_ok());
    }

    #[test]
    fn test_requested_algorithm() {
        assert_eq!(requested_algorithm(Some("rs256")), Algorithm::RS256);
        assert_eq!(requested_algorithm(Some("HS512")), Algorithm::HS256);
        assert_eq!(requested_algorithm(None), Algorithm::HS256);
    }
}
