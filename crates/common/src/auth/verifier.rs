use std::path::PathBuf;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use url::Url;

use super::jwks::JwkSet;
use super::{Claims, TokenError};

/// Anything that can turn a bearer token into verified claims.
#[async_trait::async_trait]
pub trait TokenParser: Send + Sync {
    async fn parse(&self, token: &str) -> Result<Claims, TokenError>;
}

/// Read the header, enforce the `{HS256, RS256}` whitelist and return the
/// declared algorithm with its `kid`.
pub fn declared_algorithm(token: &str) -> Result<(Algorithm, Option<String>), TokenError> {
    let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;
    match header.alg {
        Algorithm::HS256 | Algorithm::RS256 => Ok((header.alg, header.kid)),
        other => Err(TokenError::UnsupportedAlgorithm(format!("{:?}", other))),
    }
}

/// Verify signature and expiry with exactly the declared algorithm.
pub fn decode_claims(token: &str, key: &DecodingKey, alg: Algorithm) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(alg);
    validation.leeway = 0;
    validation.validate_aud = false;
    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(TokenError::from)
}

/// Where RS256 public keys come from when verifying outside the issuer.
#[derive(Debug, Clone)]
pub enum JwksSource {
    None,
    File(PathBuf),
    Remote(Url),
}

/// Verifier used by services that do not hold the private keys.
///
/// HS256 tokens are checked against the shared secret; RS256 tokens against
/// a cached JWKS document, refreshed from its source on an unknown `kid`.
pub struct SharedKeyVerifier {
    access_secret: Vec<u8>,
    source: JwksSource,
    jwks: RwLock<JwkSet>,
    http: reqwest::Client,
}

impl SharedKeyVerifier {
    pub fn new(access_secret: impl Into<Vec<u8>>, source: JwksSource) -> Self {
        Self {
            access_secret: access_secret.into(),
            source,
            jwks: RwLock::new(JwkSet::default()),
            http: reqwest::Client::new(),
        }
    }

    async fn refresh_jwks(&self) -> Result<(), TokenError> {
        let fresh = match &self.source {
            JwksSource::None => return Ok(()),
            JwksSource::File(path) => JwkSet::load(path).await?,
            JwksSource::Remote(base) => {
                let url = base
                    .join("/.well-known/jwks.json")
                    .map_err(|e| TokenError::Upstream(e.to_string()))?;
                tracing::debug!("fetching JWKS from {}", url);
                self.http
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| TokenError::Upstream(e.to_string()))?
                    .json::<JwkSet>()
                    .await
                    .map_err(|e| TokenError::Upstream(e.to_string()))?
            }
        };
        *self.jwks.write() = fresh;
        Ok(())
    }

    fn cached_key(&self, kid: &str) -> Option<Result<DecodingKey, TokenError>> {
        self.jwks.read().find(kid).map(|jwk| jwk.decoding_key())
    }
}

#[async_trait::async_trait]
impl TokenParser for SharedKeyVerifier {
    async fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let (alg, kid) = declared_algorithm(token)?;
        match alg {
            Algorithm::RS256 => {
                let kid = kid.ok_or_else(|| TokenError::UnknownKey("missing kid".into()))?;
                let key = match self.cached_key(&kid) {
                    Some(key) => key?,
                    None => {
                        self.refresh_jwks().await?;
                        self.cached_key(&kid)
                            .ok_or_else(|| TokenError::UnknownKey(kid.clone()))??
                    }
                };
                decode_claims(token, &key, alg)
            }
            _ => decode_claims(token, &DecodingKey::from_secret(&self.access_secret), alg),
        }
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;
    use crate::auth::TokenUse;

    fn claims(exp_offset: i64) -> Claims {
        let now = now_secs();
        Claims {
            sub: "1000".into(),
            username: "alice".into(),
            groups: "user".into(),
            group_ids: "1000".into(),
            iss: "test".into(),
            iat: now,
            exp: now + exp_offset,
            token_use: TokenUse::Access,
        }
    }

    fn now_secs() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    fn sign(claims: &Claims, secret: &[u8]) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_hs256_round_trip() {
        let verifier = SharedKeyVerifier::new(b"secret".to_vec(), JwksSource::None);
        let token = sign(&claims(3600), b"secret");
        let parsed = verifier.parse(&token).await.unwrap();
        assert_eq!(parsed.uid(), Some(1000));
    }

    #[tokio::test]
    async fn test_expired_and_wrong_key_rejected() {
        let verifier = SharedKeyVerifier::new(b"secret".to_vec(), JwksSource::None);

        let expired = sign(&claims(-10), b"secret");
        assert!(matches!(
            verifier.parse(&expired).await,
            Err(TokenError::Expired)
        ));

        let forged = sign(&claims(3600), b"other");
        assert!(matches!(
            verifier.parse(&forged).await,
            Err(TokenError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_unsupported_algorithm_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims(3600),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(matches!(
            declared_algorithm(&token),
            Err(TokenError::UnsupportedAlgorithm(_))
        ));
    }
}
