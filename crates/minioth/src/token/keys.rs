//! RS256 signing keys and the JWKS document publishing their public halves.

use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common::auth::{Jwk, JwkSet, TokenError};
use jsonwebtoken::{DecodingKey, EncodingKey};
use parking_lot::RwLock;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use time::OffsetDateTime;
use tokio::sync::Mutex;

const RSA_BITS: usize = 2048;

struct SigningKey {
    kid: String,
    encoding: EncodingKey,
    retired_at: Option<i64>,
}

/// Process-wide key table.
///
/// Exactly one key is active (the newest); rotation retires it and retired
/// keys stay published until `retention` after retirement so tokens already
/// issued keep verifying. JWKS writes are serialized and read-modify-write.
pub struct KeyTable {
    keys: RwLock<Vec<SigningKey>>,
    published: RwLock<JwkSet>,
    jwks_path: Option<PathBuf>,
    jwks_write: Mutex<()>,
    retention: Duration,
}

async fn generate() -> Result<(SigningKey, Jwk), TokenError> {
    let private = tokio::task::spawn_blocking(|| {
        let mut rng = rand::rngs::OsRng;
        RsaPrivateKey::new(&mut rng, RSA_BITS)
    })
    .await
    .map_err(|e| TokenError::Signing(e.to_string()))?
    .map_err(|e| TokenError::Signing(e.to_string()))?;

    let pem = private
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| TokenError::Signing(e.to_string()))?;
    let encoding = EncodingKey::from_rsa_pem(pem.as_bytes())?;

    let kid = uuid::Uuid::new_v4().to_string();
    let jwk = Jwk::rsa(
        kid.clone(),
        URL_SAFE_NO_PAD.encode(private.n().to_bytes_be()),
        URL_SAFE_NO_PAD.encode(private.e().to_bytes_be()),
    );
    Ok((
        SigningKey {
            kid,
            encoding,
            retired_at: None,
        },
        jwk,
    ))
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

impl KeyTable {
    /// Generate the first active key and publish it next to whatever the
    /// JWKS file already holds.
    pub async fn bootstrap(jwks_path: Option<PathBuf>, retention: Duration) -> Result<Self, TokenError> {
        let table = Self {
            keys: RwLock::new(Vec::new()),
            published: RwLock::new(JwkSet::default()),
            jwks_path,
            jwks_write: Mutex::new(()),
            retention,
        };
        table.rotate().await?;
        Ok(table)
    }

    /// Make a fresh key active; returns its `kid`.
    ///
    /// Every other published key is retired now unless it already carries a
    /// retirement time, which covers keys left in the file by earlier runs.
    /// Keys retired before the retention cutoff are dropped.
    pub async fn rotate(&self) -> Result<String, TokenError> {
        let (key, jwk) = generate().await?;
        let kid = key.kid.clone();

        let _guard = self.jwks_write.lock().await;
        let at = now();
        let cutoff = at - self.retention.as_secs() as i64;

        let mut doc = match &self.jwks_path {
            Some(path) => JwkSet::load(path).await?,
            None => self.published.read().clone(),
        };
        for k in doc.keys.iter_mut().filter(|k| k.retired_at.is_none()) {
            k.retired_at = Some(at);
        }
        let before = doc.keys.len();
        doc.keys.retain(|k| k.retired_at.is_some_and(|r| r >= cutoff));
        let expired = before - doc.keys.len();
        doc.upsert(jwk);
        if let Some(path) = &self.jwks_path {
            doc.store(path).await?;
        }

        {
            let mut keys = self.keys.write();
            keys.retain(|k| doc.find(&k.kid).is_some());
            for k in keys.iter_mut().filter(|k| k.retired_at.is_none()) {
                k.retired_at = Some(at);
            }
            keys.push(key);
        }
        *self.published.write() = doc;

        tracing::info!("signing key {} active, {} expired", kid, expired);
        Ok(kid)
    }

    /// The active key; the newest by insertion order.
    pub fn active(&self) -> Option<(String, EncodingKey)> {
        self.keys
            .read()
            .iter()
            .rev()
            .find(|k| k.retired_at.is_none())
            .map(|k| (k.kid.clone(), k.encoding.clone()))
    }

    pub fn decoding_key(&self, kid: &str) -> Result<DecodingKey, TokenError> {
        self.published
            .read()
            .find(kid)
            .ok_or_else(|| TokenError::UnknownKey(kid.to_string()))?
            .decoding_key()
    }

    pub fn jwks(&self) -> JwkSet {
        self.published.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rotation_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwks.json");
        let table = KeyTable::bootstrap(Some(path.clone()), Duration::from_secs(3600))
            .await
            .unwrap();
        let (first, _) = table.active().unwrap();

        let second = table.rotate().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(table.active().unwrap().0, second);

        let on_disk = JwkSet::load(&path).await.unwrap();
        assert_eq!(on_disk.keys.len(), 2);
        assert_eq!(on_disk.keys[0].kid, first);
        assert_eq!(on_disk.keys[1].kid, second);
        assert!(table.decoding_key(&first).is_ok());
        assert!(matches!(
            table.decoding_key("nope"),
            Err(TokenError::UnknownKey(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_retention_prunes_retired() {
        let table = KeyTable::bootstrap(None, Duration::ZERO).await.unwrap();
        let (first, _) = table.active().unwrap();
        table.rotate().await.unwrap();
        // retired in this second, pruned once the clock moves past it
        tokio::time::sleep(Duration::from_millis(1100)).await;
        table.rotate().await.unwrap();
        assert!(table.jwks().find(&first).is_none());
        assert_eq!(table.jwks().keys.len(), 2);
    }

    #[tokio::test]
    async fn test_restarts_retire_and_prune_keys_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwks.json");

        let mut earlier = Vec::new();
        for _ in 0..3 {
            let table = KeyTable::bootstrap(Some(path.clone()), Duration::from_secs(3600))
                .await
                .unwrap();
            earlier.push(table.active().unwrap().0);
        }
        let on_disk = JwkSet::load(&path).await.unwrap();
        assert_eq!(on_disk.keys.len(), 3);
        assert_eq!(
            on_disk.keys.iter().filter(|k| k.retired_at.is_none()).count(),
            1
        );

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let table = KeyTable::bootstrap(Some(path.clone()), Duration::ZERO)
            .await
            .unwrap();
        let (current, _) = table.active().unwrap();

        // the last run's key was retired just now; older runs are gone
        let on_disk = JwkSet::load(&path).await.unwrap();
        let kids: Vec<&str> = on_disk.keys.iter().map(|k| k.kid.as_str()).collect();
        assert_eq!(kids, vec![earlier[2].as_str(), current.as_str()]);
        assert!(on_disk.keys[0].retired_at.is_some());
        assert!(on_disk.keys[1].retired_at.is_none());
    }
}
