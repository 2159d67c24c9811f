use std::path::Path;

use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

use super::TokenError;

/// One public RSA signing key, as published in a JWKS document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub kid: String,
    /// base64url modulus
    pub n: String,
    /// base64url exponent
    pub e: String,
    /// unix seconds the key stopped signing; absent while active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<i64>,
}

impl Jwk {
    pub fn rsa(kid: impl Into<String>, n: impl Into<String>, e: impl Into<String>) -> Self {
        Self {
            kty: "RSA".into(),
            alg: "RS256".into(),
            use_: "sig".into(),
            kid: kid.into(),
            n: n.into(),
            e: e.into(),
            retired_at: None,
        }
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, TokenError> {
        DecodingKey::from_rsa_components(&self.n, &self.e)
            .map_err(|e| TokenError::Jwks(format!("bad key {}: {}", self.kid, e)))
    }
}

/// `{ "keys": [ ... ] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Read the document at `path`; a missing file is an empty set.
    pub async fn load(path: &Path) -> Result<Self, TokenError> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Self::default()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| TokenError::Jwks(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(TokenError::Jwks(format!("{}: {}", path.display(), e))),
        }
    }

    /// Rewrite the whole document through a temp file and rename.
    pub async fn store(&self, path: &Path) -> Result<(), TokenError> {
        let io_err = |e: std::io::Error| TokenError::Jwks(format!("{}: {}", path.display(), e));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| TokenError::Jwks(format!("serialize: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }

    /// Insert or replace by `kid`, keeping insertion order.
    pub fn upsert(&mut self, jwk: Jwk) {
        match self.keys.iter_mut().find(|k| k.kid == jwk.kid) {
            Some(existing) => *existing = jwk,
            None => self.keys.push(jwk),
        }
    }

    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = JwkSet::load(&dir.path().join("nope.json")).await.unwrap();
        assert!(set.keys.is_empty());
    }

    #[tokio::test]
    async fn test_store_and_upsert_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwks").join("jwks.json");

        let mut set = JwkSet::default();
        set.upsert(Jwk::rsa("a", "n1", "AQAB"));
        set.upsert(Jwk::rsa("b", "n2", "AQAB"));
        set.upsert(Jwk::rsa("a", "n3", "AQAB"));
        set.store(&path).await.unwrap();

        let loaded = JwkSet::load(&path).await.unwrap();
        assert_eq!(loaded.keys.len(), 2);
        assert_eq!(loaded.keys[0].kid, "a");
        assert_eq!(loaded.keys[0].n, "n3");

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["keys"][1]["use"], "sig");
    }
}
