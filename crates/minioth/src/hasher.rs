//! bcrypt on the blocking pool.

use crate::error::{IdentityError, Result};

pub async fn hash(plain: &str, cost: u32) -> Result<String> {
    let plain = plain.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .map_err(|e| IdentityError::Io(std::io::Error::other(e)))?
        .map_err(IdentityError::from)
}

/// `false` for a mismatch; an unparsable stored hash is also a mismatch.
pub async fn verify(plain: &str, hashed: &str) -> Result<bool> {
    let plain = plain.to_string();
    let hashed = hashed.to_string();
    let verdict = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hashed))
        .await
        .map_err(|e| IdentityError::Io(std::io::Error::other(e)))?;
    match verdict {
        Ok(ok) => Ok(ok),
        Err(e) => {
            tracing::warn!("stored hash could not be checked: {}", e);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let h = hash("pw12345", 4).await.unwrap();
        assert!(h.starts_with("$2"));
        assert!(verify("pw12345", &h).await.unwrap());
        assert!(!verify("pw12346", &h).await.unwrap());
        assert!(!verify("pw12345", "not-a-hash").await.unwrap());
    }
}
