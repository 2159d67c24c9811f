use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Database;
use crate::{Result, StoreError};

/// A local FsLite administrator, independent of Minioth.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Admin {
    pub uuid: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub hashpass: String,
}

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]{3,}$").expect("static regex"))
}

fn password_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9!@#$%^&*]{5,}$").expect("static regex"))
}

async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
        .map_err(StoreError::from)
}

async fn verify_password(password: &str, hashpass: &str) -> Result<bool> {
    let password = password.to_string();
    let hashpass = hashpass.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashpass))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
        .map_err(StoreError::from)
}

pub fn validate_admin(username: &str, password: &str) -> Result<()> {
    if !username_re().is_match(username) {
        return Err(StoreError::BadInput(
            "username must be at least 3 characters of [A-Za-z0-9_]".into(),
        ));
    }
    if !password_re().is_match(password) {
        return Err(StoreError::BadInput(
            "password must be at least 5 characters of [A-Za-z0-9!@#$%^&*]".into(),
        ));
    }
    Ok(())
}

impl Admin {
    pub async fn register(
        username: &str,
        password: &str,
        hash_cost: u32,
        db: &Database,
    ) -> Result<Admin> {
        validate_admin(username, password)?;
        let hashpass = hash_password(password, hash_cost).await?;
        let uuid = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO user_admin (uuid, username, hashpass) VALUES (?1, ?2, ?3)")
            .bind(&uuid)
            .bind(username)
            .bind(&hashpass)
            .execute(&**db)
            .await
            .map_err(|e| StoreError::unique(e, format!("admin {}", username)))?;

        Ok(Admin {
            uuid,
            username: username.to_string(),
            hashpass,
        })
    }

    pub async fn by_username(username: &str, db: &Database) -> Result<Option<Admin>> {
        Ok(sqlx::query_as::<_, Admin>(
            "SELECT uuid, username, hashpass FROM user_admin WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&**db)
        .await?)
    }

    /// `None` on unknown user or wrong password.
    pub async fn authenticate(username: &str, password: &str, db: &Database) -> Result<Option<Admin>> {
        let Some(admin) = Self::by_username(username, db).await? else {
            return Ok(None);
        };
        Ok(verify_password(password, &admin.hashpass)
            .await?
            .then_some(admin))
    }

    /// Register the boot-time admin unless it already exists.
    pub async fn seed(username: &str, password: &str, hash_cost: u32, db: &Database) -> Result<()> {
        if Self::by_username(username, db).await?.is_some() {
            return Ok(());
        }
        match Self::register(username, password, hash_cost, db).await {
            Ok(_) | Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let db = Database::in_memory().await.unwrap();
        let admin = Admin::register("fsladmin", "s3cr3t!", 4, &db).await.unwrap();
        assert!(!admin.uuid.is_empty());

        let ok = Admin::authenticate("fsladmin", "s3cr3t!", &db).await.unwrap();
        assert_eq!(ok.unwrap().uuid, admin.uuid);
        assert!(Admin::authenticate("fsladmin", "wrong1", &db)
            .await
            .unwrap()
            .is_none());
        assert!(Admin::authenticate("nobody", "s3cr3t!", &db)
            .await
            .unwrap()
            .is_none());

        let dup = Admin::register("fsladmin", "other12", 4, &db).await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));

        Admin::seed("fsladmin", "ignored1", 4, &db).await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_leaves_runtime_responsive() {
        let ticker = tokio::spawn(async {
            tokio::task::yield_now().await;
            true
        });
        let hashpass = hash_password("s3cr3t!", 10).await.unwrap();
        assert!(ticker.is_finished());
        assert!(ticker.await.unwrap());
        assert!(verify_password("s3cr3t!", &hashpass).await.unwrap());
        assert!(!verify_password("s3cr3t?", &hashpass).await.unwrap());
    }

    #[test]
    fn test_validation() {
        assert!(validate_admin("ab", "12345").is_err());
        assert!(validate_admin("abc", "1234").is_err());
        assert!(validate_admin("a_b", "pa ss").is_err());
        assert!(validate_admin("a_b", "p@ss!").is_ok());
    }
}
