//! Input rules for usernames, passwords and user info.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{IdentityError, Result};
use crate::models::NewUser;

/// Names nobody may register.
pub const FORBIDDEN_NAMES: [&str; 7] = [
    "root",
    "kubernetes",
    "k8s",
    "admin",
    "manager",
    "superuser",
    "sudo",
];

pub const DEFAULT_PASSWORD_MIN_LEN: usize = 5;
pub const MAX_INFO_LEN: usize = 100;

/// Minimum password length for users; admins are held to the default.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_PASSWORD_MIN_LEN,
        }
    }
}

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{3,32}$").expect("static regex"))
}

fn password_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9!@#$%^&*]+$").expect("static regex"))
}

fn info_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+@_]*$").expect("static regex"))
}

pub fn username(name: &str) -> Result<()> {
    if !username_re().is_match(name) {
        return Err(IdentityError::BadInput(
            "username must be 3 to 32 alphanumeric characters".into(),
        ));
    }
    if FORBIDDEN_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(IdentityError::BadInput(format!(
            "username '{}' is reserved",
            name
        )));
    }
    Ok(())
}

pub fn password(pass: &str, policy: PasswordPolicy) -> Result<()> {
    if pass.len() < policy.min_len {
        return Err(IdentityError::BadInput(format!(
            "password must be at least {} characters",
            policy.min_len
        )));
    }
    if !password_re().is_match(pass) {
        return Err(IdentityError::BadInput(
            "password may only contain [A-Za-z0-9!@#$%^&*]".into(),
        ));
    }
    Ok(())
}

pub fn info(info: &str) -> Result<()> {
    if info.chars().count() > MAX_INFO_LEN || !info_re().is_match(info) {
        return Err(IdentityError::BadInput(format!(
            "info must be at most {} characters of [A-Za-z0-9+@_]",
            MAX_INFO_LEN
        )));
    }
    Ok(())
}

pub fn new_user(user: &NewUser, policy: PasswordPolicy) -> Result<()> {
    username(&user.username)?;
    password(&user.password.hashpass, policy)?;
    info(&user.info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usernames() {
        assert!(username("alice").is_ok());
        assert!(username("al").is_err());
        assert!(username("al ice").is_err());
        assert!(username("a_b_c").is_err());
        assert!(username(&"a".repeat(33)).is_err());
        assert!(username("root").is_err());
        assert!(username("Admin").is_err());
    }

    #[test]
    fn test_passwords() {
        let policy = PasswordPolicy::default();
        assert!(password("pw12345", policy).is_ok());
        assert!(password("p@ss!", policy).is_ok());
        assert!(password("pw12", policy).is_err());
        assert!(password("pw 12345", policy).is_err());
        assert!(password("pw12345", PasswordPolicy { min_len: 8 }).is_err());
    }

    #[test]
    fn test_info() {
        assert!(info("").is_ok());
        assert!(info("alice+work@example_org").is_ok());
        assert!(info("semi;colon").is_err());
        assert!(info(&"x".repeat(101)).is_err());
    }
}
