use serde::{Deserialize, Serialize};

use super::capability::CapabilitySet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    #[default]
    Access,
    Refresh,
}

/// JWT claims issued by Minioth (and by FsLite for its local admins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// uid, as a decimal string
    pub sub: String,
    pub username: String,
    /// comma-joined group names
    pub groups: String,
    /// comma-joined gids
    pub group_ids: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub token_use: TokenUse,
}

impl Claims {
    pub fn uid(&self) -> Option<u32> {
        self.sub.parse().ok()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::parse(&self.groups)
    }

    pub fn gids(&self) -> Vec<u32> {
        self.group_ids
            .split(',')
            .filter_map(|g| g.trim().parse().ok())
            .collect()
    }
}

/// The caller identity a verified token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: u32,
    pub username: String,
    pub groups: CapabilitySet,
    pub group_ids: Vec<u32>,
    pub access_token: String,
}

impl Principal {
    pub fn from_claims(claims: &Claims, access_token: &str) -> Option<Self> {
        Some(Self {
            uid: claims.uid()?,
            username: claims.username.clone(),
            groups: claims.capabilities(),
            group_ids: claims.gids(),
            access_token: access_token.to_string(),
        })
    }

    pub fn is_admin(&self) -> bool {
        self.uid == 0 || self.groups.contains("admin")
    }

    pub fn identity(&self) -> Identity {
        Identity {
            uid: self.uid,
            gids: self.group_ids.clone(),
        }
    }
}

/// The `(uid, gids)` pair resource permissions are checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gids: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_to_principal() {
        let claims = Claims {
            sub: "1000".into(),
            username: "alice".into(),
            groups: "user,alice".into(),
            group_ids: "1000, 1001".into(),
            iss: "minioth".into(),
            iat: 0,
            exp: 1,
            token_use: TokenUse::Access,
        };
        let principal = Principal::from_claims(&claims, "tok").unwrap();
        assert_eq!(principal.uid, 1000);
        assert_eq!(principal.group_ids, vec![1000, 1001]);
        assert!(!principal.is_admin());
    }

    #[test]
    fn test_token_use_defaults_to_access() {
        let json = r#"{"sub":"0","username":"root","groups":"admin","group_ids":"0","iss":"x","iat":0,"exp":1}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.token_use, TokenUse::Access);
    }
}
