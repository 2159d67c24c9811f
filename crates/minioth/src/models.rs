//! Identity records and the typed filters and patches the API accepts.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const ADMIN_GID: u32 = 0;
pub const MOD_GID: u32 = 100;
pub const USER_GID: u32 = 1000;
pub const ROOT_UID: u32 = 0;

/// Seed groups, created at boot when missing.
pub const SEED_GROUPS: [(u32, &str); 3] = [(ADMIN_GID, "admin"), (MOD_GID, "mod"), (USER_GID, "user")];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub gid: u32,
    pub groupname: String,
    /// Member usernames, only filled when listing groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

impl Group {
    pub fn new(gid: u32, groupname: impl Into<String>) -> Self {
        Self {
            gid,
            groupname: groupname.into(),
            users: Vec::new(),
        }
    }
}

/// A user snapshot, never carrying the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: u32,
    pub username: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub shell: String,
    pub pgroup: u32,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl User {
    /// Comma-joined group names, as carried in token claims.
    pub fn group_names(&self) -> String {
        self.groups
            .iter()
            .map(|g| g.groupname.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Comma-joined gids, as carried in token claims.
    pub fn group_ids(&self) -> String {
        self.groups
            .iter()
            .map(|g| g.gid.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Shadow entry for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Password {
    pub hashpass: String,
    pub last_password_change: String,
    pub minimum_password_age: String,
    pub maximum_password_age: String,
    pub warning_period: String,
    pub inactivity_period: String,
    pub expiration_date: String,
}

impl Password {
    pub fn new(hashpass: String) -> Self {
        Self {
            hashpass,
            last_password_change: today(),
            minimum_password_age: "0".into(),
            maximum_password_age: "99999".into(),
            warning_period: "7".into(),
            inactivity_period: String::new(),
            expiration_date: String::new(),
        }
    }
}

pub(crate) fn today() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}",
        now.year(),
        u8::from(now.month()),
        now.day()
    )
}

/// Id ranges: admins below 100, mods below 1000, everyone else from 1000 up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdClass {
    Admin,
    Mod,
    User,
}

impl IdClass {
    pub fn range(&self) -> (u32, u32) {
        match self {
            IdClass::Admin => (1, 99),
            IdClass::Mod => (100, 999),
            IdClass::User => (1000, u32::MAX),
        }
    }

    /// The class a new user falls in given the extra groups requested.
    pub fn for_groups(groups: &[String]) -> Self {
        if groups.iter().any(|g| g == "admin") {
            IdClass::Admin
        } else if groups.iter().any(|g| g == "mod") {
            IdClass::Mod
        } else {
            IdClass::User
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordInput {
    pub hashpass: String,
}

/// Body of `useradd` and `register`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: PasswordInput,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub shell: String,
    /// Extra group names; only honored on the admin route.
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub user: NewUser,
}

/// Full replacement of a user entry (`usermod`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub uid: u32,
    pub username: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub shell: String,
    pub pgroup: Option<u32>,
    pub password: Option<PasswordInput>,
    pub groups: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsermodRequest {
    pub user: UserUpdate,
}

/// Partial update (`userpatch`); empty strings are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    pub uid: u32,
    pub username: Option<String>,
    pub info: Option<String>,
    pub home: Option<String>,
    pub shell: Option<String>,
    pub pgroup: Option<u32>,
    /// Comma-joined group names replacing the whole membership set.
    pub groups: Option<String>,
    pub password: Option<String>,
}

/// What a backend writes for one user; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub info: Option<String>,
    pub home: Option<String>,
    pub shell: Option<String>,
    pub pgroup: Option<u32>,
    pub groups: Option<Vec<String>>,
    pub hashpass: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        *self == UserChanges::default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserFilter {
    pub uid: Option<u32>,
    pub username: Option<String>,
}

impl UserFilter {
    pub fn uid(uid: u32) -> Self {
        Self {
            uid: Some(uid),
            username: None,
        }
    }

    pub fn username(username: &str) -> Self {
        Self {
            uid: None,
            username: Some(username.to_string()),
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.uid.map_or(true, |uid| user.uid == uid)
            && self
                .username
                .as_deref()
                .map_or(true, |name| user.username == name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupFilter {
    pub gid: Option<u32>,
    pub groupname: Option<String>,
}

impl GroupFilter {
    pub fn matches(&self, group: &Group) -> bool {
        self.gid.map_or(true, |gid| group.gid == gid)
            && self
                .groupname
                .as_deref()
                .map_or(true, |name| group.groupname == name)
    }
}

/// Body of `groupadd`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewGroup {
    pub groupname: String,
    /// Member uids.
    #[serde(default)]
    pub users: Vec<u32>,
}

/// Body of `groupmod`: replaces name and members.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupUpdate {
    pub gid: u32,
    pub groupname: String,
    #[serde(default)]
    pub users: Vec<u32>,
}

/// Body of `grouppatch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupPatch {
    pub gid: u32,
    pub fields: GroupFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupFields {
    pub groupname: Option<String>,
}

/// What a backend writes for one group; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupChanges {
    pub groupname: Option<String>,
    pub members: Option<Vec<u32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_body_shape() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"user":{"username":"alice","password":{"hashpass":"pw12345"}}}"#,
        )
        .unwrap();
        assert_eq!(req.user.username, "alice");
        assert_eq!(req.user.password.hashpass, "pw12345");
        assert!(req.user.groups.is_empty());
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let ok: Result<UserPatch, _> = serde_json::from_str(r#"{"uid":1001,"info":"x"}"#);
        assert!(ok.is_ok());
        let bad: Result<UserPatch, _> = serde_json::from_str(r#"{"uid":1001,"isAdmin":true}"#);
        assert!(bad.is_err());
        let bad: Result<GroupPatch, _> =
            serde_json::from_str(r#"{"gid":1001,"fields":{"gid":0}}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_claim_strings() {
        let user = User {
            uid: 1001,
            username: "alice".into(),
            info: String::new(),
            home: String::new(),
            shell: String::new(),
            pgroup: 1001,
            verified: false,
            groups: vec![Group::new(1000, "user"), Group::new(1001, "alice")],
        };
        assert_eq!(user.group_names(), "user,alice");
        assert_eq!(user.group_ids(), "1000,1001");
    }

    #[test]
    fn test_id_class() {
        assert_eq!(IdClass::for_groups(&["admin".into()]), IdClass::Admin);
        assert_eq!(IdClass::for_groups(&["mod".into()]), IdClass::Mod);
        assert_eq!(IdClass::for_groups(&[]), IdClass::User);
        assert_eq!(IdClass::User.range().0, 1000);
    }
}
