//! The identity core: validation and hashing in front of a backend.

use std::sync::Arc;

use crate::backend::IdentityBackend;
use crate::error::{IdentityError, Result};
use crate::hasher;
use crate::models::{
    Group, GroupChanges, GroupFilter, GroupPatch, GroupUpdate, NewGroup, NewUser, User,
    UserChanges, UserFilter, UserPatch, UserUpdate,
};
use crate::validate::{self, PasswordPolicy};

#[derive(Clone)]
pub struct Minioth {
    backend: Arc<dyn IdentityBackend>,
    hash_cost: u32,
    policy: PasswordPolicy,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Minioth {
    pub fn new(backend: Arc<dyn IdentityBackend>, hash_cost: u32, policy: PasswordPolicy) -> Self {
        Self {
            backend,
            hash_cost,
            policy,
        }
    }

    pub fn backend(&self) -> &Arc<dyn IdentityBackend> {
        &self.backend
    }

    pub fn hash_cost(&self) -> u32 {
        self.hash_cost
    }

    /// Seed groups and root; root's credentials skip validation.
    pub async fn seed(&self, root_name: &str, root_password: &str) -> Result<()> {
        let hash = hasher::hash(root_password, self.hash_cost).await?;
        self.backend.seed(root_name, hash).await
    }

    /// Self-service signup. Requested extra groups are dropped.
    pub async fn register(&self, mut user: NewUser) -> Result<(u32, u32)> {
        user.groups.clear();
        validate::new_user(&user, self.policy)?;
        let hash = hasher::hash(&user.password.hashpass, self.hash_cost).await?;
        self.backend.useradd(&user, hash).await
    }

    /// Admin-side creation, honoring extra groups.
    pub async fn useradd(&self, user: NewUser) -> Result<(u32, u32)> {
        validate::new_user(&user, PasswordPolicy::default())?;
        let hash = hasher::hash(&user.password.hashpass, self.hash_cost).await?;
        self.backend.useradd(&user, hash).await
    }

    pub async fn userdel(&self, uid: u32) -> Result<()> {
        self.backend.userdel(uid).await
    }

    /// Replace a whole entry.
    pub async fn usermod(&self, update: UserUpdate) -> Result<()> {
        validate::username(&update.username)?;
        validate::info(&update.info)?;
        let hashpass = match update.password.as_ref().map(|p| p.hashpass.as_str()) {
            Some(plain) if !plain.is_empty() => {
                validate::password(plain, self.policy)?;
                Some(hasher::hash(plain, self.hash_cost).await?)
            }
            _ => None,
        };

        let changes = UserChanges {
            username: Some(update.username),
            info: Some(update.info),
            home: Some(update.home),
            shell: Some(update.shell),
            pgroup: Some(update.pgroup.unwrap_or(update.uid)),
            groups: update.groups,
            hashpass,
        };
        self.backend.update_user(update.uid, changes).await
    }

    /// Apply the non-empty fields of a patch.
    pub async fn userpatch(&self, patch: UserPatch) -> Result<()> {
        let username = non_empty(patch.username);
        if let Some(name) = &username {
            validate::username(name)?;
        }
        let info = non_empty(patch.info);
        if let Some(info) = &info {
            validate::info(info)?;
        }
        let hashpass = match non_empty(patch.password) {
            Some(plain) => {
                validate::password(&plain, self.policy)?;
                Some(hasher::hash(&plain, self.hash_cost).await?)
            }
            None => None,
        };
        let groups = non_empty(patch.groups).map(|joined| {
            joined
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect()
        });

        let changes = UserChanges {
            username,
            info,
            home: non_empty(patch.home),
            shell: non_empty(patch.shell),
            pgroup: patch.pgroup,
            groups,
            hashpass,
        };
        self.backend.update_user(patch.uid, changes).await
    }

    pub async fn groupadd(&self, group: NewGroup) -> Result<u32> {
        validate_groupname(&group.groupname)?;
        self.backend.groupadd(&group).await
    }

    pub async fn groupdel(&self, gid: u32) -> Result<()> {
        self.backend.groupdel(gid).await
    }

    pub async fn groupmod(&self, update: GroupUpdate) -> Result<()> {
        validate_groupname(&update.groupname)?;
        let changes = GroupChanges {
            groupname: Some(update.groupname),
            members: Some(update.users),
        };
        self.backend.update_group(update.gid, changes).await
    }

    pub async fn grouppatch(&self, patch: GroupPatch) -> Result<()> {
        let groupname = non_empty(patch.fields.groupname);
        if let Some(name) = &groupname {
            validate_groupname(name)?;
        }
        let changes = GroupChanges {
            groupname,
            members: None,
        };
        self.backend.update_group(patch.gid, changes).await
    }

    pub async fn passwd(&self, username: &str, password: &str) -> Result<()> {
        validate::password(password, self.policy)?;
        let hash = hasher::hash(password, self.hash_cost).await?;
        self.backend.passwd(username, hash).await
    }

    /// The user snapshot on success; unknown users and wrong passwords are
    /// indistinguishable.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let Some((user, hash)) = self.backend.credentials(username).await? else {
            return Err(IdentityError::BadCredentials);
        };
        if hasher::verify(password, &hash).await? {
            Ok(user)
        } else {
            Err(IdentityError::BadCredentials)
        }
    }

    /// Users matching `filter`; `Empty` when none do.
    pub async fn users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let users = self.backend.users(filter).await?;
        if users.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(users)
    }

    pub async fn groups(&self, filter: &GroupFilter) -> Result<Vec<Group>> {
        let groups = self.backend.groups(filter).await?;
        if groups.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(groups)
    }

    pub async fn user(&self, uid: u32) -> Result<User> {
        self.backend
            .users(&UserFilter::uid(uid))
            .await?
            .pop()
            .ok_or_else(|| IdentityError::NotFound(format!("user {}", uid)))
    }
}

fn validate_groupname(name: &str) -> Result<()> {
    let ok = (2..=32).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !ok {
        return Err(IdentityError::BadInput(
            "group name must be 2 to 32 characters of [A-Za-z0-9_-]".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Database, SqlBackend};
    use crate::models::PasswordInput;

    async fn minioth() -> Minioth {
        let backend = SqlBackend::new(Database::in_memory().await.unwrap());
        let m = Minioth::new(Arc::new(backend), 4, PasswordPolicy::default());
        m.seed("root", "root").await.unwrap();
        m
    }

    fn new_user(name: &str, pass: &str, groups: &[&str]) -> NewUser {
        NewUser {
            username: name.into(),
            password: PasswordInput {
                hashpass: pass.into(),
            },
            groups: groups.iter().map(|g| g.to_string()).collect(),
            ..NewUser::default()
        }
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let m = minioth().await;
        let (uid, pgroup) = m.register(new_user("alice", "pw12345", &["admin"])).await.unwrap();
        assert!(uid >= 1000);
        assert_eq!(uid, pgroup);

        let user = m.authenticate("alice", "pw12345").await.unwrap();
        // register drops requested groups
        assert!(!user.groups.iter().any(|g| g.groupname == "admin"));

        assert!(matches!(
            m.authenticate("alice", "nope123").await,
            Err(IdentityError::BadCredentials)
        ));
        assert!(matches!(
            m.authenticate("ghost", "pw12345").await,
            Err(IdentityError::BadCredentials)
        ));
        // root skipped validation at seed time
        assert_eq!(m.authenticate("root", "root").await.unwrap().uid, 0);
    }

    #[tokio::test]
    async fn test_passwd_changes_credentials() {
        let m = minioth().await;
        m.register(new_user("alice", "pw12345", &[])).await.unwrap();
        m.passwd("alice", "newpass1").await.unwrap();
        assert!(m.authenticate("alice", "pw12345").await.is_err());
        assert!(m.authenticate("alice", "newpass1").await.is_ok());
        assert!(matches!(
            m.passwd("alice", "x").await,
            Err(IdentityError::BadInput(_))
        ));
    }

    #[tokio::test]
    async fn test_userpatch_ignores_empty_values() {
        let m = minioth().await;
        let (uid, _) = m.register(new_user("alice", "pw12345", &[])).await.unwrap();
        m.userpatch(UserPatch {
            uid,
            info: Some("first".into()),
            ..UserPatch::default()
        })
        .await
        .unwrap();
        m.userpatch(UserPatch {
            uid,
            info: Some(String::new()),
            shell: Some("/bin/sh".into()),
            groups: Some("user, mod".into()),
            ..UserPatch::default()
        })
        .await
        .unwrap();

        let user = m.user(uid).await.unwrap();
        assert_eq!(user.info, "first");
        assert_eq!(user.shell, "/bin/sh");
        assert_eq!(user.group_names(), "mod,user");
    }

    #[tokio::test]
    async fn test_select_empty() {
        let m = minioth().await;
        assert!(matches!(
            m.users(&UserFilter::uid(4242)).await,
            Err(IdentityError::Empty)
        ));
        assert_eq!(m.users(&UserFilter::default()).await.unwrap().len(), 1);
        assert!(matches!(
            m.user(4242).await,
            Err(IdentityError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let m = minioth().await;
        assert!(matches!(
            m.register(new_user("root", "pw12345", &[])).await,
            Err(IdentityError::BadInput(_))
        ));
        assert!(matches!(
            m.groupadd(NewGroup {
                groupname: "bad name".into(),
                users: vec![],
            })
            .await,
            Err(IdentityError::BadInput(_))
        ));
    }
}
