//! Storage for users, groups and shadow passwords.
//!
//! Two interchangeable backends carry the same contract: [`SqlBackend`] over
//! SQLite and [`PlainBackend`] over passwd/shadow/group style text files.
//! Password hashing happens above this layer; backends only ever see hashes.

mod database;
mod plain;

use async_trait::async_trait;

pub use database::{Database, DatabaseSetupError, PoolConfig, SqlBackend};
pub use plain::PlainBackend;

use crate::error::Result;
use crate::models::{Group, GroupChanges, GroupFilter, NewGroup, NewUser, User, UserChanges, UserFilter};

#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Create the seed groups and the root user when missing.
    async fn seed(&self, root_name: &str, root_hash: String) -> Result<()>;

    /// Insert a user with its password, personal group and default
    /// memberships. Returns `(uid, pgroup)`.
    async fn useradd(&self, user: &NewUser, hashpass: String) -> Result<(u32, u32)>;

    async fn userdel(&self, uid: u32) -> Result<()>;

    async fn update_user(&self, uid: u32, changes: UserChanges) -> Result<()>;

    async fn groupadd(&self, group: &NewGroup) -> Result<u32>;

    async fn groupdel(&self, gid: u32) -> Result<()>;

    async fn update_group(&self, gid: u32, changes: GroupChanges) -> Result<()>;

    async fn passwd(&self, username: &str, hashpass: String) -> Result<()>;

    /// The user and their stored hash, for credential checks.
    async fn credentials(&self, username: &str) -> Result<Option<(User, String)>>;

    async fn users(&self, filter: &UserFilter) -> Result<Vec<User>>;

    async fn groups(&self, filter: &GroupFilter) -> Result<Vec<Group>>;

    /// Readiness check.
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    //! Contract tests run against both backends.

    use super::*;
    use crate::error::IdentityError;
    use crate::models::{PasswordInput, ROOT_UID, USER_GID};

    fn alice(groups: &[&str]) -> NewUser {
        NewUser {
            username: "alice".into(),
            password: PasswordInput {
                hashpass: "pw12345".into(),
            },
            info: "alice@example".into(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            ..NewUser::default()
        }
    }

    async fn backends() -> (Vec<Box<dyn IdentityBackend>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sql = SqlBackend::new(Database::in_memory().await.unwrap());
        let plain = PlainBackend::open(dir.path().join("plain")).await.unwrap();
        let backends: Vec<Box<dyn IdentityBackend>> = vec![Box::new(sql), Box::new(plain)];
        for b in &backends {
            b.seed("root", "roothash".into()).await.unwrap();
        }
        (backends, dir)
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (backends, _dir) = backends().await;
        for b in backends {
            b.seed("root", "other".into()).await.unwrap();
            let root = b.users(&UserFilter::uid(ROOT_UID)).await.unwrap();
            assert_eq!(root.len(), 1);
            assert_eq!(root[0].username, "root");
            assert!(root[0].groups.iter().any(|g| g.groupname == "admin"));
            let (_, hash) = b.credentials("root").await.unwrap().unwrap();
            assert_eq!(hash, "roothash");
            assert_eq!(b.groups(&GroupFilter::default()).await.unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_useradd_allocates_personal_group() {
        let (backends, _dir) = backends().await;
        for b in backends {
            let (uid, pgroup) = b.useradd(&alice(&[]), "h1".into()).await.unwrap();
            assert!(uid >= 1000);
            assert_eq!(uid, pgroup);

            let users = b.users(&UserFilter::uid(uid)).await.unwrap();
            assert_eq!(users.len(), 1);
            let gids: Vec<u32> = users[0].groups.iter().map(|g| g.gid).collect();
            assert!(gids.contains(&USER_GID));
            assert!(gids.contains(&pgroup));

            let dup = b.useradd(&alice(&[]), "h2".into()).await;
            assert!(matches!(dup, Err(IdentityError::AlreadyExists(_))));

            let mut bob = alice(&[]);
            bob.username = "bob".into();
            let (next, _) = b.useradd(&bob, "h3".into()).await.unwrap();
            assert_eq!(next, uid + 1);
        }
    }

    #[tokio::test]
    async fn test_id_classes() {
        let (backends, _dir) = backends().await;
        for b in backends {
            let (uid, _) = b.useradd(&alice(&["admin"]), "h".into()).await.unwrap();
            assert!((1..100).contains(&uid));
            let user = &b.users(&UserFilter::uid(uid)).await.unwrap()[0];
            assert!(user.groups.iter().any(|g| g.groupname == "admin"));

            let mut moder = alice(&["mod"]);
            moder.username = "moder".into();
            let (uid, _) = b.useradd(&moder, "h".into()).await.unwrap();
            assert!((100..1000).contains(&uid));
        }
    }

    #[tokio::test]
    async fn test_userdel() {
        let (backends, _dir) = backends().await;
        for b in backends {
            let (uid, _) = b.useradd(&alice(&[]), "h".into()).await.unwrap();
            assert!(matches!(
                b.userdel(ROOT_UID).await,
                Err(IdentityError::Forbidden(_))
            ));
            b.userdel(uid).await.unwrap();
            assert!(b.users(&UserFilter::uid(uid)).await.unwrap().is_empty());
            assert!(b.credentials("alice").await.unwrap().is_none());
            let personal = GroupFilter {
                gid: None,
                groupname: Some("alice".into()),
            };
            assert!(b.groups(&personal).await.unwrap().is_empty());
            assert!(matches!(
                b.userdel(uid).await,
                Err(IdentityError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_update_user_replaces_groups() {
        let (backends, _dir) = backends().await;
        for b in backends {
            let (uid, _) = b.useradd(&alice(&[]), "h".into()).await.unwrap();
            b.update_user(
                uid,
                UserChanges {
                    info: Some("changed".into()),
                    groups: Some(vec!["mod".into(), "user".into()]),
                    hashpass: Some("h2".into()),
                    ..UserChanges::default()
                },
            )
            .await
            .unwrap();

            let (user, hash) = b.credentials("alice").await.unwrap().unwrap();
            assert_eq!(user.info, "changed");
            assert_eq!(hash, "h2");
            let mut names: Vec<_> = user.groups.iter().map(|g| g.groupname.clone()).collect();
            names.sort();
            assert_eq!(names, vec!["mod".to_string(), "user".to_string()]);

            assert!(matches!(
                b.update_user(4242, UserChanges::default()).await,
                Err(IdentityError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_group_lifecycle() {
        let (backends, _dir) = backends().await;
        for b in backends {
            let (uid, _) = b.useradd(&alice(&[]), "h".into()).await.unwrap();
            let gid = b
                .groupadd(&NewGroup {
                    groupname: "devs".into(),
                    users: vec![uid],
                })
                .await
                .unwrap();
            assert!(gid > uid);

            let devs = b
                .groups(&GroupFilter {
                    gid: Some(gid),
                    groupname: None,
                })
                .await
                .unwrap();
            assert_eq!(devs[0].users, vec!["alice".to_string()]);

            let dup = b
                .groupadd(&NewGroup {
                    groupname: "devs".into(),
                    users: vec![],
                })
                .await;
            assert!(matches!(dup, Err(IdentityError::AlreadyExists(_))));

            b.update_group(
                gid,
                GroupChanges {
                    groupname: Some("ops".into()),
                    members: Some(vec![]),
                },
            )
            .await
            .unwrap();
            let ops = b
                .groups(&GroupFilter {
                    gid: Some(gid),
                    groupname: None,
                })
                .await
                .unwrap();
            assert_eq!(ops[0].groupname, "ops");
            assert!(ops[0].users.is_empty());

            b.groupdel(gid).await.unwrap();
            assert!(matches!(
                b.groupdel(gid).await,
                Err(IdentityError::NotFound(_))
            ));
            assert!(matches!(
                b.groupdel(USER_GID).await,
                Err(IdentityError::Forbidden(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_passwd() {
        let (backends, _dir) = backends().await;
        for b in backends {
            b.useradd(&alice(&[]), "h".into()).await.unwrap();
            b.passwd("alice", "h2".into()).await.unwrap();
            assert_eq!(b.credentials("alice").await.unwrap().unwrap().1, "h2");
            assert!(matches!(
                b.passwd("nobody", "h".into()).await,
                Err(IdentityError::NotFound(_))
            ));
        }
    }
}
