//! Text-file identity backend.
//!
//! Three colon-separated files under one directory:
//!
//! ```text
//! mpasswd  username:x:uid:pgroup:info:home:shell
//! mshadow  username:hash:lastChange:minAge:maxAge:warn:inactive:expire
//! mgroup   groupname:x:gid:user1,user2
//! ```
//!
//! Every mutation takes one process-wide lock, reads all three files, applies
//! the change in memory and rewrites each file through a temp file and rename.
//! Reads take no lock.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::IdentityBackend;
use crate::error::{IdentityError, Result};
use crate::models::{
    today, Group, GroupChanges, GroupFilter, IdClass, NewGroup, NewUser, Password, User,
    UserChanges, UserFilter, ADMIN_GID, ROOT_UID, SEED_GROUPS, USER_GID,
};

const PASSWD: &str = "mpasswd";
const SHADOW: &str = "mshadow";
const GROUP: &str = "mgroup";

#[derive(Debug, Clone)]
struct PasswdEntry {
    username: String,
    uid: u32,
    pgroup: u32,
    info: String,
    home: String,
    shell: String,
}

#[derive(Debug, Clone)]
struct ShadowEntry {
    username: String,
    password: Password,
}

#[derive(Debug, Clone)]
struct GroupEntry {
    groupname: String,
    gid: u32,
    members: Vec<String>,
}

#[derive(Debug, Default)]
struct Tables {
    passwd: Vec<PasswdEntry>,
    shadow: Vec<ShadowEntry>,
    groups: Vec<GroupEntry>,
}

fn field(value: &str) -> Result<&str> {
    if value.contains(':') || value.contains('\n') {
        return Err(IdentityError::BadInput(format!(
            "'{}' cannot be stored in a colon-separated file",
            value
        )));
    }
    Ok(value)
}

fn number(value: &str, line: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| IdentityError::Corrupt(format!("bad id in '{}'", line)))
}

impl Tables {
    fn parse(passwd: &str, shadow: &str, group: &str) -> Result<Self> {
        let lines = |text: &str| -> Vec<String> {
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()
        };

        let mut tables = Tables::default();
        for line in lines(passwd) {
            let f: Vec<&str> = line.split(':').collect();
            let [username, _, uid, pgroup, info, home, shell] = f[..] else {
                return Err(IdentityError::Corrupt(format!("{}: '{}'", PASSWD, line)));
            };
            tables.passwd.push(PasswdEntry {
                username: username.to_string(),
                uid: number(uid, &line)?,
                pgroup: number(pgroup, &line)?,
                info: info.to_string(),
                home: home.to_string(),
                shell: shell.to_string(),
            });
        }
        for line in lines(shadow) {
            let f: Vec<&str> = line.split(':').collect();
            let [username, hash, last, min, max, warn, inactive, expire] = f[..] else {
                return Err(IdentityError::Corrupt(format!("{}: '{}'", SHADOW, line)));
            };
            tables.shadow.push(ShadowEntry {
                username: username.to_string(),
                password: Password {
                    hashpass: hash.to_string(),
                    last_password_change: last.to_string(),
                    minimum_password_age: min.to_string(),
                    maximum_password_age: max.to_string(),
                    warning_period: warn.to_string(),
                    inactivity_period: inactive.to_string(),
                    expiration_date: expire.to_string(),
                },
            });
        }
        for line in lines(group) {
            let f: Vec<&str> = line.split(':').collect();
            let [groupname, _, gid, members] = f[..] else {
                return Err(IdentityError::Corrupt(format!("{}: '{}'", GROUP, line)));
            };
            tables.groups.push(GroupEntry {
                groupname: groupname.to_string(),
                gid: number(gid, &line)?,
                members: members
                    .split(',')
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect(),
            });
        }
        Ok(tables)
    }

    fn render(&self) -> Result<(String, String, String)> {
        let mut passwd = String::new();
        for u in &self.passwd {
            passwd.push_str(&format!(
                "{}:x:{}:{}:{}:{}:{}\n",
                field(&u.username)?,
                u.uid,
                u.pgroup,
                field(&u.info)?,
                field(&u.home)?,
                field(&u.shell)?
            ));
        }
        let mut shadow = String::new();
        for s in &self.shadow {
            let p = &s.password;
            shadow.push_str(&format!(
                "{}:{}:{}:{}:{}:{}:{}:{}\n",
                field(&s.username)?,
                field(&p.hashpass)?,
                p.last_password_change,
                p.minimum_password_age,
                p.maximum_password_age,
                p.warning_period,
                p.inactivity_period,
                p.expiration_date
            ));
        }
        let mut group = String::new();
        for g in &self.groups {
            group.push_str(&format!(
                "{}:x:{}:{}\n",
                field(&g.groupname)?,
                g.gid,
                g.members.join(",")
            ));
        }
        Ok((passwd, shadow, group))
    }

    fn next_id(&self, class: IdClass) -> Result<u32> {
        let (lo, hi) = class.range();
        let max = self
            .passwd
            .iter()
            .map(|u| u.uid)
            .chain(self.groups.iter().map(|g| g.gid))
            .filter(|id| (lo..=hi).contains(id))
            .max();
        match max {
            None => Ok(lo),
            Some(id) if id < hi => Ok(id + 1),
            Some(_) => Err(IdentityError::BadInput(format!(
                "id range {}..={} exhausted",
                lo, hi
            ))),
        }
    }

    fn user_by_uid(&self, uid: u32) -> Result<usize> {
        self.passwd
            .iter()
            .position(|u| u.uid == uid)
            .ok_or_else(|| IdentityError::NotFound(format!("user {}", uid)))
    }

    fn group_by_gid(&self, gid: u32) -> Result<usize> {
        self.groups
            .iter()
            .position(|g| g.gid == gid)
            .ok_or_else(|| IdentityError::NotFound(format!("group {}", gid)))
    }

    fn join(&mut self, username: &str, groupname: &str) {
        if let Some(g) = self.groups.iter_mut().find(|g| g.groupname == groupname) {
            if !g.members.iter().any(|m| m == username) {
                g.members.push(username.to_string());
            }
        }
    }

    fn leave_all(&mut self, username: &str) {
        for g in &mut self.groups {
            g.members.retain(|m| m != username);
        }
    }

    fn username_of(&self, uid: u32) -> Option<&str> {
        self.passwd
            .iter()
            .find(|u| u.uid == uid)
            .map(|u| u.username.as_str())
    }

    fn to_user(&self, entry: &PasswdEntry) -> User {
        User {
            uid: entry.uid,
            username: entry.username.clone(),
            info: entry.info.clone(),
            home: entry.home.clone(),
            shell: entry.shell.clone(),
            pgroup: entry.pgroup,
            verified: false,
            groups: self
                .groups
                .iter()
                .filter(|g| g.members.iter().any(|m| *m == entry.username))
                .map(|g| Group::new(g.gid, g.groupname.clone()))
                .collect(),
        }
    }

    fn add_user(&mut self, entry: PasswdEntry, hashpass: String) -> Result<()> {
        if self.passwd.iter().any(|u| u.username == entry.username)
            || self.groups.iter().any(|g| g.groupname == entry.username)
        {
            return Err(IdentityError::AlreadyExists(format!("user {}", entry.username)));
        }
        self.shadow.push(ShadowEntry {
            username: entry.username.clone(),
            password: Password::new(hashpass),
        });
        self.passwd.push(entry);
        Ok(())
    }
}

/// Identity files under one directory.
#[derive(Debug)]
pub struct PlainBackend {
    dir: PathBuf,
    write: Mutex<()>,
}

impl PlainBackend {
    /// Create the directory and empty files when missing.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        for name in [PASSWD, SHADOW, GROUP] {
            let path = dir.join(name);
            if !tokio::fs::try_exists(&path).await? {
                tokio::fs::write(&path, b"").await?;
            }
        }
        Ok(Self {
            dir,
            write: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn load(&self) -> Result<Tables> {
        let passwd = tokio::fs::read_to_string(self.dir.join(PASSWD)).await?;
        let shadow = tokio::fs::read_to_string(self.dir.join(SHADOW)).await?;
        let group = tokio::fs::read_to_string(self.dir.join(GROUP)).await?;
        Tables::parse(&passwd, &shadow, &group)
    }

    async fn replace(&self, name: &str, body: String) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{}.tmp", name));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn mutate<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T> + Send,
        T: Send,
    {
        let _guard = self.write.lock().await;
        let mut tables = self.load().await?;
        let out = apply(&mut tables)?;
        let (passwd, shadow, group) = tables.render()?;
        self.replace(PASSWD, passwd).await?;
        self.replace(SHADOW, shadow).await?;
        self.replace(GROUP, group).await?;
        Ok(out)
    }
}

#[async_trait]
impl IdentityBackend for PlainBackend {
    async fn seed(&self, root_name: &str, root_hash: String) -> Result<()> {
        let root_name = root_name.to_string();
        self.mutate(move |t| {
            for (gid, name) in SEED_GROUPS {
                if !t.groups.iter().any(|g| g.gid == gid || g.groupname == name) {
                    t.groups.push(GroupEntry {
                        groupname: name.to_string(),
                        gid,
                        members: Vec::new(),
                    });
                }
            }
            if !t
                .passwd
                .iter()
                .any(|u| u.uid == ROOT_UID || u.username == root_name)
            {
                t.shadow.push(ShadowEntry {
                    username: root_name.clone(),
                    password: Password::new(root_hash),
                });
                t.passwd.push(PasswdEntry {
                    username: root_name.clone(),
                    uid: ROOT_UID,
                    pgroup: ADMIN_GID,
                    info: String::new(),
                    home: String::new(),
                    shell: String::new(),
                });
                t.join(&root_name, "admin");
                t.join(&root_name, "user");
                tracing::info!("seeded root user {}", root_name);
            }
            Ok(())
        })
        .await
    }

    async fn useradd(&self, user: &NewUser, hashpass: String) -> Result<(u32, u32)> {
        let user = user.clone();
        self.mutate(move |t| {
            let uid = t.next_id(IdClass::for_groups(&user.groups))?;
            t.add_user(
                PasswdEntry {
                    username: user.username.clone(),
                    uid,
                    pgroup: uid,
                    info: user.info.clone(),
                    home: user.home.clone(),
                    shell: user.shell.clone(),
                },
                hashpass,
            )?;
            t.groups.push(GroupEntry {
                groupname: user.username.clone(),
                gid: uid,
                members: vec![user.username.clone()],
            });
            if let Some(g) = t.groups.iter_mut().find(|g| g.gid == USER_GID) {
                g.members.push(user.username.clone());
            }
            for extra in &user.groups {
                t.join(&user.username, extra);
            }
            Ok((uid, uid))
        })
        .await
    }

    async fn userdel(&self, uid: u32) -> Result<()> {
        if uid == ROOT_UID {
            return Err(IdentityError::Forbidden("root cannot be deleted".into()));
        }
        self.mutate(move |t| {
            let idx = t.user_by_uid(uid)?;
            let entry = t.passwd.remove(idx);
            t.shadow.retain(|s| s.username != entry.username);
            t.groups.retain(|g| g.groupname != entry.username);
            t.leave_all(&entry.username);
            Ok(())
        })
        .await
    }

    async fn update_user(&self, uid: u32, changes: UserChanges) -> Result<()> {
        self.mutate(move |t| {
            let idx = t.user_by_uid(uid)?;
            let current = t.passwd[idx].username.clone();
            let mut name = current.clone();

            if let Some(new) = changes.username.filter(|n| *n != current) {
                if t.passwd.iter().any(|u| u.username == new)
                    || t.groups.iter().any(|g| g.groupname == new)
                {
                    return Err(IdentityError::AlreadyExists(format!("user {}", new)));
                }
                for s in t.shadow.iter_mut().filter(|s| s.username == current) {
                    s.username = new.clone();
                }
                for g in &mut t.groups {
                    if g.groupname == current {
                        g.groupname = new.clone();
                    }
                    for m in g.members.iter_mut().filter(|m| **m == current) {
                        *m = new.clone();
                    }
                }
                t.passwd[idx].username = new.clone();
                name = new;
            }

            let entry = &mut t.passwd[idx];
            if let Some(info) = changes.info {
                entry.info = info;
            }
            if let Some(home) = changes.home {
                entry.home = home;
            }
            if let Some(shell) = changes.shell {
                entry.shell = shell;
            }
            if let Some(pgroup) = changes.pgroup {
                entry.pgroup = pgroup;
            }

            if let Some(hashpass) = changes.hashpass {
                for s in t.shadow.iter_mut().filter(|s| s.username == name) {
                    s.password.hashpass = hashpass.clone();
                    s.password.last_password_change = today();
                }
            }

            if let Some(groups) = changes.groups {
                t.leave_all(&name);
                for g in &groups {
                    t.join(&name, g);
                }
            }
            Ok(())
        })
        .await
    }

    async fn groupadd(&self, group: &NewGroup) -> Result<u32> {
        let group = group.clone();
        self.mutate(move |t| {
            if t.groups.iter().any(|g| g.groupname == group.groupname) {
                return Err(IdentityError::AlreadyExists(format!("group {}", group.groupname)));
            }
            let gid = t.next_id(IdClass::User)?;
            let members = group
                .users
                .iter()
                .filter_map(|uid| t.username_of(*uid).map(String::from))
                .collect();
            t.groups.push(GroupEntry {
                groupname: group.groupname.clone(),
                gid,
                members,
            });
            Ok(gid)
        })
        .await
    }

    async fn groupdel(&self, gid: u32) -> Result<()> {
        if SEED_GROUPS.iter().any(|(seed, _)| *seed == gid) {
            return Err(IdentityError::Forbidden(format!("group {} is built in", gid)));
        }
        self.mutate(move |t| {
            let idx = t.group_by_gid(gid)?;
            t.groups.remove(idx);
            Ok(())
        })
        .await
    }

    async fn update_group(&self, gid: u32, changes: GroupChanges) -> Result<()> {
        self.mutate(move |t| {
            let idx = t.group_by_gid(gid)?;
            if let Some(name) = changes.groupname {
                if t.groups.iter().any(|g| g.groupname == name && g.gid != gid) {
                    return Err(IdentityError::AlreadyExists(format!("group {}", name)));
                }
                t.groups[idx].groupname = name;
            }
            if let Some(uids) = changes.members {
                let members = uids
                    .iter()
                    .filter_map(|uid| t.username_of(*uid).map(String::from))
                    .collect();
                t.groups[idx].members = members;
            }
            Ok(())
        })
        .await
    }

    async fn passwd(&self, username: &str, hashpass: String) -> Result<()> {
        let username = username.to_string();
        self.mutate(move |t| {
            let entry = t
                .shadow
                .iter_mut()
                .find(|s| s.username == username)
                .ok_or_else(|| IdentityError::NotFound(format!("user {}", username)))?;
            entry.password.hashpass = hashpass;
            entry.password.last_password_change = today();
            Ok(())
        })
        .await
    }

    async fn credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        let t = self.load().await?;
        let Some(entry) = t.passwd.iter().find(|u| u.username == username) else {
            return Ok(None);
        };
        let hash = t
            .shadow
            .iter()
            .find(|s| s.username == username)
            .map(|s| s.password.hashpass.clone());
        Ok(hash.map(|h| (t.to_user(entry), h)))
    }

    async fn users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let t = self.load().await?;
        Ok(t.passwd
            .iter()
            .map(|e| t.to_user(e))
            .filter(|u| filter.matches(u))
            .collect())
    }

    async fn groups(&self, filter: &GroupFilter) -> Result<Vec<Group>> {
        let t = self.load().await?;
        Ok(t.groups
            .iter()
            .map(|g| Group {
                gid: g.gid,
                groupname: g.groupname.clone(),
                users: g.members.clone(),
            })
            .filter(|g| filter.matches(g))
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.load().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let backend = PlainBackend::open(dir.path()).await.unwrap();
        backend.seed("root", "$2b$04$hash".into()).await.unwrap();

        let passwd = std::fs::read_to_string(dir.path().join(PASSWD)).unwrap();
        assert_eq!(passwd, "root:x:0:0:::\n");
        let group = std::fs::read_to_string(dir.path().join(GROUP)).unwrap();
        assert!(group.contains("admin:x:0:root\n"));
        assert!(group.contains("user:x:1000:root\n"));
        let shadow = std::fs::read_to_string(dir.path().join(SHADOW)).unwrap();
        assert!(shadow.starts_with("root:$2b$04$hash:"));
        assert!(shadow.trim_end().ends_with(":0:99999:7::"));
    }

    #[tokio::test]
    async fn test_colon_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = PlainBackend::open(dir.path()).await.unwrap();
        backend.seed("root", "h".into()).await.unwrap();
        let err = backend
            .update_user(
                ROOT_UID,
                UserChanges {
                    shell: Some("/bin:/sh".into()),
                    ..UserChanges::default()
                },
            )
            .await;
        assert!(matches!(err, Err(IdentityError::BadInput(_))));
        // nothing was written
        let root = &backend.users(&UserFilter::uid(ROOT_UID)).await.unwrap()[0];
        assert_eq!(root.shell, "");
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = PlainBackend::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join(PASSWD), "broken line\n").unwrap();
        assert!(matches!(
            backend.users(&UserFilter::default()).await,
            Err(IdentityError::Corrupt(_))
        ));
    }
}
