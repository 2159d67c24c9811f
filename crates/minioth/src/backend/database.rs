//! SQLite identity backend.

use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use tokio::sync::Mutex;

use super::IdentityBackend;
use crate::error::{IdentityError, Result};
use crate::models::{
    today, Group, GroupChanges, GroupFilter, IdClass, NewGroup, NewUser, Password, User,
    UserChanges, UserFilter, ADMIN_GID, ROOT_UID, SEED_GROUPS, USER_GID,
};

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_open: u32,
    pub max_idle: u32,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 50,
            max_idle: 10,
            max_lifetime: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Database(SqlitePool);

impl Database {
    pub async fn connect(path: &Path, pool: PoolConfig) -> std::result::Result<Self, DatabaseSetupError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(DatabaseSetupError::Directory)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool.max_open.max(1))
            .min_connections(pool.max_idle.min(pool.max_open))
            .max_lifetime(pool.max_lifetime)
            .connect_with(options)
            .await
            .map_err(DatabaseSetupError::Unavailable)?;

        let db = Self(pool);
        db.migrate().await?;
        Ok(db)
    }

    pub async fn in_memory() -> std::result::Result<Self, DatabaseSetupError> {
        let options = SqliteConnectOptions::new().filename(":memory:");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(DatabaseSetupError::Unavailable)?;

        let db = Self(pool);
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> std::result::Result<(), DatabaseSetupError> {
        sqlx::migrate!("./migrations")
            .run(&self.0)
            .await
            .map_err(DatabaseSetupError::MigrationFailed)
    }
}

impl Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseSetupError {
    #[error("error occurred while attempting database migration: {0}")]
    MigrationFailed(sqlx::migrate::MigrateError),

    #[error("unable to perform initial connection and check of the database: {0}")]
    Unavailable(sqlx::Error),

    #[error("unable to create the database directory: {0}")]
    Directory(std::io::Error),
}

#[derive(FromRow)]
struct UserRow {
    uid: i64,
    username: String,
    info: String,
    home: String,
    shell: String,
    pgroup: i64,
    verified: bool,
}

impl UserRow {
    fn into_user(self, groups: Vec<Group>) -> User {
        User {
            uid: self.uid as u32,
            username: self.username,
            info: self.info,
            home: self.home,
            shell: self.shell,
            pgroup: self.pgroup as u32,
            verified: self.verified,
            groups,
        }
    }
}

#[derive(FromRow)]
struct MembershipRow {
    uid: i64,
    gid: i64,
    groupname: String,
}

const USER_COLUMNS: &str = "uid, username, info, home, shell, pgroup, verified";

/// Identity rows in SQLite. `MAX(id)+1` allocation is serialized by `alloc`.
#[derive(Debug)]
pub struct SqlBackend {
    db: Database,
    alloc: Mutex<()>,
}

impl SqlBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            alloc: Mutex::new(()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Next free id in `class`, shared between uids and gids so a user's
    /// personal gid can equal their uid.
    async fn next_id(tx: &mut Transaction<'_, Sqlite>, class: IdClass) -> Result<u32> {
        let (lo, hi) = class.range();
        let (next,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(id), ?1 - 1) + 1 FROM (
                SELECT uid AS id FROM users UNION ALL SELECT gid AS id FROM groups
             ) WHERE id BETWEEN ?1 AND ?2",
        )
        .bind(lo as i64)
        .bind(hi as i64)
        .fetch_one(&mut **tx)
        .await?;
        if next > hi as i64 {
            return Err(IdentityError::BadInput(format!("id range {}..={} exhausted", lo, hi)));
        }
        Ok(next as u32)
    }

    async fn insert_password(
        tx: &mut Transaction<'_, Sqlite>,
        uid: u32,
        password: &Password,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO passwords (uid, hashpass, last_password_change, minimum_password_age,
                maximum_password_age, warning_period, inactivity_period, expiration_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(uid as i64)
        .bind(&password.hashpass)
        .bind(&password.last_password_change)
        .bind(&password.minimum_password_age)
        .bind(&password.maximum_password_age)
        .bind(&password.warning_period)
        .bind(&password.inactivity_period)
        .bind(&password.expiration_date)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn join_by_name(tx: &mut Transaction<'_, Sqlite>, uid: u32, groupname: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_groups (uid, gid) SELECT ?1, gid FROM groups WHERE groupname = ?2",
        )
        .bind(uid as i64)
        .bind(groupname)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn join_by_gid(tx: &mut Transaction<'_, Sqlite>, uid: u32, gid: u32) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO user_groups (uid, gid) VALUES (?1, ?2)")
            .bind(uid as i64)
            .bind(gid as i64)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn set_members(tx: &mut Transaction<'_, Sqlite>, gid: u32, members: &[u32]) -> Result<()> {
        sqlx::query("DELETE FROM user_groups WHERE gid = ?1")
            .bind(gid as i64)
            .execute(&mut **tx)
            .await?;
        for uid in members {
            sqlx::query(
                "INSERT OR IGNORE INTO user_groups (uid, gid) SELECT uid, ?2 FROM users WHERE uid = ?1",
            )
            .bind(*uid as i64)
            .bind(gid as i64)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn memberships(&self, uid: Option<u32>) -> Result<HashMap<u32, Vec<Group>>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            "SELECT ug.uid, g.gid, g.groupname FROM user_groups ug
             JOIN groups g ON g.gid = ug.gid
             WHERE ?1 IS NULL OR ug.uid = ?1
             ORDER BY ug.uid, g.gid",
        )
        .bind(uid.map(i64::from))
        .fetch_all(&*self.db)
        .await?;

        let mut by_user: HashMap<u32, Vec<Group>> = HashMap::new();
        for row in rows {
            by_user
                .entry(row.uid as u32)
                .or_default()
                .push(Group::new(row.gid as u32, row.groupname));
        }
        Ok(by_user)
    }
}

#[async_trait]
impl IdentityBackend for SqlBackend {
    async fn seed(&self, root_name: &str, root_hash: String) -> Result<()> {
        let _alloc = self.alloc.lock().await;
        let mut tx = self.db.begin().await?;

        for (gid, name) in SEED_GROUPS {
            sqlx::query("INSERT OR IGNORE INTO groups (gid, groupname) VALUES (?1, ?2)")
                .bind(gid as i64)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        let root = sqlx::query("SELECT uid FROM users WHERE uid = ?1 OR username = ?2")
            .bind(ROOT_UID as i64)
            .bind(root_name)
            .fetch_optional(&mut *tx)
            .await?;
        if root.is_none() {
            sqlx::query("INSERT INTO users (uid, username, pgroup, verified) VALUES (?1, ?2, ?3, 1)")
                .bind(ROOT_UID as i64)
                .bind(root_name)
                .bind(ADMIN_GID as i64)
                .execute(&mut *tx)
                .await?;
            Self::insert_password(&mut tx, ROOT_UID, &Password::new(root_hash)).await?;
            Self::join_by_gid(&mut tx, ROOT_UID, ADMIN_GID).await?;
            Self::join_by_gid(&mut tx, ROOT_UID, USER_GID).await?;
            tracing::info!("seeded root user {}", root_name);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn useradd(&self, user: &NewUser, hashpass: String) -> Result<(u32, u32)> {
        let _alloc = self.alloc.lock().await;
        let mut tx = self.db.begin().await?;
        let what = format!("user {}", user.username);

        let uid = Self::next_id(&mut tx, IdClass::for_groups(&user.groups)).await?;
        sqlx::query(
            "INSERT INTO users (uid, username, info, home, shell, pgroup) VALUES (?1, ?2, ?3, ?4, ?5, ?1)",
        )
        .bind(uid as i64)
        .bind(&user.username)
        .bind(&user.info)
        .bind(&user.home)
        .bind(&user.shell)
        .execute(&mut *tx)
        .await
        .map_err(|e| IdentityError::unique(e, what.clone()))?;

        Self::insert_password(&mut tx, uid, &Password::new(hashpass)).await?;

        sqlx::query("INSERT INTO groups (gid, groupname) VALUES (?1, ?2)")
            .bind(uid as i64)
            .bind(&user.username)
            .execute(&mut *tx)
            .await
            .map_err(|e| IdentityError::unique(e, what.clone()))?;

        Self::join_by_gid(&mut tx, uid, uid).await?;
        Self::join_by_gid(&mut tx, uid, USER_GID).await?;
        for extra in &user.groups {
            Self::join_by_name(&mut tx, uid, extra).await?;
        }

        tx.commit().await?;
        Ok((uid, uid))
    }

    async fn userdel(&self, uid: u32) -> Result<()> {
        if uid == ROOT_UID {
            return Err(IdentityError::Forbidden("root cannot be deleted".into()));
        }
        let mut tx = self.db.begin().await?;

        let username: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE uid = ?1")
            .bind(uid as i64)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((username,)) = username else {
            return Err(IdentityError::NotFound(format!("user {}", uid)));
        };

        sqlx::query(
            "DELETE FROM user_groups WHERE uid = ?1
                OR gid IN (SELECT gid FROM groups WHERE groupname = ?2)",
        )
        .bind(uid as i64)
        .bind(&username)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM groups WHERE groupname = ?1")
            .bind(&username)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM passwords WHERE uid = ?1")
            .bind(uid as i64)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE uid = ?1")
            .bind(uid as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_user(&self, uid: u32, changes: UserChanges) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let current: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE uid = ?1")
            .bind(uid as i64)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((current,)) = current else {
            return Err(IdentityError::NotFound(format!("user {}", uid)));
        };

        if let Some(name) = changes.username.as_deref().filter(|n| *n != current) {
            let what = format!("user {}", name);
            // the personal group follows the username
            sqlx::query("UPDATE groups SET groupname = ?1 WHERE groupname = ?2")
                .bind(name)
                .bind(&current)
                .execute(&mut *tx)
                .await
                .map_err(|e| IdentityError::unique(e, what.clone()))?;
            sqlx::query("UPDATE users SET username = ?1 WHERE uid = ?2")
                .bind(name)
                .bind(uid as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| IdentityError::unique(e, what))?;
        }

        sqlx::query(
            "UPDATE users SET
                info = COALESCE(?1, info),
                home = COALESCE(?2, home),
                shell = COALESCE(?3, shell),
                pgroup = COALESCE(?4, pgroup)
             WHERE uid = ?5",
        )
        .bind(changes.info.as_deref())
        .bind(changes.home.as_deref())
        .bind(changes.shell.as_deref())
        .bind(changes.pgroup.map(i64::from))
        .bind(uid as i64)
        .execute(&mut *tx)
        .await?;

        if let Some(hashpass) = &changes.hashpass {
            sqlx::query("UPDATE passwords SET hashpass = ?1, last_password_change = ?2 WHERE uid = ?3")
                .bind(hashpass)
                .bind(today())
                .bind(uid as i64)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(groups) = &changes.groups {
            sqlx::query("DELETE FROM user_groups WHERE uid = ?1")
                .bind(uid as i64)
                .execute(&mut *tx)
                .await?;
            for name in groups {
                Self::join_by_name(&mut tx, uid, name).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn groupadd(&self, group: &NewGroup) -> Result<u32> {
        let _alloc = self.alloc.lock().await;
        let mut tx = self.db.begin().await?;

        let gid = Self::next_id(&mut tx, IdClass::User).await?;
        sqlx::query("INSERT INTO groups (gid, groupname) VALUES (?1, ?2)")
            .bind(gid as i64)
            .bind(&group.groupname)
            .execute(&mut *tx)
            .await
            .map_err(|e| IdentityError::unique(e, format!("group {}", group.groupname)))?;
        Self::set_members(&mut tx, gid, &group.users).await?;

        tx.commit().await?;
        Ok(gid)
    }

    async fn groupdel(&self, gid: u32) -> Result<()> {
        if SEED_GROUPS.iter().any(|(seed, _)| *seed == gid) {
            return Err(IdentityError::Forbidden(format!("group {} is built in", gid)));
        }
        let mut tx = self.db.begin().await?;
        let deleted = sqlx::query("DELETE FROM groups WHERE gid = ?1")
            .bind(gid as i64)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(IdentityError::NotFound(format!("group {}", gid)));
        }
        sqlx::query("DELETE FROM user_groups WHERE gid = ?1")
            .bind(gid as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_group(&self, gid: u32, changes: GroupChanges) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let exists = sqlx::query("SELECT gid FROM groups WHERE gid = ?1")
            .bind(gid as i64)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(IdentityError::NotFound(format!("group {}", gid)));
        }

        if let Some(name) = &changes.groupname {
            sqlx::query("UPDATE groups SET groupname = ?1 WHERE gid = ?2")
                .bind(name)
                .bind(gid as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| IdentityError::unique(e, format!("group {}", name)))?;
        }
        if let Some(members) = &changes.members {
            Self::set_members(&mut tx, gid, members).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn passwd(&self, username: &str, hashpass: String) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE passwords SET hashpass = ?1, last_password_change = ?2
             WHERE uid = (SELECT uid FROM users WHERE username = ?3)",
        )
        .bind(&hashpass)
        .bind(today())
        .bind(username)
        .execute(&*self.db)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(IdentityError::NotFound(format!("user {}", username)));
        }
        Ok(())
    }

    async fn credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        let mut users = self.users(&UserFilter::username(username)).await?;
        let Some(user) = users.pop() else {
            return Ok(None);
        };
        let hash: Option<(String,)> = sqlx::query_as("SELECT hashpass FROM passwords WHERE uid = ?1")
            .bind(user.uid as i64)
            .fetch_optional(&*self.db)
            .await?;
        Ok(hash.map(|(h,)| (user, h)))
    }

    async fn users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users
             WHERE (?1 IS NULL OR uid = ?1) AND (?2 IS NULL OR username = ?2)
             ORDER BY uid",
            USER_COLUMNS
        ))
        .bind(filter.uid.map(i64::from))
        .bind(filter.username.as_deref())
        .fetch_all(&*self.db)
        .await?;

        let single = match rows.as_slice() {
            [] => return Ok(Vec::new()),
            [one] => Some(one.uid as u32),
            _ => None,
        };
        let mut memberships = self.memberships(single).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let groups = memberships.remove(&(row.uid as u32)).unwrap_or_default();
                row.into_user(groups)
            })
            .collect())
    }

    async fn groups(&self, filter: &GroupFilter) -> Result<Vec<Group>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT gid, groupname FROM groups
             WHERE (?1 IS NULL OR gid = ?1) AND (?2 IS NULL OR groupname = ?2)
             ORDER BY gid",
        )
        .bind(filter.gid.map(i64::from))
        .bind(filter.groupname.as_deref())
        .fetch_all(&*self.db)
        .await?;

        let members: Vec<(i64, String)> = sqlx::query_as(
            "SELECT ug.gid, u.username FROM user_groups ug
             JOIN users u ON u.uid = ug.uid
             ORDER BY ug.gid, u.uid",
        )
        .fetch_all(&*self.db)
        .await?;
        let mut by_group: HashMap<i64, Vec<String>> = HashMap::new();
        for (gid, username) in members {
            by_group.entry(gid).or_default().push(username);
        }

        Ok(rows
            .into_iter()
            .map(|(gid, groupname)| Group {
                gid: gid as u32,
                groupname,
                users: by_group.remove(&gid).unwrap_or_default(),
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&*self.db).await?;
        Ok(())
    }
}
