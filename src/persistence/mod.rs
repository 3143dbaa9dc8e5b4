//! The blocking-in-spirit persistence gateway: account and channel tables.
//!
//! The distilled spec treats the actual SQL engine as an external
//! collaborator ("a simple key/value or relational store suffices"); we use
//! sqlite via sqlx, matching the original daemon's choice of sqlite, with
//! case-insensitive unique names pinned per spec.md's DESIGN NOTES (case
//! folding is an Open Question the original deferred to store collation).

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

#[derive(Clone)]
pub struct Persistence {
    pool: SqlitePool,
}

pub struct Account {
    pub id: i64,
    pub username: String,
}

impl Persistence {
    pub async fn connect(db_path: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let persistence = Self { pool };
        persistence.create_schema().await?;
        Ok(persistence)
    }

    async fn create_schema(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user (
                userid INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS channel (
                channelid INTEGER PRIMARY KEY AUTOINCREMENT,
                channelname TEXT NOT NULL UNIQUE COLLATE NOCASE
            );",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn user_exists(&self, username: &str) -> Result<bool, PersistenceError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT userid FROM user WHERE username = ?;")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Creates the account, or updates the stored password if it somehow
    /// already exists between the existence check and this call (matches the
    /// original's `createUser`, which is insert-or-update rather than a hard
    /// uniqueness failure). The existence check and the write are wrapped in
    /// one transaction, matching `createUser`'s `global.db.Begin()` /
    /// commit, so two concurrent creates of the same new username can't both
    /// observe "does not exist" and both insert.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<(), PersistenceError> {
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        let mut tx = self.pool.begin().await?;
        let existing: Option<(i64,)> = sqlx::query_as("SELECT userid FROM user WHERE username = ?;")
            .bind(username)
            .fetch_optional(&mut *tx)
            .await?;
        match existing {
            None => {
                sqlx::query("INSERT INTO user (username, password) VALUES (?, ?);")
                    .bind(username)
                    .bind(&hash)
                    .execute(&mut *tx)
                    .await?;
            }
            Some((userid,)) => {
                sqlx::query("UPDATE user SET username = ?, password = ? WHERE userid = ?;")
                    .bind(username)
                    .bind(&hash)
                    .bind(userid)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Verifies credentials. On success, returns the account id and the
    /// store's canonical spelling of the username (which may differ in case
    /// from what the user typed).
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Account>, PersistenceError> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT userid, username, password FROM user WHERE username = ?;")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        let Some((userid, canonical_username, password_hash)) = row else {
            return Ok(None);
        };
        if bcrypt::verify(password, &password_hash)? {
            Ok(Some(Account {
                id: userid,
                username: canonical_username,
            }))
        } else {
            Ok(None)
        }
    }

    /// Returns `true` if the channel already existed (and its stored spelling
    /// was updated to match), `false` if it was newly created. The existence
    /// check and the write are wrapped in one transaction, matching
    /// `createChatchannel`'s `global.db.Begin()` / commit, so two concurrent
    /// creates of the same new room name can't both observe "does not
    /// exist" and both insert.
    pub async fn create_channel(&self, name: &str) -> Result<bool, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT channelid FROM channel WHERE channelname = ?;")
                .bind(name)
                .fetch_optional(&mut *tx)
                .await?;
        let already_existed = match existing {
            None => {
                sqlx::query("INSERT INTO channel (channelname) VALUES (?);")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                false
            }
            Some((channelid,)) => {
                sqlx::query("UPDATE channel SET channelname = ? WHERE channelid = ?;")
                    .bind(name)
                    .bind(channelid)
                    .execute(&mut *tx)
                    .await?;
                true
            }
        };
        tx.commit().await?;
        Ok(already_existed)
    }

    /// Returns 0 if no channel by that name exists, matching the original's
    /// "channelID can be 0" convention rather than an `Option`, since this
    /// value flows straight into the registry's room-id space where 0 already
    /// means "no room".
    pub async fn channel_id(&self, name: &str) -> Result<i64, PersistenceError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT channelid FROM channel WHERE channelname = ?;")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id).unwrap_or(0))
    }

    pub async fn list_channels(&self) -> Result<Vec<String>, PersistenceError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT channelname FROM channel ORDER BY channelname;")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Persistence {
        Persistence::connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn register_then_login_round_trips() {
        let store = memory_store().await;
        assert!(!store.user_exists("alice").await.unwrap());
        store.create_user("alice", "secret").await.unwrap();
        assert!(store.user_exists("alice").await.unwrap());
        let account = store.login("alice", "secret").await.unwrap().unwrap();
        assert_eq!(account.username, "alice");
        assert!(store.login("alice", "wrong").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn username_lookup_is_case_insensitive_but_preserves_case() {
        let store = memory_store().await;
        store.create_user("Alice", "secret").await.unwrap();
        assert!(store.user_exists("alice").await.unwrap());
        let account = store.login("ALICE", "secret").await.unwrap().unwrap();
        assert_eq!(account.username, "Alice");
    }

    #[tokio::test]
    async fn creating_the_same_channel_twice_keeps_the_same_id() {
        let store = memory_store().await;
        let already_existed = store.create_channel("lobby").await.unwrap();
        assert!(!already_existed);
        let first_id = store.channel_id("lobby").await.unwrap();
        assert!(first_id > 0);

        let already_existed = store.create_channel("lobby").await.unwrap();
        assert!(already_existed);
        let second_id = store.channel_id("lobby").await.unwrap();
        assert_eq!(first_id, second_id);
    }

    #[tokio::test]
    async fn unknown_channel_id_is_zero() {
        let store = memory_store().await;
        assert_eq!(store.channel_id("nowhere").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_channels_is_alphabetical() {
        let store = memory_store().await;
        store.create_channel("zeta").await.unwrap();
        store.create_channel("alpha").await.unwrap();
        assert_eq!(store.list_channels().await.unwrap(), vec!["alpha", "zeta"]);
    }
}
