use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;

use super::{ElectionDb, ElectionRecord, StorageBackend, StorageError, StorageResult};
use crate::identity::UserId;

const CREATE_ELECTION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS election (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner INTEGER NOT NULL,
    data TEXT NOT NULL
)
"#;

// Expiry is unix seconds so the purge comparison is numeric.
const CREATE_INVITE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS invite (
    token TEXT PRIMARY KEY,
    expires INTEGER NOT NULL
)
"#;

/// Embedded engine backed by a SQLite file.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub async fn open_file(path: &Path, max_connections: u32) -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Private database living as long as the backend.
    ///
    /// An in-memory SQLite database belongs to a single connection, so the
    /// pool is pinned to exactly one connection that never expires.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn engine(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> StorageResult<Box<dyn ElectionDb>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(SqliteElectionDb { conn }))
    }
}

struct SqliteElectionDb {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl ElectionDb for SqliteElectionDb {
    async fn setup(&mut self) -> StorageResult<()> {
        sqlx::query(CREATE_ELECTION_TABLE)
            .execute(&mut *self.conn)
            .await?;
        sqlx::query(CREATE_INVITE_TABLE)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn get_election(&mut self, id: i64) -> StorageResult<ElectionRecord> {
        let row: Option<(i64, i64, String)> =
            sqlx::query_as("SELECT id, owner, data FROM election WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *self.conn)
                .await?;

        let (id, owner, data) = row.ok_or(StorageError::NotFound(id))?;
        Ok(ElectionRecord {
            id,
            owner: UserId(owner),
            data,
        })
    }

    async fn put_election(&mut self, record: &ElectionRecord) -> StorageResult<i64> {
        if record.id == 0 {
            let result = sqlx::query("INSERT INTO election (owner, data) VALUES (?1, ?2)")
                .bind(record.owner.0)
                .bind(record.data.as_str())
                .execute(&mut *self.conn)
                .await?;
            return Ok(result.last_insert_rowid());
        }

        let result = sqlx::query("UPDATE election SET data = ?1 WHERE id = ?2")
            .bind(record.data.as_str())
            .bind(record.id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(record.id));
        }
        Ok(record.id)
    }

    async fn make_invite_token(
        &mut self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query("INSERT INTO invite (token, expires) VALUES (?1, ?2)")
            .bind(token)
            .bind(expires_at.timestamp())
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn purge_expired_invite_tokens(&mut self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM invite WHERE expires < ?1")
            .bind(now.timestamp())
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    async fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().await.expect("in-memory sqlite");
        backend
            .connect()
            .await
            .expect("connect")
            .setup()
            .await
            .expect("setup");
        backend
    }

    #[tokio::test]
    async fn setup_is_idempotent() {
        let backend = backend().await;
        let mut db = backend.connect().await.expect("connect");
        db.setup().await.expect("second setup should succeed");
        db.setup().await.expect("third setup should succeed");
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let backend = backend().await;
        let mut db = backend.connect().await.expect("connect");

        let first = db
            .put_election(&ElectionRecord::new(UserId(1), r#"{"title":"A"}"#))
            .await
            .expect("insert");
        let second = db
            .put_election(&ElectionRecord::new(UserId(1), r#"{"title":"B"}"#))
            .await
            .expect("insert");

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn update_keeps_original_owner() {
        let backend = backend().await;
        let mut db = backend.connect().await.expect("connect");

        let id = db
            .put_election(&ElectionRecord::new(UserId(10), r#"{"v":1}"#))
            .await
            .expect("insert");

        let update = ElectionRecord {
            id,
            owner: UserId(99),
            data: r#"{"v":2}"#.to_string(),
        };
        assert_eq!(db.put_election(&update).await.expect("update"), id);

        let stored = db.get_election(id).await.expect("get");
        assert_eq!(stored.owner, UserId(10));
        assert_eq!(stored.data, r#"{"v":2}"#);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let backend = backend().await;
        let mut db = backend.connect().await.expect("connect");

        let missing = ElectionRecord {
            id: 42,
            owner: UserId(1),
            data: "{}".to_string(),
        };
        let err = db.put_election(&missing).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(42)));
    }

    #[tokio::test]
    async fn purge_removes_only_expired_tokens() {
        let backend = backend().await;
        let mut db = backend.connect().await.expect("connect");
        let now = Utc::now();

        db.make_invite_token("old", now - Duration::minutes(5))
            .await
            .expect("token");
        db.make_invite_token("fresh", now + Duration::minutes(30))
            .await
            .expect("token");

        assert_eq!(db.purge_expired_invite_tokens(now).await.expect("purge"), 1);
        assert_eq!(db.purge_expired_invite_tokens(now).await.expect("purge"), 0);
        drop(db);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invite")
            .fetch_one(backend.pool())
            .await
            .expect("count");
        assert_eq!(remaining, 1);
    }
}
