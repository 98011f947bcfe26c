use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;

use super::{ElectionDb, ElectionRecord, StorageBackend, StorageError, StorageResult};
use crate::identity::UserId;

const CREATE_ELECTION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS election (
    id BIGSERIAL PRIMARY KEY,
    owner BIGINT NOT NULL,
    data TEXT NOT NULL
)
"#;

const CREATE_INVITE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS invite (
    token TEXT PRIMARY KEY,
    expires TIMESTAMPTZ NOT NULL
)
"#;

/// Networked engine backed by PostgreSQL.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageBackend for PgBackend {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn connect(&self) -> StorageResult<Box<dyn ElectionDb>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgElectionDb { conn }))
    }
}

struct PgElectionDb {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl ElectionDb for PgElectionDb {
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
            sqlx::query_as("SELECT id, owner, data FROM election WHERE id = $1")
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
            let id: i64 =
                sqlx::query_scalar("INSERT INTO election (owner, data) VALUES ($1, $2) RETURNING id")
                    .bind(record.owner.0)
                    .bind(record.data.as_str())
                    .fetch_one(&mut *self.conn)
                    .await?;
            return Ok(id);
        }

        let result = sqlx::query("UPDATE election SET data = $1 WHERE id = $2")
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
        sqlx::query("INSERT INTO invite (token, expires) VALUES ($1, $2)")
            .bind(token)
            .bind(expires_at)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn purge_expired_invite_tokens(&mut self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM invite WHERE expires < $1")
            .bind(now)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }
}
