//! Election and invite-token persistence.
//!
//! Two engines implement the same contract:
//! - [`SqliteBackend`]: embedded, file-based (or in-memory when no path is configured)
//! - [`PgBackend`]: networked PostgreSQL
//!
//! A [`StorageBackend`] is the process-wide connection factory. Every request
//! asks it for a scoped [`ElectionDb`] connection, which goes back to the pool
//! when dropped.

mod postgres;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::StorageSelection;
use crate::identity::UserId;

pub use postgres::PgBackend;
pub use sqlite::SqliteBackend;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("election {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A stored election document.
///
/// `data` is the JSON text exactly as the owner submitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionRecord {
    pub id: i64,
    pub owner: UserId,
    pub data: String,
}

impl ElectionRecord {
    /// A record that storage has not assigned an id to yet.
    pub fn new(owner: UserId, data: impl Into<String>) -> Self {
        Self {
            id: 0,
            owner,
            data: data.into(),
        }
    }
}

/// Connection factory shared by every request.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Engine name for logs.
    fn engine(&self) -> &'static str;

    async fn connect(&self) -> StorageResult<Box<dyn ElectionDb>>;
}

/// One scoped storage connection.
#[async_trait]
pub trait ElectionDb: Send {
    /// Creates tables when missing. Safe to run on every startup.
    async fn setup(&mut self) -> StorageResult<()>;

    async fn get_election(&mut self, id: i64) -> StorageResult<ElectionRecord>;

    /// Inserts when `record.id == 0` and returns the new id. Otherwise replaces
    /// the data of the existing row and returns `record.id`; the owner column
    /// is never rewritten.
    async fn put_election(&mut self, record: &ElectionRecord) -> StorageResult<i64>;

    async fn make_invite_token(
        &mut self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Deletes tokens that expired before `now` and returns how many went.
    async fn purge_expired_invite_tokens(&mut self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// Opens the backend chosen by configuration and makes sure the schema exists.
pub async fn open(
    selection: &StorageSelection,
    max_connections: u32,
) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match selection {
        StorageSelection::Sqlite(path) => {
            info!(path = %path.display(), "storage backend: sqlite");
            Arc::new(SqliteBackend::open_file(path, max_connections).await?)
        }
        StorageSelection::Postgres(url) => {
            info!("storage backend: postgres");
            Arc::new(PgBackend::connect(url, max_connections).await?)
        }
        StorageSelection::InMemory => {
            warn!("running with in-memory database that will disappear when shut down");
            Arc::new(SqliteBackend::in_memory().await?)
        }
    };

    backend.connect().await?.setup().await?;
    info!(engine = backend.engine(), "storage schema ready");
    Ok(backend)
}
