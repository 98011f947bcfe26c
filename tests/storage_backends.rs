use std::sync::Arc;

use ballot_studio::{
    config::StorageSelection,
    identity::UserId,
    storage::{self, ElectionRecord, StorageBackend, StorageError},
};
use chrono::{Duration, Utc};

/// Runs the shared storage contract against one backend.
async fn exercise_contract(backend: Arc<dyn StorageBackend>) {
    let mut db = backend.connect().await.expect("connection");
    db.setup().await.expect("setup is idempotent");

    let owner = UserId(7);
    let first = db
        .put_election(&ElectionRecord::new(owner, r#"{"title":"A"}"#))
        .await
        .expect("insert");
    let second = db
        .put_election(&ElectionRecord::new(owner, r#"{"title":"B"}"#))
        .await
        .expect("insert");
    assert!(first > 0);
    assert!(second > first);

    let updated = db
        .put_election(&ElectionRecord {
            id: first,
            owner: UserId(8),
            data: r#"{"title":"A2"}"#.to_string(),
        })
        .await
        .expect("update");
    assert_eq!(updated, first);

    let record = db.get_election(first).await.expect("get");
    assert_eq!(record.owner, owner);
    assert_eq!(record.data, r#"{"title":"A2"}"#);

    assert!(matches!(
        db.get_election(i64::MAX).await,
        Err(StorageError::NotFound(_))
    ));

    let now = Utc::now();
    let stale = format!("stale-{}", now.timestamp_nanos_opt().unwrap_or_default());
    let fresh = format!("fresh-{}", now.timestamp_nanos_opt().unwrap_or_default());
    db.make_invite_token(&stale, now - Duration::minutes(5))
        .await
        .expect("stale token");
    db.make_invite_token(&fresh, now + Duration::minutes(30))
        .await
        .expect("fresh token");
    let purged = db
        .purge_expired_invite_tokens(now)
        .await
        .expect("purge");
    assert!(purged >= 1);
    assert_eq!(db.purge_expired_invite_tokens(now).await.expect("purge"), 0);
}

#[tokio::test]
async fn in_memory_sqlite_honours_the_contract() {
    let backend = storage::open(&StorageSelection::InMemory, 1)
        .await
        .expect("in-memory storage");
    assert_eq!(backend.engine(), "sqlite");
    exercise_contract(backend).await;
}

#[tokio::test]
async fn sqlite_file_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("studio.db");
    let selection = StorageSelection::Sqlite(path);

    let id = {
        let backend = storage::open(&selection, 2).await.expect("open");
        let mut db = backend.connect().await.expect("connection");
        db.put_election(&ElectionRecord::new(UserId(1), "[]"))
            .await
            .expect("insert")
    };

    let backend = storage::open(&selection, 2).await.expect("reopen");
    exercise_contract(backend.clone()).await;
    let mut db = backend.connect().await.expect("connection");
    assert_eq!(db.get_election(id).await.expect("get").data, "[]");
}

#[tokio::test]
async fn postgres_honours_the_contract() {
    let Ok(url) = std::env::var("BALLOT_STUDIO_TEST_POSTGRES_URL") else {
        eprintln!("skipping postgres test: BALLOT_STUDIO_TEST_POSTGRES_URL is not set");
        return;
    };

    let backend = storage::open(&StorageSelection::Postgres(url), 2)
        .await
        .expect("postgres storage");
    assert_eq!(backend.engine(), "postgres");
    exercise_contract(backend).await;
}
