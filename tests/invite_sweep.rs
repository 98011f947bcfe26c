use std::time::Duration;

use ballot_studio::{
    config::StorageSelection,
    invite::{self, InviteSweeper},
    storage,
};

#[tokio::test]
async fn sweep_purges_only_expired_tokens() {
    let storage = storage::open(&StorageSelection::InMemory, 1)
        .await
        .expect("in-memory storage");

    invite::issue_token(storage.as_ref(), chrono::Duration::minutes(-1))
        .await
        .expect("expired token");
    invite::issue_token(storage.as_ref(), chrono::Duration::minutes(30))
        .await
        .expect("live token");

    assert_eq!(invite::sweep_once(storage.as_ref()).await.expect("sweep"), 1);
    assert_eq!(invite::sweep_once(storage.as_ref()).await.expect("sweep"), 0);
}

#[tokio::test]
async fn issued_tokens_are_distinct_and_url_safe() {
    let first = invite::random_token();
    let second = invite::random_token();

    assert_ne!(first, second);
    assert!(
        first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
}

#[tokio::test]
async fn sweeper_runs_on_its_interval_and_stops() {
    let storage = storage::open(&StorageSelection::InMemory, 1)
        .await
        .expect("in-memory storage");
    invite::issue_token(storage.as_ref(), chrono::Duration::minutes(-1))
        .await
        .expect("expired token");

    let sweeper = InviteSweeper::spawn(storage.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(200)).await;
    sweeper.stop().await;

    assert_eq!(invite::sweep_once(storage.as_ref()).await.expect("sweep"), 0);
}
