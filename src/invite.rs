//! Invite tokens gating signup: issued at startup, purged once expired.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::RngCore;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::storage::{StorageBackend, StorageResult};

const TOKEN_BYTES: usize = 12;

/// How long a token issued at startup stays valid.
pub const STARTUP_TOKEN_TTL_MINUTES: i64 = 30;

pub fn random_token() -> String {
    let mut raw = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Stores a fresh token expiring `ttl` from now and returns it.
pub async fn issue_token(storage: &dyn StorageBackend, ttl: chrono::Duration) -> StorageResult<String> {
    let token = random_token();
    let mut db = storage.connect().await?;
    db.make_invite_token(&token, Utc::now() + ttl).await?;
    Ok(token)
}

/// Deletes expired invite tokens once and reports how many went.
pub async fn sweep_once(storage: &dyn StorageBackend) -> StorageResult<u64> {
    let mut db = storage.connect().await?;
    db.purge_expired_invite_tokens(Utc::now()).await
}

/// Background worker purging expired invite tokens on a fixed interval.
pub struct InviteSweeper {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl InviteSweeper {
    pub fn spawn(storage: Arc<dyn StorageBackend>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let join_handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "invite sweeper started");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        break;
                    }
                    _ = sleep(interval) => {
                        match sweep_once(storage.as_ref()).await {
                            Ok(0) => debug!("no expired invite tokens"),
                            Ok(purged) => info!(purged, "purged expired invite tokens"),
                            Err(err) => warn!(error = %err, "invite token sweep failed"),
                        }
                    }
                }
            }
            debug!("invite sweeper stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    /// Signals the worker to stop and waits for it to finish.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(join_handle) = self.join_handle.take() {
            if let Err(err) = join_handle.await {
                error!(error = %err, "invite sweeper join failed");
            }
        }
    }
}

impl Drop for InviteSweeper {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}
