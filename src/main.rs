use std::sync::Arc;

use anyhow::{Context, Result};
use ballot_studio::{
    archive::{FileImageArchiver, ImageArchiver},
    artifacts::ArtifactService,
    build_router,
    cache::ArtifactCache,
    config::{AppConfig, CookieKey, StudioArgs},
    identity::CookieIdentity,
    invite::{self, InviteSweeper, STARTUP_TOKEN_TTL_MINUTES},
    render::{HttpDrawBackend, Pdftoppm},
    state::AppState,
    storage,
};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_args(StudioArgs::parse())
        .context("failed to load application configuration")?;

    if let CookieKey::Generated(_) = config.cookie_key {
        info!(cookie_key = %config.cookie_key.encoded(), "generated cookie key; pass --cookie-key to keep sessions across restarts");
    }

    let storage = storage::open(&config.storage, config.db_max_connections)
        .await
        .context("could not open db")?;

    let token = invite::issue_token(
        storage.as_ref(),
        chrono::Duration::minutes(STARTUP_TOKEN_TTL_MINUTES),
    )
    .await
    .context("failed to store startup invite token")?;
    info!(
        "http://localhost:{}/signup/{token}",
        config.listen_port().unwrap_or(80)
    );

    let sweeper = InviteSweeper::spawn(storage.clone(), config.invite_gc_interval);

    let archiver: Option<Arc<dyn ImageArchiver>> = match &config.im_archive_dir {
        Some(dir) => {
            let archiver = FileImageArchiver::new(dir)
                .await
                .with_context(|| format!("image archive dir {}", dir.display()))?;
            Some(Arc::new(archiver) as Arc<dyn ImageArchiver>)
        }
        None => None,
    };

    let identity = CookieIdentity::new(config.cookie_key.bytes())
        .map_err(|err| anyhow::anyhow!("invalid cookie key: {err}"))?;

    let draw = HttpDrawBackend::new(config.draw_backend.clone());
    if draw.endpoint().is_none() {
        warn!("no draw backend configured; ballot renders will fail");
    }

    let artifacts = ArtifactService::new(
        Arc::new(ArtifactCache::new(config.cache_bytes)),
        Arc::new(draw),
        Arc::new(Pdftoppm::new(config.pdftoppm.clone()).with_resolution(config.png_dpi)),
    );

    let app = build_router(AppState::new(
        storage,
        Arc::new(artifacts),
        Arc::new(identity),
        archiver,
    ));

    if let Some(pid_path) = &config.pid_path {
        if let Err(err) = tokio::fs::write(pid_path, std::process::id().to_string()).await {
            error!(path = %pid_path.display(), error = %err, "could not write pid file");
        }
    }

    let addr = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "ballot studio started");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    sweeper.stop().await;
    served
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ballot_studio=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
