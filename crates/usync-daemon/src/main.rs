//! usync-daemon entry point.
//!
//! Thin on purpose: load config, connect the database and the control plane
//! (both fatal on failure), cold-start the snapshot, optionally serve the
//! status surface, then hand over to the reconcile loop.

use std::sync::Arc;

use anyhow::Context;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};
use usync_config::UnusedKeyPolicy;
use usync_daemon::{routes, run_loop, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = usync_config::config_paths_from_env();
    let (loaded, cfg) = usync_config::load_sync_config(&paths).context("config load failed")?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let unused = usync_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for pointer in &unused.unused_leaf_pointers {
        warn!(%pointer, "config key not recognised; ignored");
    }

    let secrets = usync_config::resolve_secrets(&cfg)?;

    let shared = Arc::new(state::AppState::new());
    shared.set_config_hash(&loaded.config_hash).await;

    let reconciler = usync_runtime::connect_reconciler(&cfg, &secrets).await?;

    if cfg.reconcile.cold_start {
        reconciler
            .cold_start()
            .context("cold start: snapshot reset failed")?;
        info!(path = %cfg.snapshot.path, "cold start: applied snapshot cleared");
    }

    if let Some(addr) = cfg.daemon.status_socket_addr()? {
        let app = routes::build_router(Arc::clone(&shared)).layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("status surface bind failed: {addr}"))?;
        info!("usync-daemon status on http://{}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "status server crashed");
            }
        });
    }

    run_loop::run_reconcile_loop(
        &shared,
        &reconciler,
        cfg.reconcile.interval(),
        run_loop::shutdown_signal(),
    )
    .await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
