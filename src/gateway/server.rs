use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::proxy::ProxyNetworkFetcher;
use super::services::{
    abort_download, get_download, health, intercept, make_offline, make_online_only,
    notification_clicked, offline_status,
};
use super::state::AppState;
use crate::cache::CacheStore;
use crate::config::Config;
use crate::controller::DownloadController;
use crate::downloads::{DownloadManager, HttpAssetFetcher, HttpConfig};
use crate::intercept::{InterceptPolicy, Interceptor, NetworkFetcher};
use crate::lifecycle::LifecycleCoordinator;
use crate::notify::Notifier;
use crate::observability::Metrics;
use crate::storage::BodyStore;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/offline/status", get(offline_status))
        .route("/offline", post(make_offline).delete(make_online_only))
        .route("/downloads/{id}", get(get_download))
        .route("/downloads/{id}/abort", post(abort_download))
        .route("/downloads/{id}/clicked", post(notification_clicked))
        .fallback(intercept)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let data_path = config.gateway.data_path.clone();
    info!(path = %data_path.display(), "Opening stores");
    let bodies = BodyStore::local(data_path.join("bodies"))?;
    let cache = CacheStore::open(data_path.join("cache"), bodies)?;

    let notifier = Notifier::new();
    let metrics = Arc::new(Metrics::new());

    let asset_fetcher = HttpAssetFetcher::new(&HttpConfig {
        connect_timeout: std::time::Duration::from_secs(config.downloads.connect_timeout_secs),
        request_timeout: std::time::Duration::from_secs(config.downloads.request_timeout_secs),
        user_agent: config.downloads.user_agent.clone(),
    })?;
    let manager = DownloadManager::open(
        data_path.join("jobs"),
        cache.clone(),
        notifier.clone(),
        Arc::new(asset_fetcher),
        config.downloads.poll_interval(),
    )?;

    let proxy: Arc<dyn NetworkFetcher> = Arc::new(ProxyNetworkFetcher::new(&config.downloads)?);

    let static_namespace = config.cache.static_namespace.clone();
    let interceptor = Interceptor::new(
        InterceptPolicy::new(
            config.cache.media_extensions.clone(),
            config.cache.excluded_patterns.clone(),
        ),
        cache.clone(),
        proxy.clone(),
        static_namespace.clone(),
        config.offline_doc_url(),
        metrics.clone(),
    );

    // Install and activate before accepting traffic; both are fatal on
    // failure so the gateway never serves from a half-built cache.
    let mut lifecycle = LifecycleCoordinator::new(
        cache.clone(),
        proxy.clone(),
        static_namespace,
        config.core_asset_urls(),
    );
    lifecycle.install().await?;
    lifecycle.activate().await?;

    let controller = DownloadController::new(
        manager.clone(),
        cache.clone(),
        &notifier,
        config.media.clone(),
        config.cache.media_extensions.clone(),
        metrics.clone(),
    );

    let bind_addr = config.gateway.bind_addr;
    let state = AppState::new(
        config,
        cache,
        manager,
        controller,
        interceptor,
        proxy,
        notifier,
        metrics,
    );

    let app = router(state);
    let listener = TcpListener::bind(bind_addr).await?;
    info!(address = %bind_addr, "Medialocker gateway listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
