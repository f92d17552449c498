use anyhow::{Context, Result};
use axum::http::{header, HeaderName, Method};
use axum::routing::{any, get};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::proxy::forward::{forward, ProxyState};

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub proxy_state: ProxyState,
}

impl AppState {
    pub fn new(
        metrics: &Metrics,
        proxy_state: ProxyState,
    ) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            proxy_state,
        }
    }
}

/// Browser clients call the proxy directly, so any origin is allowed.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
}

pub fn router(state: AppState, settings_config: &SettingsConfig) -> Router {
    let proxy_path = format!("{}/{{*path}}", state.proxy_state.prefix());
    info!("proxying {} to the LINE API", proxy_path);

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(&proxy_path, any(forward))
        .merge(state.metrics_state.router(&settings_config.metrics))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until SIGINT/SIGTERM.
pub async fn start(settings_config: &SettingsConfig, state: AppState) -> Result<()> {
    let metrics = get_metrics().await;
    let app = router(state, settings_config);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Server is running on {}", bind_addr);
    metrics.up.set(1);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    metrics.up.set(0);
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
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
    info!("shutdown signal received");
}
