//! appbuilder API 서버 진입점.

use std::sync::Arc;
use std::time::Duration;

use appbuilder_core::{init_logging, AppConfig, LogConfig};
use appbuilder_api::{
    create_router, setup_metrics_recorder, AppState, MemoryStore, PgStore, SharedStore,
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

/// HTTP 라우트용 CORS 레이어.
///
/// `origins`가 비어 있거나 모두 잘못된 값이면 모든 origin을 허용합니다.
/// WebSocket 업그레이드는 origin을 검사하지 않습니다.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if allowed.is_empty() {
        warn!("No CORS origins configured, allowing any origin");
        AllowOrigin::any()
    } else {
        info!(count = allowed.len(), "CORS origins configured");
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 설정에 따라 저장소를 만듭니다. DB 설정이 없으면 메모리 저장소를 씁니다.
async fn create_store(config: &AppConfig) -> Result<SharedStore, Box<dyn std::error::Error>> {
    if !config.database.is_configured() {
        warn!("Database is not configured, using in-memory store (data is lost on restart)");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(&config.database).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from(&config.logging))?;

    info!("Starting appbuilder API server...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let store = create_store(&config).await?;
    let state = AppState::new(store, &config.subscriptions);
    let registry = state.registry.clone();

    // 전역 종료 토큰 (intake 루프에 종료 전파)
    let shutdown_token = CancellationToken::new();
    let ws_state = state.ws_state(shutdown_token.clone());

    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let app = Router::new()
        .merge(metrics_router)
        .merge(create_router(
            Arc::new(state),
            ws_state,
            Duration::from_secs(config.server.request_timeout_secs),
        ))
        .layer(cors_layer(&config.server.cors_origins));

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "API server listening");
    info!("GraphiQL available at http://{}/", addr);
    info!("WebSocket available at ws://{}/subscriptions", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    let grace = config.subscriptions.shutdown_grace();
    match tokio::time::timeout(grace, registry.close_all()).await {
        Ok(closed) => info!(closed, "Subscriber connections closed"),
        Err(_) => warn!(?grace, "Cleanup timeout, forcing shutdown"),
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    // 열린 WebSocket intake 루프에 종료 전파
    shutdown_token.cancel();
    info!("Shutdown signal propagated to connections");
}
