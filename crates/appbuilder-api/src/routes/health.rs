//! 헬스 체크 endpoint.
//!
//! - `GET /health`: 프로세스 생존 여부 (liveness)
//! - `GET /health/ready`: 저장소 연결과 구독 현황 (readiness)

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// 컴포넌트 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

/// 저장소 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreHealth {
    pub status: ComponentStatus,
    /// 연결 실패 사유
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 구독 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionHealth {
    pub status: ComponentStatus,
    /// 현재 registry에 있는 구독자 수 (닫혔지만 아직 정리되지 않은 항목 포함)
    pub subscribers: usize,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub store: StoreHealth,
    pub subscriptions: SubscriptionHealth,
}

/// readiness 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 저장소가 살아 있으면 `up`
    pub status: ComponentStatus,
    pub version: String,
    pub uptime_secs: i64,
    /// RFC 3339
    pub timestamp: String,
    pub components: ComponentHealth,
}

/// GET /health
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// GET /health/ready
///
/// 저장소 ping이 실패하면 503을 반환합니다. 구독 registry는 항상 `up`입니다.
pub async fn health_ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let store = match state.store.ping().await {
        Ok(()) => StoreHealth {
            status: ComponentStatus::Up,
            error: None,
        },
        Err(e) => StoreHealth {
            status: ComponentStatus::Down,
            error: Some(e.to_string()),
        },
    };

    let status = store.status;
    let code = match status {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            store,
            subscriptions: SubscriptionHealth {
                status: ComponentStatus::Up,
                subscribers: state.registry.len().await,
            },
        },
    };

    (code, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
