//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/` - GraphiQL IDE
//! - `/graphql` - GraphQL 쿼리/mutation (GET, POST)
//! - `/subscriptions` - 실시간 업데이트 WebSocket (`graphql-ws`)
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)

pub mod graphiql;
pub mod graphql;
pub mod health;

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::metrics_layer;
use crate::state::AppState;
use crate::websocket::{websocket_router, WsState};

pub use graphiql::graphiql_router;
pub use graphql::{graphql_router, GraphQlBody, GraphQlParams};
pub use health::{
    health_router, ComponentHealth, ComponentStatus, HealthResponse, StoreHealth,
    SubscriptionHealth,
};

/// 애플리케이션 라우터 생성.
///
/// 메트릭/트레이싱/타임아웃 미들웨어가 모든 라우트에 적용됩니다. 타임아웃은
/// WebSocket 업그레이드 응답까지만 적용되고 업그레이드 이후 연결에는 영향이 없습니다.
pub fn create_router(state: Arc<AppState>, ws_state: WsState, request_timeout: Duration) -> Router {
    let api_router = Router::new()
        .merge(graphiql_router())
        .merge(graphql_router())
        .nest("/health", health_router())
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(websocket_router(ws_state))
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = create_test_state();
        let ws_state = state.ws_state(CancellationToken::new());
        create_router(Arc::new(state), ws_state, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_routes_are_mounted() {
        for uri in ["/", "/health", "/health/ready"] {
            let response = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_subscriptions_requires_upgrade() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/subscriptions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
