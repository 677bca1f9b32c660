//! GraphQL API 및 실시간 업데이트 WebSocket 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 사용자/메시지 CRUD를 위한 GraphQL 엔드포인트
//! - mutation 후 등록된 쿼리를 재실행해 푸시하는 WebSocket 서버 (`graphql-ws`)
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: HTTP 엔드포인트
//! - [`graphql`]: 스키마와 쿼리 실행기
//! - [`websocket`]: 구독자 registry, 브로드캐스트, 연결 handler
//! - [`repository`]: 저장소 (PostgreSQL, 메모리)
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어

pub mod error;
pub mod graphql;
pub mod metrics;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::{ApiErrorResponse, ApiResult};
pub use graphql::{GraphQlExecutor, QueryExecutor, QueryRequest, QueryResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use repository::{MemoryStore, PgStore, SharedStore, Store, StoreError};
pub use routes::create_router;
pub use state::AppState;
pub use websocket::{
    Broadcaster, ClientMessage, ServerMessage, SubscriberRegistry, UpdateKey, WsError, WsState,
};

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
