//! 애플리케이션 상태.
//!
//! 모든 HTTP 핸들러가 공유하는 상태입니다. 구성 순서는
//! 저장소 → 스키마 → 실행기 → 브로드캐스터이며, 브로드캐스터는 요청마다
//! mutation에 전달되므로 서로를 소유하는 순환은 없습니다.

use std::sync::Arc;

use appbuilder_core::SubscriptionConfig;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::graphql::{build_schema, GraphQlExecutor, QueryExecutor};
use crate::repository::SharedStore;
use crate::websocket::{
    create_subscriber_registry, Broadcaster, SendOptions, SharedBroadcaster,
    SharedSubscriberRegistry, WsState,
};

/// 애플리케이션 상태.
#[derive(Clone)]
pub struct AppState {
    /// 사용자/메시지 저장소
    pub store: SharedStore,
    /// 쿼리 실행기
    pub executor: Arc<dyn QueryExecutor>,
    /// mutation 후 fan-out
    pub broadcaster: SharedBroadcaster,
    /// 구독자 registry
    pub registry: SharedSubscriberRegistry,
    /// 연결 전송 옵션
    pub send_options: SendOptions,
    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
    /// API 버전
    pub version: String,
}

impl AppState {
    /// 저장소와 구독 설정으로 상태를 구성합니다.
    pub fn new(store: SharedStore, subscriptions: &SubscriptionConfig) -> Self {
        let executor: Arc<dyn QueryExecutor> =
            Arc::new(GraphQlExecutor::new(build_schema(store.clone())));
        let registry = create_subscriber_registry();
        let broadcaster = Arc::new(Broadcaster::new(registry.clone(), executor.clone()));

        Self {
            store,
            executor,
            broadcaster,
            registry,
            send_options: SendOptions::from(subscriptions),
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// WebSocket 라우터용 상태.
    pub fn ws_state(&self, shutdown: CancellationToken) -> WsState {
        WsState::new(self.registry.clone(), self.send_options, shutdown)
    }

    /// 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// 테스트용 상태 (메모리 저장소).
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use crate::repository::MemoryStore;

    AppState::new(Arc::new(MemoryStore::new()), &SubscriptionConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_wiring_shares_registry() {
        let state = create_test_state();
        assert!(Arc::ptr_eq(&state.registry, state.broadcaster.registry()));
        assert!(state.store.ping().await.is_ok());
        assert!(state.uptime_secs() >= 0);
    }
}
