//! 브로드캐스트 엔진.
//!
//! mutation이 커밋되면 등록된 모든 구독자의 쿼리를 새 값으로 재실행하고 결과를
//! 각 구독자의 연결로 보냅니다. 한 구독자의 실패는 나머지 전송을 막지 않습니다.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::classification::{BoundValue, UpdateKey};
use super::messages::ServerMessage;
use super::registry::SharedSubscriberRegistry;
use crate::graphql::{QueryExecutor, QueryRequest};
use crate::metrics;

/// 브로드캐스트 한 번의 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// 전송 성공
    pub delivered: usize,
    /// 닫힌 연결이라 registry에서 제거됨
    pub pruned: usize,
    /// 그 밖의 실패 (구독자는 유지)
    pub failed: usize,
}

/// 구독자 fan-out.
pub struct Broadcaster {
    registry: SharedSubscriberRegistry,
    executor: Arc<dyn QueryExecutor>,
}

/// 공유 브로드캐스터 타입.
pub type SharedBroadcaster = Arc<Broadcaster>;

impl Broadcaster {
    pub fn new(registry: SharedSubscriberRegistry, executor: Arc<dyn QueryExecutor>) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &SharedSubscriberRegistry {
        &self.registry
    }

    /// `value`를 `key`로 묶어 모든 구독자에게 브로드캐스트합니다.
    pub async fn broadcast<T: Any + Send + Sync>(&self, key: UpdateKey, value: T) -> BroadcastReport {
        self.broadcast_bound(BoundValue::new(key, value)).await
    }

    /// 이미 묶인 값을 브로드캐스트합니다.
    ///
    /// 시작 시점의 registry 스냅샷을 대상으로 하며, 도중에 등록된 구독자는
    /// 이번 브로드캐스트를 받지 않습니다.
    pub async fn broadcast_bound(&self, bound: BoundValue) -> BroadcastReport {
        let started = Instant::now();
        let key = bound.key();
        let mut report = BroadcastReport::default();

        for subscriber in self.registry.snapshot().await {
            let request = QueryRequest::new(subscriber.query.clone()).with_bound(bound.clone());
            let payload = self.executor.execute(request).await;

            let frame = match ServerMessage::data(subscriber.operation_id.clone(), payload).to_json()
            {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(subscriber_id = subscriber.id, error = %e, "Failed to serialize data message");
                    report.failed += 1;
                    continue;
                }
            };

            match subscriber.connection.send(frame).await {
                Ok(()) => report.delivered += 1,
                Err(e) if e.is_closed() => {
                    if self.registry.remove(subscriber.id).await {
                        report.pruned += 1;
                    }
                    debug!(
                        subscriber_id = subscriber.id,
                        connection_id = %subscriber.connection.id(),
                        "Pruned subscriber on closed connection"
                    );
                }
                Err(e) => {
                    warn!(
                        subscriber_id = subscriber.id,
                        connection_id = %subscriber.connection.id(),
                        error = %e,
                        "Failed to deliver update"
                    );
                    report.failed += 1;
                }
            }
        }

        metrics::record_broadcast(
            key,
            report.delivered,
            report.pruned,
            report.failed,
            started.elapsed().as_secs_f64(),
        );
        debug!(
            %key,
            delivered = report.delivered,
            pruned = report.pruned,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
