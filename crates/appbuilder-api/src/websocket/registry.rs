//! 구독자 registry.
//!
//! 구독자 ID → 구독자 매핑을 보관합니다. 모든 연산은 여러 intake 루프와
//! 브로드캐스트가 동시에 호출해도 안전합니다.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::connection::ConnectionHandle;
use crate::metrics;

/// 구독자 식별자. 프로세스 수명 동안 재사용되지 않습니다.
pub type SubscriberId = u64;

/// 등록된 구독자.
#[derive(Debug)]
pub struct Subscriber {
    /// registry가 부여한 ID
    pub id: SubscriberId,
    /// 클라이언트 연결
    pub connection: ConnectionHandle,
    /// 재실행할 쿼리 문자열 (등록 후 변경되지 않음)
    pub query: String,
    /// 클라이언트가 정한 operation ID
    pub operation_id: String,
}

/// 등록 요청.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub connection: ConnectionHandle,
    pub query: String,
    pub operation_id: String,
}

/// `for_each` 방문 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// 유지
    Keep,
    /// 제거
    Remove,
}

/// 구독자 registry.
#[derive(Debug)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    entries: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    /// 빈 registry 생성.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 구독자를 등록하고 새 ID를 반환합니다.
    ///
    /// 동시에 호출되어도 ID는 서로 다릅니다.
    pub async fn insert(&self, new: NewSubscriber) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            connection: new.connection,
            query: new.query,
            operation_id: new.operation_id,
        });

        let count = {
            let mut entries = self.entries.write().await;
            entries.insert(id, subscriber);
            entries.len()
        };
        metrics::set_active_subscribers(count);

        debug!(subscriber_id = id, subscribers = count, "Subscriber registered");
        id
    }

    /// 구독자를 제거합니다. 없는 ID면 `false`.
    pub async fn remove(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut entries = self.entries.write().await;
            let removed = entries.remove(&id).is_some();
            (removed, entries.len())
        };
        if removed {
            metrics::set_active_subscribers(count);
            debug!(subscriber_id = id, subscribers = count, "Subscriber removed");
        }
        removed
    }

    /// 한 연결에서 같은 operation ID로 등록된 구독자를 모두 제거합니다.
    pub async fn remove_operation(&self, connection_id: Uuid, operation_id: &str) -> usize {
        let (removed, count) = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, s| {
                !(s.connection.id() == connection_id && s.operation_id == operation_id)
            });
            (before - entries.len(), entries.len())
        };
        if removed > 0 {
            metrics::set_active_subscribers(count);
            debug!(%connection_id, operation_id, removed, "Operation stopped");
        }
        removed
    }

    /// 현재 구독자 목록의 스냅샷.
    ///
    /// 스냅샷을 만든 뒤 등록된 구독자는 포함되지 않습니다.
    pub async fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.entries.read().await.values().cloned().collect()
    }

    /// 스냅샷의 각 구독자를 방문하고 `Visit::Remove`를 반환한 구독자를 제거합니다.
    ///
    /// 방문 중에는 lock을 잡지 않으므로 `visit` 안에서 registry를 호출해도 됩니다.
    /// 제거한 구독자 수를 반환합니다.
    pub async fn for_each<F, Fut>(&self, mut visit: F) -> usize
    where
        F: FnMut(Arc<Subscriber>) -> Fut,
        Fut: Future<Output = Visit>,
    {
        let mut removed = 0;
        for subscriber in self.snapshot().await {
            let id = subscriber.id;
            if visit(subscriber).await == Visit::Remove && self.remove(id).await {
                removed += 1;
            }
        }
        removed
    }

    /// 등록된 구독자 수.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 구독자가 없는지 확인.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// ID가 등록되어 있는지 확인.
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.entries.read().await.contains_key(&id)
    }

    /// 모든 연결을 닫고 registry를 비웁니다 (종료 시).
    pub async fn close_all(&self) -> usize {
        let removed = self
            .for_each(|subscriber| async move {
                subscriber.connection.close().await;
                Visit::Remove
            })
            .await;
        debug!(removed, "All subscriber connections closed");
        removed
    }
}

/// 공유 registry 타입.
pub type SharedSubscriberRegistry = Arc<SubscriberRegistry>;

/// 새 공유 registry 생성.
pub fn create_subscriber_registry() -> SharedSubscriberRegistry {
    Arc::new(SubscriberRegistry::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::{channel_sink, Connection, SendOptions};
    use std::collections::HashSet;

    fn new_subscriber(conn: &ConnectionHandle, op: &str) -> NewSubscriber {
        NewSubscriber {
            connection: conn.clone(),
            query: "{ users { id } }".to_string(),
            operation_id: op.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let registry = SubscriberRegistry::new();
        let (sink, _rx) = channel_sink();
        let conn = Connection::new(sink, SendOptions::default());

        let id = registry.insert(new_subscriber(&conn, "1")).await;
        assert!(registry.contains(id).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_same_query_twice_gets_distinct_ids() {
        let registry = SubscriberRegistry::new();
        let (sink, _rx) = channel_sink();
        let conn = Connection::new(sink, SendOptions::default());

        let a = registry.insert(new_subscriber(&conn, "1")).await;
        let b = registry.insert(new_subscriber(&conn, "1")).await;
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_get_distinct_ids() {
        let registry = create_subscriber_registry();
        let (sink, _rx) = channel_sink();
        let conn = Connection::new(sink, SendOptions::default());

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let registry = registry.clone();
                let sub = new_subscriber(&conn, &i.to_string());
                tokio::spawn(async move { registry.insert(sub).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 64);
        assert_eq!(registry.len().await, 64);
    }

    #[tokio::test]
    async fn test_remove_operation_only_matches_connection_and_id() {
        let registry = SubscriberRegistry::new();
        let (sink_a, _rx_a) = channel_sink();
        let (sink_b, _rx_b) = channel_sink();
        let a = Connection::new(sink_a, SendOptions::default());
        let b = Connection::new(sink_b, SendOptions::default());

        registry.insert(new_subscriber(&a, "1")).await;
        registry.insert(new_subscriber(&a, "1")).await;
        registry.insert(new_subscriber(&a, "2")).await;
        registry.insert(new_subscriber(&b, "1")).await;

        assert_eq!(registry.remove_operation(a.id(), "1").await, 2);
        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.remove_operation(a.id(), "1").await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_excludes_later_inserts() {
        let registry = SubscriberRegistry::new();
        let (sink, _rx) = channel_sink();
        let conn = Connection::new(sink, SendOptions::default());

        registry.insert(new_subscriber(&conn, "1")).await;
        let snapshot = registry.snapshot().await;
        registry.insert(new_subscriber(&conn, "2")).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_for_each_removes_marked() {
        let registry = SubscriberRegistry::new();
        let (sink, _rx) = channel_sink();
        let conn = Connection::new(sink, SendOptions::default());

        let keep = registry.insert(new_subscriber(&conn, "keep")).await;
        registry.insert(new_subscriber(&conn, "drop")).await;

        let removed = registry
            .for_each(|s| async move {
                if s.operation_id == "drop" {
                    Visit::Remove
                } else {
                    Visit::Keep
                }
            })
            .await;

        assert_eq!(removed, 1);
        assert!(registry.contains(keep).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SubscriberRegistry::new();
        let (sink, _rx) = channel_sink();
        let conn = Connection::new(sink, SendOptions::default());

        registry.insert(new_subscriber(&conn, "1")).await;
        registry.insert(new_subscriber(&conn, "2")).await;

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty().await);
        assert!(conn.is_closed());
    }
}
