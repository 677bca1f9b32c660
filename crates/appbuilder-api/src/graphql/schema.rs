//! GraphQL 스키마.
//!
//! 필드/인자 이름은 기존 클라이언트와 맞추기 위해 snake_case 인자를 유지합니다
//! (`createUser(first_name: ..., last_name: ..., email: ...)`).
//!
//! 라이브 필드(`updatedUser`, `deletedUser`, `newMessage`, `deletedMessage`)는
//! Query 루트에 있고, 재실행 시 주입된 [`BoundValue`]에서만 값을 꺼냅니다.
//! 키가 다르거나 값이 없으면 null입니다.

use std::any::Any;

use appbuilder_core::{Message, NewMessage, NewUser, User, UserUpdate};
use async_graphql::{Context, EmptySubscription, Error, Object, Result, Schema};
use tracing::info;

use crate::repository::SharedStore;
use crate::websocket::{BoundValue, SharedBroadcaster, UpdateKey};

/// 애플리케이션 스키마 타입.
pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// 스키마를 만듭니다. 저장소는 스키마 데이터로 들어갑니다.
pub fn build_schema(store: SharedStore) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .finish()
}

fn bound_value<T: Any + Clone>(ctx: &Context<'_>, key: UpdateKey) -> Option<T> {
    ctx.data_opt::<BoundValue>()
        .and_then(|bound| bound.get::<T>(key))
        .cloned()
}

/// 요청에 실린 브로드캐스터를 꺼냅니다.
///
/// 브로드캐스터가 없는 요청(구독자 재실행 포함)에서는 쓰기 전에 실패해야 하므로
/// 모든 mutation은 저장소를 건드리기 전에 이 함수를 호출합니다.
fn notifier<'a>(ctx: &Context<'a>) -> Result<&'a SharedBroadcaster> {
    ctx.data::<SharedBroadcaster>()
        .map_err(|_| Error::new("mutations are not available in this context"))
}

// ==================== Query ====================

pub struct QueryRoot;

#[Object(name = "Query", rename_args = "snake_case")]
impl QueryRoot {
    /// ID로 사용자 조회. 없으면 null.
    async fn user(&self, ctx: &Context<'_>, id: Option<i32>) -> Result<Option<User>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let store = ctx.data::<SharedStore>()?;
        Ok(store.get_user(id).await?)
    }

    /// 전체 사용자.
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let store = ctx.data::<SharedStore>()?;
        Ok(store.list_users().await?)
    }

    /// 삭제되지 않은 메시지.
    async fn messages(&self, ctx: &Context<'_>) -> Result<Vec<Message>> {
        let store = ctx.data::<SharedStore>()?;
        Ok(store.list_messages().await?)
    }

    /// 생성/수정된 사용자 (라이브).
    async fn updated_user(&self, ctx: &Context<'_>) -> Option<User> {
        bound_value(ctx, UpdateKey::UserUpdated)
    }

    /// 삭제된 사용자 (라이브).
    async fn deleted_user(&self, ctx: &Context<'_>) -> Option<User> {
        bound_value(ctx, UpdateKey::UserDeleted)
    }

    /// 생성/수정된 메시지 (라이브).
    async fn new_message(&self, ctx: &Context<'_>) -> Option<Message> {
        bound_value(ctx, UpdateKey::MessageUpdated)
    }

    /// 삭제된 메시지 (라이브).
    async fn deleted_message(&self, ctx: &Context<'_>) -> Option<Message> {
        bound_value(ctx, UpdateKey::MessageDeleted)
    }
}

// ==================== Mutation ====================

pub struct MutationRoot;

#[Object(name = "Mutation", rename_args = "snake_case")]
impl MutationRoot {
    /// 사용자 생성.
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        first_name: String,
        last_name: String,
        email: String,
    ) -> Result<User> {
        let notifier = notifier(ctx)?;
        let store = ctx.data::<SharedStore>()?;

        let user = store
            .create_user(NewUser {
                first_name,
                last_name,
                email,
            })
            .await?;

        info!(user_id = user.id, "User created");
        notifier.broadcast(UpdateKey::UserUpdated, user.clone()).await;
        Ok(user)
    }

    /// 사용자 수정.
    async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: i32,
        email: String,
        first_name: String,
        last_name: String,
    ) -> Result<User> {
        let notifier = notifier(ctx)?;
        let store = ctx.data::<SharedStore>()?;

        let user = store
            .update_user(UserUpdate {
                id,
                email,
                first_name,
                last_name,
            })
            .await?;

        info!(user_id = user.id, "User updated");
        notifier.broadcast(UpdateKey::UserUpdated, user.clone()).await;
        Ok(user)
    }

    /// 사용자 삭제.
    async fn delete_user(&self, ctx: &Context<'_>, id: i32) -> Result<bool> {
        let notifier = notifier(ctx)?;
        let store = ctx.data::<SharedStore>()?;

        let user = store.delete_user(id).await?;

        info!(user_id = user.id, "User deleted");
        notifier.broadcast(UpdateKey::UserDeleted, user).await;
        Ok(true)
    }

    /// 메시지 생성.
    async fn create_message(&self, ctx: &Context<'_>, user_id: i32, message: String) -> Result<Message> {
        let notifier = notifier(ctx)?;
        let store = ctx.data::<SharedStore>()?;

        let message = store.create_message(NewMessage { user_id, message }).await?;

        info!(message_id = message.id, user_id, "Message created");
        notifier.broadcast(UpdateKey::MessageUpdated, message.clone()).await;
        Ok(message)
    }

    /// 메시지 본문 수정.
    async fn update_message(&self, ctx: &Context<'_>, id: i32, message: String) -> Result<Message> {
        let notifier = notifier(ctx)?;
        let store = ctx.data::<SharedStore>()?;

        let message = store.update_message(id, message).await?;

        info!(message_id = message.id, "Message updated");
        notifier.broadcast(UpdateKey::MessageUpdated, message.clone()).await;
        Ok(message)
    }

    /// 메시지 삭제 (soft delete).
    async fn delete_message(&self, ctx: &Context<'_>, id: i32) -> Result<bool> {
        let notifier = notifier(ctx)?;
        let store = ctx.data::<SharedStore>()?;

        let message = store.delete_message(id).await?;

        info!(message_id = message.id, "Message deleted");
        notifier.broadcast(UpdateKey::MessageDeleted, message).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::{GraphQlExecutor, QueryExecutor, QueryRequest};
    use crate::repository::MemoryStore;
    use crate::websocket::{
        channel_sink, create_subscriber_registry, Broadcaster, Connection, NewSubscriber,
        SendOptions,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        executor: Arc<GraphQlExecutor>,
        broadcaster: SharedBroadcaster,
    }

    impl Harness {
        fn new() -> Self {
            let store: SharedStore = Arc::new(MemoryStore::new());
            let executor = Arc::new(GraphQlExecutor::new(build_schema(store)));
            let broadcaster = Arc::new(Broadcaster::new(
                create_subscriber_registry(),
                executor.clone(),
            ));
            Self {
                executor,
                broadcaster,
            }
        }

        async fn mutate(&self, query: &str) -> crate::graphql::QueryResult {
            self.executor
                .execute(QueryRequest::new(query).with_notifier(self.broadcaster.clone()))
                .await
        }

        async fn subscribe(&self, op: &str, query: &str) -> UnboundedReceiver<String> {
            let (sink, rx) = channel_sink();
            let conn = Connection::new(sink, SendOptions::default());
            self.broadcaster
                .registry()
                .insert(NewSubscriber {
                    connection: conn,
                    query: query.to_string(),
                    operation_id: op.to_string(),
                })
                .await;
            rx
        }
    }

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn test_new_message_scenario() {
        let h = Harness::new();
        let user = h
            .mutate(r#"mutation { createUser(first_name: "Ada", last_name: "Lovelace", email: "ada@example.com") { id } }"#)
            .await;
        assert!(user.is_ok(), "{:?}", user.errors);
        let user_id = user.data["createUser"]["id"].as_i64().unwrap();

        let mut rx = h.subscribe("1", "{ newMessage { id message } }").await;

        let created = h
            .mutate(&format!(
                r#"mutation {{ createMessage(user_id: {user_id}, message: "hi") {{ id }} }}"#
            ))
            .await;
        assert!(created.is_ok(), "{:?}", created.errors);
        let message_id = created.data["createMessage"]["id"].clone();

        let frame = parse(&rx.recv().await.unwrap());
        assert_eq!(
            frame,
            json!({
                "type": "data",
                "id": "1",
                "payload": {"data": {"newMessage": {"id": message_id, "message": "hi"}}}
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscription_document_and_key_mismatch() {
        let h = Harness::new();
        let mut rx = h
            .subscribe("u", "subscription { updatedUser { id first_name } }")
            .await;

        h.mutate(r#"mutation { createUser(first_name: "Grace", last_name: "Hopper", email: "g@example.com") { id } }"#)
            .await;
        let frame = parse(&rx.recv().await.unwrap());
        assert_eq!(frame["payload"]["data"]["updatedUser"]["first_name"], "Grace");

        // 다른 키의 브로드캐스트는 null 필드로 도착
        h.mutate("mutation { deleteUser(id: 1) }").await;
        let frame = parse(&rx.recv().await.unwrap());
        assert!(frame["payload"]["data"]["updatedUser"].is_null());
        assert!(frame["payload"].get("errors").is_none());
    }

    #[tokio::test]
    async fn test_empty_stored_query_gets_errors_as_data() {
        let h = Harness::new();
        let mut rx = h.subscribe("e", "").await;

        h.mutate(r#"mutation { createUser(first_name: "Alan", last_name: "Turing", email: "a@example.com") { id } }"#)
            .await;
        let frame = parse(&rx.recv().await.unwrap());
        assert_eq!(frame["type"], "data");
        assert_eq!(frame["id"], "e");
        assert!(frame["payload"]["errors"]
            .as_array()
            .is_some_and(|errors| !errors.is_empty()));

        // 연결은 유지되어 다음 브로드캐스트도 받음
        h.mutate("mutation { deleteUser(id: 1) }").await;
        assert_eq!(parse(&rx.recv().await.unwrap())["id"], "e");
    }

    #[tokio::test]
    async fn test_mutation_without_notifier_fails_before_write() {
        let h = Harness::new();
        let result = h
            .executor
            .execute(QueryRequest::new(
                r#"mutation { createUser(first_name: "A", last_name: "B", email: "c") { id } }"#,
            ))
            .await;
        assert!(!result.is_ok());

        let users = h.mutate("{ users { id } }").await;
        assert_eq!(users.data, json!({"users": []}));
    }

    #[tokio::test]
    async fn test_failed_mutation_does_not_broadcast() {
        let h = Harness::new();
        let mut rx = h.subscribe("1", "{ deletedMessage { id } }").await;

        let result = h.mutate("mutation { deleteMessage(id: 404) }").await;
        assert!(!result.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_message_broadcasts_deleted_row() {
        let h = Harness::new();
        h.mutate(r#"mutation { createUser(first_name: "A", last_name: "B", email: "c") { id } }"#)
            .await;
        h.mutate(r#"mutation { createMessage(user_id: 1, message: "bye") { id } }"#)
            .await;

        let mut rx = h.subscribe("d", "{ deletedMessage { id message } }").await;
        let result = h.mutate("mutation { deleteMessage(id: 1) }").await;
        assert_eq!(result.data, json!({"deleteMessage": true}));

        let frame = parse(&rx.recv().await.unwrap());
        assert_eq!(
            frame["payload"]["data"]["deletedMessage"],
            json!({"id": 1, "message": "bye"})
        );

        let messages = h.mutate("{ messages { id } }").await;
        assert_eq!(messages.data, json!({"messages": []}));
    }

    #[tokio::test]
    async fn test_query_execution_error_is_delivered_as_data() {
        let h = Harness::new();
        let mut rx = h.subscribe("bad", "{ noSuchField }").await;

        h.mutate(r#"mutation { createUser(first_name: "A", last_name: "B", email: "c") { id } }"#)
            .await;
        let frame = parse(&rx.recv().await.unwrap());
        assert_eq!(frame["type"], "data");
        assert!(!frame["payload"]["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_lookup() {
        let h = Harness::new();
        h.mutate(r#"mutation { createUser(first_name: "A", last_name: "B", email: "c") { id } }"#)
            .await;

        let found = h.mutate("{ user(id: 1) { email last_name } }").await;
        assert_eq!(found.data, json!({"user": {"email": "c", "last_name": "B"}}));

        let missing = h.mutate("{ user(id: 2) { id } }").await;
        assert_eq!(missing.data, json!({"user": null}));
    }
}
