//! 메모리 저장소.
//!
//! `PgStore`와 같은 의미를 가집니다: 사용자 삭제는 해당 사용자의 메시지를 함께
//! 지우고, 메시지 삭제는 soft delete입니다.

use std::collections::BTreeMap;

use appbuilder_core::{Message, NewMessage, NewUser, User, UserUpdate};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    messages: BTreeMap<i32, Message>,
    next_user_id: i32,
    next_message_id: i32,
}

/// 메모리 저장소.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn create_user(&self, input: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        tables.next_user_id += 1;
        let user = User::from_new(tables.next_user_id, input, Utc::now());
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, update: UserUpdate) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let id = update.id;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user.apply(update, Utc::now());
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i32) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        tables.messages.retain(|_, m| m.user_id != id);
        Ok(user)
    }

    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        Ok(self
            .tables
            .read()
            .await
            .messages
            .values()
            .filter(|m| !m.is_deleted())
            .cloned()
            .collect())
    }

    async fn create_message(&self, input: NewMessage) -> StoreResult<Message> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&input.user_id) {
            return Err(StoreError::InvalidInput(format!(
                "user {}: referenced row does not exist",
                input.user_id
            )));
        }
        tables.next_message_id += 1;
        let message = Message::from_new(tables.next_message_id, input, Utc::now());
        tables.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn update_message(&self, id: i32, text: String) -> StoreResult<Message> {
        let mut tables = self.tables.write().await;
        let message = tables
            .messages
            .get_mut(&id)
            .filter(|m| !m.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))?;
        message.message = text;
        message.updated_at = Some(Utc::now());
        Ok(message.clone())
    }

    async fn delete_message(&self, id: i32) -> StoreResult<Message> {
        let mut tables = self.tables.write().await;
        let message = tables
            .messages
            .get_mut(&id)
            .filter(|m| !m.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))?;
        message.deleted_at = Some(Utc::now());
        Ok(message.clone())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
