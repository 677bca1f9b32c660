//! 메시지 도메인 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 사용자가 보낸 메시지.
///
/// 삭제는 `deleted_at`을 채우는 soft delete입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "graphql-support", derive(async_graphql::SimpleObject))]
#[cfg_attr(
    feature = "graphql-support",
    graphql(name = "message", rename_fields = "snake_case")
)]
pub struct Message {
    pub id: i32,
    pub user_id: i32,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// 새 메시지 입력.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub user_id: i32,
    pub message: String,
}

impl Message {
    /// 입력값으로부터 저장 전 메시지 레코드를 만듭니다.
    pub fn from_new(id: i32, input: NewMessage, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: input.user_id,
            message: input.message,
            created_at: Some(now),
            updated_at: Some(now),
            deleted_at: None,
        }
    }

    /// soft delete 여부.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
