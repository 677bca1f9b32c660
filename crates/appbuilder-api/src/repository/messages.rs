//! 메시지 Repository.
//!
//! `messages` 테이블에 대한 CRUD. Soft delete 패턴을 사용하므로 조회/수정/삭제는
//! `deleted_at IS NULL`인 행만 대상으로 합니다.

use appbuilder_core::{Message, NewMessage};
use sqlx::PgPool;
use tracing::debug;

/// 메시지 Repository.
pub struct MessageRepository;

impl MessageRepository {
    /// 삭제되지 않은 메시지 조회.
    pub async fn list(pool: &PgPool) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT id, user_id, message, created_at, updated_at, deleted_at
            FROM messages
            WHERE deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// 메시지 생성.
    pub async fn insert(pool: &PgPool, input: &NewMessage) -> Result<Message, sqlx::Error> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (user_id, message)
            VALUES ($1, $2)
            RETURNING id, user_id, message, created_at, updated_at, deleted_at
            "#,
        )
        .bind(input.user_id)
        .bind(&input.message)
        .fetch_one(pool)
        .await?;

        debug!(message_id = message.id, user_id = message.user_id, "Message inserted");
        Ok(message)
    }

    /// 메시지 본문 수정. 없거나 삭제된 메시지면 `None`.
    pub async fn update(
        pool: &PgPool,
        id: i32,
        message: &str,
    ) -> Result<Option<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET message = $1, updated_at = NOW()
            WHERE id = $2 AND deleted_at IS NULL
            RETURNING id, user_id, message, created_at, updated_at, deleted_at
            "#,
        )
        .bind(message)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// 메시지 soft delete. 없거나 이미 삭제된 메시지면 `None`.
    pub async fn soft_delete(pool: &PgPool, id: i32) -> Result<Option<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, user_id, message, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
