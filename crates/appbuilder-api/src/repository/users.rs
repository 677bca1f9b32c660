//! 사용자 Repository.
//!
//! `users` 테이블에 대한 CRUD. 삭제는 hard delete입니다.

use appbuilder_core::{NewUser, User, UserUpdate};
use sqlx::PgPool;
use tracing::debug;

/// 사용자 Repository.
pub struct UserRepository;

impl UserRepository {
    /// ID로 사용자 조회.
    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// 전체 사용자 조회.
    pub async fn list(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, created_at, updated_at, deleted_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// 사용자 생성.
    pub async fn insert(pool: &PgPool, input: &NewUser) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name, email)
            VALUES ($1, $2, $3)
            RETURNING id, first_name, last_name, email, created_at, updated_at, deleted_at
            "#,
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .fetch_one(pool)
        .await?;

        debug!(user_id = user.id, "User inserted");
        Ok(user)
    }

    /// 사용자 수정. 대상이 없으면 `None`.
    pub async fn update(pool: &PgPool, update: &UserUpdate) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = $1, first_name = $2, last_name = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING id, first_name, last_name, email, created_at, updated_at, deleted_at
            "#,
        )
        .bind(&update.email)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.id)
        .fetch_optional(pool)
        .await
    }

    /// 사용자 삭제. 삭제된 행을 반환하고, 대상이 없으면 `None`.
    ///
    /// 사용자의 메시지는 FK `ON DELETE CASCADE`로 함께 삭제됩니다.
    pub async fn delete(pool: &PgPool, id: i32) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            DELETE FROM users
            WHERE id = $1
            RETURNING id, first_name, last_name, email, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
