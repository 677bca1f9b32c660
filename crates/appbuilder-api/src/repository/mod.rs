//! Repository pattern for database operations.
//!
//! 데이터 접근 로직을 GraphQL resolver에서 분리합니다. PostgreSQL 접근은
//! static methods 패턴의 Repository가 담당하고, resolver는 `Store` trait만 봅니다.
//!
//! - [`PgStore`]: `sqlx::PgPool` 기반 운영 저장소
//! - [`MemoryStore`]: DB 설정이 없을 때와 테스트에서 쓰는 메모리 저장소

pub mod memory;
pub mod messages;
pub mod pg;
pub mod users;

use std::sync::Arc;

use appbuilder_core::{Message, NewMessage, NewUser, User, UserUpdate};
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use messages::MessageRepository;
pub use pg::PgStore;
pub use users::UserRepository;

/// 저장소 에러.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),

    /// 대상 행 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 제약 조건 위반 등 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),
}

/// 저장소 작업 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;

/// 사용자/메시지 저장소.
///
/// 쓰기 연산은 커밋된 행을 그대로 반환하므로 호출자는 그 값을 브로드캐스트할 수 있습니다.
#[async_trait]
pub trait Store: Send + Sync {
    /// 사용자 단건 조회. 없으면 `None`.
    async fn get_user(&self, id: i32) -> StoreResult<Option<User>>;

    /// 전체 사용자 조회.
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// 사용자 생성.
    async fn create_user(&self, input: NewUser) -> StoreResult<User>;

    /// 사용자 수정. 없으면 `NotFound`.
    async fn update_user(&self, update: UserUpdate) -> StoreResult<User>;

    /// 사용자 삭제 (hard delete). 삭제된 행을 반환합니다.
    async fn delete_user(&self, id: i32) -> StoreResult<User>;

    /// 삭제되지 않은 메시지 조회.
    async fn list_messages(&self) -> StoreResult<Vec<Message>>;

    /// 메시지 생성. 존재하지 않는 사용자면 `InvalidInput`.
    async fn create_message(&self, input: NewMessage) -> StoreResult<Message>;

    /// 메시지 본문 수정. 없거나 삭제된 메시지면 `NotFound`.
    async fn update_message(&self, id: i32, message: String) -> StoreResult<Message>;

    /// 메시지 soft delete. 삭제 처리된 행을 반환합니다.
    async fn delete_message(&self, id: i32) -> StoreResult<Message>;

    /// 저장소 연결 확인 (readiness).
    async fn ping(&self) -> StoreResult<()>;
}

/// 공유 저장소 타입.
pub type SharedStore = Arc<dyn Store>;

/// FK 위반(존재하지 않는 사용자 참조)을 입력 에러로 변환합니다.
pub(crate) fn map_foreign_key_violation(err: sqlx::Error, what: &str) -> StoreError {
    let is_fk_violation = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23503");
    if is_fk_violation {
        StoreError::InvalidInput(format!("{what}: referenced row does not exist"))
    } else {
        StoreError::Database(err)
    }
}
