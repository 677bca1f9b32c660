//! 업데이트 분류 키.
//!
//! 변경 가능한 엔티티 종류마다 하나의 키를 둡니다. mutation resolver는 커밋 후
//! 자신의 엔티티 종류에 맞는 키로 브로드캐스트하고, 구독 필드 resolver는 자신이
//! 선언한 키로만 값을 꺼낼 수 있습니다. 새 엔티티 종류를 추가하려면 키를 추가하고
//! 해당 resolver가 그 키를 읽도록 해야 합니다.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 브로드캐스트 분류 키.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKey {
    /// 사용자 생성/수정
    UserUpdated,
    /// 사용자 삭제
    UserDeleted,
    /// 메시지 생성/수정
    MessageUpdated,
    /// 메시지 삭제 (soft delete)
    MessageDeleted,
}

impl UpdateKey {
    /// 모든 분류 키.
    pub const ALL: [UpdateKey; 4] = [
        UpdateKey::UserUpdated,
        UpdateKey::UserDeleted,
        UpdateKey::MessageUpdated,
        UpdateKey::MessageDeleted,
    ];

    /// 로그/메트릭 라벨용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKey::UserUpdated => "user_updated",
            UpdateKey::UserDeleted => "user_deleted",
            UpdateKey::MessageUpdated => "message_updated",
            UpdateKey::MessageDeleted => "message_deleted",
        }
    }
}

impl fmt::Display for UpdateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 쿼리 재실행 시 주입되는 값.
///
/// 값은 자신의 키로 요청한 resolver에게만 보입니다. 키가 다르면 `None`이므로
/// 다른 엔티티 종류의 구독 필드는 null로 평가됩니다.
#[derive(Clone)]
pub struct BoundValue {
    key: UpdateKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl BoundValue {
    /// 키와 값을 묶습니다.
    pub fn new<T: Any + Send + Sync>(key: UpdateKey, value: T) -> Self {
        Self {
            key,
            value: Arc::new(value),
        }
    }

    /// 분류 키.
    pub fn key(&self) -> UpdateKey {
        self.key
    }

    /// `key`가 일치하고 타입이 맞을 때만 값을 반환합니다.
    pub fn get<T: Any>(&self, key: UpdateKey) -> Option<&T> {
        if self.key != key {
            return None;
        }
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundValue").field("key", &self.key).finish_non_exhaustive()
    }
}
