//! 사용자 도메인 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 애플리케이션 사용자.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "graphql-support", derive(async_graphql::SimpleObject))]
#[cfg_attr(
    feature = "graphql-support",
    graphql(name = "user", rename_fields = "snake_case")
)]
pub struct User {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// 새 사용자 입력.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// 사용자 수정 입력.
///
/// 모든 필드를 한 번에 교체합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    /// 입력값으로부터 저장 전 사용자 레코드를 만듭니다.
    pub fn from_new(id: i32, input: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            created_at: Some(now),
            updated_at: Some(now),
            deleted_at: None,
        }
    }

    /// 수정 입력을 적용합니다.
    pub fn apply(&mut self, update: UserUpdate, now: DateTime<Utc>) {
        self.email = update.email;
        self.first_name = update.first_name;
        self.last_name = update.last_name;
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_apply_update() {
        let now = Utc::now();
        let mut user = User::from_new(
            1,
            NewUser {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            now,
        );

        user.apply(
            UserUpdate {
                id: 1,
                email: "ada@analytical.engine".to_string(),
                first_name: "Augusta".to_string(),
                last_name: "King".to_string(),
            },
            now,
        );

        assert_eq!(user.id, 1);
        assert_eq!(user.email, "ada@analytical.engine");
        assert_eq!(user.first_name, "Augusta");
        assert!(user.deleted_at.is_none());
    }

    #[test]
    fn test_user_json_field_names() {
        let user = User::from_new(
            3,
            NewUser {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: "grace@example.com".to_string(),
            },
            Utc::now(),
        );
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["first_name"], "Grace");
        assert!(json["deleted_at"].is_null());
    }

    proptest::proptest! {
        #[test]
        fn prop_apply_keeps_identity(
            email in "[a-z]{1,12}@[a-z]{1,8}\\.com",
            first in "[A-Za-z]{1,16}",
            last in "[A-Za-z]{1,16}",
        ) {
            let created = Utc::now();
            let mut user = User::from_new(
                7,
                NewUser {
                    first_name: "a".to_string(),
                    last_name: "b".to_string(),
                    email: "c@d.com".to_string(),
                },
                created,
            );

            user.apply(
                UserUpdate { id: 7, email: email.clone(), first_name: first.clone(), last_name: last.clone() },
                Utc::now(),
            );

            proptest::prop_assert_eq!(user.id, 7);
            proptest::prop_assert_eq!(user.created_at, Some(created));
            proptest::prop_assert_eq!(user.email, email);
            proptest::prop_assert_eq!(user.first_name, first);
            proptest::prop_assert_eq!(user.last_name, last);
        }
    }
}
