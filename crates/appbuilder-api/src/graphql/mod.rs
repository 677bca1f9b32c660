//! 쿼리 실행 계층.
//!
//! 브로드캐스트 엔진과 HTTP 엔드포인트는 [`QueryExecutor`] trait만 봅니다.
//! 운영 구현은 `async-graphql` 스키마 위의 [`GraphQlExecutor`]입니다.

mod executor;
pub mod schema;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::websocket::{BoundValue, SharedBroadcaster};

pub use executor::GraphQlExecutor;
pub use schema::{build_schema, AppSchema, MutationRoot, QueryRoot};

/// 쿼리 실행 요청.
#[derive(Clone, Default)]
pub struct QueryRequest {
    /// 쿼리 문서
    pub query: String,
    /// 변수 (JSON 객체)
    pub variables: Option<Value>,
    /// 실행할 operation 이름
    pub operation_name: Option<String>,
    /// 재실행 시 주입되는 값
    pub bound: Option<BoundValue>,
    /// mutation이 커밋 후 호출할 브로드캐스터. 없으면 mutation은 실패합니다.
    pub notifier: Option<SharedBroadcaster>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_variables(mut self, variables: Option<Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_operation_name(mut self, operation_name: Option<String>) -> Self {
        self.operation_name = operation_name;
        self
    }

    pub fn with_bound(mut self, bound: BoundValue) -> Self {
        self.bound = Some(bound);
        self
    }

    pub fn with_notifier(mut self, notifier: SharedBroadcaster) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

impl std::fmt::Debug for QueryRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRequest")
            .field("query", &self.query)
            .field("operation_name", &self.operation_name)
            .field("bound", &self.bound)
            .field("has_notifier", &self.notifier.is_some())
            .finish()
    }
}

/// 쿼리 실행 결과.
///
/// GraphQL 응답 형식으로 직렬화됩니다. `errors`가 비어 있으면 생략됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
}

impl QueryResult {
    /// 에러 없는 결과.
    pub fn from_data(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    /// 실행 자체가 실패한 결과.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: Value::Null,
            errors: vec![serde_json::json!({ "message": message.into() })],
        }
    }

    /// 에러가 없는지 확인.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<async_graphql::Response> for QueryResult {
    fn from(response: async_graphql::Response) -> Self {
        let data = response.data.into_json().unwrap_or(Value::Null);
        let errors = response
            .errors
            .iter()
            .map(|e| {
                serde_json::to_value(e)
                    .unwrap_or_else(|_| serde_json::json!({ "message": e.message }))
            })
            .collect();
        Self { data, errors }
    }
}

/// 쿼리 실행 엔진.
///
/// 실행 에러는 `QueryResult.errors`에 담겨 반환되며 호출자를 실패시키지 않습니다.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, request: QueryRequest) -> QueryResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_result_omits_empty_errors() {
        let result = QueryResult::from_data(json!({"users": []}));
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"data": {"users": []}}));
        assert!(result.is_ok());
    }

    #[test]
    fn test_query_result_error() {
        let result = QueryResult::error("boom");
        assert!(!result.is_ok());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"data": null, "errors": [{"message": "boom"}]})
        );
    }
}
