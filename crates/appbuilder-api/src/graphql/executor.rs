//! `async-graphql` 기반 실행기.

use async_graphql::Variables;
use async_trait::async_trait;
use tracing::debug;

use super::{AppSchema, QueryExecutor, QueryRequest, QueryResult};

/// 스키마를 감싼 실행기.
#[derive(Clone)]
pub struct GraphQlExecutor {
    schema: AppSchema,
}

impl GraphQlExecutor {
    pub fn new(schema: AppSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &AppSchema {
        &self.schema
    }
}

/// 저장된 `subscription` 문서를 `query`로 바꿉니다.
///
/// 라이브 필드는 Query 루트에 있으므로 재실행은 항상 query로 평가됩니다.
fn as_query_document(document: &str) -> std::borrow::Cow<'_, str> {
    let trimmed = document.trim_start();
    let Some(rest) = trimmed.strip_prefix("subscription") else {
        return document.into();
    };
    let keyword_ends = rest
        .chars()
        .next()
        .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
    if keyword_ends {
        format!("query{rest}").into()
    } else {
        document.into()
    }
}

#[async_trait]
impl QueryExecutor for GraphQlExecutor {
    async fn execute(&self, request: QueryRequest) -> QueryResult {
        let mut gql = async_graphql::Request::new(as_query_document(&request.query));

        if let Some(variables) = request.variables {
            gql = gql.variables(Variables::from_json(variables));
        }
        if let Some(operation_name) = request.operation_name {
            gql = gql.operation_name(operation_name);
        }
        if let Some(bound) = request.bound {
            debug!(key = %bound.key(), "Executing with bound value");
            gql = gql.data(bound);
        }
        if let Some(notifier) = request.notifier {
            gql = gql.data(notifier);
        }

        self.schema.execute(gql).await.into()
    }
}
