//! GraphQL HTTP endpoint.
//!
//! - `POST /graphql`: JSON 본문 `{query, variables, operationName}`
//! - `GET /graphql?query=...&variables=...&operationName=...`
//!
//! 모든 요청은 브로드캐스터를 notifier로 실어 보내므로 HTTP로 실행된 mutation은
//! 커밋 후 구독자에게 전달됩니다.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{bad_request, ApiErrorResponse, ApiResult};
use crate::graphql::{QueryRequest, QueryResult};
use crate::state::AppState;

/// GraphQL 요청 본문.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlBody {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub variables: Option<Value>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

/// GET 쿼리 파라미터. `variables`는 JSON 문자열입니다.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub variables: Option<String>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

async fn execute(state: &AppState, body: GraphQlBody) -> Json<QueryResult> {
    let request = QueryRequest::new(body.query)
        .with_variables(body.variables)
        .with_operation_name(body.operation_name)
        .with_notifier(state.broadcaster.clone());

    let result = state.executor.execute(request).await;
    if !result.is_ok() {
        debug!(errors = ?result.errors, "GraphQL operation returned errors");
    }
    Json(result)
}

/// POST /graphql
pub async fn graphql_post(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<QueryResult>> {
    let body: GraphQlBody = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Invalid GraphQL request body");
        bad_request(ApiErrorResponse::invalid_request("Error parsing JSON request body"))
    })?;
    Ok(execute(&state, body).await)
}

/// GET /graphql
pub async fn graphql_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GraphQlParams>,
) -> ApiResult<Json<QueryResult>> {
    let variables = params
        .variables
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|e| {
            bad_request(
                ApiErrorResponse::invalid_request("Error parsing variables")
                    .with_details(serde_json::json!({ "error": e.to_string() })),
            )
        })?;

    let body = GraphQlBody {
        query: params.query,
        variables,
        operation_name: params.operation_name,
    };
    Ok(execute(&state, body).await)
}

/// GraphQL 라우터 생성.
pub fn graphql_router() -> Router<Arc<AppState>> {
    Router::new().route("/graphql", get(graphql_get).post(graphql_post))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use crate::websocket::{channel_sink, Connection, NewSubscriber};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        graphql_router().with_state(state)
    }

    async fn post(app: Router, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/graphql")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_post_query() {
        let state = Arc::new(create_test_state());
        let (status, body) = post(app(state), r#"{"query":"{ users { id } }"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": {"users": []}}));
    }

    #[tokio::test]
    async fn test_post_invalid_json() {
        let state = Arc::new(create_test_state());
        let (status, body) = post(app(state), "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Error parsing JSON request body");
    }

    #[tokio::test]
    async fn test_post_mutation_with_variables_notifies_subscribers() {
        let state = Arc::new(create_test_state());
        let (sink, mut rx) = channel_sink();
        let conn = Connection::new(sink, state.send_options);
        state
            .registry
            .insert(NewSubscriber {
                connection: conn,
                query: "{ updatedUser { email } }".to_string(),
                operation_id: "7".to_string(),
            })
            .await;

        let (status, body) = post(
            app(state.clone()),
            r#"{
                "query": "mutation Create($email: String!) { createUser(first_name: \"A\", last_name: \"B\", email: $email) { id } }",
                "variables": {"email": "a@example.com"},
                "operationName": "Create"
            }"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": {"createUser": {"id": 1}}}));

        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({"type": "data", "id": "7", "payload": {"data": {"updatedUser": {"email": "a@example.com"}}}})
        );
    }

    #[tokio::test]
    async fn test_get_query() {
        let state = Arc::new(create_test_state());
        let request = Request::builder()
            .method(Method::GET)
            .uri("/graphql?query=%7B%20messages%20%7B%20id%20%7D%20%7D")
            .body(Body::empty())
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"data": {"messages": []}}));
    }

    #[tokio::test]
    async fn test_get_invalid_variables() {
        let state = Arc::new(create_test_state());
        let request = Request::builder()
            .method(Method::GET)
            .uri("/graphql?query=%7B%20users%20%7B%20id%20%7D%20%7D&variables=%7Bnope")
            .body(Body::empty())
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
