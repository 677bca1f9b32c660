//! GraphiQL IDE.

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use axum::{response::Html, routing::get, Router};

use crate::state::AppState;

/// GET /
pub async fn graphiql() -> Html<String> {
    Html(
        GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/subscriptions")
            .finish(),
    )
}

/// GraphiQL 라우터 생성.
pub fn graphiql_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(graphiql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_graphiql_page_points_at_endpoints() {
        let Html(page) = graphiql().await;
        assert!(page.contains("/graphql"));
        assert!(page.contains("/subscriptions"));
    }
}
