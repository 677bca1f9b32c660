//! HTTP 요청 metrics middleware.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
    record_websocket_upgrade,
};

/// 구독 업그레이드 경로.
const SUBSCRIPTIONS_PATH: &str = "/subscriptions";

/// HTTP 메트릭을 수집하는 미들웨어.
///
/// 일반 요청은 `http_requests_total`, `http_responses_total`,
/// `http_request_duration_seconds`에 기록됩니다.
///
/// `/subscriptions` 요청은 응답 시간이 의미가 없으므로 업그레이드 성공 여부만
/// `websocket_upgrades_total`에 남깁니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    if request.uri().path() == SUBSCRIPTIONS_PATH {
        let response = next.run(request).await;
        record_websocket_upgrade(response.status() == StatusCode::SWITCHING_PROTOCOLS);
        return response;
    }

    let method = request.method().as_str().to_owned();
    let path = normalize_path(request.uri().path());
    record_http_request(&method, &path);

    let started = Instant::now();
    let response = next.run(request).await;

    record_http_response(&method, &path, response.status().as_u16());
    record_http_duration(&method, &path, started.elapsed().as_secs_f64());
    response
}
