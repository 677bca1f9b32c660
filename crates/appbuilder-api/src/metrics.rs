//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 실시간 구독 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::websocket::UpdateKey;

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # 반환값
///
/// `/metrics` 엔드포인트에서 메트릭을 렌더링하기 위한 `PrometheusHandle`.
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("broadcast_duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 실시간 구독 메트릭 헬퍼 함수
// ============================================================================

/// WebSocket 연결 수 증가.
pub fn increment_websocket_connections() {
    gauge!("websocket_connections_active").increment(1.0);
}

/// WebSocket 연결 수 감소.
pub fn decrement_websocket_connections() {
    gauge!("websocket_connections_active").decrement(1.0);
}

/// 업그레이드 요청 결과 기록.
pub fn record_websocket_upgrade(accepted: bool) {
    let result = if accepted { "accepted" } else { "rejected" };
    counter!("websocket_upgrades_total", "result" => result).increment(1);
}

/// 등록된 구독자 수 설정.
pub fn set_active_subscribers(count: usize) {
    gauge!("subscribers_active").set(count as f64);
}

/// 브로드캐스트 한 번의 결과 기록.
pub fn record_broadcast(
    key: UpdateKey,
    delivered: usize,
    pruned: usize,
    failed: usize,
    duration_secs: f64,
) {
    let label = key.as_str();
    counter!("broadcasts_total", "key" => label).increment(1);
    counter!("broadcast_deliveries_total", "key" => label).increment(delivered as u64);
    counter!("broadcast_pruned_total", "key" => label).increment(pruned as u64);
    counter!("broadcast_failures_total", "key" => label).increment(failed as u64);
    histogram!("broadcast_duration_seconds", "key" => label).record(duration_secs);
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로에서 동적 파라미터를 정규화합니다.
///
/// 예: `/users/42` → `/users/:id`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());

            if is_uuid || is_numeric {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
