//! 통합 API 에러 응답 타입.
//!
//! GraphQL 실행 에러는 GraphQL 응답의 `errors`로 전달되고, 이 타입은 그 이전
//! 단계(요청 본문 파싱 등)에서 실패한 HTTP 요청에만 쓰입니다.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "INVALID_REQUEST",
///   "message": "Error parsing JSON request body",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_REQUEST", "INTERNAL_ERROR")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 추가.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// 잘못된 요청 에러.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("INVALID_REQUEST", message)
    }
}

/// 상태 코드와 함께 반환되는 API 에러.
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입.
pub type ApiResult<T> = Result<T, ApiError>;

/// 400 응답 생성.
pub fn bad_request(response: ApiErrorResponse) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization_skips_empty_fields() {
        let mut error = ApiErrorResponse::invalid_request("Error parsing JSON request body");
        error.timestamp = None;
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "INVALID_REQUEST",
                "message": "Error parsing JSON request body"
            })
        );
    }

    #[test]
    fn test_bad_request_status() {
        let (status, Json(body)) = bad_request(
            ApiErrorResponse::invalid_request("x").with_details(serde_json::json!({"line": 1})),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.details, Some(serde_json::json!({"line": 1})));
    }
}
