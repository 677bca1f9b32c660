//! WebSocket 메시지 타입.
//!
//! `graphql-ws` 하위 프로토콜의 envelope 정의.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graphql::QueryResult;

/// WebSocket 에러.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("잘못된 메시지 형식: {0}")]
    InvalidMessage(String),
    #[error("직렬화 실패: {0}")]
    SerializationError(#[from] serde_json::Error),
}

// ==================== 클라이언트 → 서버 메시지 ====================

/// 디코딩 전 제어 envelope.
#[derive(Debug, Clone, Deserialize)]
struct ControlEnvelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// `start` 메시지의 payload.
#[derive(Debug, Clone, Default, Deserialize)]
struct StartPayload {
    #[serde(default)]
    query: String,
}

/// 클라이언트에서 서버로 보내는 제어 메시지.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// 쿼리 구독 시작
    Start {
        /// 클라이언트가 정한 operation ID (모든 data envelope에 그대로 돌려줌)
        id: String,
        /// 재실행할 쿼리 문자열
        query: String,
    },
    /// 구독 중지
    Stop {
        /// 중지할 operation ID
        id: String,
    },
    /// 연결 초기화 (무시)
    ConnectionInit,
    /// 클라이언트의 연결 종료 요청
    ConnectionTerminate,
    /// 알 수 없는 타입 (무시)
    Other(String),
}

impl ClientMessage {
    /// JSON 문자열에서 파싱.
    pub fn from_json(json: &str) -> Result<Self, WsError> {
        Self::from_slice(json.as_bytes())
    }

    /// JSON 바이트에서 파싱.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WsError> {
        let envelope: ControlEnvelope =
            serde_json::from_slice(bytes).map_err(|e| WsError::InvalidMessage(e.to_string()))?;
        Self::from_envelope(envelope)
    }

    fn from_envelope(envelope: ControlEnvelope) -> Result<Self, WsError> {
        let id = envelope.id.unwrap_or_default();
        match envelope.kind.as_str() {
            "start" => {
                // payload나 query가 없으면 빈 쿼리로 등록하고, 실행 에러는 data envelope로 전달됨
                let payload: StartPayload = match envelope.payload {
                    None | Some(Value::Null) => StartPayload::default(),
                    Some(payload) => serde_json::from_value(payload)
                        .map_err(|e| WsError::InvalidMessage(format!("start payload: {e}")))?,
                };
                Ok(ClientMessage::Start {
                    id,
                    query: payload.query,
                })
            }
            "stop" => Ok(ClientMessage::Stop { id }),
            "connection_init" => Ok(ClientMessage::ConnectionInit),
            "connection_terminate" => Ok(ClientMessage::ConnectionTerminate),
            other => Ok(ClientMessage::Other(other.to_string())),
        }
    }
}

// ==================== 서버 → 클라이언트 메시지 ====================

/// 서버에서 클라이언트로 보내는 메시지.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 업그레이드 직후 한 번 보내는 확인
    ConnectionAck,
    /// 재실행된 쿼리 결과
    Data {
        /// 구독자의 operation ID
        id: String,
        /// 쿼리 실행 결과
        payload: QueryResult,
    },
    /// stop 처리 완료
    Complete {
        /// 중지된 operation ID
        id: String,
    },
}

impl ServerMessage {
    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(WsError::from)
    }

    /// data envelope 생성 헬퍼.
    pub fn data(id: impl Into<String>, payload: QueryResult) -> Self {
        ServerMessage::Data {
            id: id.into(),
            payload,
        }
    }
}
