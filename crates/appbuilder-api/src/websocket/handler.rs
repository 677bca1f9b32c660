//! WebSocket 연결 handler.
//!
//! 업그레이드 직후 `connection_ack`을 보내고, 연결이 끝날 때까지 제어 메시지를
//! 읽어 구독자를 등록/해제합니다.

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{
    classify_ws_error, Connection, ConnectionHandle, Frame, SendOptions, TransportError,
    WebSocketSink,
};
use super::messages::{ClientMessage, ServerMessage};
use super::registry::{NewSubscriber, SharedSubscriberRegistry};
use crate::metrics::{decrement_websocket_connections, increment_websocket_connections};

/// 클라이언트가 요청하는 WebSocket 하위 프로토콜.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

/// WebSocket 상태.
#[derive(Clone)]
pub struct WsState {
    /// 구독자 registry
    pub registry: SharedSubscriberRegistry,
    /// 연결별 전송 옵션
    pub send_options: SendOptions,
    /// 서버 종료 신호
    pub shutdown: CancellationToken,
}

impl WsState {
    /// 새로운 WebSocket 상태 생성.
    pub fn new(
        registry: SharedSubscriberRegistry,
        send_options: SendOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            send_options,
            shutdown,
        }
    }
}

/// intake 루프 종료 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// ack 전송 실패
    AckFailed,
    /// 상대방이 닫음 (close 프레임 또는 스트림 종료)
    PeerClosed,
    /// 클라이언트가 `connection_terminate`를 보냄
    Terminated,
    /// 해석할 수 없는 제어 메시지
    MalformedFrame,
    /// 읽기 에러
    ReceiveError,
    /// 전송 실패가 누적되어 연결이 닫힌 것으로 표시됨
    SendFailed,
    /// 서버 종료
    Shutdown,
}

/// WebSocket 업그레이드 핸들러.
///
/// # 엔드포인트
///
/// `GET /subscriptions` (하위 프로토콜 `graphql-ws`)
pub async fn subscription_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
) -> impl IntoResponse {
    ws.protocols([GRAPHQL_WS_PROTOCOL])
        .on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// WebSocket 연결 처리.
async fn handle_socket(socket: WebSocket, state: WsState) {
    increment_websocket_connections();

    let (sender, receiver) = socket.split();
    let conn = Connection::new(WebSocketSink::new(sender), state.send_options);
    let connection_id = conn.id();
    info!(%connection_id, "WebSocket connected");

    let frames = receiver.map(|result| {
        result
            .map(Frame::from)
            .map_err(|e| classify_ws_error(&e))
    });
    let reason = serve_connection(conn, frames, &state).await;

    decrement_websocket_connections();
    info!(%connection_id, ?reason, "WebSocket disconnected");
}

/// 한 연결의 handshake와 intake 루프.
///
/// 반환 시 소켓은 닫힌 상태입니다. 이 연결의 구독자는 다음 브로드캐스트에서 제거됩니다.
/// 브로드캐스트 중 연결이 닫힌 것으로 표시되면 루프도 즉시 끝납니다.
pub async fn serve_connection<S>(conn: ConnectionHandle, mut frames: S, state: &WsState) -> CloseReason
where
    S: Stream<Item = Result<Frame, TransportError>> + Unpin,
{
    let reason = match send_message(&conn, &ServerMessage::ConnectionAck).await {
        Ok(()) => intake_loop(&conn, &mut frames, state).await,
        Err(e) => {
            warn!(connection_id = %conn.id(), error = %e, "Failed to send connection ack");
            CloseReason::AckFailed
        }
    };

    conn.close().await;
    reason
}

async fn intake_loop<S>(conn: &ConnectionHandle, frames: &mut S, state: &WsState) -> CloseReason
where
    S: Stream<Item = Result<Frame, TransportError>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => return CloseReason::Shutdown,
            _ = conn.closed() => return CloseReason::SendFailed,
            next = frames.next() => next,
        };

        let payload = match next {
            None | Some(Ok(Frame::Close)) => return CloseReason::PeerClosed,
            Some(Err(e)) => {
                debug!(connection_id = %conn.id(), error = %e, "WebSocket receive error");
                return CloseReason::ReceiveError;
            }
            Some(Ok(Frame::Control)) => continue,
            Some(Ok(Frame::Text(text))) => text.into_bytes(),
            Some(Ok(Frame::Binary(bytes))) => bytes,
        };

        let message = match ClientMessage::from_slice(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection_id = %conn.id(), error = %e, "Invalid message");
                return CloseReason::MalformedFrame;
            }
        };

        if let Some(reason) = process_client_message(conn, message, state).await {
            return reason;
        }
    }
}

/// 파싱된 클라이언트 메시지 처리.
///
/// # Returns
///
/// 연결을 끝내야 하면 `Some(reason)`
async fn process_client_message(
    conn: &ConnectionHandle,
    message: ClientMessage,
    state: &WsState,
) -> Option<CloseReason> {
    match message {
        ClientMessage::Start { id, query } => {
            if conn.is_closed() {
                return Some(CloseReason::SendFailed);
            }
            let subscriber_id = state
                .registry
                .insert(NewSubscriber {
                    connection: conn.clone(),
                    query,
                    operation_id: id.clone(),
                })
                .await;
            debug!(connection_id = %conn.id(), subscriber_id, operation_id = %id, "Subscription started");
            None
        }
        ClientMessage::Stop { id } => {
            let removed = state.registry.remove_operation(conn.id(), &id).await;
            debug!(connection_id = %conn.id(), operation_id = %id, removed, "Subscription stopped");
            match send_message(conn, &ServerMessage::Complete { id }).await {
                Err(e) if e.is_closed() => Some(CloseReason::PeerClosed),
                _ => None,
            }
        }
        ClientMessage::ConnectionTerminate => Some(CloseReason::Terminated),
        ClientMessage::ConnectionInit => None,
        ClientMessage::Other(kind) => {
            debug!(connection_id = %conn.id(), kind = %kind, "Ignoring control message");
            None
        }
    }
}

async fn send_message(conn: &ConnectionHandle, message: &ServerMessage) -> Result<(), TransportError> {
    let json = message
        .to_json()
        .map_err(|e| TransportError::Io(e.to_string()))?;
    conn.send(json).await
}

/// WebSocket 라우터 생성.
pub fn websocket_router(state: WsState) -> Router {
    Router::new()
        .route("/subscriptions", get(subscription_handler))
        .with_state(state)
}
