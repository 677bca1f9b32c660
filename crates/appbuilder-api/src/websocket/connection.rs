//! 연결 transport.
//!
//! 클라이언트 하나당 하나의 양방향 프레임 연결을 감쌉니다. 쓰기는 연결별
//! lock으로 직렬화되므로 브로드캐스트 경로와 직접 응답 경로가 섞이지 않습니다.
//! 읽기는 intake 루프가 소유하는 별도 스트림에서 일어나므로 `send`와 동시에
//! 진행될 수 있습니다.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use appbuilder_core::SubscriptionConfig;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// transport 에러.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// 연결이 이미 닫힘
    #[error("connection closed")]
    Closed,
    /// 전송 시간 초과
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    /// 그 밖의 전송 실패
    #[error("transport error: {0}")]
    Io(String),
}

impl TransportError {
    /// 연결이 닫혔음이 확실한 에러인지 확인합니다.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// 수신 프레임.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 텍스트 프레임
    Text(String),
    /// 바이너리 프레임
    Binary(Vec<u8>),
    /// 상대방이 보낸 close 프레임
    Close,
    /// ping/pong 등 제어 프레임
    Control,
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
            Message::Close(_) => Frame::Close,
            Message::Ping(_) | Message::Pong(_) => Frame::Control,
        }
    }
}

/// 프레임 쓰기 측 seam.
#[async_trait]
pub trait FrameSink: Send {
    /// 텍스트 프레임 하나를 씁니다.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// close 프레임을 보내고 쓰기 측을 닫습니다.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// axum WebSocket의 쓰기 절반.
pub struct WebSocketSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WebSocketSink {
    pub fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| classify_ws_error(&e))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // close 프레임 전송은 이미 닫힌 연결이면 실패할 수 있음
        let _ = self.inner.send(Message::Close(None)).await;
        self.inner.close().await.map_err(|e| classify_ws_error(&e))
    }
}

/// WebSocket 에러를 transport 에러로 분류합니다.
///
/// 에러 체인에서 연결 종료를 뜻하는 tungstenite 에러나 I/O 에러 종류를 찾으면
/// `Closed`, 나머지는 `Io`입니다.
pub fn classify_ws_error(err: &(dyn std::error::Error + 'static)) -> TransportError {
    use std::io::ErrorKind::*;
    use tungstenite::error::{Error as WsError, ProtocolError};

    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(ws) = current.downcast_ref::<WsError>() {
            if matches!(
                ws,
                WsError::ConnectionClosed
                    | WsError::AlreadyClosed
                    | WsError::Protocol(ProtocolError::SendAfterClosing)
            ) {
                return TransportError::Closed;
            }
        }
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                BrokenPipe | ConnectionReset | ConnectionAborted | NotConnected | UnexpectedEof
            ) {
                return TransportError::Closed;
            }
        }
        source = current.source();
    }
    TransportError::Io(err.to_string())
}

/// 전송 옵션.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// 전송 한 번에 허용하는 시간 (lock 대기 포함)
    pub timeout: Duration,
    /// 연속 타임아웃 허용 횟수. 도달하면 연결을 닫힌 것으로 표시합니다.
    pub max_failures: u32,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::from(&SubscriptionConfig::default())
    }
}

impl From<&SubscriptionConfig> for SendOptions {
    fn from(config: &SubscriptionConfig) -> Self {
        Self {
            timeout: config.send_timeout(),
            max_failures: config.max_send_failures.max(1),
        }
    }
}

/// 클라이언트 연결 하나.
pub struct Connection {
    id: Uuid,
    sink: Mutex<Box<dyn FrameSink>>,
    closed: AtomicBool,
    /// `closed`가 true가 되면 취소됨
    closed_signal: CancellationToken,
    /// 쓰기 측 종료를 한 번만 수행
    sink_shut: AtomicBool,
    consecutive_timeouts: AtomicU32,
    options: SendOptions,
}

/// 공유 연결 핸들.
pub type ConnectionHandle = Arc<Connection>;

impl Connection {
    /// 새 연결 핸들을 만듭니다.
    pub fn new(sink: impl FrameSink + 'static, options: SendOptions) -> ConnectionHandle {
        Arc::new(Self {
            id: Uuid::new_v4(),
            sink: Mutex::new(Box::new(sink)),
            closed: AtomicBool::new(false),
            closed_signal: CancellationToken::new(),
            sink_shut: AtomicBool::new(false),
            consecutive_timeouts: AtomicU32::new(0),
            options,
        })
    }

    /// 연결 ID (로그용).
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 닫힌 연결인지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 연결을 닫힌 것으로 표시합니다. 이후 `send`는 `Closed`로 실패합니다.
    pub fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(connection_id = %self.id, "Connection marked closed");
        }
        self.closed_signal.cancel();
    }

    /// 연결이 닫힌 것으로 표시될 때까지 기다립니다.
    pub async fn closed(&self) {
        self.closed_signal.cancelled().await;
    }

    /// 텍스트 프레임을 전송합니다.
    ///
    /// 같은 연결에 대한 동시 호출은 순서대로 직렬화됩니다.
    pub async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let attempt = tokio::time::timeout(self.options.timeout, async {
            let mut sink = self.sink.lock().await;
            // lock 대기 중에 닫혔을 수 있음
            if self.is_closed() {
                return Err(TransportError::Closed);
            }
            sink.send_text(text).await
        })
        .await;

        match attempt {
            Ok(Ok(())) => {
                self.consecutive_timeouts.store(0, Ordering::Release);
                Ok(())
            }
            Ok(Err(err)) => {
                if err.is_closed() {
                    self.mark_closed();
                }
                Err(err)
            }
            Err(_) => {
                let failures = self.consecutive_timeouts.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.options.max_failures {
                    warn!(
                        connection_id = %self.id,
                        failures,
                        "Send timed out repeatedly, treating connection as closed"
                    );
                    self.mark_closed();
                    return Err(TransportError::Closed);
                }
                Err(TransportError::Timeout(self.options.timeout))
            }
        }
    }

    /// 연결을 닫고 close 프레임을 보냅니다. 여러 번 호출해도 안전합니다.
    ///
    /// 전송 실패로 이미 닫힌 것으로 표시된 연결도 소켓은 여기서 닫힙니다.
    pub async fn close(&self) {
        if self.sink_shut.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mark_closed();
        let result = tokio::time::timeout(self.options.timeout, async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        })
        .await;

        match result {
            Ok(Ok(())) => debug!(connection_id = %self.id, "Connection closed"),
            Ok(Err(e)) => debug!(connection_id = %self.id, error = %e, "Close failed"),
            Err(_) => debug!(connection_id = %self.id, "Close timed out"),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// 채널 기반 sink (테스트용).
///
/// 수신 측이 drop되면 `Closed`로 실패합니다.
#[cfg(any(test, feature = "test-utils"))]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<String>,
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.tx.send(text).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// 채널 기반 sink와 수신기를 만듭니다 (테스트용).
#[cfg(any(test, feature = "test-utils"))]
pub fn channel_sink() -> (ChannelSink, tokio::sync::mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}
