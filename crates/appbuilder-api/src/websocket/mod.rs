//! 실시간 업데이트 WebSocket 모듈.
//!
//! # 프로토콜 (`graphql-ws`)
//!
//! 1. 클라이언트가 `GET /subscriptions`로 업그레이드를 요청합니다.
//! 2. 서버는 곧바로 `{"type":"connection_ack"}`를 보냅니다.
//! 3. 클라이언트는 `{"type":"start","id":"1","payload":{"query":"{ newMessage { id message } }"}}`로
//!    쿼리를 등록합니다. 같은 연결에서 여러 번 보낼 수 있습니다.
//! 4. mutation이 커밋될 때마다 서버는 등록된 쿼리를 새 값으로 재실행하고
//!    `{"type":"data","id":"1","payload":{...}}`를 보냅니다.
//! 5. `{"type":"stop","id":"1"}`는 해당 operation을 해제하고 `{"type":"complete","id":"1"}`로
//!    응답합니다. `connection_terminate`는 연결을 끝냅니다.
//!
//! 해석할 수 없는 제어 메시지를 받으면 연결을 끝냅니다. 닫힌 연결의 구독자는
//! 다음 브로드캐스트에서 registry에서 제거됩니다.

pub mod broadcast;
pub mod classification;
pub mod connection;
pub mod handler;
pub mod messages;
pub mod registry;

pub use broadcast::{BroadcastReport, Broadcaster, SharedBroadcaster};
pub use classification::{BoundValue, UpdateKey};
pub use connection::{
    Connection, ConnectionHandle, Frame, FrameSink, SendOptions, TransportError, WebSocketSink,
};
pub use handler::{serve_connection, websocket_router, CloseReason, WsState, GRAPHQL_WS_PROTOCOL};
pub use messages::{ClientMessage, ServerMessage, WsError};
pub use registry::{
    create_subscriber_registry, NewSubscriber, SharedSubscriberRegistry, Subscriber,
    SubscriberId, SubscriberRegistry, Visit,
};

#[cfg(any(test, feature = "test-utils"))]
pub use connection::{channel_sink, ChannelSink};
