//! 실제 WebSocket 루프백 테스트.
//!
//! 로컬 tokio-tungstenite 서버를 띄워 인증 → 구독 → 수신 → 재연결/재구독 흐름을 검증한다.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use truckflow_core::config::RealtimeConfig;
use truckflow_core::error::CoreError;
use truckflow_core::models::realtime::{InboundMessage, ResourceId, SubscriptionKey};
use truckflow_core::models::session::{LifecycleEvent, SessionState};
use truckflow_network::session::SessionHandle;
use truckflow_network::ws_client::WsTransport;

const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn recv_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let msg = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn fast_reconnect() -> RealtimeConfig {
    RealtimeConfig {
        reconnect_interval_ms: 50,
        ..RealtimeConfig::default()
    }
}

#[tokio::test]
async fn auth_subscribe_and_receive_over_websocket() {
    let (listener, url) = bind().await;
    let session = SessionHandle::spawn(url, Arc::new(WsTransport::new()), &fast_reconnect());

    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .subscribe(
            SubscriptionKey::truck(7),
            move |m: &InboundMessage| -> Result<(), CoreError> {
                let _ = tx.send(m.clone());
                Ok(())
            },
        )
        .await
        .unwrap();
    session.connect("jwt_loopback").await.unwrap();

    let mut ws = accept(&listener).await;
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "auth", "token": "jwt_loopback"})
    );
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "subscribe", "channel": "truck_location", "truck_id": 7})
    );

    // 서버 허브 형식 ({type, data})
    let frame = json!({
        "type": "location_update",
        "data": {"truck_id": 7, "latitude": 35.1, "longitude": 129.0, "speed": 62.5}
    });
    ws.send(Message::text(frame.to_string())).await.unwrap();

    let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    match received {
        InboundMessage::TruckLocationUpdate(loc) => {
            assert_eq!(loc.truck_id, ResourceId::Int(7));
            assert_eq!(loc.speed, Some(62.5));
        }
        other => panic!("예상치 못한 메시지: {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn server_close_triggers_reconnect_and_replay() {
    let (listener, url) = bind().await;
    let session = SessionHandle::spawn(url, Arc::new(WsTransport::new()), &fast_reconnect());
    let mut events = session.events();

    let noop = |_: &InboundMessage| -> Result<(), CoreError> { Ok(()) };
    session.subscribe(SubscriptionKey::route(3), noop).await.unwrap();
    session.subscribe(SubscriptionKey::fleet(), noop).await.unwrap();
    session.connect("jwt").await.unwrap();

    let mut ws = accept(&listener).await;
    assert_eq!(recv_json(&mut ws).await["type"], "auth");
    assert_eq!(recv_json(&mut ws).await["channel"], "route_updates");
    assert_eq!(recv_json(&mut ws).await["channel"], "fleet_updates");
    ws.close(None).await.unwrap();
    drop(ws);

    // 재연결 후 같은 순서로 재구독
    let mut ws = accept(&listener).await;
    assert_eq!(recv_json(&mut ws).await["type"], "auth");
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "subscribe", "channel": "route_updates", "route_id": 3})
    );
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "subscribe", "channel": "fleet_updates"})
    );

    let mut seen = Vec::new();
    while !seen.contains(&LifecycleEvent::Reconnecting { attempt: 1 }) {
        seen.push(timeout(WAIT, events.recv()).await.unwrap().unwrap());
    }
    assert!(seen.contains(&LifecycleEvent::Disconnected));
}

#[tokio::test]
async fn disconnect_closes_socket() {
    let (listener, url) = bind().await;
    let session = SessionHandle::spawn(url, Arc::new(WsTransport::new()), &fast_reconnect());
    session.connect("jwt").await.unwrap();

    let mut ws = accept(&listener).await;
    assert_eq!(recv_json(&mut ws).await["type"], "auth");

    session.disconnect().await.unwrap();

    // close 프레임 또는 스트림 종료
    let next = timeout(WAIT, ws.next()).await.unwrap();
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn unreachable_server_reports_transport_error() {
    // 바인드 후 즉시 닫아 연결 거부 유도
    let (listener, url) = bind().await;
    drop(listener);

    let config = RealtimeConfig {
        max_reconnect_attempts: 1,
        reconnect_interval_ms: 10,
        ..RealtimeConfig::default()
    };
    let session = SessionHandle::spawn(url, Arc::new(WsTransport::new()), &config);
    let mut events = session.events();
    session.connect("jwt").await.unwrap();

    let mut seen = Vec::new();
    while !seen.contains(&LifecycleEvent::MaxReconnectAttemptsReached) {
        seen.push(timeout(WAIT, events.recv()).await.unwrap().unwrap());
    }
    assert!(seen
        .iter()
        .any(|e| matches!(e, LifecycleEvent::TransportError(_))));
    assert_eq!(session.state(), SessionState::Failed);
}
