//! WebSocket 전송 어댑터.
//!
//! `Transport` 포트 구현 (`tokio-tungstenite`).
//! 연결마다 수신 태스크와 송신 태스크를 하나씩 띄우고, 송신 채널이 닫히면
//! close 프레임을 보내 연결을 정리한다.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use truckflow_core::error::CoreError;
use truckflow_core::ports::transport::{Transport, TransportEvent, TransportLink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 채널 기본 용량
const DEFAULT_BUFFER: usize = 64;

/// WebSocket 전송: `Transport` 포트 구현
#[derive(Debug, Clone)]
pub struct WsTransport {
    buffer: usize,
}

impl WsTransport {
    /// 새 WebSocket 전송 생성
    pub fn new() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
        }
    }

    /// 송수신 채널 용량 설정
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// 로그용 URL (쿼리 문자열 제거)
pub fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// ws/wss 스킴 검증
fn validate_url(raw: &str) -> Result<(), CoreError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| CoreError::Transport(format!("잘못된 WebSocket URL: {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(CoreError::Transport(format!(
            "지원하지 않는 스킴: {other} (ws/wss만 허용)"
        ))),
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<TransportLink, CoreError> {
        validate_url(url)?;
        info!("WebSocket 연결: {}", redact_url(url));

        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| CoreError::Transport(format!("WebSocket 연결 실패: {e}")))?;

        let (write, read) = ws_stream.split();
        let (out_tx, out_rx) = mpsc::channel(self.buffer);
        let (in_tx, in_rx) = mpsc::channel(self.buffer);

        tokio::spawn(read_loop(read, in_tx));
        tokio::spawn(write_loop(write, out_rx));

        Ok(TransportLink {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

/// 수신 루프
async fn read_loop(mut read: SplitStream<WsStream>, tx: mpsc::Sender<TransportEvent>) {
    while let Some(msg) = read.next().await {
        let event = match msg {
            Ok(Message::Text(text)) => TransportEvent::Frame(text.to_string()),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => TransportEvent::Frame(text),
                Err(_) => {
                    debug!("UTF-8이 아닌 바이너리 프레임 무시");
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty());
                let _ = tx.send(TransportEvent::Closed { reason }).await;
                debug!("WebSocket close 프레임 수신");
                return;
            }
            Ok(_) => continue, // Ping/Pong은 자동 처리
            Err(e) => {
                warn!("WebSocket 수신 에러: {e}");
                let _ = tx.send(TransportEvent::Error(e.to_string())).await;
                return;
            }
        };

        if tx.send(event).await.is_err() {
            // 세션이 링크를 버림
            break;
        }
    }

    let _ = tx.send(TransportEvent::Closed { reason: None }).await;
    debug!("WebSocket 수신 루프 종료");
}

/// 송신 루프: 송신 채널이 닫히면 close 프레임 전송 후 종료
async fn write_loop(mut write: SplitSink<WsStream, Message>, mut rx: mpsc::Receiver<String>) {
    while let Some(text) = rx.recv().await {
        if let Err(e) = write.send(Message::text(text)).await {
            warn!("WebSocket 전송 실패: {e}");
            return;
        }
    }

    if let Err(e) = write.send(Message::Close(None)).await {
        debug!("WebSocket 종료 프레임 전송 실패: {e}");
    }
    debug!("WebSocket 송신 루프 종료");
}
