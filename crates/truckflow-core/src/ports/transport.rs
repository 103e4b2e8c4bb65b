//! 양방향 전송 포트.
//!
//! 구현: `truckflow-network` crate (tokio-tungstenite)
//!
//! 연결 하나는 송신 채널과 수신 이벤트 채널의 쌍(`TransportLink`)으로 표현된다.
//! 송신 채널을 drop하면 구현체는 연결을 닫아야 한다.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CoreError;

/// 전송 계층에서 올라오는 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// 텍스트 프레임 수신
    Frame(String),
    /// 연결 종료 (서버 close 프레임 또는 스트림 종료)
    Closed { reason: Option<String> },
    /// 전송 에러 (이후 연결은 사용 불가)
    Error(String),
}

/// 열린 연결
#[derive(Debug)]
pub struct TransportLink {
    /// 송신 프레임 (JSON 텍스트)
    pub outgoing: mpsc::Sender<String>,
    /// 수신 이벤트
    pub incoming: mpsc::Receiver<TransportEvent>,
}

/// 양방향 전송: 연결 수립만 담당
#[async_trait]
pub trait Transport: Send + Sync {
    /// `url`로 연결을 열고 링크 반환
    ///
    /// 반환 시점이 곧 "open" 이벤트다.
    async fn open(&self, url: &str) -> Result<TransportLink, CoreError>;
}
