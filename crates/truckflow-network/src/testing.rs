//! 테스트용 인메모리 `Transport`.
//!
//! 연결 시도마다 미리 넣어 둔 [`OpenPlan`]을 하나씩 소비한다 (비어 있으면 수락).
//! 수락된 연결의 서버 쪽 끝은 [`ScriptedTransport::accept`]로 꺼낸다.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

use truckflow_core::error::CoreError;
use truckflow_core::ports::transport::{Transport, TransportEvent, TransportLink};

/// 연결 시도 하나에 대한 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenPlan {
    Accept,
    Refuse(String),
}

/// 스크립트 가능한 전송
pub struct ScriptedTransport {
    plans: Mutex<VecDeque<OpenPlan>>,
    urls: Mutex<Vec<String>>,
    opens: AtomicUsize,
    accepted_tx: mpsc::UnboundedSender<ServerEnd>,
    accepted_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEnd>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            plans: Mutex::new(VecDeque::new()),
            urls: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
            accepted_tx,
            accepted_rx: tokio::sync::Mutex::new(accepted_rx),
        }
    }

    /// 다음 연결 시도 응답 예약
    pub fn push_plan(&self, plan: OpenPlan) {
        self.plans.lock().push_back(plan);
    }

    /// 지금까지의 연결 시도 횟수
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// 연결 시도에 쓰인 URL 목록
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// 다음으로 수락된 연결의 서버 쪽 끝
    pub async fn accept(&self) -> Option<ServerEnd> {
        self.accepted_rx.lock().await.recv().await
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, url: &str) -> Result<TransportLink, CoreError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());

        let plan = self.plans.lock().pop_front().unwrap_or(OpenPlan::Accept);
        match plan {
            OpenPlan::Refuse(reason) => Err(CoreError::Transport(reason)),
            OpenPlan::Accept => {
                let (out_tx, out_rx) = mpsc::channel(64);
                let (in_tx, in_rx) = mpsc::channel(64);
                let server = ServerEnd {
                    received: out_rx,
                    events: in_tx,
                };
                self.accepted_tx
                    .send(server)
                    .map_err(|_| CoreError::Transport("테스트 서버 종료".to_string()))?;
                Ok(TransportLink {
                    outgoing: out_tx,
                    incoming: in_rx,
                })
            }
        }
    }
}

/// 수락된 연결의 서버 쪽 끝
pub struct ServerEnd {
    received: mpsc::Receiver<String>,
    events: mpsc::Sender<TransportEvent>,
}

impl ServerEnd {
    /// 클라이언트가 보낸 다음 프레임 (클라이언트가 연결을 닫으면 None)
    pub async fn next_frame(&mut self) -> Option<Value> {
        let text = self.received.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// 이미 도착한 프레임 하나 (없으면 None)
    pub fn try_frame(&mut self) -> Option<Value> {
        let text = self.received.try_recv().ok()?;
        serde_json::from_str(&text).ok()
    }

    /// 이미 도착한 프레임 전부
    pub fn drain(&mut self) -> Vec<Value> {
        std::iter::from_fn(|| self.try_frame()).collect()
    }

    /// 수신 중단: 연결은 유지한 채 이후 클라이언트 송신이 실패하게 만든다
    pub fn stop_reading(&mut self) {
        self.received.close();
    }

    /// 텍스트 프레임 푸시
    pub async fn push(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Frame(text.into())).await;
    }

    /// 서버 측 정상 종료
    pub async fn close(self, reason: Option<&str>) {
        let _ = self
            .events
            .send(TransportEvent::Closed {
                reason: reason.map(str::to_string),
            })
            .await;
    }

    /// 전송 에러로 종료
    pub async fn fail(self, error: &str) {
        let _ = self
            .events
            .send(TransportEvent::Error(error.to_string()))
            .await;
    }
}
