//! 토픽 라우터.
//!
//! 구독 키별 핸들러 목록과 리스너를 보관하고 수신 메시지를 분배한다.
//! I/O를 하지 않으며, 서버로 보낼 제어 프레임을 반환값으로 돌려준다.
//!
//! - 키의 첫 핸들러 등록 시에만 subscribe 프레임
//! - 키의 마지막 핸들러 제거 시에만 unsubscribe 프레임
//! - 재연결 시 [`TopicRouter::replay_frames`]가 등록 순서대로 subscribe 프레임 생성

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

use truckflow_core::error::CoreError;
use truckflow_core::models::realtime::{InboundMessage, OutboundFrame, SubscriptionKey};

/// 수신 메시지 핸들러
///
/// 에러와 panic은 라우터가 잡아 로그로 남기며 다른 핸들러에 영향을 주지 않는다.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &InboundMessage) -> Result<(), CoreError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&InboundMessage) -> Result<(), CoreError> + Send + Sync,
{
    fn handle(&self, message: &InboundMessage) -> Result<(), CoreError> {
        self(message)
    }
}

/// 등록된 핸들러 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// 구독 등록 결과
#[derive(Debug)]
pub struct Registration {
    pub id: HandlerId,
    /// 키의 첫 핸들러일 때만 Some
    pub frame: Option<OutboundFrame>,
}

/// 분배 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// 정상 처리한 핸들러 수
    pub delivered: usize,
    /// 에러/panic으로 실패한 핸들러 수
    pub failed: usize,
}

/// 공유 핸들러
pub type SharedHandler = Arc<dyn MessageHandler>;

struct TopicEntry {
    key: SubscriptionKey,
    handlers: Vec<(HandlerId, SharedHandler)>,
}

/// 구독 키 → 핸들러 라우터
#[derive(Default)]
pub struct TopicRouter {
    /// 등록 순서 유지
    entries: Vec<TopicEntry>,
    listeners: Vec<(HandlerId, SharedHandler)>,
    next_id: u64,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }

    /// 핸들러 등록
    pub fn subscribe(&mut self, key: SubscriptionKey, handler: SharedHandler) -> Registration {
        let id = self.allocate_id();

        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.handlers.push((id, handler));
            debug!("핸들러 추가: {key} ({id}, 총 {}개)", entry.handlers.len());
            return Registration { id, frame: None };
        }

        let frame = key.subscribe_frame();
        debug!("새 구독: {key} ({id})");
        self.entries.push(TopicEntry {
            key,
            handlers: vec![(id, handler)],
        });
        Registration {
            id,
            frame: Some(frame),
        }
    }

    /// 핸들러 제거: 마지막 핸들러였다면 unsubscribe 프레임 반환
    ///
    /// 등록되지 않은 키/ID는 아무 일도 하지 않는다.
    pub fn unsubscribe(&mut self, key: &SubscriptionKey, id: HandlerId) -> Option<OutboundFrame> {
        let index = self.entries.iter().position(|e| &e.key == key)?;
        let entry = &mut self.entries[index];

        let before = entry.handlers.len();
        entry.handlers.retain(|(hid, _)| *hid != id);
        if entry.handlers.len() == before {
            debug!("등록되지 않은 핸들러 해제 무시: {key} ({id})");
            return None;
        }

        if entry.handlers.is_empty() {
            self.entries.remove(index);
            debug!("구독 종료: {key}");
            Some(key.unsubscribe_frame())
        } else {
            None
        }
    }

    /// 모든 메시지를 받는 리스너 등록 (제어 프레임 없음)
    pub fn add_listener(&mut self, handler: SharedHandler) -> HandlerId {
        let id = self.allocate_id();
        self.listeners.push((id, handler));
        id
    }

    /// 리스너 제거: 존재했으면 true
    pub fn remove_listener(&mut self, id: HandlerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(hid, _)| *hid != id);
        self.listeners.len() != before
    }

    /// 재연결 후 재전송할 subscribe 프레임 (등록 순서)
    pub fn replay_frames(&self) -> Vec<OutboundFrame> {
        self.entries.iter().map(|e| e.key.subscribe_frame()).collect()
    }

    /// 활성 구독 키 (등록 순서)
    pub fn active_keys(&self) -> Vec<SubscriptionKey> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    /// 키에 등록된 핸들러 수
    pub fn handler_count(&self, key: &SubscriptionKey) -> usize {
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map_or(0, |e| e.handlers.len())
    }

    /// 수신 메시지 분배: 토픽 핸들러(등록 순) → 리스너
    pub fn dispatch(&self, message: &InboundMessage) -> DispatchReport {
        let mut report = DispatchReport::default();

        let Some(key) = message.routing_key() else {
            debug!("알 수 없는 메시지 타입 무시: {}", message.kind());
            return report;
        };

        if let Some(entry) = self.entries.iter().find(|e| e.key == key) {
            for (id, handler) in &entry.handlers {
                invoke(*id, handler.as_ref(), message, &mut report);
            }
        } else {
            debug!("구독자 없는 메시지: {} → {key}", message.kind());
        }

        for (id, listener) in &self.listeners {
            invoke(*id, listener.as_ref(), message, &mut report);
        }

        report
    }
}

/// 핸들러 하나 실행: 에러/panic 격리
fn invoke(
    id: HandlerId,
    handler: &dyn MessageHandler,
    message: &InboundMessage,
    report: &mut DispatchReport,
) {
    match catch_unwind(AssertUnwindSafe(|| handler.handle(message))) {
        Ok(Ok(())) => report.delivered += 1,
        Ok(Err(e)) => {
            warn!("핸들러 {id} 처리 실패 ({}): {e}", message.kind());
            report.failed += 1;
        }
        Err(_) => {
            error!("핸들러 {id} panic ({})", message.kind());
            report.failed += 1;
        }
    }
}
