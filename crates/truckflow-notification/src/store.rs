//! 제한 크기 알림 저장소.
//!
//! 최신 알림이 맨 앞에 오며 용량을 넘으면 가장 오래된 알림부터 버린다.
//! 표시 여부 판단은 호출자 몫이고 저장소는 메모리 상태만 바꾼다.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use truckflow_core::config::NotificationConfig;
use truckflow_core::models::notification::{Notification, NotificationDraft, NotificationId};

/// 여러 태스크가 공유하는 저장소
pub type SharedNotificationStore = Arc<Mutex<NotificationStore>>;

/// 알림 ID 생성기: `ntf_<밀리초>_<카운터>_<솔트>`
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 ID 발급 (같은 밀리초 안에서도 카운터로 구분)
    pub fn next_id(&self) -> NotificationId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let salt = uuid::Uuid::new_v4().simple().to_string();
        NotificationId(format!(
            "ntf_{}_{}_{}",
            Utc::now().timestamp_millis(),
            seq,
            &salt[..8]
        ))
    }
}

/// 최신순 제한 크기 알림 목록
#[derive(Debug)]
pub struct NotificationStore {
    items: VecDeque<Notification>,
    capacity: usize,
    ids: IdGenerator,
}

impl NotificationStore {
    /// 새 저장소 생성 (용량 최소 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            ids: IdGenerator::new(),
        }
    }

    /// 설정으로부터 생성
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.capacity)
    }

    /// 공유 저장소로 감싸기
    pub fn shared(self) -> SharedNotificationStore {
        Arc::new(Mutex::new(self))
    }

    /// 알림 추가: ID/시각이 없으면 채우고 맨 앞에 넣은 뒤 용량 초과분 제거
    pub fn add(&mut self, draft: NotificationDraft) -> Notification {
        let notification = Notification {
            id: draft.id.unwrap_or_else(|| self.ids.next_id()),
            timestamp: draft.timestamp.unwrap_or_else(Utc::now),
            kind: draft.kind,
            priority: draft.priority,
            title: draft.title,
            message: draft.message,
        };

        self.items.push_front(notification.clone());
        if self.items.len() > self.capacity {
            self.items.truncate(self.capacity);
            debug!("알림 용량 초과: 오래된 알림 제거 (용량 {})", self.capacity);
        }
        notification
    }

    /// ID로 제거 (없으면 아무것도 하지 않음)
    pub fn remove(&mut self, id: &NotificationId) -> bool {
        let before = self.items.len();
        self.items.retain(|n| &n.id != id);
        before != self.items.len()
    }

    /// 전체 비우기
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// ID로 조회
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| &n.id == id)
    }

    /// 최신순 순회
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    /// 최신순 스냅샷
    pub fn list(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }

    /// 가장 최근 알림
    pub fn latest(&self) -> Option<&Notification> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::from_config(&NotificationConfig::default())
    }
}
