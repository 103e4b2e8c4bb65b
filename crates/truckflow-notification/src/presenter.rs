//! 알림 프레젠터.
//!
//! 수신 메시지 / API 에러 / 세션 라이프사이클 → 알림 초안 변환,
//! 저장된 알림 → 표시용 데이터 변환.

use chrono::{DateTime, Utc};

use truckflow_core::error::CoreError;
use truckflow_core::models::notification::{
    Notification, NotificationDraft, NotificationType, Priority,
};
use truckflow_core::models::realtime::InboundMessage;
use truckflow_core::models::session::LifecycleEvent;

/// API 에러 알림 제목
pub const API_ERROR_TITLE: &str = "API Error";

/// 실시간 연결 알림 제목
pub const REALTIME_TITLE: &str = "Realtime Connection";

/// 수신 메시지 → 알림 초안 (`alert`/`notification`만 해당)
///
/// 경보는 항상 alert / high로 고정한다.
pub fn from_inbound(message: &InboundMessage) -> Option<NotificationDraft> {
    match message {
        InboundMessage::Alert(alert) => Some(NotificationDraft {
            title: alert.title.clone(),
            ..NotificationDraft::new(alert.message.clone())
                .kind(NotificationType::Alert)
                .priority(Priority::High)
        }),
        InboundMessage::Notification(payload) => Some(NotificationDraft {
            kind: payload.kind.unwrap_or_default(),
            priority: payload.priority.unwrap_or_default(),
            title: payload.title.clone(),
            ..NotificationDraft::new(payload.message.clone())
        }),
        _ => None,
    }
}

/// API 호출 실패 → error / high 알림 초안
pub fn from_api_error(error: &CoreError) -> NotificationDraft {
    NotificationDraft::new(error.to_string())
        .kind(NotificationType::Error)
        .priority(Priority::High)
        .title(API_ERROR_TITLE)
}

/// 라이프사이클 이벤트 → 알림 초안 (재연결/한도 소진/전송 에러만 해당)
pub fn from_lifecycle(event: &LifecycleEvent) -> Option<NotificationDraft> {
    let draft = match event {
        LifecycleEvent::Reconnecting { attempt } => {
            NotificationDraft::new(format!("실시간 연결 끊김: 재연결 시도 {attempt}회차"))
                .kind(NotificationType::Warning)
        }
        LifecycleEvent::MaxReconnectAttemptsReached => {
            NotificationDraft::new("실시간 연결 재시도 한도 초과: 수동으로 다시 연결 필요")
                .kind(NotificationType::Error)
        }
        LifecycleEvent::TransportError(reason) => {
            NotificationDraft::new(format!("실시간 연결 에러: {reason}"))
                .kind(NotificationType::Error)
        }
        LifecycleEvent::Connecting | LifecycleEvent::Connected | LifecycleEvent::Disconnected => {
            return None
        }
    };
    Some(draft.priority(Priority::High).title(REALTIME_TITLE))
}

/// 표시용 알림 데이터
#[derive(Debug, Clone)]
pub struct NotificationView {
    pub id: String,
    /// 제목 (없으면 유형 기반)
    pub title: String,
    pub body: String,
    pub kind_label: String,
    pub priority_label: String,
    /// 우선순위 색상 (#RRGGBB)
    pub priority_color: String,
    /// 상대 시간
    pub time_text: String,
}

impl NotificationView {
    /// 한 줄 요약 (CLI 출력용)
    pub fn line(&self) -> String {
        format!(
            "[{}/{}] {}: {} ({})",
            self.kind_label, self.priority_label, self.title, self.body, self.time_text
        )
    }
}

/// Notification → NotificationView
pub fn present(notification: &Notification) -> NotificationView {
    present_at(notification, Utc::now())
}

/// 여러 알림 일괄 변환
pub fn present_all(notifications: &[Notification]) -> Vec<NotificationView> {
    let now = Utc::now();
    notifications.iter().map(|n| present_at(n, now)).collect()
}

fn present_at(notification: &Notification, now: DateTime<Utc>) -> NotificationView {
    NotificationView {
        id: notification.id.to_string(),
        title: notification
            .title
            .clone()
            .unwrap_or_else(|| kind_to_title(notification.kind).to_string()),
        body: notification.message.clone(),
        kind_label: kind_to_label(notification.kind).to_string(),
        priority_label: priority_to_label(notification.priority).to_string(),
        priority_color: priority_to_color(notification.priority).to_string(),
        time_text: format_relative_time(notification.timestamp, now),
    }
}

fn kind_to_title(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::Info => "알림",
        NotificationType::Warning => "주의",
        NotificationType::Error => "오류",
        NotificationType::Alert => "경보",
    }
}

fn kind_to_label(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::Info => "info",
        NotificationType::Warning => "warning",
        NotificationType::Error => "error",
        NotificationType::Alert => "alert",
    }
}

fn priority_to_label(p: Priority) -> &'static str {
    match p {
        Priority::High => "높음",
        Priority::Medium => "보통",
        Priority::Low => "낮음",
    }
}

fn priority_to_color(p: Priority) -> &'static str {
    match p {
        Priority::High => "#EF4444",   // red-500
        Priority::Medium => "#3B82F6", // blue-500
        Priority::Low => "#6B7280",    // gray-500
    }
}

fn format_relative_time(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now - dt;

    if diff.num_seconds() < 60 {
        "방금 전".to_string()
    } else if diff.num_minutes() < 60 {
        format!("{}분 전", diff.num_minutes())
    } else if diff.num_hours() < 24 {
        format!("{}시간 전", diff.num_hours())
    } else {
        format!("{}일 전", diff.num_days())
    }
}
