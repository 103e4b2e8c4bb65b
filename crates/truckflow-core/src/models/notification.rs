//! 알림 모델.
//!
//! 수신 메시지, 로컬 에러, 명시적 호출로부터 만들어지는 사용자 알림.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 알림 고유 ID (`ntf_<밀리초>_<카운터>_<솔트>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 알림 유형
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Info,
    Warning,
    Error,
    Alert,
}

/// 알림 우선순위
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// 저장소에 들어간 알림
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub priority: Priority,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
}

/// 저장 전 알림: ID/시각이 없으면 저장소가 채운다
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationDraft {
    pub id: Option<NotificationId>,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: NotificationType,
    pub priority: Priority,
    pub title: Option<String>,
    pub message: String,
}

impl NotificationDraft {
    /// 메시지로 초안 생성 (info / medium)
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// 유형 지정
    pub fn kind(mut self, kind: NotificationType) -> Self {
        self.kind = kind;
        self
    }

    /// 우선순위 지정
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// 제목 지정
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
