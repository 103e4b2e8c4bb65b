//! 세션 모델.
//!
//! 실시간 세션의 연결 상태, 라이프사이클 이벤트, 인증 토큰을 표현.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 실시간 세션 연결 상태
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// 연결 끊김 (명시적 connect 전까지 유지)
    #[default]
    Disconnected,
    /// 연결 중
    Connecting,
    /// 연결됨
    Connected,
    /// 재연결 대기 또는 시도 중
    Reconnecting,
    /// 재연결 한도 소진 (수동 재시도 필요)
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "Disconnected"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Reconnecting => write!(f, "Reconnecting"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

/// 세션 라이프사이클 이벤트 (broadcast로 발행)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// 전송 계층 연결 시도 시작
    Connecting,
    /// 연결 + 인증 프레임 전송 완료
    Connected,
    /// 연결 종료 (명시적 disconnect 또는 예기치 않은 종료)
    Disconnected,
    /// 재연결 예약됨
    Reconnecting {
        /// 현재 시도 번호 (1부터)
        attempt: u32,
    },
    /// 재연결 한도 소진
    MaxReconnectAttemptsReached,
    /// 전송 계층 에러
    TransportError(String),
}

/// 불투명 인증 토큰: Debug/Display 출력 시 마스킹
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// 토큰 생성
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// 원문 토큰 (헤더/프레임 구성 전용)
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// 빈 토큰인지
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for AuthToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for AuthToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}
