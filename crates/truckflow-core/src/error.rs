//! TruckFlow 핵심 에러 타입.
//!
//! 실시간 세션(전송/프로토콜/구독)과 REST 협력자 에러를 하나의 분류 체계로 정의한다.
//! 모든 어댑터 crate는 이 타입을 그대로 반환한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 전송 계층 실패 (연결 수립 실패, 예기치 않은 종료)
    #[error("전송 에러: {0}")]
    Transport(String),

    /// 수신 프레임이 잘못되었거나 알 수 없는 타입
    #[error("프로토콜 에러: {0}")]
    Protocol(String),

    /// subscribe/unsubscribe 제어 프레임 전송 실패
    #[error("구독 에러: {0}")]
    Subscription(String),

    /// 세션이 Connected 상태가 아님
    #[error("실시간 세션이 연결되지 않음")]
    NotConnected,

    /// 네트워크 에러 (응답 없음, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 필드 유효성 검증 실패 (400/409/422 포함)
    #[error("유효성 검증 실패: {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 인증/권한 실패 (401/403, 토큰 없음)
    #[error("인증 에러 ({status}): {message}")]
    Auth {
        /// HTTP 상태 코드 (로컬 에러는 401)
        status: u16,
        /// 실패 사유
        message: String,
    },

    /// 리소스를 찾을 수 없음 (404)
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Truck", "API")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 서버 에러 (5xx)
    #[error("서버 에러 ({status}): {message}")]
    Server {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문 또는 사유
        message: String,
    },

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 오프라인 상태에서 API 호출
    #[error("인터넷 연결 없음: 네트워크 확인 후 다시 시도")]
    Offline,

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// HTTP 상태 코드를 에러 분류로 매핑
    ///
    /// 400/409/422 → Validation, 401/403 → Auth, 404 → NotFound,
    /// 429 → RateLimit, 5xx → Server.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 | 422 => CoreError::Validation {
                field: "request".to_string(),
                message: non_empty_or(body, "잘못된 요청 데이터"),
            },
            409 => CoreError::Validation {
                field: "request".to_string(),
                message: non_empty_or(body, "리소스가 이미 존재하거나 사용 중"),
            },
            401 => CoreError::Auth {
                status,
                message: non_empty_or(body, "인증 필요: 다시 로그인하세요"),
            },
            403 => CoreError::Auth {
                status,
                message: non_empty_or(body, "접근 거부: 권한 없음"),
            },
            404 => CoreError::NotFound {
                resource_type: "API".to_string(),
                id: body,
            },
            429 => CoreError::RateLimit {
                retry_after_secs: 60,
            },
            500..=599 => CoreError::Server {
                status,
                message: non_empty_or(body, "서버 에러: 잠시 후 다시 시도"),
            },
            _ => CoreError::Internal(format!("예상치 못한 응답 ({status}): {body}")),
        }
    }

    /// 재시도 가능한 에러인지 판별
    ///
    /// 4xx 계열은 절대 자동 재시도하지 않는다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_) | CoreError::Server { .. } | CoreError::RateLimit { .. }
        )
    }

    /// 로컬 인증 에러 (토큰 없음 등)
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        CoreError::Auth {
            status: 401,
            message: message.into(),
        }
    }
}

fn non_empty_or(body: String, fallback: &str) -> String {
    if body.trim().is_empty() {
        fallback.to_string()
    } else {
        body
    }
}
