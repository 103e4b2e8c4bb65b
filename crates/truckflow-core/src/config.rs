//! 애플리케이션 설정 구조체.
//!
//! REST/WebSocket 서버 주소, 재연결 정책, 알림 저장소 용량, 요청 캐시 TTL,
//! 재시도 정책 등 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 서버 연결 설정
    pub server: ServerConfig,
    /// 실시간 세션 설정
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// 알림 저장소 설정
    #[serde(default)]
    pub notification: NotificationConfig,
    /// 요청 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// REST 재시도 설정
    #[serde(default)]
    pub retry: RetryConfig,
    /// 인증 토큰 보관 설정
    #[serde(default)]
    pub auth: AuthConfig,
}

// ============================================================
// 서버 설정
// ============================================================

/// 서버 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST API 기본 URL (예: "http://localhost:8080/api/v1")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// WebSocket 엔드포인트 URL (예: "ws://localhost:8080/ws")
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

// ============================================================
// 실시간 세션 설정
// ============================================================

/// 재연결 대기 시간 계산 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// 고정 간격 (기존 동작)
    #[default]
    Fixed,
    /// 시도마다 2배씩 증가 (상한: `max_reconnect_interval_ms`)
    Exponential,
}

/// 실시간 세션 설정: 재연결 정책과 명령 버퍼
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// 자동 재연결 최대 시도 횟수
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// 재연결 기본 간격 (밀리초)
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// 대기 시간 계산 방식
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// 지수 백오프 상한 (밀리초)
    #[serde(default = "default_max_reconnect_interval_ms")]
    pub max_reconnect_interval_ms: u64,
    /// 세션 명령 채널 용량
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            backoff: BackoffStrategy::default(),
            max_reconnect_interval_ms: default_max_reconnect_interval_ms(),
            command_buffer: default_command_buffer(),
        }
    }
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_interval_ms() -> u64 {
    5_000
}

fn default_max_reconnect_interval_ms() -> u64 {
    60_000
}

fn default_command_buffer() -> usize {
    64
}

// ============================================================
// 알림 / 캐시 / 재시도 설정
// ============================================================

/// 알림 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// 보관할 최대 알림 수 (최신순)
    #[serde(default = "default_notification_capacity")]
    pub capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            capacity: default_notification_capacity(),
        }
    }
}

fn default_notification_capacity() -> usize {
    50
}

/// 요청 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 캐시 항목 유효 시간 (밀리초)
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_cache_ttl_ms(),
        }
    }
}

impl CacheConfig {
    /// 캐시 TTL
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

fn default_cache_ttl_ms() -> u64 {
    300_000
}

/// REST 재시도 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (최초 시도 제외)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 첫 재시도 대기 (밀리초)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// 재시도 대기 상한 (밀리초)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

/// 인증 토큰 보관 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 토큰 파일 경로 (None이면 플랫폼 기본 경로)
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

impl AppConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            realtime: RealtimeConfig::default(),
            notification: NotificationConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}
