//! 차량 관리 도메인 모델.
//!
//! REST/실시간 payload가 공유하는 상태 열거형과 인증 요청/응답.

use serde::{Deserialize, Serialize};

/// 트럭 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TruckStatus {
    Online,
    Offline,
    InUse,
    Maintenance,
    /// 서버가 새 상태를 추가한 경우
    #[serde(other)]
    Unknown,
}

/// 경로 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// 화물 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CargoStatus {
    Pending,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// 로그인 요청
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 로그인 응답
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// 베어러 토큰
    pub token: String,
    /// 사용자 정보 (서버 스키마 그대로)
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}
