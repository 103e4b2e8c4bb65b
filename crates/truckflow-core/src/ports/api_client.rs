//! REST API 클라이언트 포트.
//!
//! 구현: `truckflow-network` crate (reqwest)
//!
//! 엔티티 스키마는 서버 소유이므로 본문은 `serde_json::Value`로 주고받는다.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreError;
use crate::models::fleet::{LoginRequest, LoginResponse};
use crate::models::realtime::ResourceId;

/// 차량 관리 REST API
#[async_trait]
pub trait FleetApi: Send + Sync {
    // --- 인증 ---

    /// 로그인 (POST /auth/login)
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, CoreError>;

    /// 회원가입 (POST /auth/register)
    async fn register(&self, data: &Value) -> Result<Value, CoreError>;

    // --- 회사 / 사용자 / 지점 ---

    async fn companies(&self) -> Result<Value, CoreError>;
    async fn create_company(&self, data: &Value) -> Result<Value, CoreError>;
    async fn users(&self) -> Result<Value, CoreError>;
    async fn drivers(&self) -> Result<Value, CoreError>;
    async fn create_user(&self, data: &Value) -> Result<Value, CoreError>;
    async fn branches(&self) -> Result<Value, CoreError>;
    async fn create_branch(&self, data: &Value) -> Result<Value, CoreError>;

    // --- 트럭 ---

    async fn trucks(&self) -> Result<Value, CoreError>;
    async fn online_trucks(&self) -> Result<Value, CoreError>;
    async fn truck_location(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn approve_truck(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn my_truck(&self) -> Result<Value, CoreError>;
    async fn create_truck(&self, data: &Value) -> Result<Value, CoreError>;
    async fn update_truck(&self, id: &ResourceId, data: &Value) -> Result<Value, CoreError>;
    async fn delete_truck(&self, id: &ResourceId) -> Result<(), CoreError>;

    // --- 경로 ---

    async fn routes(&self) -> Result<Value, CoreError>;
    async fn create_route(&self, data: &Value) -> Result<Value, CoreError>;
    async fn approve_route(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn route_stops(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn complete_route_stop(&self, stop_id: &ResourceId) -> Result<Value, CoreError>;

    // --- 화물 ---

    async fn cargo(&self) -> Result<Value, CoreError>;
    async fn unassigned_cargo(&self) -> Result<Value, CoreError>;
    async fn create_cargo(&self, data: &Value) -> Result<Value, CoreError>;
    async fn assign_cargo(&self, id: &ResourceId, assignment: &Value)
        -> Result<Value, CoreError>;
    async fn unassign_cargo(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn cargo_events(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn cargo_location(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn track_cargo(&self, tracking_number: &str) -> Result<Value, CoreError>;
    async fn truck_cargo(&self, truck_id: &ResourceId) -> Result<Value, CoreError>;

    // --- 방문 / 작업 / 요청 ---

    async fn visits(&self) -> Result<Value, CoreError>;
    async fn create_visit(&self, data: &Value) -> Result<Value, CoreError>;
    async fn tasks(&self) -> Result<Value, CoreError>;
    async fn create_task(&self, data: &Value) -> Result<Value, CoreError>;
    async fn complete_task(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn requests(&self) -> Result<Value, CoreError>;
    async fn create_request(&self, data: &Value) -> Result<Value, CoreError>;
    async fn accept_request(&self, id: &ResourceId) -> Result<Value, CoreError>;
    async fn terminate_request(&self, id: &ResourceId) -> Result<Value, CoreError>;
}
