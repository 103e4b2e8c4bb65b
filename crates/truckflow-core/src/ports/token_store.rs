//! 인증 토큰 보관 포트.
//!
//! 구현: `truckflow-network` crate (파일 / 메모리)

use crate::error::CoreError;
use crate::models::session::AuthToken;

/// 베어러 토큰 하나를 보관하는 저장소
pub trait TokenStore: Send + Sync {
    /// 저장된 토큰 로드 (없으면 None)
    fn load(&self) -> Result<Option<AuthToken>, CoreError>;

    /// 토큰 저장 (기존 값 덮어씀)
    fn save(&self, token: &AuthToken) -> Result<(), CoreError>;

    /// 토큰 삭제 (없어도 성공)
    fn clear(&self) -> Result<(), CoreError>;
}
