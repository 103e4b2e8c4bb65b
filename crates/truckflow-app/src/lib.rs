//! # truckflow-app
//!
//! TruckFlow 클라이언트 조립 계층.
//! [`hub::ApiHub`]가 REST 클라이언트, 실시간 세션, 알림 저장소, 요청 캐시를 묶고
//! `truckflow` 바이너리가 이를 CLI로 노출한다.

pub mod hub;
pub mod lifecycle;

pub use hub::{ApiHub, BatchCall, BatchOutcome, UpdateKind};
