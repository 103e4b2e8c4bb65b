//! # truckflow-notification
//!
//! 사용자 알림.
//! 수신 메시지, 로컬 에러, 세션 라이프사이클 이벤트를 알림 초안으로 변환하고
//! 최신순 제한 크기 저장소에 보관한다.

pub mod presenter;
pub mod store;

pub use store::{NotificationStore, SharedNotificationStore};
