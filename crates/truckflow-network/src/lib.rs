//! # truckflow-network
//!
//! WebSocket 실시간 세션과 REST 네트워크 어댑터.
//! 서버와의 실시간 구독(재연결/재구독 포함), REST API 호출, 토큰 관리, 요청 캐시를 담당한다.
//!
//! ## Feature Flags
//!
//! - `test-util`: 스크립트 가능한 인메모리 `Transport` ([`testing`])
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use truckflow_core::models::realtime::SubscriptionKey;
//! use truckflow_network::session::SessionHandle;
//! use truckflow_network::ws_client::WsTransport;
//!
//! let session = SessionHandle::spawn(ws_url, Arc::new(WsTransport::new()), &config.realtime);
//! session.subscribe(SubscriptionKey::truck(7), |msg: &_| { println!("{msg:?}"); Ok(()) }).await?;
//! session.connect(token).await?;
//! ```

pub mod auth;
pub mod cache;
pub mod connectivity;
pub mod endpoints;
pub mod http_client;
pub mod reconnect;
pub mod router;
pub mod session;
pub mod token_store;
pub mod ws_client;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
