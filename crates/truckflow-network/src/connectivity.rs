//! 온라인/오프라인 상태 관리.
//!
//! 오프라인 동안 REST 호출은 즉시 `Offline`으로 실패하고 실시간 연결은 시작하지 않는다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// 연결 상태 관리자
pub struct ConnectivityManager {
    /// 현재 온라인 상태 (atomic for lock-free access)
    is_online: AtomicBool,
    /// 상태 변경 브로드캐스트
    status_tx: watch::Sender<bool>,
}

impl ConnectivityManager {
    /// 초기 상태를 지정해 생성
    pub fn new(online: bool) -> Self {
        let (status_tx, _) = watch::channel(online);
        Self {
            is_online: AtomicBool::new(online),
            status_tx,
        }
    }

    /// 현재 온라인 상태
    pub fn is_online(&self) -> bool {
        self.is_online.load(Ordering::Relaxed)
    }

    /// 상태 설정: 실제로 바뀐 경우 true
    pub fn set_online(&self, online: bool) -> bool {
        let was = self.is_online.swap(online, Ordering::Relaxed);
        if was == online {
            return false;
        }

        if online {
            info!("네트워크 복구됨 - 온라인 모드");
        } else {
            info!("네트워크 끊김 - 오프라인 모드");
        }
        self.status_tx.send_replace(online);
        true
    }

    /// 상태 변경 수신기 생성
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status_tx.subscribe()
    }
}

impl Default for ConnectivityManager {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Arc로 감싼 ConnectivityManager
pub type SharedConnectivityManager = Arc<ConnectivityManager>;
