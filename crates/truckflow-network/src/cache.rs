//! 요청 결과 캐시.
//!
//! 키별 값과 저장 시각을 보관하며 만료는 조회 시점에만 판단한다 (백그라운드 정리 없음).
//! 에러 결과는 저장하지 않는다. 같은 키의 동시 조회는 합치지 않는다.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use truckflow_core::config::CacheConfig;
use truckflow_core::error::CoreError;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// TTL 기반 요청 캐시
pub struct RequestCache<V = Value> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> RequestCache<V> {
    /// 새 캐시 생성
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 설정으로부터 생성
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl())
    }

    /// 유효한 값 조회: 만료된 항목은 이 시점에 제거
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                debug!("캐시 만료: {key}");
                None
            }
            None => None,
        }
    }

    /// 값 저장 (기존 값 덮어씀)
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.lock().insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// 캐시 적중 시 저장된 값, 아니면 `fetch` 실행 후 성공 결과만 저장
    pub async fn cached_call<F, Fut>(&self, key: &str, fetch: F) -> Result<V, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, CoreError>>,
    {
        if let Some(value) = self.get(key) {
            debug!("캐시 적중: {key}");
            return Ok(value);
        }

        let value = fetch().await?;
        self.set(key, value.clone());
        Ok(value)
    }

    /// 항목 하나 제거
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// 전체 비우기
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// 저장된 항목 수 (만료 항목 포함)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<V: Clone> Default for RequestCache<V> {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
