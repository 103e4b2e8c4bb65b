//! API 허브.
//!
//! REST 클라이언트, 실시간 세션, 알림 저장소, 요청 캐시, 온라인 상태를 한곳에서 묶는다.
//! 화면/CLI는 허브만 보고 하위 어댑터를 직접 만들지 않는다.

use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use truckflow_core::config::AppConfig;
use truckflow_core::config_manager::ConfigManager;
use truckflow_core::error::CoreError;
use truckflow_core::models::notification::{Notification, NotificationDraft, NotificationId};
use truckflow_core::models::realtime::{InboundMessage, ResourceId, SubscriptionKey, Topic};
use truckflow_core::models::session::{AuthToken, LifecycleEvent, SessionState};
use truckflow_core::ports::token_store::TokenStore;
use truckflow_core::ports::transport::Transport;
use truckflow_network::auth::TokenManager;
use truckflow_network::cache::RequestCache;
use truckflow_network::connectivity::{ConnectivityManager, SharedConnectivityManager};
use truckflow_network::http_client::HttpApiClient;
use truckflow_network::router::HandlerId;
use truckflow_network::session::SessionHandle;
use truckflow_network::token_store::FileTokenStore;
use truckflow_network::ws_client::WsTransport;
use truckflow_notification::presenter;
use truckflow_notification::{NotificationStore, SharedNotificationStore};

const UPDATE_CAPACITY: usize = 256;
const TOKEN_FILE_NAME: &str = "auth_token";

/// `subscribe_to_updates` 대상 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Truck,
    Route,
    Cargo,
    Fleet,
}

impl UpdateKind {
    /// 구독 키로 변환 (트럭/경로/화물은 ID 필요)
    pub fn key(self, id: Option<ResourceId>) -> Result<SubscriptionKey, CoreError> {
        let topic = match self {
            UpdateKind::Truck => Topic::TruckLocation,
            UpdateKind::Route => Topic::RouteUpdates,
            UpdateKind::Cargo => Topic::CargoUpdates,
            UpdateKind::Fleet => Topic::FleetUpdates,
        };
        SubscriptionKey::new(topic, id)
    }
}

impl FromStr for UpdateKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "truck" => Ok(UpdateKind::Truck),
            "route" => Ok(UpdateKind::Route),
            "cargo" => Ok(UpdateKind::Cargo),
            "fleet" => Ok(UpdateKind::Fleet),
            other => Err(CoreError::Validation {
                field: "kind".to_string(),
                message: format!("알 수 없는 구독 종류: {other}"),
            }),
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateKind::Truck => "truck",
            UpdateKind::Route => "route",
            UpdateKind::Cargo => "cargo",
            UpdateKind::Fleet => "fleet",
        };
        f.write_str(name)
    }
}

/// 일괄 호출 항목
pub struct BatchCall<'a, T> {
    pub label: String,
    pub call: BoxFuture<'a, Result<T, CoreError>>,
}

impl<'a, T> BatchCall<'a, T> {
    pub fn new(
        label: impl Into<String>,
        call: impl Future<Output = Result<T, CoreError>> + Send + 'a,
    ) -> Self {
        Self {
            label: label.into(),
            call: Box::pin(call),
        }
    }
}

/// 일괄 호출 결과 (항목별, 입력 순서 유지)
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub label: String,
    pub result: Result<T, CoreError>,
}

impl<T> BatchOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// REST + 실시간 + 알림 + 캐시 허브
pub struct ApiHub {
    api: Arc<HttpApiClient>,
    tokens: Arc<TokenManager>,
    session: SessionHandle,
    notifications: SharedNotificationStore,
    notified: broadcast::Sender<Notification>,
    updates: broadcast::Sender<InboundMessage>,
    cache: RequestCache,
    connectivity: SharedConnectivityManager,
    subscriptions: Mutex<HashMap<SubscriptionKey, HandlerId>>,
    lifecycle_task: JoinHandle<()>,
}

impl ApiHub {
    /// 설정만으로 허브 구성: 파일 토큰 저장소 + WebSocket 전송
    ///
    /// 저장된 토큰이 있으면 복원한다.
    pub async fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let token_path = match &config.auth.token_file {
            Some(path) => path.clone(),
            None => ConfigManager::data_dir()?.join(TOKEN_FILE_NAME),
        };
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(token_path));
        let tokens = Arc::new(
            TokenManager::new(&config.server.base_url, store)
                .with_timeout(config.server.request_timeout())?,
        );
        if tokens.restore().await? {
            info!("저장된 인증 토큰 복원");
        }

        Self::new(config, tokens, Arc::new(WsTransport::new())).await
    }

    /// 구성 요소를 받아 허브 생성 (tokio 런타임 필요)
    ///
    /// 수신 경보/알림 리스너와 라이프사이클 → 알림 전달 태스크를 설치한다.
    pub async fn new(
        config: &AppConfig,
        tokens: Arc<TokenManager>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CoreError> {
        let api = HttpApiClient::new(
            &config.server.base_url,
            tokens.clone(),
            config.server.request_timeout(),
        )?
        .with_retry(config.retry.clone());

        let session = SessionHandle::spawn(config.server.ws_url.clone(), transport, &config.realtime);
        let notifications = NotificationStore::from_config(&config.notification).shared();
        let (notified, _) = broadcast::channel(UPDATE_CAPACITY);
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);

        {
            let store = notifications.clone();
            let notified = notified.clone();
            session
                .add_listener(move |message: &InboundMessage| -> Result<(), CoreError> {
                    if let Some(draft) = presenter::from_inbound(message) {
                        debug!("수신 {} → 알림", message.kind());
                        push_notification(&store, &notified, draft);
                    }
                    Ok(())
                })
                .await?;
        }

        let lifecycle_task = tokio::spawn(forward_lifecycle(
            session.events(),
            notifications.clone(),
            notified.clone(),
        ));

        Ok(Self {
            api: Arc::new(api),
            tokens,
            session,
            notifications,
            notified,
            updates,
            cache: RequestCache::from_config(&config.cache),
            connectivity: Arc::new(ConnectivityManager::default()),
            subscriptions: Mutex::new(HashMap::new()),
            lifecycle_task,
        })
    }

    // --- REST ---

    /// API 호출 래퍼
    ///
    /// 오프라인이면 호출하지 않고 `Offline`. 실패하면 "API Error" 알림을 남기고 에러를 그대로 돌려준다.
    pub async fn api_call<T, Fut>(&self, call: Fut) -> Result<T, CoreError>
    where
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if !self.is_online() {
            return Err(CoreError::Offline);
        }

        match call.await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("API 호출 실패: {e}");
                self.add_notification(presenter::from_api_error(&e));
                Err(e)
            }
        }
    }

    /// 캐시 우선 API 호출: 적중하면 오프라인이어도 캐시 값을 돌려준다
    pub async fn cached_api_call<F, Fut>(&self, key: &str, fetch: F) -> Result<Value, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, CoreError>>,
    {
        self.cache
            .cached_call(key, || self.api_call(fetch()))
            .await
    }

    /// 여러 호출을 동시에 실행: 일부 실패가 다른 호출을 중단시키지 않는다
    pub async fn batch_api_calls<'a, T>(&self, calls: Vec<BatchCall<'a, T>>) -> Vec<BatchOutcome<T>> {
        let runs = calls.into_iter().map(|BatchCall { label, call }| async move {
            let result = self.api_call(call).await;
            BatchOutcome { label, result }
        });
        let outcomes = join_all(runs).await;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        debug!("일괄 호출 완료: {}건 (실패 {failed}건)", outcomes.len());
        outcomes
    }

    /// 캐시 비우기
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // --- 실시간 ---

    /// 실시간 연결: 토큰이 있고 온라인일 때만 연결하며 연결 시도 여부를 돌려준다
    ///
    /// 토큰을 주지 않으면 토큰 매니저의 현재 토큰을 쓴다.
    pub async fn connect_realtime(&self, token: Option<AuthToken>) -> Result<bool, CoreError> {
        let token = match token {
            Some(token) => Some(token),
            None => self.tokens.token().await,
        };
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            debug!("토큰 없음: 실시간 연결 생략");
            return Ok(false);
        };
        if !self.is_online() {
            debug!("오프라인: 실시간 연결 생략");
            return Ok(false);
        }

        self.session.connect(token).await?;
        Ok(true)
    }

    /// 실시간 연결 해제
    pub async fn disconnect_realtime(&self) -> Result<(), CoreError> {
        self.session.disconnect().await
    }

    /// 실시간 업데이트 구독: 알 수 없는 종류는 경고 후 무시
    ///
    /// 같은 키를 다시 구독해도 핸들러는 하나만 유지한다.
    pub async fn subscribe_to_updates(
        &self,
        kind: &str,
        id: Option<ResourceId>,
    ) -> Result<Option<SubscriptionKey>, CoreError> {
        let Ok(kind) = kind.parse::<UpdateKind>() else {
            warn!("알 수 없는 구독 종류: {kind}");
            return Ok(None);
        };
        let key = kind.key(id)?;

        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.contains_key(&key) {
            debug!("이미 구독 중: {key:?}");
            return Ok(Some(key));
        }

        let updates = self.updates.clone();
        let handler_id = self
            .session
            .subscribe(key.clone(), move |message: &InboundMessage| -> Result<(), CoreError> {
                let _ = updates.send(message.clone());
                Ok(())
            })
            .await?;
        subscriptions.insert(key.clone(), handler_id);
        info!("실시간 구독: {kind} {key:?}");
        Ok(Some(key))
    }

    /// 실시간 업데이트 구독 해제: 알 수 없는 종류나 구독하지 않은 키는 무시
    pub async fn unsubscribe_from_updates(
        &self,
        kind: &str,
        id: Option<ResourceId>,
    ) -> Result<(), CoreError> {
        let Ok(kind) = kind.parse::<UpdateKind>() else {
            warn!("알 수 없는 구독 해제 종류: {kind}");
            return Ok(());
        };
        let key = kind.key(id)?;

        let mut subscriptions = self.subscriptions.lock().await;
        match subscriptions.remove(&key) {
            Some(handler_id) => {
                self.session.unsubscribe(key.clone(), handler_id).await?;
                info!("실시간 구독 해제: {kind} {key:?}");
            }
            None => debug!("구독하지 않은 키: {key:?}"),
        }
        Ok(())
    }

    /// 구독한 채널로 들어온 메시지 수신기
    pub fn updates(&self) -> broadcast::Receiver<InboundMessage> {
        self.updates.subscribe()
    }

    /// 세션 라이프사이클 이벤트 수신기
    pub fn realtime_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.session.events()
    }

    /// 실시간 세션 상태
    pub fn realtime_state(&self) -> SessionState {
        self.session.state()
    }

    /// 실시간 연결 여부
    pub fn ws_connected(&self) -> bool {
        self.realtime_state() == SessionState::Connected
    }

    // --- 온라인 상태 ---

    /// 온라인 상태 변경
    pub fn set_online(&self, online: bool) {
        if self.connectivity.set_online(online) {
            info!("네트워크 상태 변경: {}", if online { "온라인" } else { "오프라인" });
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    // --- 알림 ---

    /// 알림 추가
    pub fn add_notification(&self, draft: NotificationDraft) -> Notification {
        push_notification(&self.notifications, &self.notified, draft)
    }

    /// 알림 제거 (없으면 무시)
    pub fn remove_notification(&self, id: &NotificationId) -> bool {
        self.notifications.lock().remove(id)
    }

    /// 알림 전체 삭제
    pub fn clear_notifications(&self) {
        self.notifications.lock().clear();
    }

    /// 현재 알림 (최신순)
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().list()
    }

    /// 새 알림 수신기
    pub fn notification_events(&self) -> broadcast::Receiver<Notification> {
        self.notified.subscribe()
    }

    // --- 하위 어댑터 ---

    pub fn api(&self) -> &Arc<HttpApiClient> {
        &self.api
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }
}

impl Drop for ApiHub {
    fn drop(&mut self) {
        self.lifecycle_task.abort();
    }
}

fn push_notification(
    store: &SharedNotificationStore,
    notified: &broadcast::Sender<Notification>,
    draft: NotificationDraft,
) -> Notification {
    let notification = store.lock().add(draft);
    let _ = notified.send(notification.clone());
    notification
}

/// 라이프사이클 이벤트 → 알림
async fn forward_lifecycle(
    mut events: broadcast::Receiver<LifecycleEvent>,
    store: SharedNotificationStore,
    notified: broadcast::Sender<Notification>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                match &event {
                    LifecycleEvent::Connected => info!("실시간 연결됨"),
                    LifecycleEvent::Disconnected => info!("실시간 연결 끊김"),
                    _ => {}
                }
                if let Some(draft) = presenter::from_lifecycle(&event) {
                    push_notification(&store, &notified, draft);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("라이프사이클 이벤트 {skipped}건 누락");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_kind_parsing() {
        assert_eq!("truck".parse::<UpdateKind>().unwrap(), UpdateKind::Truck);
        assert_eq!("fleet".parse::<UpdateKind>().unwrap(), UpdateKind::Fleet);
        assert!("driver".parse::<UpdateKind>().is_err());
        assert_eq!(UpdateKind::Cargo.to_string(), "cargo");
    }

    #[test]
    fn update_kind_keys() {
        assert_eq!(
            UpdateKind::Route.key(Some(ResourceId::Int(3))).unwrap(),
            SubscriptionKey::route(3)
        );
        assert_eq!(UpdateKind::Fleet.key(None).unwrap(), SubscriptionKey::fleet());
        assert!(UpdateKind::Truck.key(None).is_err());
    }
}
