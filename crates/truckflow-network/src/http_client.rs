//! HTTP REST API 클라이언트.
//!
//! `FleetApi` 포트 구현. 베어러 토큰 헤더 자동 주입 + 재시도 로직.
//! 조회(GET)만 재시도하며 쓰기 요청은 한 번만 보낸다.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use truckflow_core::config::RetryConfig;
use truckflow_core::error::CoreError;
use truckflow_core::models::fleet::{LoginRequest, LoginResponse};
use truckflow_core::models::realtime::ResourceId;
use truckflow_core::ports::api_client::FleetApi;

use crate::auth::TokenManager;
use crate::endpoints::Endpoint;

/// 재시도가 포함된 비동기 작업 실행
///
/// exponential backoff: initial → ×2 → … (상한 `max_delay_ms`).
/// `is_retryable()`이 아닌 에러는 즉시 반환한다.
pub async fn execute_with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let max_delay = Duration::from_millis(config.max_delay_ms);
    let mut delay = Duration::from_millis(config.initial_delay_ms).min(max_delay);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempt >= config.max_retries {
                    return Err(e);
                }
                attempt += 1;

                // RateLimit의 경우 서버 지정 대기 시간 사용
                let wait = match &e {
                    CoreError::RateLimit { retry_after_secs } => {
                        Duration::from_secs(*retry_after_secs)
                    }
                    _ => delay,
                };

                warn!(
                    "요청 실패 (시도 {}/{}): {e}, {wait:?} 후 재시도",
                    attempt,
                    config.max_retries + 1
                );

                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

/// REST API 클라이언트: `FleetApi` 포트 구현
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    token_manager: Arc<TokenManager>,
    retry: RetryConfig,
}

impl HttpApiClient {
    /// 새 HTTP API 클라이언트 생성
    pub fn new(
        base_url: &str,
        token_manager: Arc<TokenManager>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_manager,
            retry: RetryConfig::default(),
        })
    }

    /// 재시도 설정
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 재시도 횟수만 변경
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// 토큰 매니저
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    /// 단일 요청 (재시도 없음)
    ///
    /// 토큰이 있으면 `Authorization: Bearer` 헤더를 붙인다.
    /// 204/빈 본문 → `Value::Null`, JSON이 아닌 본문 → `Value::String`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, CoreError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{method} {path}");

        let mut req = self.client.request(method, &url);
        if let Some(token) = self.token_manager.token().await {
            req = req.bearer_auth(token.expose());
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("요청 실패 ({path}): {e}")))?;

        let resp = check_response(resp).await?;
        decode_body(resp).await
    }

    /// 재시도 포함 GET
    pub async fn get(&self, path: &str) -> Result<Value, CoreError> {
        execute_with_retry(&self.retry, || self.request(Method::GET, path, None)).await
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value, CoreError> {
        self.request(Method::POST, path, body).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, CoreError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, CoreError> {
        self.request(Method::DELETE, path, None).await
    }
}

/// 응답 상태 코드 확인 및 에러 매핑
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    // Rate Limit: Retry-After 헤더 파싱 (기본 60초)
    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let text = resp.text().await.unwrap_or_else(|e| {
        warn!("응답 본문 읽기 실패: {e}");
        String::new()
    });

    match CoreError::from_status(status.as_u16(), text) {
        CoreError::RateLimit { retry_after_secs } => Err(CoreError::RateLimit {
            retry_after_secs: retry_after.unwrap_or(retry_after_secs),
        }),
        other => Err(other),
    }
}

async fn decode_body(resp: reqwest::Response) -> Result<Value, CoreError> {
    if resp.status() == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }

    let text = resp
        .text()
        .await
        .map_err(|e| CoreError::Network(format!("응답 본문 읽기 실패: {e}")))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(_) => Ok(Value::String(text)),
    }
}

#[async_trait]
impl FleetApi for HttpApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, CoreError> {
        self.token_manager.login(request).await
    }

    async fn register(&self, data: &Value) -> Result<Value, CoreError> {
        self.token_manager.register(data).await
    }

    // --- 회사 / 사용자 / 지점 ---

    async fn companies(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Companies.template()).await
    }

    async fn create_company(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Companies.template(), Some(data)).await
    }

    async fn users(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Users.template()).await
    }

    async fn drivers(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Drivers.template()).await
    }

    async fn create_user(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Users.template(), Some(data)).await
    }

    async fn branches(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Branches.template()).await
    }

    async fn create_branch(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Branches.template(), Some(data)).await
    }

    // --- 트럭 ---

    async fn trucks(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Trucks.template()).await
    }

    async fn online_trucks(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::TrucksOnline.template()).await
    }

    async fn truck_location(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::TruckLocation.with_id(&id.to_string())?;
        self.get(&path).await
    }

    async fn approve_truck(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::TruckApprove.with_id(&id.to_string())?;
        self.put(&path, &Value::Object(Default::default())).await
    }

    async fn my_truck(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::MyTruck.template()).await
    }

    async fn create_truck(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Trucks.template(), Some(data)).await
    }

    async fn update_truck(&self, id: &ResourceId, data: &Value) -> Result<Value, CoreError> {
        self.put(&Endpoint::Trucks.item(&id.to_string()), data).await
    }

    async fn delete_truck(&self, id: &ResourceId) -> Result<(), CoreError> {
        self.delete(&Endpoint::Trucks.item(&id.to_string())).await?;
        Ok(())
    }

    // --- 경로 ---

    async fn routes(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Routes.template()).await
    }

    async fn create_route(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Routes.template(), Some(data)).await
    }

    async fn approve_route(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::RouteApprove.with_id(&id.to_string())?;
        self.put(&path, &Value::Object(Default::default())).await
    }

    async fn route_stops(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::RouteStops.with_id(&id.to_string())?;
        self.get(&path).await
    }

    async fn complete_route_stop(&self, stop_id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::RouteStopComplete.with_id(&stop_id.to_string())?;
        self.put(&path, &Value::Object(Default::default())).await
    }

    // --- 화물 ---

    async fn cargo(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Cargo.template()).await
    }

    async fn unassigned_cargo(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::CargoUnassigned.template()).await
    }

    async fn create_cargo(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Cargo.template(), Some(data)).await
    }

    async fn assign_cargo(
        &self,
        id: &ResourceId,
        assignment: &Value,
    ) -> Result<Value, CoreError> {
        let path = Endpoint::CargoAssign.with_id(&id.to_string())?;
        self.put(&path, assignment).await
    }

    async fn unassign_cargo(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::CargoUnassign.with_id(&id.to_string())?;
        self.put(&path, &Value::Object(Default::default())).await
    }

    async fn cargo_events(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::CargoEvents.with_id(&id.to_string())?;
        self.get(&path).await
    }

    async fn cargo_location(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::CargoLocation.with_id(&id.to_string())?;
        self.get(&path).await
    }

    async fn track_cargo(&self, tracking_number: &str) -> Result<Value, CoreError> {
        let path = Endpoint::CargoTrack.path(&[("tracking_number", tracking_number)])?;
        self.get(&path).await
    }

    async fn truck_cargo(&self, truck_id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::TruckCargo.path(&[("truck_id", &truck_id.to_string())])?;
        self.get(&path).await
    }

    // --- 방문 / 작업 / 요청 ---

    async fn visits(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Visits.template()).await
    }

    async fn create_visit(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Visits.template(), Some(data)).await
    }

    async fn tasks(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Tasks.template()).await
    }

    async fn create_task(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Tasks.template(), Some(data)).await
    }

    async fn complete_task(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::TaskComplete.with_id(&id.to_string())?;
        self.put(&path, &Value::Object(Default::default())).await
    }

    async fn requests(&self) -> Result<Value, CoreError> {
        self.get(Endpoint::Requests.template()).await
    }

    async fn create_request(&self, data: &Value) -> Result<Value, CoreError> {
        self.post(Endpoint::Requests.template(), Some(data)).await
    }

    async fn accept_request(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::RequestAccept.with_id(&id.to_string())?;
        self.put(&path, &Value::Object(Default::default())).await
    }

    async fn terminate_request(&self, id: &ResourceId) -> Result<Value, CoreError> {
        let path = Endpoint::RequestTerminate.with_id(&id.to_string())?;
        self.put(&path, &Value::Object(Default::default())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use truckflow_core::models::session::AuthToken;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 10,
            max_delay_ms: 20,
        }
    }

    /// 토큰이 설정된 클라이언트를 생성하는 헬퍼
    async fn setup_authed_client(server: &mockito::ServerGuard) -> HttpApiClient {
        let tm = Arc::new(TokenManager::in_memory(&server.url()));
        tm.set_token(AuthToken::new("test_jwt")).await.unwrap();
        HttpApiClient::new(&server.url(), tm, Duration::from_secs(5))
            .unwrap()
            .with_retry(fast_retry(2))
    }

    #[test]
    fn http_client_creation() {
        let tm = Arc::new(TokenManager::in_memory("http://localhost:8080"));
        let client =
            HttpApiClient::new("http://localhost:8080/", tm, Duration::from_secs(30)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.retry.max_retries, 3);
    }

    #[test]
    fn with_max_retries() {
        let tm = Arc::new(TokenManager::in_memory("http://localhost:8080"));
        let client = HttpApiClient::new("http://localhost:8080", tm, Duration::from_secs(30))
            .unwrap()
            .with_max_retries(5);
        assert_eq!(client.retry.max_retries, 5);
    }

    #[tokio::test]
    async fn trucks_sends_bearer_header() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await;

        let mock = server
            .mock("GET", "/trucks")
            .match_header("authorization", "Bearer test_jwt")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":1,"plate":"12가3456"}]"#)
            .create_async()
            .await;

        let trucks = client.trucks().await.unwrap();
        assert_eq!(trucks[0]["id"], 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn request_without_token_has_no_auth_header() {
        let mut server = mockito::Server::new_async().await;
        let tm = Arc::new(TokenManager::in_memory(&server.url()));
        let client = HttpApiClient::new(&server.url(), tm, Duration::from_secs(5)).unwrap();

        let mock = server
            .mock("GET", "/trucks/online")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let online = client.online_trucks().await.unwrap();
        assert_eq!(online, serde_json::json!([]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn update_and_delete_use_item_path() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await;

        let put = server
            .mock("PUT", "/trucks/7")
            .match_body(mockito::Matcher::Json(serde_json::json!({"capacity": 10})))
            .with_status(200)
            .with_body(r#"{"id":7,"capacity":10}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/trucks/7")
            .with_status(204)
            .create_async()
            .await;

        let id = ResourceId::from(7);
        let updated = client
            .update_truck(&id, &serde_json::json!({"capacity": 10}))
            .await
            .unwrap();
        assert_eq!(updated["capacity"], 10);
        client.delete_truck(&id).await.unwrap();

        put.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn track_cargo_path() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await;

        let mock = server
            .mock("GET", "/cargo/track/TRK-9")
            .with_status(200)
            .with_body(r#"{"status":"in_transit"}"#)
            .create_async()
            .await;

        let status = client.track_cargo("TRK-9").await.unwrap();
        assert_eq!(status["status"], "in_transit");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_json_body_becomes_string() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await;

        let mock = server
            .mock("PUT", "/tasks/3/complete")
            .with_status(200)
            .with_body("OK")
            .create_async()
            .await;

        let result = client.complete_task(&ResourceId::from(3)).await.unwrap();
        assert_eq!(result, Value::String("OK".to_string()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_404() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await;

        let mock = server
            .mock("GET", "/routes/99/stops")
            .with_status(404)
            .with_body("route 99")
            .create_async()
            .await;

        let err = client.route_stops(&ResourceId::from(99)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await;

        let mock = server
            .mock("GET", "/cargo")
            .with_status(422)
            .with_body("weight must be positive")
            .expect(1)
            .create_async()
            .await;

        let err = client.cargo().await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surface() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await;

        // 최초 1회 + 재시도 2회
        let mock = server
            .mock("GET", "/visits")
            .with_status(503)
            .with_body("Service Unavailable")
            .expect(3)
            .create_async()
            .await;

        let err = client.visits().await.unwrap_err();
        assert!(matches!(err, CoreError::Server { status: 503, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn writes_are_sent_once() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await;

        let mock = server
            .mock("POST", "/requests")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let err = client
            .create_request(&serde_json::json!({"type": "fuel"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Server { status: 500, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_authed_client(&server).await.with_max_retries(0);

        let mock = server
            .mock("GET", "/tasks")
            .with_status(429)
            .with_header("retry-after", "7")
            .with_body("Too Many Requests")
            .create_async()
            .await;

        let err = client.tasks().await.unwrap_err();
        assert!(matches!(err, CoreError::RateLimit { retry_after_secs: 7 }));
        mock.assert_async().await;
    }

    #[tokio::test(start_paused = true)]
    async fn retry_backoff_stops_at_max_retries() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
        };

        let started = tokio::time::Instant::now();
        let result: Result<(), CoreError> = execute_with_retry(&config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Network("connection refused".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(7));
        assert!(elapsed < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = execute_with_retry(&RetryConfig::default(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CoreError::Server {
                    status: 502,
                    message: "bad gateway".to_string(),
                })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
