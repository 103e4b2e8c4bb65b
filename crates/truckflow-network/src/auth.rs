//! 베어러 토큰 관리.
//!
//! 서버 로그인/회원가입, 현재 토큰 보관, `TokenStore`를 통한 영속화와 세션 복원을 담당한다.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use truckflow_core::error::CoreError;
use truckflow_core::models::fleet::{LoginRequest, LoginResponse};
use truckflow_core::models::session::AuthToken;
use truckflow_core::ports::token_store::TokenStore;

use crate::endpoints::Endpoint;
use crate::token_store::MemoryTokenStore;

/// 토큰 매니저: 로그인/복원/로그아웃
#[derive(Clone)]
pub struct TokenManager {
    base_url: String,
    client: reqwest::Client,
    store: Arc<dyn TokenStore>,
    state: Arc<RwLock<Option<AuthToken>>>,
}

impl TokenManager {
    /// 새 토큰 매니저 생성
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            store,
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// 로그인/회원가입 요청 타임아웃 적용
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, CoreError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("인증 HTTP 클라이언트 빌드 실패: {e}")))?;
        Ok(self)
    }

    /// 영속화 없는 토큰 매니저
    pub fn in_memory(base_url: &str) -> Self {
        Self::new(base_url, Arc::new(MemoryTokenStore::new()))
    }

    /// 저장소에서 토큰 복원: 복원되면 true
    pub async fn restore(&self) -> Result<bool, CoreError> {
        let stored = self.store.load()?;
        let restored = stored.is_some();
        *self.state.write().await = stored;
        if restored {
            info!("저장된 인증 토큰 복원");
        }
        Ok(restored)
    }

    /// 이메일/비밀번호 로그인 → 토큰 저장
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, CoreError> {
        let url = format!("{}{}", self.base_url, Endpoint::Login.template());
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("로그인 요청 실패: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CoreError::from_status(status.as_u16(), text));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Internal(format!("로그인 응답 파싱 실패: {e}")))?;

        self.set_token(AuthToken::new(login.token.clone())).await?;
        debug!("로그인 성공: {}", request.email);
        Ok(login)
    }

    /// 회원가입 (토큰은 저장하지 않음)
    pub async fn register(&self, data: &Value) -> Result<Value, CoreError> {
        let url = format!("{}{}", self.base_url, Endpoint::Register.template());
        let resp = self
            .client
            .post(&url)
            .json(data)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("회원가입 요청 실패: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CoreError::from_status(status.as_u16(), text));
        }

        resp.json()
            .await
            .map_err(|e| CoreError::Internal(format!("회원가입 응답 파싱 실패: {e}")))
    }

    /// 토큰 설정 + 영속화
    pub async fn set_token(&self, token: AuthToken) -> Result<(), CoreError> {
        if token.is_empty() {
            return Err(CoreError::Validation {
                field: "token".to_string(),
                message: "빈 토큰".to_string(),
            });
        }
        self.store.save(&token)?;
        *self.state.write().await = Some(token);
        Ok(())
    }

    /// 로그아웃: 메모리/저장소 모두 삭제
    pub async fn clear(&self) -> Result<(), CoreError> {
        *self.state.write().await = None;
        if let Err(e) = self.store.clear() {
            warn!("저장된 토큰 삭제 실패: {e}");
            return Err(e);
        }
        debug!("로그아웃 완료");
        Ok(())
    }

    /// 현재 토큰
    pub async fn token(&self) -> Option<AuthToken> {
        self.state.read().await.clone()
    }

    /// 현재 토큰 (없으면 Auth 에러)
    pub async fn require_token(&self) -> Result<AuthToken, CoreError> {
        self.token()
            .await
            .ok_or_else(|| CoreError::unauthenticated("인증되지 않음"))
    }

    /// 현재 인증 상태 확인
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::FileTokenStore;

    #[test]
    fn token_manager_trailing_slash() {
        let tm = TokenManager::in_memory("http://localhost:8080/api/v1/");
        assert_eq!(tm.base_url, "http://localhost:8080/api/v1");
    }

    #[tokio::test]
    async fn unauthenticated_state() {
        let tm = TokenManager::in_memory("http://localhost:8080");
        assert!(!tm.is_authenticated().await);
        assert!(tm.token().await.is_none());
        let err = tm.require_token().await.unwrap_err();
        assert!(matches!(err, CoreError::Auth { status: 401, .. }));
    }

    #[tokio::test]
    async fn login_success_persists_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "email": "driver@test.com",
                "password": "pw"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"jwt_abc","user":{"id":1,"role":"DRIVER"}}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTokenStore::new(dir.path().join("auth_token")));
        let tm = TokenManager::new(&server.url(), store.clone());

        let resp = tm
            .login(&LoginRequest {
                email: "driver@test.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(resp.token, "jwt_abc");
        assert!(tm.is_authenticated().await);
        assert_eq!(store.load().unwrap().unwrap().expose(), "jwt_abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_failure_401() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body("Invalid credentials")
            .create_async()
            .await;

        let tm = TokenManager::in_memory(&server.url());
        let err = tm
            .login(&LoginRequest {
                email: "bad@test.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Auth { status: 401, .. }));
        assert!(!tm.is_authenticated().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_failure_network() {
        // 도달 불가 URL → 네트워크 에러
        let tm = TokenManager::in_memory("http://127.0.0.1:1");
        let err = tm
            .login(&LoginRequest {
                email: "a@b.c".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
    }

    #[tokio::test]
    async fn login_honours_request_timeout() {
        // 연결만 받고 응답하지 않는 서버
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let tm = TokenManager::in_memory(&format!("http://{addr}"))
            .with_timeout(Duration::from_millis(200))
            .unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            tm.login(&LoginRequest {
                email: "a@b.c".to_string(),
                password: "p".to_string(),
            }),
        )
        .await
        .expect("타임아웃이 적용되지 않음");

        assert!(matches!(result, Err(CoreError::Network(_))));
        server.abort();
    }

    #[test]
    fn restore_from_store() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save(&AuthToken::new("saved")).unwrap();

        let tm = TokenManager::new("http://localhost:8080", store);
        assert!(tokio_test::block_on(tm.restore()).unwrap());
        let token = tokio_test::block_on(tm.token()).unwrap();
        assert_eq!(token.expose(), "saved");
    }

    #[tokio::test]
    async fn clear_removes_persisted_token() {
        let store = Arc::new(MemoryTokenStore::new());
        let tm = TokenManager::new("http://localhost:8080", store.clone());
        tm.set_token(AuthToken::new("t1")).await.unwrap();
        tm.clear().await.unwrap();

        assert!(!tm.is_authenticated().await);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_token_rejected() {
        let tm = TokenManager::in_memory("http://localhost:8080");
        assert!(tm.set_token(AuthToken::new("  ")).await.is_err());
    }
}
