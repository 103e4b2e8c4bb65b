//! 실시간 세션.
//!
//! 세션 상태(라우터, 재연결 정책, 연결 상태, 링크)는 전부 하나의 actor 태스크가 소유한다.
//! 외부에서는 복제 가능한 [`SessionHandle`]로 명령을 보낸다.
//!
//! ```text
//! Disconnected ─connect─▶ Connecting ─open─▶ Connected
//!      ▲                      │                  │ 예기치 않은 종료
//!      │ disconnect           ▼                  ▼
//!      └──────────────── Reconnecting ◀──── (재시도 < 최대)
//!                             │ 최대 횟수 소진
//!                             ▼
//!                           Failed
//! ```
//!
//! 연결 시도마다 epoch를 붙이고, 현재 epoch가 아닌 결과는 버린다.

use std::future::pending;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use truckflow_core::config::RealtimeConfig;
use truckflow_core::error::CoreError;
use truckflow_core::models::realtime::{InboundMessage, OutboundFrame, SubscriptionKey};
use truckflow_core::models::session::{AuthToken, LifecycleEvent, SessionState};
use truckflow_core::ports::transport::{Transport, TransportEvent, TransportLink};

use crate::reconnect::{ReconnectDecision, ReconnectPolicy};
use crate::router::{HandlerId, MessageHandler, SharedHandler, TopicRouter};
use crate::ws_client::redact_url;

/// 생명주기 이벤트 채널 용량
const EVENT_CAPACITY: usize = 64;

enum Command {
    Connect {
        token: AuthToken,
        reply: oneshot::Sender<()>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        frame: OutboundFrame,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    Subscribe {
        key: SubscriptionKey,
        handler: SharedHandler,
        reply: oneshot::Sender<HandlerId>,
    },
    Unsubscribe {
        key: SubscriptionKey,
        id: HandlerId,
        reply: oneshot::Sender<()>,
    },
    AddListener {
        handler: SharedHandler,
        reply: oneshot::Sender<HandlerId>,
    },
    RemoveListener {
        id: HandlerId,
        reply: oneshot::Sender<bool>,
    },
    ActiveSubscriptions {
        reply: oneshot::Sender<Vec<SubscriptionKey>>,
    },
}

struct OpenOutcome {
    epoch: u64,
    result: Result<TransportLink, CoreError>,
}

enum Step {
    Command(Command),
    Opened(OpenOutcome),
    Transport(Option<TransportEvent>),
    ReconnectDue,
}

/// 실시간 세션 핸들: 복제해서 여러 곳에서 사용
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<LifecycleEvent>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// 세션 actor 생성 (tokio 런타임 필요)
    ///
    /// 모든 핸들이 drop되면 actor는 연결을 닫고 종료한다.
    pub fn spawn(
        url: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: &RealtimeConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (opened_tx, opened_rx) = mpsc::channel(8);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        let actor = SessionActor {
            url: url.into(),
            transport,
            token: None,
            state: SessionState::Disconnected,
            policy: ReconnectPolicy::from_config(config),
            router: TopicRouter::new(),
            link: None,
            epoch: 0,
            reconnect_at: None,
            opened_tx,
            events: events.clone(),
            state_tx,
        };
        tokio::spawn(actor.run(command_rx, opened_rx));

        Self {
            commands: command_tx,
            events,
            state: state_rx,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| session_gone())?;
        rx.await.map_err(|_| session_gone())
    }

    /// 연결 시작
    ///
    /// 이미 Connected/Connecting이거나 토큰이 비어 있으면 경고만 남기고 무시한다.
    /// 결과는 생명주기 이벤트로 확인한다.
    pub async fn connect(&self, token: impl Into<AuthToken>) -> Result<(), CoreError> {
        let token = token.into();
        self.request(|reply| Command::Connect { token, reply }).await
    }

    /// 연결 해제: 재연결 타이머 취소, 시도 횟수 초기화 (여러 번 호출해도 안전)
    pub async fn disconnect(&self) -> Result<(), CoreError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// 프레임 전송: Connected가 아니면 `NotConnected` (큐잉 없음)
    pub async fn send(&self, frame: OutboundFrame) -> Result<(), CoreError> {
        self.request(|reply| Command::Send { frame, reply }).await?
    }

    /// 핸들러 등록: 키의 첫 핸들러이고 연결 중이면 subscribe 프레임 전송
    pub async fn subscribe(
        &self,
        key: SubscriptionKey,
        handler: impl MessageHandler + 'static,
    ) -> Result<HandlerId, CoreError> {
        let handler: SharedHandler = Arc::new(handler);
        self.request(|reply| Command::Subscribe {
            key,
            handler,
            reply,
        })
        .await
    }

    /// 핸들러 제거: 키의 마지막 핸들러이고 연결 중이면 unsubscribe 프레임 전송
    pub async fn unsubscribe(&self, key: SubscriptionKey, id: HandlerId) -> Result<(), CoreError> {
        self.request(|reply| Command::Unsubscribe { key, id, reply })
            .await
    }

    /// 모든 수신 메시지를 관찰하는 리스너 등록
    pub async fn add_listener(
        &self,
        handler: impl MessageHandler + 'static,
    ) -> Result<HandlerId, CoreError> {
        let handler: SharedHandler = Arc::new(handler);
        self.request(|reply| Command::AddListener { handler, reply })
            .await
    }

    /// 리스너 제거
    pub async fn remove_listener(&self, id: HandlerId) -> Result<bool, CoreError> {
        self.request(|reply| Command::RemoveListener { id, reply })
            .await
    }

    /// 활성 구독 키 (등록 순서)
    pub async fn active_subscriptions(&self) -> Result<Vec<SubscriptionKey>, CoreError> {
        self.request(|reply| Command::ActiveSubscriptions { reply })
            .await
    }

    /// 현재 세션 상태
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// 상태 변경 수신기
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// 생명주기 이벤트 구독
    pub fn events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }
}

fn session_gone() -> CoreError {
    CoreError::Internal("실시간 세션 태스크 종료됨".to_string())
}

struct SessionActor {
    url: String,
    transport: Arc<dyn Transport>,
    token: Option<AuthToken>,
    state: SessionState,
    policy: ReconnectPolicy,
    router: TopicRouter,
    link: Option<TransportLink>,
    epoch: u64,
    reconnect_at: Option<Instant>,
    opened_tx: mpsc::Sender<OpenOutcome>,
    events: broadcast::Sender<LifecycleEvent>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut opened: mpsc::Receiver<OpenOutcome>,
    ) {
        debug!("실시간 세션 시작: {}", redact_url(&self.url));

        loop {
            let step = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => break,
                },
                Some(outcome) = opened.recv() => Step::Opened(outcome),
                event = next_event(self.link.as_mut()) => Step::Transport(event),
                _ = reconnect_due(self.reconnect_at) => Step::ReconnectDue,
            };

            match step {
                Step::Command(command) => self.handle_command(command).await,
                Step::Opened(outcome) => self.on_opened(outcome).await,
                Step::Transport(event) => self.on_transport_event(event),
                Step::ReconnectDue => {
                    self.reconnect_at = None;
                    info!(
                        "재연결 시도 {}/{}",
                        self.policy.attempts(),
                        self.policy.max_attempts()
                    );
                    self.start_open();
                }
            }
        }

        if self.link.take().is_some() {
            debug!("세션 핸들 모두 해제 - 연결 종료");
        }
        debug!("실시간 세션 종료");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { token, reply } => {
                self.connect(token);
                let _ = reply.send(());
            }
            Command::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            Command::Send { frame, reply } => {
                let result = self.send(frame).await;
                let _ = reply.send(result);
            }
            Command::Subscribe {
                key,
                handler,
                reply,
            } => {
                let registration = self.router.subscribe(key, handler);
                if let Some(frame) = registration.frame {
                    self.send_control(frame).await;
                }
                let _ = reply.send(registration.id);
            }
            Command::Unsubscribe { key, id, reply } => {
                if let Some(frame) = self.router.unsubscribe(&key, id) {
                    self.send_control(frame).await;
                }
                let _ = reply.send(());
            }
            Command::AddListener { handler, reply } => {
                let _ = reply.send(self.router.add_listener(handler));
            }
            Command::RemoveListener { id, reply } => {
                let _ = reply.send(self.router.remove_listener(id));
            }
            Command::ActiveSubscriptions { reply } => {
                let _ = reply.send(self.router.active_keys());
            }
        }
    }

    fn connect(&mut self, token: AuthToken) {
        if token.is_empty() {
            warn!("빈 토큰 - 연결 생략");
            return;
        }
        if matches!(
            self.state,
            SessionState::Connected | SessionState::Connecting
        ) {
            warn!("이미 {} 상태 - connect 무시", self.state);
            return;
        }

        self.token = Some(token);
        self.reconnect_at = None;
        self.start_open();
    }

    fn disconnect(&mut self) {
        // 진행 중인 연결 시도 결과 무효화
        self.epoch += 1;
        self.reconnect_at = None;
        self.policy.reset();
        self.token = None;

        // 송신 채널 drop → 전송 계층이 연결을 닫음
        if self.link.take().is_some() {
            info!("실시간 연결 해제");
        }

        if self.state != SessionState::Disconnected {
            self.set_state(SessionState::Disconnected);
            self.emit(LifecycleEvent::Disconnected);
        }
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), CoreError> {
        if self.state != SessionState::Connected {
            warn!("연결되지 않음 - {} 프레임 폐기", frame.kind());
            return Err(CoreError::NotConnected);
        }
        self.write(&frame).await
    }

    /// subscribe/unsubscribe 제어 프레임: 연결 전이면 재연결 시 재전송에 맡긴다
    async fn send_control(&mut self, frame: OutboundFrame) {
        if self.state != SessionState::Connected {
            debug!("연결 전 {} - 연결 후 반영", frame.kind());
            return;
        }
        if let Err(e) = self.write(&frame).await {
            let err = CoreError::Subscription(format!("{} 전송 실패: {e}", frame.kind()));
            warn!("{err}");
        }
    }

    async fn write(&self, frame: &OutboundFrame) -> Result<(), CoreError> {
        let link = self.link.as_ref().ok_or(CoreError::NotConnected)?;
        let text = frame.to_json()?;
        link.outgoing
            .send(text)
            .await
            .map_err(|_| CoreError::Transport("송신 채널 닫힘".to_string()))?;
        debug!("프레임 송신: {}", frame.kind());
        Ok(())
    }

    fn start_open(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;

        if self.state != SessionState::Reconnecting {
            self.set_state(SessionState::Connecting);
        }
        self.emit(LifecycleEvent::Connecting);

        let transport = self.transport.clone();
        let url = self.url.clone();
        let opened_tx = self.opened_tx.clone();
        tokio::spawn(async move {
            let result = transport.open(&url).await;
            let _ = opened_tx.send(OpenOutcome { epoch, result }).await;
        });
    }

    async fn on_opened(&mut self, outcome: OpenOutcome) {
        if outcome.epoch != self.epoch {
            // 링크가 있으면 여기서 drop되어 닫힌다
            debug!("이전 연결 시도 결과 무시 (epoch {})", outcome.epoch);
            return;
        }

        match outcome.result {
            Ok(link) => {
                self.link = Some(link);
                info!("실시간 연결 수립: {}", redact_url(&self.url));

                if let Some(token) = self.token.clone() {
                    if let Err(e) = self.write(&OutboundFrame::Auth { token }).await {
                        warn!("인증 프레임 전송 실패: {e}");
                    }
                }

                self.set_state(SessionState::Connected);
                self.policy.reset();

                for frame in self.router.replay_frames() {
                    if let Err(e) = self.write(&frame).await {
                        warn!("구독 재전송 실패: {e}");
                    }
                }

                self.emit(LifecycleEvent::Connected);
            }
            Err(e) => {
                warn!("실시간 연결 실패: {e}");
                self.on_connection_lost(Some(e.to_string()));
            }
        }
    }

    fn on_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Frame(text)) => self.on_frame(&text),
            Some(TransportEvent::Closed { reason }) => {
                info!(
                    "실시간 연결 종료: {}",
                    reason.as_deref().unwrap_or("사유 없음")
                );
                self.on_connection_lost(None);
            }
            Some(TransportEvent::Error(e)) => {
                warn!("실시간 전송 에러: {e}");
                self.on_connection_lost(Some(e));
            }
            None => {
                debug!("수신 채널 닫힘");
                self.on_connection_lost(None);
            }
        }
    }

    fn on_frame(&self, text: &str) {
        match InboundMessage::decode(text) {
            Ok(message) => {
                let report = self.router.dispatch(&message);
                if report.failed > 0 {
                    debug!(
                        "{} 처리: 성공 {}, 실패 {}",
                        message.kind(),
                        report.delivered,
                        report.failed
                    );
                }
            }
            Err(e) => warn!("수신 프레임 폐기: {e}"),
        }
    }

    /// 예기치 않은 종료/연결 실패 → 재연결 정책 적용
    fn on_connection_lost(&mut self, error: Option<String>) {
        self.link = None;

        if self.state == SessionState::Connected {
            self.emit(LifecycleEvent::Disconnected);
        }
        if let Some(error) = error {
            self.emit(LifecycleEvent::TransportError(error));
        }

        match self.policy.on_unexpected_close() {
            ReconnectDecision::Retry { attempt, delay } => {
                info!("{delay:?} 후 재연결 ({attempt}/{})", self.policy.max_attempts());
                self.set_state(SessionState::Reconnecting);
                self.reconnect_at = Some(Instant::now() + delay);
                self.emit(LifecycleEvent::Reconnecting { attempt });
            }
            ReconnectDecision::GiveUp { attempts } => {
                error!("재연결 {attempts}회 실패 - 자동 재연결 중단");
                self.reconnect_at = None;
                self.set_state(SessionState::Failed);
                self.emit(LifecycleEvent::MaxReconnectAttemptsReached);
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("세션 상태: {} → {state}", self.state);
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn emit(&self, event: LifecycleEvent) {
        // 구독자가 없어도 무시
        let _ = self.events.send(event);
    }
}

async fn next_event(link: Option<&mut TransportLink>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.incoming.recv().await,
        None => pending().await,
    }
}

async fn reconnect_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{OpenPlan, ScriptedTransport, ServerEnd};
    use assert_matches::assert_matches;
    use serde_json::{json, Value};
    use std::time::Duration;
    use truckflow_core::models::realtime::ResourceId;

    const URL: &str = "ws://fleet.test/ws";

    fn spawn_session(transport: &Arc<ScriptedTransport>) -> SessionHandle {
        SessionHandle::spawn(URL, transport.clone(), &RealtimeConfig::default())
    }

    async fn next_lifecycle(rx: &mut broadcast::Receiver<LifecycleEvent>) -> LifecycleEvent {
        tokio::time::timeout(Duration::from_secs(600), rx.recv())
            .await
            .expect("이벤트 대기 시간 초과")
            .expect("이벤트 채널 닫힘")
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<LifecycleEvent>,
        wanted: LifecycleEvent,
    ) -> Vec<LifecycleEvent> {
        let mut seen = Vec::new();
        loop {
            let event = next_lifecycle(rx).await;
            let done = event == wanted;
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    async fn connect_and_accept(
        session: &SessionHandle,
        transport: &ScriptedTransport,
        events: &mut broadcast::Receiver<LifecycleEvent>,
    ) -> ServerEnd {
        session.connect("tok_1").await.unwrap();
        let server = transport.accept().await.unwrap();
        wait_for(events, LifecycleEvent::Connected).await;
        server
    }

    fn location_frame(truck_id: i64) -> String {
        json!({
            "type": "truck_location_update",
            "payload": {"truck_id": truck_id, "latitude": 37.56, "longitude": 126.97}
        })
        .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn connect_sends_auth_first() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();

        let mut server = connect_and_accept(&session, &transport, &mut events).await;

        assert_eq!(
            server.next_frame().await,
            Some(json!({"type": "auth", "token": "tok_1"}))
        );
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(transport.urls(), vec![URL.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn subscriptions_before_connect_are_sent_once_on_open() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();

        let noop = |_: &InboundMessage| -> Result<(), CoreError> { Ok(()) };
        session.subscribe(SubscriptionKey::truck(7), noop).await.unwrap();
        session.subscribe(SubscriptionKey::truck(7), noop).await.unwrap();

        let mut server = connect_and_accept(&session, &transport, &mut events).await;

        assert_eq!(server.next_frame().await.unwrap()["type"], "auth");
        assert_eq!(
            server.next_frame().await,
            Some(json!({"type": "subscribe", "channel": "truck_location", "truck_id": 7}))
        );
        assert_eq!(server.try_frame(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn control_frames_follow_handler_refcount() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();
        let mut server = connect_and_accept(&session, &transport, &mut events).await;
        server.drain();

        let key = SubscriptionKey::cargo(ResourceId::from("C-1"));
        let noop = |_: &InboundMessage| -> Result<(), CoreError> { Ok(()) };
        let a = session.subscribe(key.clone(), noop).await.unwrap();
        let b = session.subscribe(key.clone(), noop).await.unwrap();

        assert_eq!(
            server.try_frame(),
            Some(json!({"type": "subscribe", "channel": "cargo_updates", "cargo_id": "C-1"}))
        );
        assert_eq!(server.try_frame(), None);

        session.unsubscribe(key.clone(), a).await.unwrap();
        assert_eq!(server.try_frame(), None);

        session.unsubscribe(key.clone(), b).await.unwrap();
        assert_eq!(
            server.try_frame(),
            Some(json!({"type": "unsubscribe", "channel": "cargo_updates", "cargo_id": "C-1"}))
        );
        assert!(session.active_subscriptions().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_control_frame_keeps_subscription() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();
        let mut server = connect_and_accept(&session, &transport, &mut events).await;
        server.drain();
        server.stop_reading();

        let noop = |_: &InboundMessage| -> Result<(), CoreError> { Ok(()) };
        let key = SubscriptionKey::truck(7);
        let id = session.subscribe(key.clone(), noop).await;

        assert!(id.is_ok());
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.active_subscriptions().await.unwrap(), vec![key.clone()]);

        let other = SubscriptionKey::fleet();
        let other_id = session.subscribe(other.clone(), noop).await.unwrap();
        assert!(session.unsubscribe(other, other_id).await.is_ok());
        assert_eq!(session.active_subscriptions().await.unwrap(), vec![key]);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_replays_subscriptions_in_registration_order() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();
        let noop = |_: &InboundMessage| -> Result<(), CoreError> { Ok(()) };

        session.subscribe(SubscriptionKey::cargo(5), noop).await.unwrap();
        session.subscribe(SubscriptionKey::truck(1), noop).await.unwrap();
        session.subscribe(SubscriptionKey::fleet(), noop).await.unwrap();

        let mut server = connect_and_accept(&session, &transport, &mut events).await;
        server.drain();

        let dropped_at = tokio::time::Instant::now();
        server.close(None).await;

        let seen = wait_for(&mut events, LifecycleEvent::Reconnecting { attempt: 1 }).await;
        assert!(seen.contains(&LifecycleEvent::Disconnected));
        assert_eq!(session.state(), SessionState::Reconnecting);

        let mut server = transport.accept().await.unwrap();
        assert!(dropped_at.elapsed() >= Duration::from_millis(5_000));
        wait_for(&mut events, LifecycleEvent::Connected).await;

        let frames: Vec<Value> = server.drain();
        let kinds: Vec<String> = frames
            .iter()
            .map(|f| {
                format!(
                    "{}:{}",
                    f["type"].as_str().unwrap_or_default(),
                    f["channel"].as_str().unwrap_or("-")
                )
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "auth:-",
                "subscribe:cargo_updates",
                "subscribe:truck_location",
                "subscribe:fleet_updates",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts_exactly_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_plan(OpenPlan::Accept);
        for _ in 0..5 {
            transport.push_plan(OpenPlan::Refuse("connection refused".to_string()));
        }
        let session = spawn_session(&transport);
        let mut events = session.events();

        let server = connect_and_accept(&session, &transport, &mut events).await;
        server.close(Some("server restart")).await;

        let seen = wait_for(&mut events, LifecycleEvent::MaxReconnectAttemptsReached).await;
        let attempts: Vec<u32> = seen
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Reconnecting { attempt } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.open_count(), 6);

        // 포기 이후 타이머 없음
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.open_count(), 6);
        assert_matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn successful_reconnect_resets_attempts() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();

        let server = connect_and_accept(&session, &transport, &mut events).await;
        server.close(None).await;
        wait_for(&mut events, LifecycleEvent::Reconnecting { attempt: 1 }).await;

        let server = transport.accept().await.unwrap();
        wait_for(&mut events, LifecycleEvent::Connected).await;

        server.fail("connection reset").await;
        let seen = wait_for(&mut events, LifecycleEvent::Reconnecting { attempt: 1 }).await;
        assert!(seen.contains(&LifecycleEvent::TransportError("connection reset".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn initial_open_failure_triggers_reconnect() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_plan(OpenPlan::Refuse("no route to host".to_string()));
        let session = spawn_session(&transport);
        let mut events = session.events();

        session.connect("tok").await.unwrap();
        let seen = wait_for(&mut events, LifecycleEvent::Reconnecting { attempt: 1 }).await;
        assert_eq!(seen[0], LifecycleEvent::Connecting);
        assert_matches!(seen[1], LifecycleEvent::TransportError(_));

        // 다음 시도는 수락
        let _server = transport.accept().await.unwrap();
        wait_for(&mut events, LifecycleEvent::Connected).await;
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();

        let server = connect_and_accept(&session, &transport, &mut events).await;
        server.close(None).await;
        wait_for(&mut events, LifecycleEvent::Reconnecting { attempt: 1 }).await;

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_closes_transport_and_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();

        let mut server = connect_and_accept(&session, &transport, &mut events).await;
        server.drain();

        session.disconnect().await.unwrap();
        assert_eq!(next_lifecycle(&mut events).await, LifecycleEvent::Disconnected);
        assert_eq!(server.next_frame().await, None);

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_requires_connected_state() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);

        let frame = SubscriptionKey::fleet().subscribe_frame();
        assert_matches!(session.send(frame.clone()).await, Err(CoreError::NotConnected));

        let mut events = session.events();
        let mut server = connect_and_accept(&session, &transport, &mut events).await;
        server.drain();

        session.send(frame).await.unwrap();
        assert_eq!(server.try_frame().unwrap()["channel"], "fleet_updates");
    }

    #[tokio::test(start_paused = true)]
    async fn connect_while_connected_is_ignored() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();

        let _server = connect_and_accept(&session, &transport, &mut events).await;
        session.connect("tok_2").await.unwrap();
        session.connect("").await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.open_count(), 1);
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_frames_reach_handlers_and_listeners() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();

        let (topic_tx, mut topic_rx) = mpsc::unbounded_channel();
        session
            .subscribe(SubscriptionKey::truck(7), move |m: &InboundMessage| -> Result<(), CoreError> {
                let _ = topic_tx.send(m.clone());
                Ok(())
            })
            .await
            .unwrap();

        let (listener_tx, mut listener_rx) = mpsc::unbounded_channel();
        session
            .add_listener(move |m: &InboundMessage| -> Result<(), CoreError> {
                let _ = listener_tx.send(m.kind().to_string());
                Ok(())
            })
            .await
            .unwrap();

        let server = connect_and_accept(&session, &transport, &mut events).await;

        server.push("not json at all").await;
        server.push(r#"{"type":"weather","payload":{}}"#).await;
        server.push(location_frame(8)).await;
        server.push(location_frame(7)).await;

        let received = topic_rx.recv().await.unwrap();
        assert_matches!(received, InboundMessage::TruckLocationUpdate(ref loc) if loc.truck_id == ResourceId::Int(7));
        assert_eq!(listener_rx.recv().await.unwrap(), "truck_location_update");
        assert_eq!(listener_rx.recv().await.unwrap(), "truck_location_update");

        // 잘못된 프레임은 세션을 끊지 않음
        assert_eq!(session.state(), SessionState::Connected);
        assert!(topic_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_all_handles_closes_link() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = spawn_session(&transport);
        let mut events = session.events();
        let mut server = connect_and_accept(&session, &transport, &mut events).await;
        server.drain();

        drop(session);
        assert_eq!(server.next_frame().await, None);
    }
}
