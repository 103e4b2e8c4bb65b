//! # truckflow
//!
//! TruckFlow 클라이언트 CLI.
//! 실시간 구독 감시, 로그인, 트럭 목록 조회.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use truckflow_app::hub::ApiHub;
use truckflow_app::lifecycle::LifecycleManager;
use truckflow_core::config::AppConfig;
use truckflow_core::config_manager::ConfigManager;
use truckflow_core::models::fleet::LoginRequest;
use truckflow_core::models::realtime::ResourceId;
use truckflow_core::models::session::AuthToken;
use truckflow_core::ports::api_client::FleetApi;
use truckflow_notification::presenter;

/// TruckFlow 차량 관리 클라이언트
#[derive(Parser, Debug)]
#[command(name = "truckflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API 기본 URL (기본: 설정 파일 값)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// WebSocket URL (기본: 설정 파일 값)
    #[arg(long, global = true)]
    ws_url: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', global = true, default_value = "info")]
    log_level: String,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 실시간 업데이트 구독 후 Ctrl-C까지 출력
    Watch {
        /// 인증 토큰 (없으면 저장된 토큰)
        #[arg(long)]
        token: Option<String>,

        /// 위치를 받을 트럭 ID
        #[arg(long = "truck")]
        trucks: Vec<i64>,

        /// 경로 ID
        #[arg(long = "route")]
        routes: Vec<i64>,

        /// 화물 ID
        #[arg(long = "cargo")]
        cargo: Vec<i64>,

        /// 차량 전체 이벤트
        #[arg(long)]
        fleet: bool,
    },

    /// 로그인 후 토큰 저장
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// 트럭 목록 조회
    Trucks {
        /// 운행 중인 트럭만
        #[arg(long)]
        online: bool,
    },
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let mut config = match manager {
        Ok(manager) => {
            info!("설정 파일: {:?}", manager.config_path());
            manager.get()
        }
        Err(e) => {
            warn!("설정 로드 실패, 기본 설정 사용: {e}");
            AppConfig::default_config()
        }
    };

    if let Some(url) = &args.api_url {
        config.server.base_url = url.clone();
    }
    if let Some(url) = &args.ws_url {
        config.server.ws_url = url.clone();
    }
    Ok(config)
}

async fn watch(
    hub: &ApiHub,
    token: Option<String>,
    trucks: &[i64],
    routes: &[i64],
    cargo: &[i64],
    fleet: bool,
) -> Result<()> {
    let targets = trucks
        .iter()
        .map(|id| ("truck", Some(ResourceId::Int(*id))))
        .chain(routes.iter().map(|id| ("route", Some(ResourceId::Int(*id)))))
        .chain(cargo.iter().map(|id| ("cargo", Some(ResourceId::Int(*id)))))
        .chain(fleet.then_some(("fleet", None)));

    for (kind, id) in targets {
        hub.subscribe_to_updates(kind, id).await?;
    }

    let mut updates = hub.updates();
    let mut notifications = hub.notification_events();
    if !hub.connect_realtime(token.map(AuthToken::from)).await? {
        bail!("인증 토큰이 없습니다. `truckflow login` 또는 --token 사용");
    }

    let lifecycle = LifecycleManager::new();
    let mut shutdown = lifecycle.subscribe();
    let signal = tokio::spawn(async move {
        if let Err(e) = lifecycle.wait_for_signal().await {
            warn!("시그널 핸들러 등록 실패: {e}");
        }
    });

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            update = updates.recv() => match update {
                Ok(message) => println!("{} {:?}", message.kind(), message),
                Err(RecvError::Lagged(n)) => warn!("업데이트 {n}건 누락"),
                Err(RecvError::Closed) => break,
            },
            notification = notifications.recv() => match notification {
                Ok(n) => println!("{}", presenter::present(&n).line()),
                Err(RecvError::Lagged(n)) => warn!("알림 {n}건 누락"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    signal.abort();
    hub.disconnect_realtime().await?;
    info!("감시 종료");
    Ok(())
}

async fn login(hub: &ApiHub, email: String, password: String) -> Result<()> {
    let response = hub
        .api_call(hub.tokens().login(&LoginRequest { email, password }))
        .await
        .context("로그인 실패")?;

    println!("로그인 성공");
    if let Some(user) = response.user {
        println!("{}", serde_json::to_string_pretty(&user)?);
    }
    Ok(())
}

async fn list_trucks(hub: &ApiHub, online: bool) -> Result<()> {
    let api = hub.api().clone();
    let trucks = if online {
        hub.cached_api_call("trucks:online", || async move { api.online_trucks().await })
            .await
    } else {
        hub.cached_api_call("trucks", || async move { api.trucks().await })
            .await
    }
    .context("트럭 목록 조회 실패")?;

    println!("{}", serde_json::to_string_pretty(&trucks)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "truckflow={},truckflow_app={},truckflow_core={},truckflow_network={},truckflow_notification={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let config = load_config(&args)?;
    info!(
        "TruckFlow 클라이언트 시작 (API: {}, WS: {})",
        config.server.base_url,
        truckflow_network::ws_client::redact_url(&config.server.ws_url)
    );

    let hub = ApiHub::from_config(&config)
        .await
        .context("API 허브 초기화 실패")?;

    match args.command {
        Command::Watch {
            token,
            trucks,
            routes,
            cargo,
            fleet,
        } => watch(&hub, token, &trucks, &routes, &cargo, fleet).await,
        Command::Login { email, password } => login(&hub, email, password).await,
        Command::Trucks { online } => list_trucks(&hub, online).await,
    }
}
