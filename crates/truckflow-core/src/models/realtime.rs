//! 실시간 프레임 모델.
//!
//! WebSocket으로 주고받는 JSON 프레임. 송신은 `OutboundFrame`(auth/subscribe/unsubscribe),
//! 수신은 `type` 판별자를 가진 `InboundMessage`로 디코딩한다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::CoreError;
use crate::models::fleet::{CargoStatus, RouteStatus, TruckStatus};
use crate::models::notification::{NotificationType, Priority};
use crate::models::session::AuthToken;

/// 구독 채널
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// 트럭 위치/상태 (트럭 ID 필요)
    TruckLocation,
    /// 경로 변경 (경로 ID 필요)
    RouteUpdates,
    /// 화물 변경 (화물 ID 필요)
    CargoUpdates,
    /// 차량 전체 이벤트 (리소스 ID 없음)
    FleetUpdates,
}

impl Topic {
    /// 와이어 채널 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::TruckLocation => "truck_location",
            Topic::RouteUpdates => "route_updates",
            Topic::CargoUpdates => "cargo_updates",
            Topic::FleetUpdates => "fleet_updates",
        }
    }

    /// 리소스 ID가 필요한 채널인지
    pub fn is_resource_scoped(&self) -> bool {
        !matches!(self, Topic::FleetUpdates)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 리소스 식별자 (서버는 정수, 일부 화면은 문자열 사용)
///
/// 비교와 해시는 정규 정수 문자열을 정수로 본다: `Int(7) == Str("7")`, `Str("07")`은 별개.
/// 와이어 표현은 받은 그대로 유지한다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Str(String),
}

impl ResourceId {
    /// 정수 값 (정규 정수 문자열 포함)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ResourceId::Int(id) => Some(*id),
            ResourceId::Str(s) => s.parse::<i64>().ok().filter(|n| n.to_string() == *s),
        }
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_int(), other.as_int()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.to_string() == other.to_string(),
            _ => false,
        }
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match (self.as_int(), self) {
            (Some(id), _) => id.hash(state),
            (None, ResourceId::Str(s)) => s.hash(state),
            (None, ResourceId::Int(id)) => id.hash(state),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(id) => write!(f, "{id}"),
            ResourceId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        ResourceId::Int(id)
    }
}

impl From<i32> for ResourceId {
    fn from(id: i32) -> Self {
        ResourceId::Int(i64::from(id))
    }
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        ResourceId::Int(i64::from(id))
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId::Str(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        ResourceId::Str(id)
    }
}

/// 논리 구독 키: (채널, 리소스 ID?)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub topic: Topic,
    pub resource_id: Option<ResourceId>,
}

impl SubscriptionKey {
    /// 구독 키 생성
    ///
    /// 리소스 범위 채널에 ID가 없거나, `fleet_updates`에 ID가 주어지면 Validation 에러.
    pub fn new(topic: Topic, resource_id: Option<ResourceId>) -> Result<Self, CoreError> {
        match (topic.is_resource_scoped(), &resource_id) {
            (true, None) => Err(CoreError::Validation {
                field: "resource_id".to_string(),
                message: format!("{topic} 채널은 리소스 ID가 필요함"),
            }),
            (false, Some(_)) => Err(CoreError::Validation {
                field: "resource_id".to_string(),
                message: format!("{topic} 채널은 리소스 ID를 받지 않음"),
            }),
            _ => Ok(Self { topic, resource_id }),
        }
    }

    /// 트럭 위치 구독 키
    pub fn truck(id: impl Into<ResourceId>) -> Self {
        Self {
            topic: Topic::TruckLocation,
            resource_id: Some(id.into()),
        }
    }

    /// 경로 구독 키
    pub fn route(id: impl Into<ResourceId>) -> Self {
        Self {
            topic: Topic::RouteUpdates,
            resource_id: Some(id.into()),
        }
    }

    /// 화물 구독 키
    pub fn cargo(id: impl Into<ResourceId>) -> Self {
        Self {
            topic: Topic::CargoUpdates,
            resource_id: Some(id.into()),
        }
    }

    /// 차량 전체 구독 키
    pub fn fleet() -> Self {
        Self {
            topic: Topic::FleetUpdates,
            resource_id: None,
        }
    }

    /// 이 키에 대한 subscribe 제어 프레임
    pub fn subscribe_frame(&self) -> OutboundFrame {
        OutboundFrame::Subscribe(ChannelRef::from(self))
    }

    /// 이 키에 대한 unsubscribe 제어 프레임
    pub fn unsubscribe_frame(&self) -> OutboundFrame {
        OutboundFrame::Unsubscribe(ChannelRef::from(self))
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_id {
            Some(id) => write!(f, "{}:{}", self.topic, id),
            None => write!(f, "{}", self.topic),
        }
    }
}

// ============================================================
// 송신 프레임
// ============================================================

/// 제어 프레임의 채널 참조 (`channel` + 채널별 ID 필드)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub channel: Topic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truck_id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cargo_id: Option<ResourceId>,
}

impl From<&SubscriptionKey> for ChannelRef {
    fn from(key: &SubscriptionKey) -> Self {
        let mut channel = ChannelRef {
            channel: key.topic,
            truck_id: None,
            route_id: None,
            cargo_id: None,
        };
        match key.topic {
            Topic::TruckLocation => channel.truck_id = key.resource_id.clone(),
            Topic::RouteUpdates => channel.route_id = key.resource_id.clone(),
            Topic::CargoUpdates => channel.cargo_id = key.resource_id.clone(),
            Topic::FleetUpdates => {}
        }
        channel
    }
}

impl ChannelRef {
    /// 구독 키로 되돌리기
    pub fn key(&self) -> SubscriptionKey {
        let resource_id = self
            .truck_id
            .clone()
            .or_else(|| self.route_id.clone())
            .or_else(|| self.cargo_id.clone());
        SubscriptionKey {
            topic: self.channel,
            resource_id,
        }
    }
}

/// 클라이언트 → 서버 프레임
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// 연결 직후 인증
    Auth { token: AuthToken },
    /// 채널 구독
    Subscribe(ChannelRef),
    /// 채널 구독 해제
    Unsubscribe(ChannelRef),
}

impl OutboundFrame {
    /// JSON 텍스트로 직렬화
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// 프레임 종류 (로그용, 토큰 미포함)
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundFrame::Auth { .. } => "auth",
            OutboundFrame::Subscribe(_) => "subscribe",
            OutboundFrame::Unsubscribe(_) => "unsubscribe",
        }
    }
}

// ============================================================
// 수신 프레임
// ============================================================

/// 트럭 위치 업데이트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckLocation {
    #[serde(alias = "truckId")]
    pub truck_id: ResourceId,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng")]
    pub longitude: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// 트럭 상태 업데이트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckStatusChange {
    #[serde(alias = "truckId")]
    pub truck_id: ResourceId,
    pub status: TruckStatus,
}

/// 경로 업데이트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteChange {
    #[serde(alias = "routeId", alias = "id")]
    pub route_id: ResourceId,
    #[serde(default)]
    pub status: Option<RouteStatus>,
    /// 나머지 필드 (정류장, 이름 등)
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// 화물 업데이트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoChange {
    #[serde(alias = "cargoId", alias = "id")]
    pub cargo_id: ResourceId,
    #[serde(default)]
    pub status: Option<CargoStatus>,
    /// 나머지 필드 (위치, 추적 번호 등)
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// 운전자 상태 업데이트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStatusChange {
    #[serde(default, alias = "driverId")]
    pub driver_id: Option<ResourceId>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// 서버 경보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// 서버 알림
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<NotificationType>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    TruckLocationUpdate(TruckLocation),
    TruckStatusUpdate(TruckStatusChange),
    RouteUpdate(RouteChange),
    CargoUpdate(CargoChange),
    DriverStatusUpdate(DriverStatusChange),
    Alert(AlertPayload),
    Notification(NotificationPayload),
    /// 알 수 없는 `type`: 로그 후 폐기
    Unknown { kind: String, raw: serde_json::Value },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, alias = "data")]
    payload: serde_json::Value,
}

impl InboundMessage {
    /// 텍스트 프레임 디코딩
    ///
    /// JSON이 아니거나 payload가 타입과 맞지 않으면 `CoreError::Protocol`.
    /// 알 수 없는 `type`은 에러가 아니라 `Unknown`으로 반환한다.
    pub fn decode(text: &str) -> Result<Self, CoreError> {
        let raw: RawFrame = serde_json::from_str(text)
            .map_err(|e| CoreError::Protocol(format!("프레임 파싱 실패: {e}")))?;

        let payload = raw.payload;
        let message = match raw.kind.as_str() {
            // 서버 허브는 `location_update`로도 송신
            "truck_location_update" | "location_update" => {
                InboundMessage::TruckLocationUpdate(parse_payload(&raw.kind, payload)?)
            }
            "truck_status_update" => {
                InboundMessage::TruckStatusUpdate(parse_payload(&raw.kind, payload)?)
            }
            "route_update" => InboundMessage::RouteUpdate(parse_payload(&raw.kind, payload)?),
            "cargo_update" | "cargo_updated" | "cargo_location_update" => {
                InboundMessage::CargoUpdate(parse_payload(&raw.kind, payload)?)
            }
            "driver_status_update" => {
                InboundMessage::DriverStatusUpdate(parse_payload(&raw.kind, payload)?)
            }
            "alert" => InboundMessage::Alert(parse_payload(&raw.kind, payload)?),
            "notification" => InboundMessage::Notification(parse_payload(&raw.kind, payload)?),
            _ => InboundMessage::Unknown {
                kind: raw.kind,
                raw: payload,
            },
        };
        Ok(message)
    }

    /// 메시지 타입 이름
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::TruckLocationUpdate(_) => "truck_location_update",
            InboundMessage::TruckStatusUpdate(_) => "truck_status_update",
            InboundMessage::RouteUpdate(_) => "route_update",
            InboundMessage::CargoUpdate(_) => "cargo_update",
            InboundMessage::DriverStatusUpdate(_) => "driver_status_update",
            InboundMessage::Alert(_) => "alert",
            InboundMessage::Notification(_) => "notification",
            InboundMessage::Unknown { kind, .. } => kind,
        }
    }

    /// 이 메시지가 전달될 구독 키
    ///
    /// 트럭 이벤트는 `truck_location:<id>`, 경로/화물은 각 채널의 ID,
    /// 운전자/경보/알림은 `fleet_updates`. 알 수 없는 메시지는 None.
    pub fn routing_key(&self) -> Option<SubscriptionKey> {
        match self {
            InboundMessage::TruckLocationUpdate(p) => Some(SubscriptionKey::truck(p.truck_id.clone())),
            InboundMessage::TruckStatusUpdate(p) => Some(SubscriptionKey::truck(p.truck_id.clone())),
            InboundMessage::RouteUpdate(p) => Some(SubscriptionKey::route(p.route_id.clone())),
            InboundMessage::CargoUpdate(p) => Some(SubscriptionKey::cargo(p.cargo_id.clone())),
            InboundMessage::DriverStatusUpdate(_)
            | InboundMessage::Alert(_)
            | InboundMessage::Notification(_) => Some(SubscriptionKey::fleet()),
            InboundMessage::Unknown { .. } => None,
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    payload: serde_json::Value,
) -> Result<T, CoreError> {
    serde_json::from_value(payload)
        .map_err(|e| CoreError::Protocol(format!("{kind} payload 불일치: {e}")))
}
