//! REST 엔드포인트 테이블.
//!
//! 경로 템플릿은 `{name}` 자리표시자를 포함하며 [`Endpoint::path`]로 채운다.

use truckflow_core::error::CoreError;

/// 서버 REST 엔드포인트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Register,
    Companies,
    Users,
    Drivers,
    Trucks,
    TrucksOnline,
    TruckLocation,
    TruckApprove,
    MyTruck,
    Routes,
    RouteApprove,
    RouteStops,
    RouteStopComplete,
    Cargo,
    CargoUnassigned,
    CargoAssign,
    CargoUnassign,
    CargoEvents,
    CargoLocation,
    CargoTrack,
    TruckCargo,
    Visits,
    Tasks,
    TaskComplete,
    Requests,
    RequestAccept,
    RequestTerminate,
    Branches,
    WebSocket,
}

impl Endpoint {
    /// 경로 템플릿 (base URL 기준 상대 경로)
    pub fn template(&self) -> &'static str {
        match self {
            Endpoint::Login => "/auth/login",
            Endpoint::Register => "/auth/register",
            Endpoint::Companies => "/companies",
            Endpoint::Users => "/users",
            Endpoint::Drivers => "/users/drivers",
            Endpoint::Trucks => "/trucks",
            Endpoint::TrucksOnline => "/trucks/online",
            Endpoint::TruckLocation => "/trucks/{id}/location",
            Endpoint::TruckApprove => "/trucks/{id}/approve",
            Endpoint::MyTruck => "/trucks/my-truck",
            Endpoint::Routes => "/routes",
            Endpoint::RouteApprove => "/routes/{id}/approve",
            Endpoint::RouteStops => "/routes/{id}/stops",
            Endpoint::RouteStopComplete => "/route-stops/{id}/complete",
            Endpoint::Cargo => "/cargo",
            Endpoint::CargoUnassigned => "/cargo/unassigned",
            Endpoint::CargoAssign => "/cargo/{id}/assign",
            Endpoint::CargoUnassign => "/cargo/{id}/unassign",
            Endpoint::CargoEvents => "/cargo/{id}/events",
            Endpoint::CargoLocation => "/cargo/{id}/location",
            Endpoint::CargoTrack => "/cargo/track/{tracking_number}",
            Endpoint::TruckCargo => "/trucks/{truck_id}/cargo",
            Endpoint::Visits => "/visits",
            Endpoint::Tasks => "/tasks",
            Endpoint::TaskComplete => "/tasks/{id}/complete",
            Endpoint::Requests => "/requests",
            Endpoint::RequestAccept => "/requests/{id}/accept",
            Endpoint::RequestTerminate => "/requests/{id}/terminate",
            Endpoint::Branches => "/branches",
            Endpoint::WebSocket => "/ws",
        }
    }

    /// 자리표시자를 채운 경로
    ///
    /// 값은 경로 세그먼트 하나로 퍼센트 인코딩된다.
    /// 템플릿의 `{name}`에 해당하는 값이 없으면 `Validation` 에러.
    pub fn path(&self, params: &[(&str, &str)]) -> Result<String, CoreError> {
        let template = self.template();
        let mut path = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            path.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').unwrap_or(after.len());
            let name = &after[..end];

            let value = params
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| CoreError::Validation {
                    field: name.to_string(),
                    message: format!("경로 파라미터 누락: {template}"),
                })?;
            path.push_str(&encode_segment(name, value)?);
            rest = after.get(end + 1..).unwrap_or_default();
        }

        path.push_str(rest);
        Ok(path)
    }

    /// `{id}` 하나만 받는 경로 단축형
    pub fn with_id(&self, id: &str) -> Result<String, CoreError> {
        self.path(&[("id", id)])
    }

    /// 컬렉션 하위 개별 항목 경로 (`/trucks/7` 형태)
    pub fn item(&self, id: &str) -> String {
        format!("{}/{id}", self.template())
    }
}

/// 경로 세그먼트 인코딩 (`/`, `?`, `{` 등은 모두 `%XX`)
fn encode_segment(name: &str, value: &str) -> Result<String, CoreError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(CoreError::Validation {
            field: name.to_string(),
            message: format!("잘못된 경로 파라미터: {value:?}"),
        });
    }
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    Ok(encoded.replace('+', "%20"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_paths() {
        assert_eq!(Endpoint::Login.path(&[]).unwrap(), "/auth/login");
        assert_eq!(Endpoint::TrucksOnline.path(&[]).unwrap(), "/trucks/online");
        assert_eq!(Endpoint::WebSocket.template(), "/ws");
    }

    #[test]
    fn placeholder_substitution() {
        assert_eq!(
            Endpoint::TruckLocation.with_id("42").unwrap(),
            "/trucks/42/location"
        );
        assert_eq!(
            Endpoint::CargoTrack
                .path(&[("tracking_number", "TRK-001")])
                .unwrap(),
            "/cargo/track/TRK-001"
        );
        assert_eq!(
            Endpoint::TruckCargo.path(&[("truck_id", "9")]).unwrap(),
            "/trucks/9/cargo"
        );
    }

    #[test]
    fn missing_parameter_is_validation_error() {
        let err = Endpoint::RouteStops.path(&[]).unwrap_err();
        match err {
            CoreError::Validation { field, .. } => assert_eq!(field, "id"),
            other => panic!("예상치 못한 에러: {other:?}"),
        }
    }

    #[test]
    fn values_are_encoded_as_one_segment() {
        assert_eq!(
            Endpoint::CargoTrack
                .path(&[("tracking_number", "TRK/../x?y")])
                .unwrap(),
            "/cargo/track/TRK%2F..%2Fx%3Fy"
        );
        assert_eq!(
            Endpoint::CargoTrack
                .path(&[("tracking_number", "A{1} B+C")])
                .unwrap(),
            "/cargo/track/A%7B1%7D%20B%2BC"
        );
    }

    #[test]
    fn dot_segments_are_rejected() {
        for value in ["", ".", ".."] {
            let err = Endpoint::CargoTrack
                .path(&[("tracking_number", value)])
                .unwrap_err();
            match err {
                CoreError::Validation { field, .. } => assert_eq!(field, "tracking_number"),
                other => panic!("예상치 못한 에러: {other:?}"),
            }
        }
    }

    #[test]
    fn item_path() {
        assert_eq!(Endpoint::Trucks.item("7"), "/trucks/7");
    }
}
