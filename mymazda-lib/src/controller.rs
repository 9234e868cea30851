//! Thin remote-service wrappers on top of [`Connection`]

use crate::connection::{ApiRequest, Connection};
use crate::constants::{INTERNAL_USER_ID_PLACEHOLDER, SUCCESS_RESULT_CODE};
use crate::error::MazdaError;
use serde_json::{Value, json};

/// Fail with [`MazdaError::Domain`] unless `resultCode` is the success code
pub fn check_result_code(response: Value, action: &str) -> Result<Value, MazdaError> {
    match response.get("resultCode").and_then(Value::as_str) {
        Some(SUCCESS_RESULT_CODE) => Ok(response),
        other => Err(MazdaError::Domain {
            action: action.to_string(),
            result_code: other.unwrap_or("<missing>").to_string(),
        }),
    }
}

/// Remote actions that target one vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VehicleAction {
    DoorLock,
    DoorUnlock,
    LightOn,
    LightOff,
    EngineStart,
    EngineStop,
}

impl VehicleAction {
    fn endpoint(self) -> &'static str {
        match self {
            VehicleAction::DoorLock => "remoteServices/doorLock/v4",
            VehicleAction::DoorUnlock => "remoteServices/doorUnlock/v4",
            VehicleAction::LightOn => "remoteServices/lightOn/v4",
            VehicleAction::LightOff => "remoteServices/lightOff/v4",
            VehicleAction::EngineStart => "remoteServices/engineStart/v4",
            VehicleAction::EngineStop => "remoteServices/engineStop/v4",
        }
    }

    fn description(self) -> &'static str {
        match self {
            VehicleAction::DoorLock => "lock door",
            VehicleAction::DoorUnlock => "unlock door",
            VehicleAction::LightOn => "turn light on",
            VehicleAction::LightOff => "turn light off",
            VehicleAction::EngineStart => "start engine",
            VehicleAction::EngineStop => "stop engine",
        }
    }
}

pub struct Controller {
    connection: Connection,
}

impl Controller {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Terms and conditions
    pub async fn get_tac(&self) -> Result<Value, MazdaError> {
        self.connection.api_request(&ApiRequest::get("content/getTac/v4")).await
    }

    pub async fn get_language_pkg(&self) -> Result<Value, MazdaError> {
        let request = ApiRequest::post("junction/getLanguagePkg/v4").body(json!({
            "platformType": "ANDROID",
            "region": self.connection.config().region.to_string(),
            "version": "2.0.4",
        }))?;
        self.connection.api_request(&request).await
    }

    /// Vehicles registered to the account
    pub async fn get_vec_base_infos(&self) -> Result<Value, MazdaError> {
        let request = ApiRequest::post("remoteServices/getVecBaseInfos/v4")
            .body(json!({ "internaluserid": INTERNAL_USER_ID_PLACEHOLDER }))?
            .authenticated();
        self.connection.api_request(&request).await
    }

    pub async fn get_vehicle_status(&self, internal_vin: &str) -> Result<Value, MazdaError> {
        let request = ApiRequest::post("remoteServices/getVehicleStatus/v4")
            .body(json!({
                "internaluserid": INTERNAL_USER_ID_PLACEHOLDER,
                "internalvin": internal_vin,
                "limit": 1,
                "offset": 0,
                "vecinfotype": "0",
            }))?
            .authenticated();
        check_result_code(self.connection.api_request(&request).await?, "get vehicle status")
    }

    pub async fn get_health_report(&self, internal_vin: &str) -> Result<Value, MazdaError> {
        let request = ApiRequest::post("remoteServices/getHealthReport/v4")
            .body(json!({
                "internaluserid": INTERNAL_USER_ID_PLACEHOLDER,
                "internalvin": internal_vin,
                "limit": 1,
                "offset": 0,
            }))?
            .authenticated();
        check_result_code(self.connection.api_request(&request).await?, "get health report")
    }

    pub async fn door_lock(&self, internal_vin: &str) -> Result<Value, MazdaError> {
        self.vehicle_action(VehicleAction::DoorLock, internal_vin).await
    }

    pub async fn door_unlock(&self, internal_vin: &str) -> Result<Value, MazdaError> {
        self.vehicle_action(VehicleAction::DoorUnlock, internal_vin).await
    }

    /// Hazard lights on
    pub async fn light_on(&self, internal_vin: &str) -> Result<Value, MazdaError> {
        self.vehicle_action(VehicleAction::LightOn, internal_vin).await
    }

    pub async fn light_off(&self, internal_vin: &str) -> Result<Value, MazdaError> {
        self.vehicle_action(VehicleAction::LightOff, internal_vin).await
    }

    pub async fn engine_start(&self, internal_vin: &str) -> Result<Value, MazdaError> {
        self.vehicle_action(VehicleAction::EngineStart, internal_vin).await
    }

    pub async fn engine_stop(&self, internal_vin: &str) -> Result<Value, MazdaError> {
        self.vehicle_action(VehicleAction::EngineStop, internal_vin).await
    }

    async fn vehicle_action(&self, action: VehicleAction, internal_vin: &str) -> Result<Value, MazdaError> {
        let request = ApiRequest::post(action.endpoint())
            .body(json!({
                "internaluserid": INTERNAL_USER_ID_PLACEHOLDER,
                "internalvin": internal_vin,
            }))?
            .authenticated();
        check_result_code(self.connection.api_request(&request).await?, action.description())
    }

    pub fn close(self) {
        self.connection.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_code_success() {
        let response = json!({"resultCode": "200S00", "vehicles": []});
        assert_eq!(check_result_code(response.clone(), "lock door").unwrap(), response);
    }

    #[test]
    fn test_check_result_code_failure_names_action() {
        let err = check_result_code(json!({"resultCode": "500E00"}), "lock door").unwrap_err();
        assert_eq!(err.to_string(), "Failed to lock door (result code 500E00)");
        assert!(matches!(err, MazdaError::Domain { .. }));

        let err = check_result_code(json!({}), "start engine").unwrap_err();
        assert!(matches!(err, MazdaError::Domain { ref result_code, .. } if result_code == "<missing>"));
    }

    #[test]
    fn test_vehicle_action_endpoints() {
        assert_eq!(VehicleAction::EngineStart.endpoint(), "remoteServices/engineStart/v4");
        assert_eq!(VehicleAction::DoorUnlock.description(), "unlock door");
    }
}
