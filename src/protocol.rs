use serde_json::{json, Map, Value};

use crate::types::{ActiveModeKey, FanMode, HvacMode, LoginType};

pub const DEFAULT_BASE_URL: &str = "https://yunpan.hailin.com";

pub const LOGIN_PATH: &str = "/user/v1/user/login";
pub const HOUSE_PATH: &str = "/device/v1/device/house";
pub const GROUP_LIST_PATH: &str = "/device/v1/device/group/findUserGroup";
pub const CONTROL_PATH: &str = "/device/api/device/operationDevice";

// The vendor gate rejects unknown clients; this signature must match the
// mobile app byte-for-byte.
pub const USER_AGENT: &str = "okhttp/3.8.0";

pub const CLIENT_ID: u32 = 1;
pub const CLIENT_SECRET: &str = "d0404a5b1b5d6b6a6db049d441804188";

pub fn login_payload(login_type: LoginType, username: &str, password: &str) -> Value {
    json!({
        "clientId": CLIENT_ID,
        "client_secret": CLIENT_SECRET,
        "username": username,
        "password": password,
        "oauth_type": login_type.as_oauth_type(),
    })
}

pub fn group_list_path(house_id: &str) -> String {
    format!("{GROUP_LIST_PATH}?house_id={house_id}&of_all=0")
}

/// Temperatures travel as strings with a one-character unit prefix.
/// Integral values keep one decimal place ("c22.0").
pub fn format_unit_temp(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("c{value:.1}")
    } else {
        format!("c{value}")
    }
}

/// Operation switching the power flag and, for powered-on modes, the
/// status code. The flag is a string, the status an integer.
pub fn set_mode_operation(mode: HvacMode) -> String {
    let op = match mode.as_status() {
        None => json!({ "status_onoff": "0" }),
        Some(code) => json!({ "status_onoff": "1", "status": code }),
    };
    op.to_string()
}

/// Operation writing the target temperature into whichever of the parallel
/// heat/cool field sets is active for the device.
pub fn set_temperature_operation(key: ActiveModeKey, value: f64) -> String {
    let mut op = Map::new();
    op.insert("heat_mode".to_string(), json!(0));
    op.insert(
        format!("temp_{}", key.as_field_key()),
        Value::String(format_unit_temp(value)),
    );
    Value::Object(op).to_string()
}

pub fn set_fan_operation(mode: FanMode) -> String {
    json!({ "fan_mod": mode.as_vendor_code().to_string() }).to_string()
}

/// Envelope posted to the control endpoint: the operation rides inside as a
/// JSON-encoded string, not a nested object.
pub fn control_envelope(mac: &str, operation: &str) -> Value {
    json!({ "mac": mac, "operation": operation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::parse_unit_temp;

    #[test]
    fn off_operation_uses_power_flag_only() {
        assert_eq!(set_mode_operation(HvacMode::Off), r#"{"status_onoff":"0"}"#);
    }

    #[test]
    fn on_operations_carry_status_code() {
        for (mode, code) in [
            (HvacMode::Heat, 7),
            (HvacMode::Cool, 1),
            (HvacMode::FanOnly, 5),
        ] {
            let op: Value = serde_json::from_str(&set_mode_operation(mode)).unwrap();
            assert_eq!(op["status_onoff"], "1");
            assert_eq!(op["status"], code);
        }
    }

    #[test]
    fn mode_operations_round_trip_through_status_table() {
        for mode in [HvacMode::Heat, HvacMode::Cool, HvacMode::FanOnly] {
            let op: Value = serde_json::from_str(&set_mode_operation(mode)).unwrap();
            let code = op["status"].as_i64().unwrap();
            assert_eq!(HvacMode::from_status(code), Some(mode));
        }
    }

    #[test]
    fn temperature_operation_targets_active_field_set() {
        let op: Value =
            serde_json::from_str(&set_temperature_operation(ActiveModeKey::Heat, 22.5)).unwrap();
        assert_eq!(op["heat_mode"], 0);
        assert_eq!(op["temp_heat"], "c22.5");
        assert!(op.get("temp_cool").is_none());

        let op: Value =
            serde_json::from_str(&set_temperature_operation(ActiveModeKey::Cool, 24.0)).unwrap();
        assert_eq!(op["temp_cool"], "c24.0");
    }

    #[test]
    fn temperature_value_round_trips() {
        assert_eq!(format_unit_temp(22.5), "c22.5");
        assert_eq!(parse_unit_temp(&format_unit_temp(22.5)), Some(22.5));
        assert_eq!(format_unit_temp(22.0), "c22.0");
        assert_eq!(parse_unit_temp(&format_unit_temp(22.0)), Some(22.0));
    }

    #[test]
    fn fan_operation_sends_code_as_string() {
        assert_eq!(set_fan_operation(FanMode::Low), r#"{"fan_mod":"3"}"#);
        for mode in [FanMode::Auto, FanMode::Low, FanMode::Medium, FanMode::High] {
            let op: Value = serde_json::from_str(&set_fan_operation(mode)).unwrap();
            let code: i64 = op["fan_mod"].as_str().unwrap().parse().unwrap();
            assert_eq!(FanMode::from_vendor_code(code), Some(mode));
        }
    }

    #[test]
    fn envelope_embeds_operation_as_string() {
        let envelope = control_envelope("10:20:30", r#"{"status_onoff":"0"}"#);
        assert_eq!(envelope["mac"], "10:20:30");
        assert_eq!(envelope["operation"], r#"{"status_onoff":"0"}"#);
        // The embedded string is itself valid JSON.
        let inner: Value =
            serde_json::from_str(envelope["operation"].as_str().unwrap()).unwrap();
        assert_eq!(inner["status_onoff"], "0");
    }

    #[test]
    fn login_payload_matches_vendor_contract() {
        let payload = login_payload(LoginType::Mobile, "13800000000", "secret");
        assert_eq!(payload["clientId"], 1);
        assert_eq!(payload["client_secret"], CLIENT_SECRET);
        assert_eq!(payload["oauth_type"], "mobile");
        assert_eq!(payload["username"], "13800000000");
        assert_eq!(payload["password"], "secret");
    }

    #[test]
    fn group_list_path_carries_house_query() {
        assert_eq!(
            group_list_path("77"),
            "/device/v1/device/group/findUserGroup?house_id=77&of_all=0"
        );
    }
}
