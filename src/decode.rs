//! Maps raw vendor device entries onto normalized [`DeviceRecord`]s.
//!
//! Each entry in a group listing carries identity fields plus an embedded
//! JSON-encoded status blob under `device_json_object`. Decoding is pure:
//! identical input always yields an identical record. Any failure is scoped
//! to the one device, never the batch.

use serde_json::Value;

use crate::types::{ActiveModeKey, CapabilityOverrides, DeviceRecord, FanMode, HvacMode, Placement};
use crate::{Error, Result};

/// Stringify an id field that the vendor sends as either a string or a
/// number, depending on endpoint.
pub(crate) fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strip the one-character unit prefix and parse the remainder ("c20.0" → 20.0).
pub(crate) fn parse_unit_temp(s: &str) -> Option<f64> {
    let mut chars = s.chars();
    chars.next()?;
    chars.as_str().parse().ok()
}

fn entry_mac(entry: &Value) -> Option<String> {
    entry
        .get("mac")
        .and_then(id_string)
        .or_else(|| entry.get("id").and_then(id_string))
}

fn entry_name(entry: &Value) -> String {
    entry
        .get("dis_dev_name")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string()
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "0" && s != "false",
        _ => false,
    }
}

/// Integer blob field: absent means `default`, present-but-unparseable is a
/// hard failure for the device. Codes arrive as strings or numbers.
fn int_field(blob: &Value, key: &str, default: i64) -> std::result::Result<i64, String> {
    match blob.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| format!("{key} is not an integer: {n}")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| format!("{key} is not an integer: {s:?}")),
        Some(Value::Bool(b)) => Ok(*b as i64),
        Some(other) => Err(format!("{key} has unexpected type: {other}")),
    }
}

/// Unit-prefixed temperature field with a vendor default for absence.
fn temp_field(blob: &Value, key: &str, default: &str) -> std::result::Result<f64, String> {
    let raw = match blob.get(key) {
        None | Some(Value::Null) => default,
        Some(Value::String(s)) => s.as_str(),
        Some(other) => return Err(format!("{key} has unexpected type: {other}")),
    };
    parse_unit_temp(raw).ok_or_else(|| format!("{key} is not a unit-prefixed number: {raw:?}"))
}

/// Decode one device entry into a full record.
///
/// Returns `Error::Parse` when the status blob is malformed; the caller
/// downgrades to [`partial_record`] instead of aborting the batch.
pub fn decode(
    entry: &Value,
    placement: &Placement,
    overrides: &CapabilityOverrides,
) -> Result<DeviceRecord> {
    let name = entry_name(entry);
    let mac = entry_mac(entry).ok_or_else(|| Error::Parse {
        device: name.clone(),
        reason: "entry missing mac".to_string(),
    })?;

    let raw_blob = entry
        .get("device_json_object")
        .and_then(|v| v.as_str())
        .unwrap_or("{}");
    let blob: Value = serde_json::from_str(raw_blob).map_err(|e| Error::Parse {
        device: name.clone(),
        reason: format!("status blob is not valid JSON: {e}"),
    })?;

    build_record(mac, name.clone(), entry, &blob, placement, overrides)
        .map_err(|reason| Error::Parse { device: name, reason })
}

fn build_record(
    mac: String,
    name: String,
    entry: &Value,
    blob: &Value,
    placement: &Placement,
    overrides: &CapabilityOverrides,
) -> std::result::Result<DeviceRecord, String> {
    let supports_fan = overrides
        .fan
        .unwrap_or_else(|| truthy(blob.get("dirty_fan_mod")));
    let supports_heat = overrides
        .heat
        .unwrap_or_else(|| truthy(blob.get("dirty_heat_mode")));
    let supports_cool = overrides
        .cool
        .unwrap_or_else(|| truthy(blob.get("dirty_temp_cool")));

    let status_onoff = int_field(blob, "status_onoff", 0)?;
    let status = int_field(blob, "status", 2)?;

    // Cool-capable units report through the temp_cool field set, everything
    // else through temp_heat.
    let key = if supports_cool {
        ActiveModeKey::Cool
    } else {
        ActiveModeKey::Heat
    };

    // Power flag wins over the status code; unknown codes read as off.
    let hvac_mode = if status_onoff == 1 {
        HvacMode::from_status(status).unwrap_or(HvacMode::Off)
    } else {
        HvacMode::Off
    };

    let current = temp_field(blob, "dis_temp", "c20.0")?;
    let target = temp_field(blob, &format!("temp_{}", key.as_field_key()), "c22.0")?;
    let max = temp_field(
        blob,
        &format!("temp_{}_default_max", key.as_field_key()),
        "c30.0",
    )?;
    let min = temp_field(
        blob,
        &format!("temp_{}_default_min", key.as_field_key()),
        "c10.0",
    )?;

    let fan_mode = if supports_fan {
        let code = int_field(blob, "fan_mod", 0)?;
        Some(FanMode::from_vendor_code(code).unwrap_or(FanMode::Auto))
    } else {
        None
    };

    Ok(DeviceRecord {
        mac,
        name,
        house_id: placement.house_id.clone(),
        house_name: placement.house_name.clone(),
        group_id: placement.group_id.clone(),
        group_name: placement.group_name.clone(),
        supports_fan,
        supports_heat,
        supports_cool,
        hvac_mode: Some(hvac_mode),
        fan_mode,
        current_temperature: Some(current),
        target_temperature: Some(target),
        min_temp: Some(min),
        max_temp: Some(max),
        available: truthy(entry.get("is_enabled")),
        active_mode_key: Some(key),
    })
}

/// Identity-only fallback for an entry whose status blob failed to decode.
/// Returns `None` when the entry carries no usable id at all.
pub fn partial_record(entry: &Value, placement: &Placement) -> Option<DeviceRecord> {
    let mac = entry_mac(entry)?;
    Some(DeviceRecord {
        mac,
        name: entry_name(entry),
        house_id: placement.house_id.clone(),
        house_name: placement.house_name.clone(),
        group_id: placement.group_id.clone(),
        group_name: placement.group_name.clone(),
        available: truthy(entry.get("is_enabled")),
        ..Default::default()
    })
}
