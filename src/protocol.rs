use crate::error::{Result, SnapmakerError};
use crate::types::DiscoveryRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::net::Ipv4Addr;

/// Probe payload broadcast to find printers
pub const DISCOVER_MESSAGE: &[u8] = b"discover";

/// Keys stripped from the diagnostic copy of the status payload
pub const SENSITIVE_API_KEYS: &[&str] = &["token"];

/// Fragments that make an unexpected key worth a warning
const SUSPICIOUS_KEY_FRAGMENTS: &[&str] = &["token", "secret", "password", "passwd", "credential"];

const QUOTES: &[char] = &['\'', '"'];

/// Parse a discovery reply of the form `IP@<address>|Model:<model>|Status:<status>`.
///
/// Some firmware wraps the reply (or single fields) in quotes; those are stripped.
pub fn parse_discovery_reply(raw: &[u8]) -> Result<DiscoveryRecord> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| SnapmakerError::MalformedResponse("discovery reply is not UTF-8".to_string()))?;
    let text = text.trim().trim_matches(QUOTES);

    let mut fields = text.split('|').map(|f| f.trim().trim_matches(QUOTES));
    let (Some(ip_field), Some(model_field), Some(status_field), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed_reply(text, "expected three '|' separated fields"));
    };

    let address = tagged_value(ip_field, "IP", '@')
        .and_then(|ip| ip.parse::<Ipv4Addr>().ok())
        .ok_or_else(|| malformed_reply(text, "invalid IP field"))?;
    let model = tagged_value(model_field, "Model", ':')
        .filter(|m| !m.is_empty())
        .ok_or_else(|| malformed_reply(text, "invalid Model field"))?;
    let status = tagged_value(status_field, "Status", ':')
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed_reply(text, "invalid Status field"))?;

    Ok(DiscoveryRecord {
        address,
        model: model.to_string(),
        reported_status: status.to_string(),
    })
}

fn tagged_value<'a>(field: &'a str, tag: &str, separator: char) -> Option<&'a str> {
    let (name, value) = field.split_once(separator)?;
    (name.trim() == tag).then(|| value.trim())
}

fn malformed_reply(text: &str, reason: &str) -> SnapmakerError {
    SnapmakerError::MalformedResponse(format!("{reason} in discovery reply {text:?}"))
}

/// Body of a `POST /api/v1/connect` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectBody {
    pub token: Option<String>,
}

/// Typed view of `GET /api/v1/status`.
///
/// Every field is optional; firmware only reports what the attached modules support.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub status: Option<String>,

    pub nozzle_temperature: Option<f64>,
    pub nozzle_target_temperature: Option<f64>,
    pub nozzle1_temperature: Option<f64>,
    pub nozzle1_target_temperature: Option<f64>,
    pub nozzle2_temperature: Option<f64>,
    pub nozzle2_target_temperature: Option<f64>,
    pub heated_bed_temperature: Option<f64>,
    pub heated_bed_target_temperature: Option<f64>,

    pub file_name: Option<String>,
    pub progress: Option<Number>,
    pub elapsed_time: Option<f64>,
    pub remaining_time: Option<f64>,
    pub estimated_time: Option<f64>,

    pub tool_head: Option<String>,

    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub homing: Option<String>,

    pub total_lines: Option<f64>,
    pub current_line: Option<f64>,

    pub spindle_speed: Option<f64>,
    pub laser_power: Option<f64>,
    pub laser_focal_length: Option<f64>,

    pub is_filament_out: Option<bool>,
    pub is_door_open: Option<bool>,
    pub is_enclosure_door_open: Option<bool>,
    pub has_enclosure: Option<bool>,
    pub has_rotary_module: Option<bool>,
    pub has_emergency_stop_button: Option<bool>,
    pub has_air_purifier: Option<bool>,
}

impl StatusPayload {
    /// Deserialize the typed payload from the raw status object.
    pub fn from_raw(raw: &Map<String, Value>) -> Result<Self> {
        Self::deserialize(Value::Object(raw.clone())).map_err(|e| {
            SnapmakerError::MalformedResponse(format!("status payload has unexpected shape: {e}"))
        })
    }

    /// A second nozzle reading marks a dual extruder
    pub fn has_second_nozzle(&self) -> bool {
        self.nozzle2_temperature.is_some()
    }
}

/// Parse a response body into a JSON object.
pub fn parse_object(body: &str) -> Result<Map<String, Value>> {
    if body.trim().is_empty() {
        return Err(SnapmakerError::MalformedResponse("empty response body".to_string()));
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SnapmakerError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(SnapmakerError::MalformedResponse(format!(
            "invalid JSON ({e}): {}",
            excerpt(body)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Copy of the raw payload with sensitive keys removed, for diagnostics.
pub fn filter_sensitive(raw: &Map<String, Value>) -> Map<String, Value> {
    raw.iter()
        .filter(|(key, _)| {
            if SENSITIVE_API_KEYS.contains(&key.as_str()) {
                return false;
            }
            let lowered = key.to_ascii_lowercase();
            if SUSPICIOUS_KEY_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
                tracing::warn!(
                    "Status payload contains potentially sensitive key '{}' that is not filtered",
                    key
                );
            }
            true
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
