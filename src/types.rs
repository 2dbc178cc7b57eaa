use crate::protocol::StatusPayload;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// File name reported when nothing is loaded or the printer is offline
pub const NO_FILE: &str = "N/A";

/// One printer that answered a discovery probe
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub address: Ipv4Addr,
    pub model: String,

    /// Status text exactly as the firmware reported it (e.g. "IDLE")
    pub reported_status: String,
}

/// Printer state as tracked by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrinterStatus {
    Idle,
    Running,
    Offline,
    Unknown,
}

impl PrinterStatus {
    /// Map the firmware's status text; anything unrecognised is `Unknown`.
    ///
    /// Never yields `Offline`: that state is reserved for snapshots that
    /// could not be read at all.
    pub fn from_device(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Self::Idle,
            "RUNNING" => Self::Running,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Offline => "OFFLINE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(text)
    }
}

/// Extruder configuration, derived from the nozzle fields in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolheadType {
    Single,
    Dual,
}

impl fmt::Display for ToolheadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Dual => f.write_str("dual"),
        }
    }
}

/// Module mounted on the head, from the `toolHead` field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Extruder,
    DualExtruder,
    Cnc,
    Laser,
    /// Firmware identifier not known to this crate
    Other(String),
}

impl ToolKind {
    pub fn from_device(raw: &str) -> Self {
        if raw.starts_with("TOOLHEAD_3DPRINTING") {
            Self::Extruder
        } else if raw.starts_with("TOOLHEAD_CNC") {
            Self::Cnc
        } else if raw.starts_with("TOOLHEAD_LASER") {
            Self::Laser
        } else {
            tracing::debug!("Unknown toolhead type '{}', using raw value", raw);
            Self::Other(raw.to_string())
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extruder => f.write_str("Extruder"),
            Self::DualExtruder => f.write_str("Dual Extruder"),
            Self::Cnc => f.write_str("CNC"),
            Self::Laser => f.write_str("Laser"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Current and target temperature of one nozzle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NozzleReading {
    pub temperature: f64,
    pub target_temperature: f64,
}

/// Head position in machine coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Optional add-on modules connected to the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModulePresence {
    pub enclosure: bool,
    pub rotary_module: bool,
    pub emergency_stop: bool,
    pub air_purifier: bool,
}

/// Last known state of one printer.
///
/// Always replaced as a whole. An offline snapshot carries nothing but
/// defaults and the reason in `last_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub status: PrinterStatus,

    /// Nozzle 1 on a dual extruder
    pub nozzle_temperature: f64,
    pub nozzle_target_temperature: f64,
    pub bed_temperature: f64,
    pub bed_target_temperature: f64,

    pub file_name: String,

    /// 0..=100
    pub progress_percent: f64,
    pub elapsed_time: Duration,
    pub remaining_time: Duration,
    pub estimated_time: Duration,

    pub toolhead_type: Option<ToolheadType>,
    pub tool_kind: Option<ToolKind>,

    /// Only present on a dual extruder
    pub second_nozzle: Option<NozzleReading>,

    pub position: Option<Position>,
    pub homing: Option<String>,

    pub total_lines: Option<u64>,
    pub current_line: Option<u64>,

    pub spindle_speed: Option<f64>,
    pub laser_power: Option<f64>,
    pub laser_focal_length: Option<f64>,

    pub modules: ModulePresence,
    pub filament_out: bool,
    pub door_open: bool,

    pub last_error: Option<String>,
}

impl DeviceSnapshot {
    /// Snapshot for a printer that could not be read.
    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            last_error: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Build a snapshot from a successfully fetched status payload.
    pub fn from_payload(payload: &StatusPayload) -> Self {
        let dual = payload.has_second_nozzle();

        let tool_kind = payload.tool_head.as_deref().map(|raw| {
            match ToolKind::from_device(raw) {
                ToolKind::Extruder if dual => ToolKind::DualExtruder,
                kind => kind,
            }
        });

        let (nozzle_temperature, nozzle_target_temperature) = if dual {
            (
                payload.nozzle1_temperature.or(payload.nozzle_temperature),
                payload
                    .nozzle1_target_temperature
                    .or(payload.nozzle_target_temperature),
            )
        } else {
            (
                payload.nozzle_temperature.or(payload.nozzle1_temperature),
                payload
                    .nozzle_target_temperature
                    .or(payload.nozzle1_target_temperature),
            )
        };

        let second_nozzle = payload.nozzle2_temperature.map(|temperature| NozzleReading {
            temperature,
            target_temperature: payload.nozzle2_target_temperature.unwrap_or_default(),
        });

        let position = match (payload.x, payload.y, payload.z) {
            (None, None, None) => None,
            (x, y, z) => Some(Position {
                x: x.unwrap_or_default(),
                y: y.unwrap_or_default(),
                z: z.unwrap_or_default(),
            }),
        };

        Self {
            status: payload
                .status
                .as_deref()
                .map_or(PrinterStatus::Unknown, PrinterStatus::from_device),
            nozzle_temperature: nozzle_temperature.unwrap_or_default(),
            nozzle_target_temperature: nozzle_target_temperature.unwrap_or_default(),
            bed_temperature: payload.heated_bed_temperature.unwrap_or_default(),
            bed_target_temperature: payload.heated_bed_target_temperature.unwrap_or_default(),
            file_name: payload
                .file_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| NO_FILE.to_string()),
            progress_percent: payload.progress.as_ref().map_or(0.0, progress_percent),
            elapsed_time: seconds(payload.elapsed_time),
            remaining_time: seconds(payload.remaining_time),
            estimated_time: seconds(payload.estimated_time),
            toolhead_type: Some(if dual {
                ToolheadType::Dual
            } else {
                ToolheadType::Single
            }),
            tool_kind,
            second_nozzle,
            position,
            homing: payload.homing.clone(),
            total_lines: payload.total_lines.and_then(whole_number),
            current_line: payload.current_line.and_then(whole_number),
            spindle_speed: payload.spindle_speed,
            laser_power: payload.laser_power,
            laser_focal_length: payload.laser_focal_length,
            modules: ModulePresence {
                enclosure: payload.has_enclosure.unwrap_or(false),
                rotary_module: payload.has_rotary_module.unwrap_or(false),
                emergency_stop: payload.has_emergency_stop_button.unwrap_or(false),
                air_purifier: payload.has_air_purifier.unwrap_or(false),
            },
            filament_out: payload.is_filament_out.unwrap_or(false),
            door_open: payload.is_enclosure_door_open.unwrap_or(false)
                || payload.is_door_open.unwrap_or(false),
            last_error: None,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.status == PrinterStatus::Offline
    }
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self {
            status: PrinterStatus::Offline,
            nozzle_temperature: 0.0,
            nozzle_target_temperature: 0.0,
            bed_temperature: 0.0,
            bed_target_temperature: 0.0,
            file_name: NO_FILE.to_string(),
            progress_percent: 0.0,
            elapsed_time: Duration::ZERO,
            remaining_time: Duration::ZERO,
            estimated_time: Duration::ZERO,
            toolhead_type: None,
            tool_kind: None,
            second_nozzle: None,
            position: None,
            homing: None,
            total_lines: None,
            current_line: None,
            spindle_speed: None,
            laser_power: None,
            laser_focal_length: None,
            modules: ModulePresence::default(),
            filament_out: false,
            door_open: false,
            last_error: None,
        }
    }
}

/// Firmware reports progress either as a 0..1 fraction (float) or a whole
/// percentage (integer). Floats above 1 are taken as percentages too.
fn progress_percent(raw: &Number) -> f64 {
    let percent = if raw.is_f64() {
        let value = raw.as_f64().unwrap_or_default();
        if value <= 1.0 {
            (value * 1000.0).round() / 10.0
        } else {
            value
        }
    } else {
        raw.as_f64().unwrap_or_default()
    };
    percent.clamp(0.0, 100.0)
}

/// Out-of-range and negative values read as zero
fn seconds(raw: Option<f64>) -> Duration {
    raw.and_then(|s| Duration::try_from_secs_f64(s).ok())
        .unwrap_or_default()
}

fn whole_number(raw: f64) -> Option<u64> {
    (raw.is_finite() && raw >= 0.0).then(|| raw.round() as u64)
}
