//! Fixed metric tables for presenting a [`DeviceSnapshot`].
//!
//! Each exposed metric is a plain descriptor holding a stable key, a display
//! name, a unit and an accessor. Frontends iterate [`sensors_for`] and
//! [`BINARY_SENSORS`] to build whatever presentation objects they need.

use crate::types::{DeviceSnapshot, ToolheadType};
use std::fmt;
use std::time::Duration;

pub const CELSIUS: &str = "°C";
pub const PERCENT: &str = "%";

/// Value read out of a snapshot by a [`SensorDescriptor`]
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Number(f64),
    Text(String),
    Duration(Duration),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n:.1}"),
            Self::Text(s) => f.write_str(s),
            Self::Duration(d) => {
                let secs = d.as_secs();
                write!(f, "{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SensorDescriptor {
    /// Stable identifier, unique per printer
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub value: fn(&DeviceSnapshot) -> SensorValue,
}

impl SensorDescriptor {
    pub fn read(&self, snapshot: &DeviceSnapshot) -> SensorValue {
        (self.value)(snapshot)
    }

    /// Identifier that stays unique across several printers
    pub fn unique_id(&self, host: &str) -> String {
        format!("{}_{}", host, self.key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BinarySensorDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub is_on: fn(&DeviceSnapshot) -> bool,
}

impl BinarySensorDescriptor {
    pub fn read(&self, snapshot: &DeviceSnapshot) -> bool {
        (self.is_on)(snapshot)
    }

    pub fn unique_id(&self, host: &str) -> String {
        format!("{}_{}", host, self.key)
    }
}

/// Metrics shown for every printer
pub const SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor {
        key: "status",
        name: "Status",
        unit: None,
        value: |s| SensorValue::Text(s.status.to_string()),
    },
    SensorDescriptor {
        key: "bed_temp",
        name: "Bed Temperature",
        unit: Some(CELSIUS),
        value: |s| SensorValue::Number(s.bed_temperature),
    },
    SensorDescriptor {
        key: "bed_target_temp",
        name: "Bed Target Temperature",
        unit: Some(CELSIUS),
        value: |s| SensorValue::Number(s.bed_target_temperature),
    },
    SensorDescriptor {
        key: "file_name",
        name: "File Name",
        unit: None,
        value: |s| SensorValue::Text(s.file_name.clone()),
    },
    SensorDescriptor {
        key: "progress",
        name: "Progress",
        unit: Some(PERCENT),
        value: |s| SensorValue::Number(s.progress_percent),
    },
    SensorDescriptor {
        key: "elapsed_time",
        name: "Elapsed Time",
        unit: None,
        value: |s| SensorValue::Duration(s.elapsed_time),
    },
    SensorDescriptor {
        key: "remaining_time",
        name: "Remaining Time",
        unit: None,
        value: |s| SensorValue::Duration(s.remaining_time),
    },
];

pub const SINGLE_NOZZLE_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor {
        key: "nozzle_temp",
        name: "Nozzle Temperature",
        unit: Some(CELSIUS),
        value: |s| SensorValue::Number(s.nozzle_temperature),
    },
    SensorDescriptor {
        key: "nozzle_target_temp",
        name: "Nozzle Target Temperature",
        unit: Some(CELSIUS),
        value: |s| SensorValue::Number(s.nozzle_target_temperature),
    },
];

pub const DUAL_NOZZLE_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor {
        key: "nozzle1_temp",
        name: "Nozzle 1 Temperature",
        unit: Some(CELSIUS),
        value: |s| SensorValue::Number(s.nozzle_temperature),
    },
    SensorDescriptor {
        key: "nozzle1_target_temp",
        name: "Nozzle 1 Target Temperature",
        unit: Some(CELSIUS),
        value: |s| SensorValue::Number(s.nozzle_target_temperature),
    },
    SensorDescriptor {
        key: "nozzle2_temp",
        name: "Nozzle 2 Temperature",
        unit: Some(CELSIUS),
        value: |s| SensorValue::Number(s.second_nozzle.unwrap_or_default().temperature),
    },
    SensorDescriptor {
        key: "nozzle2_target_temp",
        name: "Nozzle 2 Target Temperature",
        unit: Some(CELSIUS),
        value: |s| {
            SensorValue::Number(s.second_nozzle.unwrap_or_default().target_temperature)
        },
    },
];

pub const BINARY_SENSORS: &[BinarySensorDescriptor] = &[
    BinarySensorDescriptor {
        key: "filament_out",
        name: "Filament Runout",
        is_on: |s| s.filament_out,
    },
    BinarySensorDescriptor {
        key: "door_open",
        name: "Door",
        is_on: |s| s.door_open,
    },
    BinarySensorDescriptor {
        key: "enclosure",
        name: "Enclosure",
        is_on: |s| s.modules.enclosure,
    },
    BinarySensorDescriptor {
        key: "rotary_module",
        name: "Rotary Module",
        is_on: |s| s.modules.rotary_module,
    },
    BinarySensorDescriptor {
        key: "emergency_stop",
        name: "Emergency Stop Button",
        is_on: |s| s.modules.emergency_stop,
    },
    BinarySensorDescriptor {
        key: "air_purifier",
        name: "Air Purifier",
        is_on: |s| s.modules.air_purifier,
    },
];

/// Metrics that apply to the printer behind `snapshot`.
///
/// Nozzle entries follow the detected toolhead; an offline snapshot with no
/// toolhead known gets the single nozzle set.
pub fn sensors_for(snapshot: &DeviceSnapshot) -> Vec<&'static SensorDescriptor> {
    let nozzles = match snapshot.toolhead_type {
        Some(ToolheadType::Dual) => DUAL_NOZZLE_SENSORS,
        Some(ToolheadType::Single) | None => SINGLE_NOZZLE_SENSORS,
    };

    SENSORS.iter().chain(nozzles).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NozzleReading, PrinterStatus};

    fn keys(sensors: &[&SensorDescriptor]) -> Vec<&'static str> {
        sensors.iter().map(|s| s.key).collect()
    }

    #[test]
    fn single_extruder_gets_plain_nozzle_sensors() {
        let snapshot = DeviceSnapshot {
            status: PrinterStatus::Running,
            toolhead_type: Some(ToolheadType::Single),
            nozzle_temperature: 205.5,
            ..DeviceSnapshot::default()
        };

        let sensors = sensors_for(&snapshot);
        let keys = keys(&sensors);
        assert!(keys.contains(&"nozzle_temp"));
        assert!(!keys.contains(&"nozzle2_temp"));

        let nozzle = sensors.iter().find(|s| s.key == "nozzle_temp").unwrap();
        assert_eq!(nozzle.read(&snapshot), SensorValue::Number(205.5));
        assert_eq!(nozzle.unit, Some(CELSIUS));
    }

    #[test]
    fn dual_extruder_gets_both_nozzles() {
        let snapshot = DeviceSnapshot {
            status: PrinterStatus::Idle,
            toolhead_type: Some(ToolheadType::Dual),
            nozzle_temperature: 200.0,
            second_nozzle: Some(NozzleReading {
                temperature: 180.0,
                target_temperature: 190.0,
            }),
            ..DeviceSnapshot::default()
        };

        let sensors = sensors_for(&snapshot);
        let keys = keys(&sensors);
        assert!(!keys.contains(&"nozzle_temp"));
        assert!(keys.contains(&"nozzle1_temp"));

        let second = sensors.iter().find(|s| s.key == "nozzle2_target_temp").unwrap();
        assert_eq!(second.read(&snapshot), SensorValue::Number(190.0));
    }

    #[test]
    fn keys_are_unique() {
        let mut all: Vec<&str> = SENSORS
            .iter()
            .chain(SINGLE_NOZZLE_SENSORS)
            .chain(DUAL_NOZZLE_SENSORS)
            .map(|s| s.key)
            .chain(BINARY_SENSORS.iter().map(|s| s.key))
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn offline_snapshot_reads_defaults() {
        let snapshot = DeviceSnapshot::offline("timed out");

        let status = SENSORS.iter().find(|s| s.key == "status").unwrap();
        assert_eq!(status.read(&snapshot), SensorValue::Text("OFFLINE".to_string()));
        assert!(BINARY_SENSORS.iter().all(|s| !s.read(&snapshot)));
    }

    #[test]
    fn durations_render_as_clock() {
        let value = SensorValue::Duration(Duration::from_secs(3 * 3600 + 25 * 60 + 7));
        assert_eq!(value.to_string(), "03:25:07");
        assert_eq!(
            SensorDescriptor {
                key: "progress",
                name: "Progress",
                unit: Some(PERCENT),
                value: |_| SensorValue::Number(0.0),
            }
            .unique_id("10.0.0.5"),
            "10.0.0.5_progress"
        );
    }
}
