use crate::transform::Transform;

/// Presentation metadata for one gateway status field.
#[derive(Debug, Clone)]
pub struct StatusDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub transform: Transform,
}

/// The diagnostic status fields the gateway exposes, with the transform
/// used to render each one. Binary facts compare against the state string
/// the device uses for "on".
pub const STATUS_FIELDS: &[StatusDescriptor] = &[
    StatusDescriptor {
        key: "fw_version",
        label: "Firmware",
        transform: Transform::Identity,
    },
    StatusDescriptor {
        key: "hw_version",
        label: "Hardware",
        transform: Transform::Identity,
    },
    StatusDescriptor {
        key: "sta_ip",
        label: "Station IP",
        transform: Transform::Identity,
    },
    StatusDescriptor {
        key: "protocol",
        label: "Protocol",
        transform: Transform::Identity,
    },
    StatusDescriptor {
        key: "batt_voltage",
        label: "Battery (V)",
        transform: Transform::VoltageStringToFloat,
    },
    StatusDescriptor {
        key: "ecu_status",
        label: "ECU link",
        transform: Transform::EqualsTargetState("online"),
    },
    StatusDescriptor {
        key: "ble_status",
        label: "Bluetooth",
        transform: Transform::EqualsTargetState("enable"),
    },
    StatusDescriptor {
        key: "sleep_status",
        label: "Sleep mode",
        transform: Transform::EqualsTargetState("enable"),
    },
    StatusDescriptor {
        key: "mqtt_en",
        label: "MQTT",
        transform: Transform::EqualsTargetState("enable"),
    },
];

/// Measurement classes the car configs use for PIDs. Unknown classes and
/// the literal `"none"` map to no class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementClass {
    Battery,
    Current,
    Distance,
    Frequency,
    Power,
    Pressure,
    Speed,
    Temperature,
    Voltage,
}

pub fn measurement_class(class: &str) -> Option<MeasurementClass> {
    match class {
        "battery" => Some(MeasurementClass::Battery),
        "current" => Some(MeasurementClass::Current),
        "distance" => Some(MeasurementClass::Distance),
        "frequency" => Some(MeasurementClass::Frequency),
        "power" => Some(MeasurementClass::Power),
        "pressure" => Some(MeasurementClass::Pressure),
        "speed" => Some(MeasurementClass::Speed),
        "temperature" => Some(MeasurementClass::Temperature),
        "voltage" => Some(MeasurementClass::Voltage),
        _ => None,
    }
}

/// Stable unique identifier for a value exposed from a device. Keyed on
/// the device id, never on transient fields like the station IP.
pub fn unique_id(device_id: &str, key: &str) -> String {
    format!("wican_{device_id}_{key}")
}
