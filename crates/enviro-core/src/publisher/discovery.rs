//! Home-Assistant MQTT discovery payloads.

use alloc::format;
use alloc::string::String;

use serde::Serialize;

use super::TransportError;

/// One Home-Assistant sensor entity backed by a field of the state payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorEntity {
    /// Display name, appended to the device name.
    pub name: &'static str,
    /// Appended to the device name in the config topic.
    pub topic_key: &'static str,
    pub unit: &'static str,
    pub value_template: &'static str,
    /// Appended to the lowercased device name to form the unique id.
    pub unique_suffix: &'static str,
    pub model: &'static str,
    pub manufacturer: &'static str,
    pub device_class: Option<&'static str>,
}

/// Entities for the Pimoroni Enviro+ sensor set.
pub const ENVIRO_PLUS: [SensorEntity; 10] = [
    SensorEntity {
        name: "Temp",
        topic_key: "Temp",
        unit: "°C",
        value_template: "{{ value_json.temperature}}",
        unique_suffix: "_sensor_temperature",
        model: "BME280",
        manufacturer: "Bosch",
        device_class: Some("temperature"),
    },
    SensorEntity {
        name: "Humidity",
        topic_key: "Humidity",
        unit: "%",
        value_template: "{{ value_json.humidity}}",
        unique_suffix: "_sensor_humidity",
        model: "BME280",
        manufacturer: "Bosch",
        device_class: Some("humidity"),
    },
    SensorEntity {
        name: "Pressure",
        topic_key: "Pressure",
        unit: "kPa",
        value_template: "{{ value_json.pressure}}",
        unique_suffix: "_sensor_pressure",
        model: "BME280",
        manufacturer: "Bosch",
        device_class: Some("pressure"),
    },
    SensorEntity {
        name: "Light",
        topic_key: "Light",
        unit: "lux",
        value_template: "{{ value_json.light}}",
        unique_suffix: "_sensor_light",
        model: "LTR-559",
        manufacturer: "Lite-On",
        device_class: Some("illuminance"),
    },
    SensorEntity {
        name: "Oxidising",
        topic_key: "Oxidising",
        unit: "Ohms",
        value_template: "{{ value_json.oxidising}}",
        unique_suffix: "_sensor_gas_oxidising",
        model: "MICS6814",
        manufacturer: "SGX Sensortech",
        device_class: None,
    },
    SensorEntity {
        name: "Reducing",
        topic_key: "Reducing",
        unit: "Ohms",
        value_template: "{{ value_json.reducing}}",
        unique_suffix: "_sensor_gas_reducing",
        model: "MICS6814",
        manufacturer: "SGX Sensortech",
        device_class: None,
    },
    SensorEntity {
        name: "NH3",
        topic_key: "NH3",
        unit: "Ohms",
        value_template: "{{ value_json.nh3}}",
        unique_suffix: "_sensor_gas_nh3",
        model: "MICS6814",
        manufacturer: "SGX Sensortech",
        device_class: None,
    },
    SensorEntity {
        name: "PM1",
        topic_key: "PM1",
        unit: "ug/m3",
        value_template: "{{ value_json.pm1}}",
        unique_suffix: "_sensor_pm1",
        model: "PMS5003",
        manufacturer: "Plantower",
        device_class: None,
    },
    SensorEntity {
        name: "PM2.5",
        topic_key: "PM25",
        unit: "ug/m3",
        value_template: "{{ value_json.pm25}}",
        unique_suffix: "_sensor_pm25",
        model: "PMS5003",
        manufacturer: "Plantower",
        device_class: None,
    },
    SensorEntity {
        name: "PM10",
        topic_key: "PM10",
        unit: "ug/m3",
        value_template: "{{ value_json.pm10}}",
        unique_suffix: "_sensor_pm10",
        model: "PMS5003",
        manufacturer: "Plantower",
        device_class: None,
    },
];

#[derive(Serialize)]
struct DiscoveryPayload<'a> {
    name: String,
    state_topic: String,
    unit_of_measurement: &'a str,
    value_template: &'a str,
    unique_id: String,
    device: DeviceInfo<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
}

#[derive(Serialize)]
struct DeviceInfo<'a> {
    identifiers: String,
    name: String,
    model: &'a str,
    manufacturer: &'a str,
}

/// Topic the JSON state of every entity is published on.
pub fn state_topic(device_name: &str) -> String {
    format!("homeassistant/sensor/{device_name}/state")
}

/// Retained config topic announcing `entity` to Home-Assistant.
pub fn config_topic(device_name: &str, entity: &SensorEntity) -> String {
    format!(
        "homeassistant/sensor/{device_name}/{device_name}{}/config",
        entity.topic_key
    )
}

/// JSON discovery document for one entity.
pub fn build_discovery_payload(
    device_name: &str,
    entity: &SensorEntity,
) -> Result<String, TransportError> {
    let device_lower = device_name.to_lowercase();
    let payload = DiscoveryPayload {
        name: format!("{device_name}{}", entity.name),
        state_topic: state_topic(device_name),
        unit_of_measurement: entity.unit,
        value_template: entity.value_template,
        unique_id: format!("{device_lower}{}", entity.unique_suffix),
        device: DeviceInfo {
            identifiers: format!("{device_lower}_sensor"),
            name: format!("{device_name}Sensors"),
            model: entity.model,
            manufacturer: entity.manufacturer,
        },
        device_class: entity.device_class,
    };

    serde_json::to_string(&payload).map_err(|_| TransportError::Encode {
        details: "discovery payload is not serializable",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_temperature_payload_fields() {
        let json = build_discovery_payload("EnviroPlus", &ENVIRO_PLUS[0]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["name"], "EnviroPlusTemp");
        assert_eq!(value["state_topic"], "homeassistant/sensor/EnviroPlus/state");
        assert_eq!(value["unit_of_measurement"], "°C");
        assert_eq!(value["value_template"], "{{ value_json.temperature}}");
        assert_eq!(value["unique_id"], "enviroplus_sensor_temperature");
        assert_eq!(value["device"]["identifiers"], "enviroplus_sensor");
        assert_eq!(value["device"]["name"], "EnviroPlusSensors");
        assert_eq!(value["device"]["model"], "BME280");
        assert_eq!(value["device"]["manufacturer"], "Bosch");
        assert_eq!(value["device_class"], "temperature");
    }

    #[test]
    fn test_device_class_omitted_when_absent() {
        let json = build_discovery_payload("EnviroPlus", &ENVIRO_PLUS[4]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("device_class").is_none());
    }

    #[test]
    fn test_payload_keys_keep_declaration_order() {
        let json = build_discovery_payload("E", &ENVIRO_PLUS[0]).unwrap();
        assert!(json.starts_with(r#"{"name":"ETemp","state_topic":"#));
        assert!(json.ends_with(r#""device_class":"temperature"}"#));
    }

    #[test]
    fn test_pm25_topic_uses_key_not_name() {
        assert_eq!(
            config_topic("EnviroPlus", &ENVIRO_PLUS[8]),
            "homeassistant/sensor/EnviroPlus/EnviroPlusPM25/config"
        );
    }
}
