//! Decoding of inbound sensor payloads into normalized readings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload decoding errors.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload was not valid JSON of the configured shape. A single
    /// malformed reading fails the whole message; there is no partial decode.
    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One sensor reading as it appears on the wire.
///
/// Unknown fields on a reading object are ignored; a wrong-typed `name`,
/// `type` or `value` fails the whole message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Sensor name (e.g., "temp", "humidity").
    pub name: String,

    /// Unit or kind of the measurement (e.g., "celsius", "percent").
    #[serde(rename = "type")]
    pub sensor_type: String,

    /// The measured value.
    pub value: f64,
}

/// The device-scoped payload shape: readings wrapped in an envelope that
/// carries the publishing device's identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEnvelope {
    #[serde(rename = "deviceId")]
    pub device_id: String,

    pub sensors: Vec<Reading>,
}

/// Which payload shape a deployment publishes.
///
/// The shape is a static per-deployment choice made in configuration, not
/// inferred per message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadShape {
    /// `{"deviceId": "...", "sensors": [...]}` — series names become
    /// `"{deviceId}-{name}"`.
    #[default]
    Device,

    /// A bare top-level array of readings — series names are taken verbatim.
    List,
}

/// Round a value to one decimal place, half away from zero.
///
/// This is a precision-reduction contract on the *stored* value, not a
/// display concern: `23.27` is stored as `23.3`, `23.24` as `23.2`, and the
/// tie `23.25` as `23.3`.
pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Decode a raw payload into normalized readings.
///
/// Each returned reading carries its final series name (device-prefixed for
/// [`PayloadShape::Device`]) and its value rounded to one decimal place.
pub fn decode_readings(shape: PayloadShape, payload: &[u8]) -> Result<Vec<Reading>, PayloadError> {
    let readings = match shape {
        PayloadShape::Device => {
            let envelope: DeviceEnvelope = serde_json::from_slice(payload)?;
            envelope
                .sensors
                .into_iter()
                .map(|r| Reading {
                    name: format!("{}-{}", envelope.device_id, r.name),
                    sensor_type: r.sensor_type,
                    value: round_tenths(r.value),
                })
                .collect()
        }
        PayloadShape::List => {
            let readings: Vec<Reading> = serde_json::from_slice(payload)?;
            readings
                .into_iter()
                .map(|r| Reading {
                    value: round_tenths(r.value),
                    ..r
                })
                .collect()
        }
    };

    Ok(readings)
}
