use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Message type carried by synthesized telemetry.
pub const SENSOR_READING: &str = "sensor-reading";

/// Environmental measurements.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SensorData {
    /// Degrees Celsius.
    pub temperature: f64,

    /// Relative humidity in percent.
    pub humidity: f64,

    /// Hectopascals.
    pub pressure: f64,
}

/// Periodic telemetry published by the publisher component.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Kind of message, normally [`SENSOR_READING`].
    pub message_type: String,

    /// Device that produced the reading.
    pub device_id: String,

    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,

    /// Monotonic per-device sequence number.
    pub sequence_number: u64,

    /// The measurements.
    pub data: SensorData,

    /// Device status.
    pub status: String,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl SensorReading {
    /// Synthesizes a plausible reading.
    pub fn generate<R>(
        rng: &mut R,
        device_id: &str,
        message_type: &str,
        sequence_number: u64,
    ) -> Self
    where
        R: Rng,
    {
        Self {
            message_type: message_type.to_string(),
            device_id: device_id.to_string(),
            timestamp: Utc::now(),
            sequence_number,
            data: SensorData {
                temperature: round2(rng.gen_range(18.0..32.0)),
                humidity: round2(rng.gen_range(30.0..80.0)),
                pressure: round2(rng.gen_range(980.0..1020.0)),
            },
            status: "active".to_string(),
        }
    }
}

/// Sensor type whose readings are reported in degrees Celsius.
pub const TEMPERATURE: &str = "temperature";

/// Single-value telemetry published towards the cloud.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudReading {
    /// Device that produced the reading.
    pub device_id: String,

    /// What was measured, e.g. [`TEMPERATURE`].
    pub sensor_type: String,

    /// The measured value.
    pub value: f64,

    /// `°C` for temperature, `units` otherwise.
    pub unit: String,

    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,

    /// Reading quality.
    pub quality: String,
}

impl CloudReading {
    /// Synthesizes a reading uniformly within `min..=max`. An empty range yields
    /// `min`.
    pub fn generate<R>(rng: &mut R, device_id: &str, sensor_type: &str, min: f64, max: f64) -> Self
    where
        R: Rng,
    {
        let value = if max > min {
            rng.gen_range(min..=max)
        } else {
            min
        };
        let unit = if sensor_type == TEMPERATURE {
            "°C"
        } else {
            "units"
        };

        Self {
            device_id: device_id.to_string(),
            sensor_type: sensor_type.to_string(),
            value: round2(value),
            unit: unit.to_string(),
            timestamp: Utc::now(),
            quality: "good".to_string(),
        }
    }
}

/// Temperature sample consumed by the processor component.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TemperatureSample {
    /// Sensor that took the sample.
    pub sensor_id: String,

    /// Degrees Fahrenheit.
    pub temperature: f64,
}

/// Alert kinds raised by the processor.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// The temperature exceeded the configured threshold.
    HighTemperature,
}

/// Alert forwarded by the processor component.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TemperatureAlert {
    /// Sensor that took the sample.
    pub sensor_id: String,

    /// The offending temperature.
    pub temperature: f64,

    /// What was detected.
    pub alert: AlertKind,
}

fn default_device_id() -> String {
    "device1".to_string()
}

/// Command sent from the cloud to a device.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Command name, e.g. `get_status`.
    pub command: String,

    /// Target device.
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

/// Status telemetry sent back to the cloud.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    /// Reporting device.
    pub device_id: String,

    /// Device status.
    pub status: String,

    /// When the status was captured.
    pub timestamp: DateTime<Utc>,
}
