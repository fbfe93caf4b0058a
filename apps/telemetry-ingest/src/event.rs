use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;

// The timestamp is the receipt time stamped by the listener, never a field
// of the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub device_id: String,
    pub humidity: f64,
    pub pump_active: bool,
    pub light_active: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct WireTelemetry {
    humidity: f64,
    #[serde(default)]
    pump_active: bool,
    #[serde(default)]
    light_active: bool,
}

// Decodes a `<prefix>/<deviceId>/telemetry` publish; Ok(None) for topics
// outside the telemetry namespace.
pub fn parse_telemetry_payload(
    topic_prefix: &str,
    topic: &str,
    payload: &mut [u8],
    received_at: DateTime<Utc>,
) -> Result<Option<TelemetryEvent>> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() != 3 || parts[0] != topic_prefix || parts[2] != "telemetry" {
        return Ok(None);
    }
    let device_id = parts[1];
    if device_id.is_empty() {
        return Ok(None);
    }

    let wire: WireTelemetry = simd_json::from_slice(payload)?;

    Ok(Some(TelemetryEvent {
        device_id: device_id.to_string(),
        humidity: wire.humidity,
        pump_active: wire.pump_active,
        light_active: wire.light_active,
        timestamp: received_at,
    }))
}
