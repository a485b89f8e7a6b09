//! Sensor payload decoding.
//!
//! The Bluetooth bridge re-broadcasts each peripheral reading as a small
//! JSON document. This module turns those payloads into typed frames and
//! classifies every way a payload can be unusable, so a bad broadcast
//! costs one skipped tick instead of a crash. Rolling-window state is
//! never touched for a payload that fails to decode.
//!
//! Chest payload:
//! `{"device":"chest","timestamp_ms":...,"accel":[x,y,z],"gyro":[x,y,z]}`
//!
//! Wrist payload additionally carries `"mag":[x,y,z]`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DeviceKind, SensorFrame};

/// Decode failure modes for an incoming sensor payload.
#[derive(Debug, Error)]
pub enum WireError {
    /// Payload is not the expected JSON shape.
    #[error("malformed sensor payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Payload names a device kind this engine does not know.
    #[error("unknown device kind `{0}`")]
    UnknownDevice(String),

    /// A wrist payload arrived without its magnetometer block.
    #[error("wrist payload missing magnetometer reading")]
    MissingMagnetometer,

    /// A channel value decoded to NaN or infinity.
    #[error("non-finite value in `{channel}` channel")]
    NonFinite { channel: &'static str },
}

/// On-the-wire frame layout. `device` is kept as a free-form string so an
/// unrecognized kind can be reported as such rather than as a parse error.
#[derive(Debug, Serialize, Deserialize)]
struct RawFrame {
    device: String,
    timestamp_ms: u64,
    accel: [f32; 3],
    gyro: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mag: Option<[f32; 3]>,
}

fn check_finite(channel: &'static str, values: &[f32; 3]) -> Result<(), WireError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(WireError::NonFinite { channel })
    }
}

/// Decodes one broadcast payload into a typed frame.
///
/// Validation order: JSON shape, device kind, channel finiteness, then the
/// per-device completeness rule (wrist frames must carry a magnetometer).
pub fn decode_frame(payload: &[u8]) -> Result<(DeviceKind, SensorFrame), WireError> {
    let raw: RawFrame = serde_json::from_slice(payload)?;

    let device = match raw.device.as_str() {
        "chest" => DeviceKind::Chest,
        "wrist" => DeviceKind::Wrist,
        other => return Err(WireError::UnknownDevice(other.to_string())),
    };

    check_finite("accel", &raw.accel)?;
    check_finite("gyro", &raw.gyro)?;
    if let Some(mag) = &raw.mag {
        check_finite("mag", mag)?;
    }

    if device == DeviceKind::Wrist && raw.mag.is_none() {
        return Err(WireError::MissingMagnetometer);
    }

    Ok((
        device,
        SensorFrame {
            timestamp_ms: raw.timestamp_ms,
            accel: raw.accel,
            gyro: raw.gyro,
            mag: raw.mag,
        },
    ))
}

/// Encodes a frame into the broadcast payload format.
///
/// The inverse of [`decode_frame`]; used by test harnesses and the demo
/// stream generator.
pub fn encode_frame(device: DeviceKind, frame: &SensorFrame) -> Result<Vec<u8>, WireError> {
    let raw = RawFrame {
        device: device.name().to_string(),
        timestamp_ms: frame.timestamp_ms,
        accel: frame.accel,
        gyro: frame.gyro,
        mag: frame.mag,
    };
    Ok(serde_json::to_vec(&raw)?)
}
