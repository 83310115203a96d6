//! Wire message types
//!
//! Text frames carry JSON objects discriminated by a `t` field. Camera frames
//! are split across two frames: a `cam.frame` JSON header followed by one
//! binary frame holding the encoded image.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{ProtocolError, Result};

/// Message kinds understood by [`ClientMessage::parse`]
pub const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "hello",
    "config",
    "imu.sample",
    "cam.frame",
    "input.click",
    "input.scroll",
    "move.delta",
];

/// Sensing sources a device can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Rear camera optical flow
    Camera,
    /// Linear accelerometer
    Accel,
    /// Gyroscope rotation rate
    Gyro,
    /// Absolute orientation
    Orientation,
}

impl SourceKind {
    /// All sources in arbitration order
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Camera,
        SourceKind::Accel,
        SourceKind::Gyro,
        SourceKind::Orientation,
    ];

    /// Wire name of the source
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Camera => "camera",
            SourceKind::Accel => "accel",
            SourceKind::Gyro => "gyro",
            SourceKind::Orientation => "orientation",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of enabled sources, as negotiated by `config`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledSources {
    /// Camera optical flow
    #[serde(default)]
    pub camera: bool,
    /// Accelerometer
    #[serde(default)]
    pub accel: bool,
    /// Gyroscope
    #[serde(default)]
    pub gyro: bool,
    /// Absolute orientation
    #[serde(default)]
    pub orientation: bool,
}

impl EnabledSources {
    /// Check whether a source is enabled
    pub fn contains(&self, source: SourceKind) -> bool {
        match source {
            SourceKind::Camera => self.camera,
            SourceKind::Accel => self.accel,
            SourceKind::Gyro => self.gyro,
            SourceKind::Orientation => self.orientation,
        }
    }

    /// Iterate enabled sources
    pub fn iter(&self) -> impl Iterator<Item = SourceKind> + '_ {
        SourceKind::ALL.into_iter().filter(|s| self.contains(*s))
    }

    /// Number of enabled sources
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Build a set from a list of sources
    pub fn from_sources(sources: &[SourceKind]) -> Self {
        let mut enabled = Self::default();
        for source in sources {
            match source {
                SourceKind::Camera => enabled.camera = true,
                SourceKind::Accel => enabled.accel = true,
                SourceKind::Gyro => enabled.gyro = true,
                SourceKind::Orientation => enabled.orientation = true,
            }
        }
        enabled
    }
}

/// Linear acceleration (m/s²), device frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    /// Lateral axis
    pub x: f64,
    /// Longitudinal axis
    pub y: f64,
    /// Normal to the desk surface
    #[serde(default)]
    pub z: f64,
}

/// Euler triple in degrees (orientation) or degrees/second (rotation rate)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    /// Rotation about the z axis
    pub alpha: f64,
    /// Rotation about the x axis
    pub beta: f64,
    /// Rotation about the y axis
    #[serde(default)]
    pub gamma: f64,
}

/// One inertial reading; only the fields for reporting sources are present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    /// Device timestamp (ms)
    pub ts: f64,
    /// Accelerometer reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel: Option<Acceleration>,
    /// Rotation rate
    #[serde(default, alias = "rotationRate", skip_serializing_if = "Option::is_none")]
    pub gyro: Option<EulerAngles>,
    /// Absolute orientation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<EulerAngles>,
}

/// Camera frame header; the encoded image follows as the next binary frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Monotonic frame sequence number
    pub seq: u64,
    /// Capture timestamp (ms)
    pub ts: f64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// `image/*` MIME type, or `gray8` for raw luma
    #[serde(alias = "mime")]
    pub encoding: String,
}

/// Pointer buttons a device can press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    /// Primary button
    Left,
    /// Secondary button
    Right,
}

/// Button transition requested by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    /// Press
    Down,
    /// Release
    Up,
}

/// Raw `config` fields; validated by [`super::SessionConfig::negotiate`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRequest {
    /// Cursor gain
    pub sensitivity: Option<f64>,
    /// Target camera sampling rate
    pub camera_fps: Option<u32>,
    /// Sources the device will report
    pub enabled: Option<EnabledSources>,
    /// EMA half-life; 0 disables smoothing
    pub smoothing_half_life_ms: Option<f64>,
    /// Per-axis minimum admitted magnitude
    pub deadzone_px: Option<f64>,
    /// Screen rotation applied to device motion
    #[serde(alias = "rotation")]
    pub rotation_deg: Option<f64>,
}

/// Messages from device to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "t")]
pub enum ClientMessage {
    /// Client identification; establishes the session
    #[serde(rename = "hello")]
    Hello {
        /// Client build identifier
        #[serde(rename = "clientVersion", default)]
        client_version: String,
        /// Device description
        #[serde(default)]
        device: Option<String>,
    },

    /// One-time session negotiation
    #[serde(rename = "config")]
    Config(ConfigRequest),

    /// Inertial sample
    #[serde(rename = "imu.sample")]
    ImuSample(InertialSample),

    /// Camera frame header
    #[serde(rename = "cam.frame")]
    CameraFrame(FrameHeader),

    /// Button transition
    #[serde(rename = "input.click")]
    Click {
        /// Button
        button: Button,
        /// Requested transition
        state: ButtonAction,
    },

    /// Scroll by a pre-clamped delta
    #[serde(rename = "input.scroll")]
    Scroll {
        /// Scroll amount
        delta: f64,
    },

    /// Already-fused relative move computed on the device
    #[serde(rename = "move.delta")]
    MoveDelta {
        /// Horizontal displacement
        dx: f64,
        /// Vertical displacement
        dy: f64,
    },
}

impl ClientMessage {
    /// Parse one text frame
    ///
    /// Distinguishes an unknown `t` from a known kind with bad fields so the
    /// device gets a useful `error` reply.
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(ProtocolError::MalformedJson)?;

        let kind = match &value {
            serde_json::Value::Object(map) => match map.get("t") {
                Some(serde_json::Value::String(kind)) => kind.clone(),
                _ => return Err(ProtocolError::MissingType),
            },
            _ => return Err(ProtocolError::NotAnObject),
        };

        if !CLIENT_MESSAGE_TYPES.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        serde_json::from_value(value)
            .map_err(|source| ProtocolError::InvalidMessage { kind, source })
    }

    /// Wire name of this message kind
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Hello { .. } => "hello",
            ClientMessage::Config(_) => "config",
            ClientMessage::ImuSample(_) => "imu.sample",
            ClientMessage::CameraFrame(_) => "cam.frame",
            ClientMessage::Click { .. } => "input.click",
            ClientMessage::Scroll { .. } => "input.scroll",
            ClientMessage::MoveDelta { .. } => "move.delta",
        }
    }
}

/// Messages from server to device
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t")]
pub enum ServerMessage {
    /// Handshake progress
    #[serde(rename = "server.state")]
    State {
        /// Set on hello acknowledgement
        #[serde(skip_serializing_if = "Option::is_none")]
        ok: Option<bool>,
        /// Server version, sent with the hello acknowledgement
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        /// Set once a `config` is accepted
        #[serde(skip_serializing_if = "Option::is_none")]
        configured: Option<bool>,
    },

    /// Non-fatal protocol fault
    #[serde(rename = "error")]
    Error {
        /// Human-readable description
        message: String,
    },
}

impl ServerMessage {
    /// Reply to `hello`
    pub fn hello_ack() -> Self {
        ServerMessage::State {
            ok: Some(true),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            configured: None,
        }
    }

    /// Reply to an accepted `config`
    pub fn configured() -> Self {
        ServerMessage::State {
            ok: None,
            version: None,
            configured: Some(true),
        }
    }

    /// Error notification
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hello() {
        let msg = ClientMessage::parse(r#"{"t":"hello","clientVersion":"1.2.0","device":"pixel"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Hello {
                client_version: "1.2.0".to_string(),
                device: Some("pixel".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_imu_sample_partial_fields() {
        let msg =
            ClientMessage::parse(r#"{"t":"imu.sample","ts":1200.5,"accel":{"x":0.5,"y":-1}}"#)
                .unwrap();
        match msg {
            ClientMessage::ImuSample(sample) => {
                assert_eq!(sample.ts, 1200.5);
                let accel = sample.accel.unwrap();
                assert_eq!((accel.x, accel.y, accel.z), (0.5, -1.0, 0.0));
                assert!(sample.gyro.is_none());
                assert!(sample.orientation.is_none());
            }
            other => panic!("Expected ImuSample, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_frame_header_mime_alias() {
        let msg = ClientMessage::parse(
            r#"{"t":"cam.frame","seq":7,"ts":10,"width":320,"height":240,"mime":"image/jpeg"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::CameraFrame(header) => {
                assert_eq!(header.seq, 7);
                assert_eq!(header.encoding, "image/jpeg");
            }
            other => panic!("Expected CameraFrame, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_click() {
        let msg = ClientMessage::parse(r#"{"t":"input.click","button":"left","state":"down"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Click {
                button: Button::Left,
                state: ButtonAction::Down,
            }
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = ClientMessage::parse(r#"{"t":"telemetry"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref t) if t == "telemetry"));
        assert_eq!(err.to_string(), "Unknown message type: telemetry");
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(matches!(
            ClientMessage::parse("[1,2,3]"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"hello"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            ClientMessage::parse("{not json"),
            Err(ProtocolError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_parse_invalid_fields() {
        let err = ClientMessage::parse(r#"{"t":"input.click","button":"middle","state":"down"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage { ref kind, .. } if kind == "input.click"));
    }

    #[test]
    fn test_server_message_json() {
        let json = ServerMessage::error("bad config").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["t"], "error");
        assert_eq!(value["message"], "bad config");

        let json = ServerMessage::configured().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["t"], "server.state");
        assert_eq!(value["configured"], true);
        assert!(value.get("ok").is_none());
    }

    #[test]
    fn test_enabled_sources_iteration() {
        let enabled = EnabledSources::from_sources(&[SourceKind::Gyro, SourceKind::Camera]);
        let sources: Vec<_> = enabled.iter().collect();
        assert_eq!(sources, vec![SourceKind::Camera, SourceKind::Gyro]);
        assert_eq!(enabled.count(), 2);
        assert!(!enabled.contains(SourceKind::Accel));
    }
}
