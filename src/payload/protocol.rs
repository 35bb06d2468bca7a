//! # Uplink Frame Layout and Downlink Commands
//!
//! ## Uplink frame (little-endian)
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | ax (i16) |
//! | 2 | 2 | ay (i16) |
//! | 4 | 2 | az (i16) |
//! | 6 | 2 | temperature |
//! | 8 | 2 | humidity |
//! | 10 | 2 | soil moisture |
//! | 12 | 2 | light level |
//! | 14 | 2 | red |
//! | 16 | 2 | green |
//! | 18 | 2 | blue |
//! | 20 | 4 | latitude (f32 bit pattern) |
//! | 24 | 4 | longitude (f32 bit pattern) |
//!
//! The versioned variant prepends [`SCHEMA_VERSION`] and shifts every offset
//! by one.

use crate::actuator::ActuatorState;

/// Bare uplink frame length
pub const UPLINK_FRAME_LEN: usize = 28;

/// Uplink frame length with the schema version prefix
pub const VERSIONED_FRAME_LEN: usize = UPLINK_FRAME_LEN + 1;

/// Current schema version byte
pub const SCHEMA_VERSION: u8 = 0x01;

/// Field offsets within the bare frame
pub const OFFSET_AX: usize = 0;
pub const OFFSET_AY: usize = 2;
pub const OFFSET_AZ: usize = 4;
pub const OFFSET_TEMPERATURE: usize = 6;
pub const OFFSET_HUMIDITY: usize = 8;
pub const OFFSET_SOIL_MOISTURE: usize = 10;
pub const OFFSET_LIGHT_LEVEL: usize = 12;
pub const OFFSET_RED: usize = 14;
pub const OFFSET_GREEN: usize = 16;
pub const OFFSET_BLUE: usize = 18;
pub const OFFSET_LATITUDE: usize = 20;
pub const OFFSET_LONGITUDE: usize = 24;

/// Latitude sent while the receiver has no fix
pub const FALLBACK_LATITUDE: f32 = 43.563644;

/// Longitude sent while the receiver has no fix
pub const FALLBACK_LONGITUDE: f32 = -5.937019;

/// Sentinel for an accelerometer axis that failed to read
///
/// The sensor's 14-bit output never reaches `i16::MIN`.
pub const AXIS_SENTINEL: i16 = i16::MIN;

/// Sentinel for an unsigned channel that failed to read
pub const CHANNEL_SENTINEL: u16 = 0xFFFF;

/// Downlink frames recognized as indicator commands (exact, case-sensitive)
pub const DOWNLINK_COMMANDS: [(&[u8], ActuatorState); 3] = [
    (b"OFF", ActuatorState::AllOff),
    (b"Green", ActuatorState::Green),
    (b"Red", ActuatorState::Red),
];

/// Uplink frame as seen by the consumer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UplinkFrame {
    /// `Some` when the frame carried the version prefix
    pub schema_version: Option<u8>,
    pub ax: i16,
    pub ay: i16,
    pub az: i16,
    pub temperature: u16,
    pub humidity: u16,
    pub soil_moisture: u16,
    pub light_level: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub latitude: f32,
    pub longitude: f32,
}
