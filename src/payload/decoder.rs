//! Consumer-side frame decoding and downlink command matching.

use bytes::Buf;

use super::protocol::*;
use crate::actuator::ActuatorState;
use crate::error::{FieldNodeError, Result};

/// Decode an uplink frame
///
/// Accepts the bare 28-byte layout or the 29-byte layout with the schema
/// version prefix.
///
/// # Errors
///
/// Returns [`FieldNodeError::Payload`] for any other length or an unknown
/// schema version.
pub fn decode_frame(bytes: &[u8]) -> Result<UplinkFrame> {
    let (schema_version, mut buf) = match bytes.len() {
        UPLINK_FRAME_LEN => (None, bytes),
        VERSIONED_FRAME_LEN => {
            if bytes[0] != SCHEMA_VERSION {
                return Err(FieldNodeError::Payload(format!(
                    "unknown schema version 0x{:02X}",
                    bytes[0]
                )));
            }
            (Some(bytes[0]), &bytes[1..])
        }
        len => {
            return Err(FieldNodeError::Payload(format!(
                "frame length {} (expected {} or {})",
                len, UPLINK_FRAME_LEN, VERSIONED_FRAME_LEN
            )))
        }
    };

    Ok(UplinkFrame {
        schema_version,
        ax: buf.get_i16_le(),
        ay: buf.get_i16_le(),
        az: buf.get_i16_le(),
        temperature: buf.get_u16_le(),
        humidity: buf.get_u16_le(),
        soil_moisture: buf.get_u16_le(),
        light_level: buf.get_u16_le(),
        red: buf.get_u16_le(),
        green: buf.get_u16_le(),
        blue: buf.get_u16_le(),
        latitude: buf.get_f32_le(),
        longitude: buf.get_f32_le(),
    })
}

/// Match a downlink frame against the indicator commands
///
/// Only exact byte matches count; anything else is `None`.
pub fn decode_command(bytes: &[u8]) -> Option<ActuatorState> {
    DOWNLINK_COMMANDS
        .iter()
        .find(|(command, _)| *command == bytes)
        .map(|(_, state)| *state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::{Fix, FixStatus};
    use crate::payload::{encode, encode_versioned};
    use crate::sensors::SampleSet;

    #[test]
    fn test_decode_reads_encoder_layout() {
        let samples = SampleSet {
            ax: Some(12),
            ay: None,
            az: Some(-4096),
            temperature: Some(0x6A4C),
            humidity: None,
            soil_moisture: Some(1),
            light_level: Some(2),
            red: Some(3),
            green: Some(4),
            blue: Some(5),
        };
        let fix = Fix {
            status: FixStatus::GpsFix,
            latitude: Some(-33.5),
            longitude: Some(151.25),
        };

        let frame = decode_frame(&encode(&samples, &fix)).unwrap();

        assert_eq!(frame.schema_version, None);
        assert_eq!(frame.ax, 12);
        assert_eq!(frame.ay, AXIS_SENTINEL);
        assert_eq!(frame.az, -4096);
        assert_eq!(frame.humidity, CHANNEL_SENTINEL);
        assert_eq!(frame.blue, 5);
        assert_eq!(frame.latitude, -33.5);
        assert_eq!(frame.longitude, 151.25);
    }

    #[test]
    fn test_decode_versioned_frame() {
        let frame = decode_frame(&encode_versioned(&SampleSet::default(), &Fix::default())).unwrap();

        assert_eq!(frame.schema_version, Some(SCHEMA_VERSION));
        assert_eq!(frame.latitude, FALLBACK_LATITUDE);
        assert_eq!(frame.longitude, FALLBACK_LONGITUDE);
    }

    #[test]
    fn test_decode_rejects_bad_lengths_and_versions() {
        assert!(decode_frame(&[0u8; 27]).is_err());
        assert!(decode_frame(&[0u8; 30]).is_err());

        let mut versioned = [0u8; VERSIONED_FRAME_LEN];
        versioned[0] = 0x02;
        assert!(decode_frame(&versioned).is_err());
    }

    #[test]
    fn test_decode_command_exact_matches() {
        assert_eq!(decode_command(b"OFF"), Some(ActuatorState::AllOff));
        assert_eq!(decode_command(b"Green"), Some(ActuatorState::Green));
        assert_eq!(decode_command(b"Red"), Some(ActuatorState::Red));
    }

    #[test]
    fn test_decode_command_rejects_near_misses() {
        assert_eq!(decode_command(b""), None);
        assert_eq!(decode_command(b"green"), None);
        assert_eq!(decode_command(b"RED"), None);
        assert_eq!(decode_command(b"Off"), None);
        assert_eq!(decode_command(b"Green\0"), None);
        assert_eq!(decode_command(b"Gree"), None);
    }

    #[test]
    fn test_every_single_byte_change_to_green_is_ignored() {
        let green = b"Green";
        for index in 0..green.len() {
            for value in 0..=u8::MAX {
                if value == green[index] {
                    continue;
                }
                let mut frame = *green;
                frame[index] = value;
                assert_eq!(decode_command(&frame), None, "{:?}", frame);
            }
        }
    }
}
