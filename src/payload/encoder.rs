//! # Uplink Frame Encoder
//!
//! Packs one [`SampleSet`] and the latest [`Fix`] into the fixed uplink
//! layout described in [`super::protocol`].

use bytes::BufMut;

use super::protocol::*;
use crate::fix::{Fix, FixStatus};
use crate::sensors::SampleSet;

/// Encode a sample set and fix into the bare 28-byte frame
///
/// Missing channels are written as their sentinel. The coordinates fall back
/// to the fixed site location when the fix is absent or incomplete.
///
/// # Examples
///
/// ```
/// use field_node::fix::Fix;
/// use field_node::payload::encode;
/// use field_node::sensors::SampleSet;
///
/// let frame = encode(&SampleSet::default(), &Fix::default());
/// assert_eq!(frame.len(), 28);
/// assert_eq!(&frame[0..2], &[0x00, 0x80]);
/// ```
pub fn encode(samples: &SampleSet, fix: &Fix) -> [u8; UPLINK_FRAME_LEN] {
    let mut frame = [0u8; UPLINK_FRAME_LEN];
    write_body(&mut frame[..], samples, fix);
    frame
}

/// Encode with the schema version byte in front
pub fn encode_versioned(samples: &SampleSet, fix: &Fix) -> [u8; VERSIONED_FRAME_LEN] {
    let mut frame = [0u8; VERSIONED_FRAME_LEN];
    frame[0] = SCHEMA_VERSION;
    write_body(&mut frame[1..], samples, fix);
    frame
}

/// Coordinates to transmit for this fix
pub fn frame_coordinates(fix: &Fix) -> (f32, f32) {
    match (fix.status, fix.latitude, fix.longitude) {
        (FixStatus::NoFix, _, _) => (FALLBACK_LATITUDE, FALLBACK_LONGITUDE),
        (_, Some(latitude), Some(longitude)) => (latitude as f32, longitude as f32),
        _ => (FALLBACK_LATITUDE, FALLBACK_LONGITUDE),
    }
}

fn write_body(mut buf: &mut [u8], samples: &SampleSet, fix: &Fix) {
    buf.put_i16_le(samples.ax.unwrap_or(AXIS_SENTINEL));
    buf.put_i16_le(samples.ay.unwrap_or(AXIS_SENTINEL));
    buf.put_i16_le(samples.az.unwrap_or(AXIS_SENTINEL));

    for value in [
        samples.temperature,
        samples.humidity,
        samples.soil_moisture,
        samples.light_level,
        samples.red,
        samples.green,
        samples.blue,
    ] {
        buf.put_u16_le(value.unwrap_or(CHANNEL_SENTINEL));
    }

    let (latitude, longitude) = frame_coordinates(fix);
    buf.put_f32_le(latitude);
    buf.put_f32_le(longitude);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_samples() -> SampleSet {
        SampleSet {
            ax: Some(-2),
            ay: Some(0x0102),
            az: Some(4096),
            temperature: Some(0x6A4C),
            humidity: Some(0x7E12),
            soil_moisture: Some(21000),
            light_level: Some(38000),
            red: Some(310),
            green: Some(420),
            blue: Some(530),
        }
    }

    fn gps_fix() -> Fix {
        Fix {
            status: FixStatus::GpsFix,
            latitude: Some(48.1173),
            longitude: Some(11.516666),
        }
    }

    #[test]
    fn test_fields_land_at_their_offsets() {
        let frame = encode(&full_samples(), &gps_fix());

        assert_eq!(&frame[OFFSET_AX..OFFSET_AX + 2], &(-2i16).to_le_bytes());
        assert_eq!(&frame[OFFSET_AY..OFFSET_AY + 2], &[0x02, 0x01]);
        assert_eq!(&frame[OFFSET_AZ..OFFSET_AZ + 2], &4096i16.to_le_bytes());
        assert_eq!(&frame[OFFSET_TEMPERATURE..OFFSET_TEMPERATURE + 2], &[0x4C, 0x6A]);
        assert_eq!(&frame[OFFSET_HUMIDITY..OFFSET_HUMIDITY + 2], &[0x12, 0x7E]);
        assert_eq!(
            &frame[OFFSET_SOIL_MOISTURE..OFFSET_SOIL_MOISTURE + 2],
            &21000u16.to_le_bytes()
        );
        assert_eq!(
            &frame[OFFSET_LIGHT_LEVEL..OFFSET_LIGHT_LEVEL + 2],
            &38000u16.to_le_bytes()
        );
        assert_eq!(&frame[OFFSET_RED..OFFSET_RED + 2], &310u16.to_le_bytes());
        assert_eq!(&frame[OFFSET_GREEN..OFFSET_GREEN + 2], &420u16.to_le_bytes());
        assert_eq!(&frame[OFFSET_BLUE..OFFSET_BLUE + 2], &530u16.to_le_bytes());
        assert_eq!(
            &frame[OFFSET_LATITUDE..OFFSET_LATITUDE + 4],
            &(48.1173f64 as f32).to_le_bytes()
        );
        assert_eq!(
            &frame[OFFSET_LONGITUDE..OFFSET_LONGITUDE + 4],
            &(11.516666f64 as f32).to_le_bytes()
        );
    }

    #[test]
    fn test_no_fix_uses_fallback_coordinates() {
        let fix = Fix {
            status: FixStatus::NoFix,
            latitude: Some(10.0),
            longitude: Some(20.0),
        };
        let frame = encode(&full_samples(), &fix);

        assert_eq!(&frame[20..24], &FALLBACK_LATITUDE.to_le_bytes());
        assert_eq!(&frame[24..28], &FALLBACK_LONGITUDE.to_le_bytes());
    }

    #[test]
    fn test_fix_without_coordinates_uses_fallback() {
        let fix = Fix {
            status: FixStatus::DgpsFix,
            latitude: Some(10.0),
            longitude: None,
        };
        assert_eq!(frame_coordinates(&fix), (FALLBACK_LATITUDE, FALLBACK_LONGITUDE));
    }

    #[test]
    fn test_missing_channels_become_sentinels() {
        let mut samples = full_samples();
        samples.ay = None;
        samples.humidity = None;
        samples.blue = None;

        let frame = encode(&samples, &gps_fix());

        assert_eq!(&frame[OFFSET_AY..OFFSET_AY + 2], &[0x00, 0x80]);
        assert_eq!(&frame[OFFSET_HUMIDITY..OFFSET_HUMIDITY + 2], &[0xFF, 0xFF]);
        assert_eq!(&frame[OFFSET_BLUE..OFFSET_BLUE + 2], &[0xFF, 0xFF]);
        assert_eq!(&frame[OFFSET_AX..OFFSET_AX + 2], &(-2i16).to_le_bytes());
    }

    #[test]
    fn test_versioned_frame_prefixes_schema_byte() {
        let bare = encode(&full_samples(), &gps_fix());
        let versioned = encode_versioned(&full_samples(), &gps_fix());

        assert_eq!(versioned.len(), 29);
        assert_eq!(versioned[0], SCHEMA_VERSION);
        assert_eq!(&versioned[1..], &bare[..]);
    }
}
