//! # NMEA-0183 Checksum
//!
//! XOR checksum over every byte between the leading `$` and the `*` delimiter,
//! transmitted as two uppercase hex digits.

/// Delimiter separating the sentence body from its checksum
pub const CHECKSUM_DELIMITER: char = '*';

/// Calculate the NMEA checksum of a sentence body
///
/// # Arguments
///
/// * `body` - Sentence bytes without the leading `$` and without `*hh`
///
/// # Returns
///
/// * `u8` - XOR of all bytes
///
/// # Examples
///
/// ```
/// use field_node::nmea::checksum::nmea_checksum;
///
/// assert_eq!(nmea_checksum(b"PMTK220,1000"), 0x1F);
/// ```
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &byte| acc ^ byte)
}

/// Parse a two-digit hex checksum field
///
/// Returns `None` unless the field is exactly two hex digits.
pub fn parse_checksum(field: &str) -> Option<u8> {
    if field.len() != 2 {
        return None;
    }
    u8::from_str_radix(field, 16).ok()
}

/// Build a complete, CRLF-terminated sentence from its body
///
/// # Examples
///
/// ```
/// use field_node::nmea::checksum::build_sentence;
///
/// assert_eq!(build_sentence("PMTK220,1000"), "$PMTK220,1000*1F\r\n");
/// ```
pub fn build_sentence(body: &str) -> String {
    format!("${}{}{:02X}\r\n", body, CHECKSUM_DELIMITER, nmea_checksum(body.as_bytes()))
}
