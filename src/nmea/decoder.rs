//! # GGA Fix Decoder
//!
//! Decodes `$GPGGA` fix reports into a [`Fix`]. Every other sentence type is
//! ignored.
//!
//! ## Field Layout (1-based, comma separated)
//!
//! | Field | Content | Example |
//! |-------|---------|---------|
//! | 1 | Tag | `$GPGGA` |
//! | 2 | UTC time | `123519` |
//! | 3 | Latitude `DDMM.mmmm` | `4807.038` |
//! | 4 | Hemisphere `N`/`S` | `N` |
//! | 5 | Longitude `DDDMM.mmmm` | `01131.000` |
//! | 6 | Hemisphere `E`/`W` | `E` |
//! | 7 | Fix quality (0/1/2) | `1` |
//!
//! A hemisphere field modifies the magnitude field immediately before it.
//! An empty magnitude keeps the previously decoded coordinate.

use thiserror::Error;
use tracing::trace;

use super::checksum::{nmea_checksum, parse_checksum, CHECKSUM_DELIMITER};
use crate::fix::{Fix, FixStatus};

/// Tag of the only sentence type acted upon
pub const GGA_TAG: &str = "$GPGGA";

/// Minimum number of fields a GGA sentence must carry to reach the fix quality
const GGA_MIN_FIELDS: usize = 7;

/// Reasons a recognized sentence is discarded
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SentenceError {
    #[error("sentence is not valid ASCII")]
    NotAscii,

    #[error("expected at least 7 fields, got {0}")]
    TooFewFields(usize),

    #[error("invalid {field} magnitude: {value:?}")]
    InvalidMagnitude { field: &'static str, value: String },

    #[error("invalid {field} hemisphere: {value:?}")]
    InvalidHemisphere { field: &'static str, value: String },

    #[error("invalid fix quality: {0:?}")]
    InvalidQuality(String),

    #[error("missing checksum")]
    MissingChecksum,

    #[error("checksum mismatch: computed 0x{computed:02X}, sentence carries {received:?}")]
    ChecksumMismatch { computed: u8, received: String },
}

/// Outcome of parsing one candidate sentence
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Not a fix report
    Ignored,

    /// Fix report that failed to parse; the previous fix stays in force
    Malformed(SentenceError),

    /// Fully parsed fix report
    Fix(Fix),
}

/// Stateless GGA decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct FixDecoder {
    verify_checksum: bool,
}

impl FixDecoder {
    /// Create a decoder
    ///
    /// # Arguments
    ///
    /// * `verify_checksum` - Reject sentences whose `*hh` suffix is missing or wrong
    pub fn new(verify_checksum: bool) -> Self {
        Self { verify_checksum }
    }

    /// Decode a sentence into `fix`
    ///
    /// All fields of `fix` are replaced together, and only when the whole
    /// sentence parses. Malformed sentences leave `fix` unchanged.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` whenever the sentence carries the GGA tag, regardless of parse outcome
    ///
    /// # Examples
    ///
    /// ```
    /// use field_node::fix::{Fix, FixStatus};
    /// use field_node::nmea::decoder::FixDecoder;
    ///
    /// let mut fix = Fix::default();
    /// let sentence = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    /// assert!(FixDecoder::default().decode(sentence, &mut fix));
    /// assert_eq!(fix.status, FixStatus::GpsFix);
    /// ```
    pub fn decode(&self, sentence: &[u8], fix: &mut Fix) -> bool {
        match self.parse(sentence, fix) {
            Decoded::Ignored => false,
            Decoded::Malformed(err) => {
                trace!("Discarding GGA sentence: {}", err);
                true
            }
            Decoded::Fix(decoded) => {
                *fix = decoded;
                true
            }
        }
    }

    /// Parse a sentence against the previously committed fix without mutating it
    pub fn parse(&self, sentence: &[u8], previous: &Fix) -> Decoded {
        let line = sentence.strip_suffix(b"\r").unwrap_or(sentence);

        let tag = line.split(|&b| b == b',').next().unwrap_or_default();
        if tag != GGA_TAG.as_bytes() {
            return Decoded::Ignored;
        }

        match self.parse_gga(line, previous) {
            Ok(fix) => Decoded::Fix(fix),
            Err(err) => Decoded::Malformed(err),
        }
    }

    fn parse_gga(&self, line: &[u8], previous: &Fix) -> Result<Fix, SentenceError> {
        let text = std::str::from_utf8(line).map_err(|_| SentenceError::NotAscii)?;

        let (body, checksum) = match text.rfind(CHECKSUM_DELIMITER) {
            Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
            None => (text, None),
        };

        if self.verify_checksum {
            verify_checksum(body, checksum)?;
        }

        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() < GGA_MIN_FIELDS {
            return Err(SentenceError::TooFewFields(fields.len()));
        }

        let latitude = parse_coordinate("latitude", fields[2], fields[3], 'N', 'S', previous.latitude)?;
        let longitude = parse_coordinate("longitude", fields[4], fields[5], 'E', 'W', previous.longitude)?;

        let status = fields[6]
            .parse::<u8>()
            .ok()
            .and_then(FixStatus::from_quality)
            .ok_or_else(|| SentenceError::InvalidQuality(fields[6].to_string()))?;

        Ok(Fix {
            status,
            latitude,
            longitude,
        })
    }
}

fn verify_checksum(body: &str, checksum: Option<&str>) -> Result<(), SentenceError> {
    let received = checksum.ok_or(SentenceError::MissingChecksum)?;
    let computed = nmea_checksum(body.strip_prefix('$').unwrap_or(body).as_bytes());

    match parse_checksum(received) {
        Some(value) if value == computed => Ok(()),
        _ => Err(SentenceError::ChecksumMismatch {
            computed,
            received: received.to_string(),
        }),
    }
}

/// Parse a magnitude/hemisphere field pair into signed decimal degrees
///
/// An empty magnitude yields `previous` untouched; the hemisphere only signs a
/// freshly parsed magnitude.
fn parse_coordinate(
    field: &'static str,
    magnitude: &str,
    hemisphere: &str,
    positive: char,
    negative: char,
    previous: Option<f64>,
) -> Result<Option<f64>, SentenceError> {
    let negate = match hemisphere {
        "" => false,
        h if h.len() == 1 && h.starts_with(positive) => false,
        h if h.len() == 1 && h.starts_with(negative) => true,
        other => {
            return Err(SentenceError::InvalidHemisphere {
                field,
                value: other.to_string(),
            })
        }
    };

    if magnitude.is_empty() {
        return Ok(previous);
    }

    let raw = magnitude
        .parse::<f64>()
        .ok()
        .filter(|raw| raw.is_finite() && *raw >= 0.0)
        .ok_or_else(|| SentenceError::InvalidMagnitude {
            field,
            value: magnitude.to_string(),
        })?;

    let decimal = ddmm_to_decimal(raw);
    Ok(Some(if negate { -decimal } else { decimal }))
}

/// Convert an unsigned `(D)DDMM.mmmm` value to decimal degrees
///
/// `degrees = floor(raw / 100)`, `minutes = raw - degrees * 100`,
/// `decimal = degrees + minutes / 60`.
pub fn ddmm_to_decimal(raw: f64) -> f64 {
    let degrees = (raw / 100.0).floor();
    let minutes = raw - degrees * 100.0;
    degrees + minutes / 60.0
}
