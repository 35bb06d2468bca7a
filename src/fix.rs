//! # Fix Store
//!
//! Single-slot holder of the latest GPS fix.
//!
//! The positioning task is the only writer; the uplink dispatcher reads a copy
//! at the start of every send cycle. The slot is a [`tokio::sync::watch`]
//! channel, so a reader always observes the last fully committed [`Fix`] and
//! never a half-written one.

use serde::Serialize;
use tokio::sync::watch;

/// Fix quality reported by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FixStatus {
    /// No position available
    #[default]
    NoFix,

    /// Standalone GPS fix
    GpsFix,

    /// Differential GPS fix
    DgpsFix,
}

impl FixStatus {
    /// Map a GGA fix-quality indicator to a status
    ///
    /// Only the indicators 0, 1 and 2 are recognized.
    pub fn from_quality(quality: u8) -> Option<Self> {
        match quality {
            0 => Some(Self::NoFix),
            1 => Some(Self::GpsFix),
            2 => Some(Self::DgpsFix),
            _ => None,
        }
    }
}

/// Most recently decoded position and quality
///
/// Coordinates are signed decimal degrees (south and west negative). They stay
/// `None` until the first sentence carrying them has been decoded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Fix {
    pub status: FixStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Fix {
    /// Whether the fix carries a usable position
    pub fn has_position(&self) -> bool {
        self.status != FixStatus::NoFix && self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Create the process-wide fix slot, starting at [`Fix::default`]
pub fn fix_store() -> (FixWriter, FixReader) {
    let (tx, rx) = watch::channel(Fix::default());
    (FixWriter { tx }, FixReader { rx })
}

/// Write half of the fix store, owned by the positioning task
#[derive(Debug)]
pub struct FixWriter {
    tx: watch::Sender<Fix>,
}

impl FixWriter {
    /// Run `update` against the committed fix while holding the slot
    ///
    /// Readers are notified only when `update` returns `true`. `update` must
    /// leave the fix untouched when it returns `false`.
    pub fn update<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut Fix) -> bool,
    {
        self.tx.send_if_modified(update)
    }

    /// Replace the committed fix
    pub fn publish(&self, fix: Fix) {
        self.tx.send_replace(fix);
    }

    /// Open another read handle
    pub fn reader(&self) -> FixReader {
        FixReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read half of the fix store
#[derive(Debug, Clone)]
pub struct FixReader {
    rx: watch::Receiver<Fix>,
}

impl FixReader {
    /// Copy of the last committed fix
    pub fn snapshot(&self) -> Fix {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_fix_without_coordinates() {
        let (_writer, reader) = fix_store();
        let fix = reader.snapshot();
        assert_eq!(fix.status, FixStatus::NoFix);
        assert!(fix.latitude.is_none());
        assert!(fix.longitude.is_none());
        assert!(!fix.has_position());
    }

    #[test]
    fn test_from_quality() {
        assert_eq!(FixStatus::from_quality(0), Some(FixStatus::NoFix));
        assert_eq!(FixStatus::from_quality(1), Some(FixStatus::GpsFix));
        assert_eq!(FixStatus::from_quality(2), Some(FixStatus::DgpsFix));
        assert_eq!(FixStatus::from_quality(3), None);
    }

    #[test]
    fn test_update_rejected_keeps_previous() {
        let (writer, reader) = fix_store();
        writer.publish(Fix {
            status: FixStatus::GpsFix,
            latitude: Some(1.0),
            longitude: Some(2.0),
        });

        assert!(!writer.update(|_| false));
        assert_eq!(reader.snapshot().latitude, Some(1.0));
    }

    #[test]
    fn test_update_commits_whole_fix() {
        let (writer, reader) = fix_store();
        let committed = writer.update(|fix| {
            *fix = Fix {
                status: FixStatus::DgpsFix,
                latitude: Some(-33.5),
                longitude: Some(151.25),
            };
            true
        });

        assert!(committed);
        let fix = reader.snapshot();
        assert_eq!(fix.status, FixStatus::DgpsFix);
        assert!(fix.has_position());
    }

    #[tokio::test]
    async fn test_reader_observes_writes_across_tasks() {
        let (writer, reader) = fix_store();
        let handle = tokio::spawn(async move {
            writer.publish(Fix {
                status: FixStatus::GpsFix,
                latitude: Some(48.1173),
                longitude: Some(11.5167),
            });
        });
        handle.await.unwrap();

        let fix = reader.snapshot();
        assert_eq!(fix.status, FixStatus::GpsFix);
        assert_eq!(fix.latitude, Some(48.1173));
    }

    #[test]
    fn test_fix_serializes_for_uplink_record() {
        let json = serde_json::to_string(&Fix::default()).unwrap();
        assert!(json.contains("\"status\":\"NoFix\""));
        assert!(json.contains("\"latitude\":null"));

        let fix = Fix {
            status: FixStatus::GpsFix,
            latitude: Some(48.5),
            longitude: Some(-11.25),
        };
        let json = serde_json::to_string(&fix).unwrap();
        assert!(json.contains("\"status\":\"GpsFix\""));
        assert!(json.contains("\"longitude\":-11.25"));
    }
}
