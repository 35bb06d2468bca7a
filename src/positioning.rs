//! # Positioning Task
//!
//! Periodic task that drains the GPS receiver port, frames NMEA sentences and
//! commits decoded fixes to the [`FixWriter`].
//!
//! The task never waits for input that has not arrived yet: each poll reads
//! whatever the driver has buffered, then sleeps for the poll interval.

use std::time::Duration;
use tracing::{info, trace, warn};

use crate::error::Result;
use crate::fix::FixWriter;
use crate::nmea::checksum::build_sentence;
use crate::nmea::decoder::{Decoded, FixDecoder};
use crate::nmea::framer::SentenceFramer;
use crate::serial::NmeaSource;

/// Receiver setup sentence bodies, sent once at task start
///
/// - `PGCMD,33,1`: report antenna status
/// - `PMTK300,1000,0,0,0,0`: 1 Hz position fix rate
/// - `PMTK220,1000`: 1 Hz NMEA output rate
pub const RECEIVER_SETUP: [&str; 3] = ["PGCMD,33,1", "PMTK300,1000,0,0,0,0", "PMTK220,1000"];

/// Read chunk size per `read_pending` call
const READ_CHUNK: usize = 64;

/// Framer + decoder pipeline writing into the fix store
#[derive(Debug)]
pub struct GpsReceiver {
    framer: SentenceFramer,
    decoder: FixDecoder,
    writer: FixWriter,
    fixes: u64,
}

impl GpsReceiver {
    pub fn new(framer: SentenceFramer, decoder: FixDecoder, writer: FixWriter) -> Self {
        Self {
            framer,
            decoder,
            writer,
            fixes: 0,
        }
    }

    /// Feed one byte; commits a fix when it completes a valid GGA sentence
    pub fn feed(&mut self, byte: u8) {
        let Some(sentence) = self.framer.feed(byte) else {
            return;
        };

        let decoder = &self.decoder;
        let committed = self.writer.update(|fix| match decoder.parse(&sentence, fix) {
            Decoded::Fix(decoded) => {
                *fix = decoded;
                true
            }
            Decoded::Malformed(err) => {
                trace!("Discarding GGA sentence: {}", err);
                false
            }
            Decoded::Ignored => false,
        });

        if committed {
            self.fixes += 1;
        }
    }

    /// Feed a chunk of bytes in order
    pub fn feed_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.feed(byte);
        }
    }

    /// Fixes committed since creation
    pub fn fixes(&self) -> u64 {
        self.fixes
    }

    /// Overflow resets of the sentence buffer since creation
    pub fn overflows(&self) -> u64 {
        self.framer.overflows()
    }
}

/// Send the receiver setup sentences
///
/// Write failures are logged and skipped: the receiver still emits GGA at its
/// power-on defaults.
pub async fn configure_receiver<S: NmeaSource + ?Sized>(source: &mut S) {
    for body in RECEIVER_SETUP {
        let sentence = build_sentence(body);
        if let Err(e) = source.write_all(sentence.as_bytes()).await {
            warn!("Failed to send receiver command {}: {}", body, e);
        }
    }

    if let Err(e) = source.flush().await {
        warn!("Failed to flush receiver commands: {}", e);
    }
}

/// Drain everything currently buffered in `source` into `receiver`
///
/// # Returns
///
/// * `Result<usize>` - Number of bytes consumed
pub async fn poll_once<S: NmeaSource + ?Sized>(source: &mut S, receiver: &mut GpsReceiver) -> Result<usize> {
    let mut buf = [0u8; READ_CHUNK];
    let mut total = 0;

    loop {
        let count = source.read_pending(&mut buf).await?;
        if count == 0 {
            return Ok(total);
        }
        receiver.feed_all(&buf[..count]);
        total += count;
    }
}

/// Run the positioning task forever
///
/// Read errors are logged and the task carries on with the next poll.
pub async fn run_positioning_task<S: NmeaSource>(mut source: S, mut receiver: GpsReceiver, poll_interval: Duration) {
    configure_receiver(&mut source).await;
    info!("Positioning task started (poll every {:?})", poll_interval);

    loop {
        if let Err(e) = poll_once(&mut source, &mut receiver).await {
            warn!("GPS read failed: {}", e);
        }

        tokio::time::sleep(poll_interval).await;
    }
}
