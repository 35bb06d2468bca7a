//! # Serial Communication Module
//!
//! Handles the UART link to the GPS receiver.
//!
//! This module handles:
//! - Opening the receiver port (9600 baud 8N1 by default)
//! - Auto-detecting the device when no path is configured
//! - Non-blocking reads of already-buffered NMEA bytes
//! - Writing receiver configuration sentences

pub mod port_trait;

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::GpsConfig;
use crate::error::{FieldNodeError, Result};
pub use port_trait::NmeaSource;

/// Default GPS receiver device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyS0",   // On-board UART wired to the receiver
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/ttyACM0", // Receivers with a native USB CDC interface
];

/// GPS receiver serial port handler
pub struct GpsSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyS0)
    device_path: String,
}

impl std::fmt::Debug for GpsSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpsSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl GpsSerial {
    /// Open the receiver port described by the configuration
    ///
    /// Uses `config.port` when set, otherwise tries the default device paths.
    ///
    /// # Errors
    ///
    /// Returns error if no device could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use field_node::config::GpsConfig;
    /// use field_node::serial::GpsSerial;
    ///
    /// let serial = GpsSerial::open(&GpsConfig::default())?;
    /// println!("GPS on {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &GpsConfig) -> Result<Self> {
        if config.port.is_empty() {
            Self::open_with_paths(DEFAULT_DEVICE_PATHS, config.baud_rate)
        } else {
            Self::open_with_paths(&[config.port.as_str()], config.baud_rate)
        }
    }

    /// Open the first device in `paths` that accepts the connection
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyS0"])
    /// * `baud_rate` - Receiver baud rate
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened GPS receiver at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(FieldNodeError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with 8N1 framing
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| FieldNodeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl NmeaSource for GpsSerial {
    async fn read_pending(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // The read is polled once; if the driver has nothing buffered the
        // ready branch wins and no bytes are consumed.
        tokio::select! {
            biased;
            result = self.port.read(buf) => result,
            _ = std::future::ready(()) => Ok(0),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }
}
