//! Trait abstraction for the GPS receiver serial port to enable testing

use async_trait::async_trait;
use std::io;

/// Byte source for the positioning task
#[async_trait]
pub trait NmeaSource: Send {
    /// Copy bytes the port has already received into `buf`
    ///
    /// Never waits for new input: returns `Ok(0)` when nothing is pending.
    async fn read_pending(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}
