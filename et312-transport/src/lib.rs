//! Transport layer for the ET-312 protocol
//!
//! Provides the byte-duplex channel the protocol engine runs over: a local
//! serial port, or a serial link forwarded over TCP.

pub mod error;
pub mod serial;
pub mod tcp;

pub use error::{Error, Result};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different communication methods
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel
    async fn open(&mut self) -> Result<()>;

    /// Close the channel
    async fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Write raw bytes
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever bytes are available, waiting at most `timeout`
    ///
    /// Returns [`Error::ReadTimeout`] if nothing arrived in time. A timed
    /// out read consumes nothing: late bytes are returned by the next call.
    async fn read_timeout(&mut self, timeout: Duration) -> Result<BytesMut>;

    /// Human-readable endpoint name (port path or remote address)
    fn name(&self) -> String;
}
