//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Read or write on a channel that was never opened (or was closed)
    #[error("Channel not open")]
    NotConnected,

    #[error("Channel already open")]
    AlreadyConnected,

    #[error("Timed out opening channel")]
    ConnectionTimeout,

    /// No bytes within the read bound; the channel itself is fine
    #[error("No bytes within read timeout")]
    ReadTimeout,

    /// Remote end hung up (bridge closed, adapter unplugged)
    #[error("Channel closed by remote end")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Bridge host could not be resolved
    #[error("Cannot resolve {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Check if the unit is no longer reachable over an opened channel
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Io(_) | Self::Serial(_))
    }
}
