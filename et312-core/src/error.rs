//! Error types for et312-core

/// Result type alias for et312 protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Packet is too short to carry a checksum
    #[error("Packet too short: expected at least {expected} bytes, got {actual} bytes")]
    PacketTooShort {
        expected: usize,
        actual: usize,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch {
        expected: u8,
        received: u8,
    },

    /// Write request carries zero or more than eight bytes
    #[error("Invalid write size: {0} bytes (must be 1-8)")]
    InvalidWriteSize(usize),

    /// Address lies outside every memory window
    #[error("Invalid address: 0x{0:04X} is outside the ROM, RAM and EEPROM windows")]
    InvalidAddress(u16),

    /// Unknown box command opcode
    #[error("Unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Session not ready for data-plane exchanges
    #[error("Session not ready - connect to the unit first")]
    SessionNotReady,

    /// Display text or position out of range
    #[error("Invalid display text: {0}")]
    InvalidDisplayText(String),
}
