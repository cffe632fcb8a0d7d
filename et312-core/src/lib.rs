//! # et312-core
//!
//! Core protocol implementation for ET-312 stimulation units.
//!
//! This crate provides the low-level protocol primitives:
//! - Checksum calculation and verification
//! - Single-byte XOR cipher
//! - Request packet encoding (sync, key exchange, read, write)
//! - Virtual address space windows
//! - Box command opcodes
//! - Session state bookkeeping

pub mod address;
pub mod checksum;
pub mod cipher;
pub mod constants;
pub mod error;
pub mod opcode;
pub mod packet;
pub mod session;

pub use address::MemoryWindow;
pub use error::{Error, Result};
pub use opcode::Opcode;
pub use packet::Request;
pub use session::{Session, SessionState};

/// Longest request frame: opcode + 2 address bytes + 8 data bytes
pub const MAX_FRAME_SIZE: usize = 11;

/// Maximum number of bytes in a single write request
pub const MAX_WRITE_SIZE: usize = 8;
