//! ET-312 checksum algorithm
//!
//! Every request carries a trailing checksum byte, and every reply that
//! returns data (key exchange, reads) ends with one:
//! 1. Sum all preceding bytes
//! 2. Keep the low 8 bits

use tracing::trace;

use crate::error::{Error, Result};

/// Calculate the checksum of a frame body
///
/// # Examples
///
/// ```
/// use et312_core::checksum;
///
/// assert_eq!(checksum::calculate(&[0x2F, 0x00]), 0x2F);
/// assert_eq!(checksum::calculate(&[0xFF, 0x02]), 0x01);
/// ```
pub fn calculate(data: &[u8]) -> u8 {
    let checksum = data.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte));

    trace!(
        len = data.len(),
        checksum = format!("0x{:02X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Verify a frame whose last byte is the checksum of the bytes before it
///
/// # Errors
///
/// - [`Error::PacketTooShort`] if the frame has fewer than 2 bytes
/// - [`Error::ChecksumMismatch`] if the trailing byte is wrong
pub fn verify(frame: &[u8]) -> Result<()> {
    let Some((received, body)) = frame.split_last().filter(|_| frame.len() >= 2) else {
        return Err(Error::PacketTooShort {
            expected: 2,
            actual: frame.len(),
        });
    };

    let expected = calculate(body);
    if expected != *received {
        return Err(Error::ChecksumMismatch {
            expected,
            received: *received,
        });
    }

    Ok(())
}

/// Append the checksum of `frame` to it
pub fn append(frame: &mut Vec<u8>) {
    let checksum = calculate(frame);
    frame.push(checksum);
}
