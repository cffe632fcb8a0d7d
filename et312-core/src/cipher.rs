//! ET-312 link obfuscation
//!
//! Once a session key has been exchanged, every byte the host sends is
//! XORed with the key and the constant `0x55`. Replies from the unit are
//! never encrypted. XOR is its own inverse, so the same operation decrypts.

use crate::constants::CIPHER_MASK;

/// Encrypt a single byte with the session key
///
/// # Examples
///
/// ```
/// use et312_core::cipher;
///
/// let encrypted = cipher::encrypt_byte(0x3C, 0x2A);
/// assert_eq!(encrypted, 0x3C ^ 0x2A ^ 0x55);
/// assert_eq!(cipher::decrypt_byte(encrypted, 0x2A), 0x3C);
/// ```
pub fn encrypt_byte(byte: u8, key: u8) -> u8 {
    byte ^ key ^ CIPHER_MASK
}

/// Decrypt a single byte with the session key
pub fn decrypt_byte(byte: u8, key: u8) -> u8 {
    encrypt_byte(byte, key)
}

/// Encrypt a frame in place, including its checksum byte
///
/// Frames sent before a key exists pass through unmodified.
pub fn encrypt_frame(frame: &mut [u8], key: Option<u8>) {
    if let Some(key) = key {
        for byte in frame.iter_mut() {
            *byte = encrypt_byte(*byte, key);
        }
    }
}
