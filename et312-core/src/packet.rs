//! ET-312 request frames and reply parsing

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    MAX_WRITE_SIZE,
    address, checksum, cipher,
    constants::wire,
    error::{Error, Result},
};

/// Request sent from the host to the unit
///
/// # Frame Structure
///
/// ```text
/// Sync          ┌──────┐
///               │ 0x00 │                                    reply: 0x07
///               └──────┘
/// Key exchange  ┌──────┬──────┬──────┐
///               │ 0x2F │ 0x00 │ csum │                      reply: 0x21 key csum
///               └──────┴──────┴──────┘
/// Read          ┌──────┬──────┬──────┬──────┐
///               │ 0x3C │ addH │ addL │ csum │               reply: 0x22 value csum
///               └──────┴──────┴──────┴──────┘
/// Write         ┌──────┬──────┬──────┬─────────┬──────┐
///               │ op   │ addH │ addL │ d0..dn-1│ csum │     reply: 0x06
///               └──────┴──────┴──────┴─────────┴──────┘
///               op = ((0x3 + n) << 4) | 0x0D
/// ```
///
/// Once a session key exists, sync, read and write frames are encrypted
/// byte by byte (checksum included). The key exchange frame never is.
///
/// # Examples
///
/// ```
/// use et312_core::Request;
///
/// let request = Request::read(0x407B).unwrap();
/// assert_eq!(&request.encode(None)[..], &[0x3C, 0x40, 0x7B, 0xF7]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum Request {
    /// Single resynchronization byte
    Sync,

    /// Session key request
    KeyExchange,

    /// Single-byte read
    Read { address: u16 },

    /// Sequential write of 1-8 bytes
    Write { address: u16, data: Bytes },
}

impl Request {
    /// Create a sync request
    pub fn sync() -> Self {
        Self::Sync
    }

    /// Create a key exchange request
    pub fn key_exchange() -> Self {
        Self::KeyExchange
    }

    /// Create a read request for an address (reduced into its window)
    pub fn read(address: u16) -> Result<Self> {
        Ok(Self::Read {
            address: address::reduce(address)?,
        })
    }

    /// Create a sequential write request
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidWriteSize`] for zero or more than eight bytes
    /// - [`Error::InvalidAddress`] if the address or the written span is
    ///   outside every window
    ///
    /// # Examples
    ///
    /// ```
    /// use et312_core::{Error, Request};
    ///
    /// assert!(Request::write(0x420D, vec![0x80u8]).is_ok());
    /// assert_eq!(
    ///     Request::write(0x420D, vec![0u8; 9]),
    ///     Err(Error::InvalidWriteSize(9))
    /// );
    /// ```
    pub fn write(address: u16, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();

        if data.is_empty() || data.len() > MAX_WRITE_SIZE {
            return Err(Error::InvalidWriteSize(data.len()));
        }

        Ok(Self::Write {
            address: address::check_span(address, data.len())?,
            data,
        })
    }

    /// Number of reply bytes the unit sends for this request
    ///
    /// Writes are acknowledged with a single byte.
    pub fn reply_len(&self) -> usize {
        match self {
            Self::Sync => 1,
            Self::KeyExchange => wire::KEY_EXCHANGE_REPLY_LEN,
            Self::Read { .. } => wire::READ_REPLY_LEN,
            Self::Write { .. } => 1,
        }
    }

    /// Plain frame, checksum included, before encryption
    pub fn frame(&self) -> BytesMut {
        let mut frame = Vec::with_capacity(crate::MAX_FRAME_SIZE + 1);

        match self {
            Self::Sync => {
                frame.push(wire::SYNC);
                return BytesMut::from(&frame[..]);
            }
            Self::KeyExchange => {
                frame.extend_from_slice(&[wire::KEY_EXCHANGE, 0x00]);
            }
            Self::Read { address } => {
                frame.push(wire::READ);
                frame.extend_from_slice(&address.to_be_bytes());
            }
            Self::Write { address, data } => {
                frame.push(write_opcode(data.len()));
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(data);
            }
        }

        checksum::append(&mut frame);

        let mut buf = BytesMut::with_capacity(frame.len());
        buf.put_slice(&frame);
        buf
    }

    /// Encode the frame for the wire, encrypting it when a key is given
    pub fn encode(&self, key: Option<u8>) -> Bytes {
        let mut frame = self.frame();

        let key = match self {
            Self::KeyExchange => None,
            _ => key,
        };
        cipher::encrypt_frame(&mut frame, key);

        frame.freeze()
    }
}

/// Opcode byte of a write request carrying `len` data bytes
pub fn write_opcode(len: usize) -> u8 {
    (((0x3 + len) as u8) << 4) | wire::WRITE_LOW_NIBBLE
}

/// Extract the value from a read reply `[0x22, value, checksum]`
pub fn read_value(reply: &[u8]) -> Result<u8> {
    if reply.len() < wire::READ_REPLY_LEN {
        return Err(Error::PacketTooShort {
            expected: wire::READ_REPLY_LEN,
            actual: reply.len(),
        });
    }

    Ok(reply[1])
}

/// Locate the key exchange marker in a reply
pub fn find_key_marker(reply: &[u8]) -> Option<usize> {
    reply.iter().position(|b| *b == wire::KEY_EXCHANGE_REPLY)
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.write_str("Sync"),
            Self::KeyExchange => f.write_str("KeyExchange"),
            Self::Read { address } => f
                .debug_struct("Read")
                .field("address", &format!("0x{:04X}", address))
                .finish(),
            Self::Write { address, data } => f
                .debug_struct("Write")
                .field("address", &format!("0x{:04X}", address))
                .field("data", &hex::encode(data))
                .finish(),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "Sync"),
            Self::KeyExchange => write!(f, "KeyExchange"),
            Self::Read { address } => write!(f, "Read[0x{:04X}]", address),
            Self::Write { address, data } => {
                write!(f, "Write[0x{:04X}](len={})", address, data.len())
            }
        }
    }
}
