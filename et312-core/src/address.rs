//! Virtual address space of the unit
//!
//! The firmware exposes three windows in a 16-bit address space:
//!
//! ```text
//! 0x0000 - 0x01FF  ROM     (last 512 bytes of flash)
//! 0x4000 - 0x43FF  RAM     (first 1k of RAM)
//! 0x8000 - 0x81FF  EEPROM  (512 bytes)
//! ```
//!
//! Each window repeats up to the base of the next one, so `0x0230` is the
//! same location as `0x0030`. Addresses from `0xC000` up belong to no window.

use std::fmt;

use crate::constants::windows::*;
use crate::error::{Error, Result};

/// One of the three memory windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryWindow {
    Rom,
    Ram,
    Eeprom,
}

impl MemoryWindow {
    /// Find the window an address falls in (including its repeats)
    pub fn of(address: u16) -> Result<Self> {
        match address {
            0x0000..=0x3FFF => Ok(Self::Rom),
            0x4000..=0x7FFF => Ok(Self::Ram),
            0x8000..=0xBFFF => Ok(Self::Eeprom),
            _ => Err(Error::InvalidAddress(address)),
        }
    }

    /// First address of the window
    pub fn base(self) -> u16 {
        match self {
            Self::Rom => ROM_BASE,
            Self::Ram => RAM_BASE,
            Self::Eeprom => EEPROM_BASE,
        }
    }

    /// Number of distinct bytes in the window
    pub fn size(self) -> u16 {
        match self {
            Self::Rom => ROM_SIZE,
            Self::Ram => RAM_SIZE,
            Self::Eeprom => EEPROM_SIZE,
        }
    }

    /// Check if writes to this window take effect
    ///
    /// ROM writes are acknowledged by the unit but change nothing.
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::Rom)
    }

    /// Check if a reduced address lies inside the window
    pub fn contains(self, address: u16) -> bool {
        address >= self.base() && address - self.base() < self.size()
    }
}

impl fmt::Display for MemoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rom => "ROM",
            Self::Ram => "RAM",
            Self::Eeprom => "EEPROM",
        };
        write!(f, "{name}[0x{:04X}..0x{:04X})", self.base(), u32::from(self.base()) + u32::from(self.size()))
    }
}

/// Reduce an address into its window
///
/// # Examples
///
/// ```
/// use et312_core::address::reduce;
///
/// assert_eq!(reduce(0x0230).unwrap(), 0x0030);
/// assert_eq!(reduce(0x407B).unwrap(), 0x407B);
/// assert_eq!(reduce(0x447B).unwrap(), 0x407B);
/// assert!(reduce(0xC000).is_err());
/// ```
pub fn reduce(address: u16) -> Result<u16> {
    let window = MemoryWindow::of(address)?;
    Ok(window.base() | (address & (window.size() - 1)))
}

/// Check that a sequential write of `len` bytes stays inside one window
pub fn check_span(address: u16, len: usize) -> Result<u16> {
    let start = reduce(address)?;
    let window = MemoryWindow::of(start)?;
    let end = u32::from(start) + len as u32;

    if end > u32::from(window.base()) + u32::from(window.size()) {
        return Err(Error::InvalidAddress(address));
    }

    Ok(start)
}
