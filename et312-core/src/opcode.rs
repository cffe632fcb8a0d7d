//! Box command opcodes
//!
//! Opcodes are executed by writing them to the command register
//! ([`addresses::COMMAND`](crate::constants::addresses::COMMAND)). Most of
//! them take their argument from the command argument register, which must
//! be written first.

use std::fmt;

use crate::error::{Error, Result};

/// Menu item id of the "Low" power level; Normal and High follow it
pub const POWER_LEVEL_MENU_BASE: u8 = 0x6A;

/// Box command opcodes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Run the menu item whose id is in the argument register
    ExecuteMenuItem = 0x06,

    /// Switch to the mode whose id is in the argument register
    SelectMode = 0x12,

    /// Draw the character/position pair in the display register
    WriteCharacter = 0x13,

    /// Draw the string table entry whose offset is in the display register
    WriteModeName = 0x15,

    /// Start the power ramp
    StartRamp = 0x21,
}

impl Opcode {
    /// Get opcode name
    pub fn name(self) -> &'static str {
        match self {
            Self::ExecuteMenuItem => "EXECUTE_MENU_ITEM",
            Self::SelectMode => "SELECT_MODE",
            Self::WriteCharacter => "WRITE_CHARACTER",
            Self::WriteModeName => "WRITE_MODE_NAME",
            Self::StartRamp => "START_RAMP",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> u8 {
        opcode as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x06 => Ok(Self::ExecuteMenuItem),
            0x12 => Ok(Self::SelectMode),
            0x13 => Ok(Self::WriteCharacter),
            0x15 => Ok(Self::WriteModeName),
            0x21 => Ok(Self::StartRamp),
            _ => Err(Error::UnknownOpcode(value)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}
