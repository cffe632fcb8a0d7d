//! Modes (running programs) and power levels

use std::fmt;

use crate::error::{Error, Result};

/// Mode id as stored in the MODENUM register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mode(pub u8);

const MODE_NAMES: [(u8, &str); 24] = [
    (0x00, "None"),
    (0x76, "Waves"),
    (0x77, "Stroke"),
    (0x78, "Climb"),
    (0x79, "Combo"),
    (0x7A, "Intense"),
    (0x7B, "Rhythm"),
    (0x7C, "Audio 1"),
    (0x7D, "Audio 2"),
    (0x7E, "Audio 3"),
    (0x7F, "Split"),
    (0x80, "Random1"),
    (0x81, "Random2"),
    (0x82, "Toggle"),
    (0x83, "Orgasm"),
    (0x84, "Torment"),
    (0x85, "Phase 1"),
    (0x86, "Phase 2"),
    (0x87, "Phase 3"),
    (0x88, "User1"),
    (0x89, "User2"),
    (0x8A, "User3"),
    (0x8B, "User4"),
    (0x8C, "User5"),
];

/// Modes that may run on either channel of Split mode
const SPLIT_MODES: [u8; 13] = [
    0x76, 0x77, 0x79, 0x7A, 0x7B, 0x7C, 0x7D, 0x7E, 0x88, 0x89, 0x8A, 0x8B, 0x8C,
];

impl Mode {
    pub const NONE: Mode = Mode(0x00);
    pub const WAVES: Mode = Mode(0x76);
    pub const SPLIT: Mode = Mode(0x7F);

    /// Mode id that does not exist; selecting it stops all output
    pub const STOP: Mode = Mode(0x8D);

    /// Validate a mode id for selection
    ///
    /// Accepts any id in the mode table (including 0) and the stop
    /// sentinel.
    ///
    /// # Examples
    ///
    /// ```
    /// use et312_types::Mode;
    ///
    /// assert!(Mode::validate(0x76).is_ok());
    /// assert!(Mode::validate(0x8D).is_ok());
    /// assert!(Mode::validate(0x42).is_err());
    /// ```
    pub fn validate(id: u8) -> Result<Self> {
        let mode = Mode(id);
        if mode == Self::STOP || mode.name().is_some() {
            Ok(mode)
        } else {
            Err(Error::InvalidMode(id))
        }
    }

    /// Mode name, if the id is in the mode table
    pub fn name(self) -> Option<&'static str> {
        MODE_NAMES
            .iter()
            .find(|(id, _)| *id == self.0)
            .map(|(_, name)| *name)
    }

    /// Check if the mode can run on a channel of Split mode
    pub fn is_split_eligible(self) -> bool {
        SPLIT_MODES.contains(&self.0)
    }

    /// Check if the unit offers this mode, given its advertised top mode
    pub fn is_available(self, top_mode: u8) -> bool {
        self.0 <= top_mode
    }

    /// Split-eligible modes the unit offers
    pub fn split_modes(top_mode: u8) -> impl Iterator<Item = Mode> {
        SPLIT_MODES
            .iter()
            .copied()
            .map(Mode)
            .filter(move |m| m.is_available(top_mode))
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> u8 {
        mode.0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}(0x{:02X})", self.0),
            None if *self == Self::STOP => write!(f, "Stop(0x{:02X})", self.0),
            None => write!(f, "Unknown(0x{:02X})", self.0),
        }
    }
}

/// Output power level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PowerLevel {
    Low = 1,
    Normal = 2,
    High = 3,
}

impl PowerLevel {
    /// Get level name
    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::High => "High",
        }
    }
}

impl From<PowerLevel> for u8 {
    fn from(level: PowerLevel) -> u8 {
        level as u8
    }
}

impl TryFrom<u8> for PowerLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Normal),
            3 => Ok(Self::High),
            _ => Err(Error::InvalidPowerLevel(value)),
        }
    }
}

impl fmt::Display for PowerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
