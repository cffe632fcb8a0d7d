//! Bit flags exposed through registers

use bitflags::bitflags;

bitflags! {
    /// SYSTEMFLAGS register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SystemFlags: u8 {
        /// Level and multi-adjust front-panel inputs are ignored in favour
        /// of values written over the link
        const REMOTE_CONTROL = 0x01;
    }
}

bitflags! {
    /// POWERSTATUS register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PowerStatus: u8 {
        const BATTERY = 0x01;
        const POWER_SUPPLY = 0x02;
    }
}

impl SystemFlags {
    /// Check if the remote-control bit is set in a raw register value
    pub fn remote_control(raw: u8) -> bool {
        Self::from_bits_retain(raw).contains(Self::REMOTE_CONTROL)
    }

    /// Raw register value with the remote-control bit set or cleared,
    /// leaving every other bit as it was
    pub fn with_remote_control(raw: u8, enabled: bool) -> u8 {
        let mut flags = Self::from_bits_retain(raw);
        flags.set(Self::REMOTE_CONTROL, enabled);
        flags.bits()
    }
}
