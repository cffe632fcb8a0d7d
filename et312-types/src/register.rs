//! Named registers of the unit's memory map
//!
//! The table below is the single source of truth shared by the controller
//! and anything that reports status. Registers flagged `heartbeat` change
//! often and make up the small status snapshot polled periodically.

use std::fmt;

use crate::error::{Error, Result};

/// Register descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    /// Symbolic name
    pub name: &'static str,

    /// Address in the unit's virtual memory map
    pub address: u16,

    /// Human-readable description
    pub description: &'static str,

    /// Included in heartbeat snapshots
    pub heartbeat: bool,

    /// Rejected by register writes
    pub read_only: bool,
}

impl Register {
    const fn new(name: &'static str, address: u16, description: &'static str) -> Self {
        Self {
            name,
            address,
            description,
            heartbeat: false,
            read_only: false,
        }
    }

    const fn heartbeat(mut self) -> Self {
        self.heartbeat = true;
        self
    }

    const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Look up a register by name
    ///
    /// # Examples
    ///
    /// ```
    /// use et312_types::Register;
    ///
    /// let register = Register::lookup("MAVALUE").unwrap();
    /// assert_eq!(register.address, 0x420D);
    /// assert!(Register::lookup("NOPE").is_err());
    /// ```
    pub fn lookup(name: &str) -> Result<&'static Register> {
        REGISTERS
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::InvalidRegister(name.to_string()))
    }

    /// Look up a register by address
    pub fn by_address(address: u16) -> Option<&'static Register> {
        REGISTERS.iter().find(|r| r.address == address)
    }

    /// Fail if the register may not be written
    pub fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnlyRegister(self.name));
        }
        Ok(())
    }

    /// Iterate over the registers of a heartbeat snapshot
    pub fn heartbeat_set() -> impl Iterator<Item = &'static Register> {
        REGISTERS.iter().filter(|r| r.heartbeat)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:04X})", self.name, self.address)
    }
}

pub const SYSTEM_FLAGS: Register = Register::new("SYSTEMFLAGS", 0x400F, "System Flags").heartbeat();
pub const ADC1: Register = Register::new("ADC1", 0x4061, "Multi-adjust knob position").read_only();
pub const ADC4: Register = Register::new("ADC4", 0x4064, "Level A Knob Position").read_only();
pub const ADC5: Register = Register::new("ADC5", 0x4065, "Level B Knob Position").read_only();
pub const ADC6: Register = Register::new("ADC6", 0x4066, "Audio Input Level A").heartbeat().read_only();
pub const ADC7: Register = Register::new("ADC7", 0x4067, "Audio Input Level B").heartbeat().read_only();
pub const MENU_STATE: Register = Register::new("MENUSTATE", 0x406D, "Menu State").read_only();
pub const MODE_NUM: Register = Register::new("MODENUM", 0x407B, "Current mode number").heartbeat().read_only();
pub const CONTROL_FLAGS: Register = Register::new("CONTROLFLAGS", 0x4083, "Control Flags");
pub const RAMP_VALUE: Register = Register::new("RAMPVALUE", 0x409C, "Ramp Value Counter").heartbeat();
pub const RAMP_SELECT: Register = Register::new("RAMPSELECT", 0x40A3, "Ramp Select").heartbeat();
pub const BATTERY_LEVEL: Register = Register::new("BATTERYLEVEL", 0x4203, "Battery Level (0-255)").read_only();
pub const MA_VALUE: Register = Register::new("MAVALUE", 0x420D, "Multi-Adjust value");
pub const MA_LOW: Register = Register::new("MALOW", 0x4086, "Low end of Multi-Adjust range");
pub const MA_HIGH: Register = Register::new("MAHIGH", 0x4087, "High end of Multi-Adjust range");
pub const POWER_LEVEL: Register = Register::new("POWERLEVEL", 0x41F4, "Power Level").read_only();
pub const TOP_MODE: Register = Register::new("TOPMODE", 0x41F3, "Highest available mode number").read_only();
pub const SPLIT_A: Register = Register::new("SPLITA", 0x41F5, "Split Mode Number A");
pub const SPLIT_B: Register = Register::new("SPLITB", 0x41F6, "Split Mode Number B");
pub const A_RAMP_LEVEL: Register = Register::new("A_RAMPLEVEL", 0x41F8, "Advanced Parameter: Ramp Level");
pub const A_RAMP_TIME: Register = Register::new("A_RAMPTIME", 0x41F9, "Advanced Parameter: Ramp Time");
pub const A_DEPTH: Register = Register::new("A_DEPTH", 0x41FA, "Advanced Parameter: Depth");
pub const A_TEMPO: Register = Register::new("A_TEMPO", 0x41FB, "Advanced Parameter: Tempo");
pub const A_FREQUENCY: Register = Register::new("A_FREQUENCY", 0x41FC, "Advanced Parameter: Frequency");
pub const A_EFFECT: Register = Register::new("A_EFFECT", 0x41FD, "Advanced Parameter: Effect");
pub const A_WIDTH: Register = Register::new("A_WIDTH", 0x41FE, "Advanced Parameter: Width");
pub const A_PACE: Register = Register::new("A_PACE", 0x41FF, "Advanced Parameter: Pace");
// 0x01 = battery available, 0x02 = power supply available
pub const POWER_STATUS: Register = Register::new("POWERSTATUS", 0x4215, "Power Status Bits").read_only();

/// Every named register, in snapshot order
pub static REGISTERS: [Register; 28] = [
    SYSTEM_FLAGS,
    ADC1,
    ADC4,
    ADC5,
    ADC6,
    ADC7,
    MENU_STATE,
    MODE_NUM,
    CONTROL_FLAGS,
    RAMP_VALUE,
    RAMP_SELECT,
    BATTERY_LEVEL,
    MA_VALUE,
    MA_LOW,
    MA_HIGH,
    POWER_LEVEL,
    TOP_MODE,
    SPLIT_A,
    SPLIT_B,
    A_RAMP_LEVEL,
    A_RAMP_TIME,
    A_DEPTH,
    A_TEMPO,
    A_FREQUENCY,
    A_EFFECT,
    A_WIDTH,
    A_PACE,
    POWER_STATUS,
];
