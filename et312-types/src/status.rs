//! Status snapshots read from the unit

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::flags::{PowerStatus, SystemFlags};
use crate::mode::Mode;
use crate::register::{self, Register};

/// Which registers a snapshot covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    /// Every register in the table
    Full,

    /// Only registers flagged for heartbeat inclusion
    Heartbeat,

    /// Registers picked by a command (e.g. the ramp registers)
    Partial,
}

impl SnapshotKind {
    /// Check if a register belongs in a snapshot of this kind
    pub fn includes(self, register: &Register) -> bool {
        match self {
            Self::Full => true,
            Self::Heartbeat => register.heartbeat,
            Self::Partial => false,
        }
    }
}

/// Register values read from the unit at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    kind: SnapshotKind,
    taken_at: DateTime<Utc>,
    values: BTreeMap<&'static str, u8>,
}

impl StatusSnapshot {
    /// Create an empty snapshot
    pub fn new(kind: SnapshotKind) -> Self {
        Self {
            kind,
            taken_at: Utc::now(),
            values: BTreeMap::new(),
        }
    }

    /// Snapshot kind
    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }

    /// Check if this is a heartbeat snapshot
    pub fn is_heartbeat(&self) -> bool {
        self.kind == SnapshotKind::Heartbeat
    }

    /// When the snapshot was started
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Record a register value
    pub fn insert(&mut self, register: &'static Register, value: u8) {
        self.values.insert(register.name, value);
    }

    /// Value of a register, if the snapshot covers it
    pub fn get(&self, register: &Register) -> Option<u8> {
        self.values.get(register.name).copied()
    }

    /// Value of a register by name
    pub fn get_by_name(&self, name: &str) -> Option<u8> {
        self.values.get(name).copied()
    }

    /// Iterate over (register name, value) pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u8)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }

    /// Number of registers covered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no register is covered
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy every value of `other` into this snapshot
    pub fn merge(&mut self, other: &StatusSnapshot) {
        self.values.extend(other.values.iter().map(|(k, v)| (*k, *v)));
        self.taken_at = other.taken_at;
    }

    /// Remote-control bit of SYSTEMFLAGS
    pub fn remote_control(&self) -> Option<bool> {
        self.get(&register::SYSTEM_FLAGS).map(SystemFlags::remote_control)
    }

    /// Currently running mode
    pub fn mode(&self) -> Option<Mode> {
        self.get(&register::MODE_NUM).map(Mode)
    }

    /// Power supply bits
    pub fn power_status(&self) -> Option<PowerStatus> {
        self.get(&register::POWER_STATUS).map(PowerStatus::from_bits_truncate)
    }

    /// Midpoint of the multi-adjust range, rounding halves up
    pub fn multi_adjust_midpoint(&self) -> Option<u8> {
        let low = u16::from(self.get(&register::MA_LOW)?);
        let high = u16::from(self.get(&register::MA_HIGH)?);
        Some(((low + high + 1) / 2) as u8)
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status[{:?}](", self.kind)?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}
