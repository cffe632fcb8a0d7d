//! Type definitions for et312

pub mod error;
pub mod flags;
pub mod mode;
pub mod register;
pub mod status;

pub use error::{Error, Result};
pub use flags::{PowerStatus, SystemFlags};
pub use mode::{Mode, PowerLevel};
pub use register::{REGISTERS, Register};
pub use status::{SnapshotKind, StatusSnapshot};
