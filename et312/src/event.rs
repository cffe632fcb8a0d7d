//! Notifications sent to collaborators
//!
//! Events are broadcast after the exchange that produced them has completed
//! and the link lock has been released.

use et312_types::StatusSnapshot;

use crate::error::{Error, ErrorKind};

/// Device event
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Session established
    Connected,

    /// Session closed, gracefully or not
    Closed,

    /// Remote-control bit changed (or was dropped by a forced close)
    RemoteControl(bool),

    /// Fresh status read from the unit
    Status(StatusSnapshot),

    /// Operation failed
    Error { kind: ErrorKind, message: String },
}

impl DeviceEvent {
    pub(crate) fn error(err: &Error, context: &str) -> Self {
        Self::Error {
            kind: err.kind(),
            message: format!("{context}: {err}"),
        }
    }
}
