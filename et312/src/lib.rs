//! # et312
//!
//! Async controller for the ErosTek ET-312 over its serial link protocol.
//!
//! ## Features
//!
//! - Sync handshake, session key exchange and XOR-encrypted framing
//! - Register reads and writes validated before they reach the wire
//! - Mode, power level and ramp commands with their firmware side effects
//! - LCD drawing in the background
//! - Serial and TCP bridge transports
//! - Broadcast events for status, remote control and failures
//!
//! ## Quick Start
//!
//! ```no_run
//! use et312::Device;
//!
//! #[tokio::main]
//! async fn main() -> et312::Result<()> {
//!     let device = Device::serial("/dev/ttyUSB0");
//!     device.connect().await?;
//!
//!     let status = device.request_status(true).await?;
//!     println!("{}", status);
//!
//!     device.close(false).await?;
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod event;
mod handshake;
mod heartbeat;
mod link;
mod memory;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use command::BoxCommand;
pub use config::{DeviceConfig, StatusFallback};
pub use device::{ControlOutcome, Device};
pub use display::{DisplayRequest, DisplayUpdate, PAUSED_LABEL};
pub use error::{Error, ErrorKind, Result};
pub use event::DeviceEvent;

// Re-export types
pub use et312_core::{Session, SessionState};
pub use et312_transport::{SerialTransport, TcpTransport, Transport};
pub use et312_types::{
    Mode, PowerLevel, PowerStatus, REGISTERS, Register, SnapshotKind, StatusSnapshot, SystemFlags,
};
