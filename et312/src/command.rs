//! Box commands
//!
//! Multi-step operations with firmware side effects. Each one runs on a
//! locked [`Link`], so its steps are never interleaved with other traffic.

use std::fmt;

use tracing::{debug, warn};

use et312_core::Opcode;
use et312_core::constants::addresses;
use et312_core::opcode::POWER_LEVEL_MENU_BASE;
use et312_types::register::{MA_VALUE, MODE_NUM, POWER_LEVEL, RAMP_SELECT, RAMP_VALUE, SYSTEM_FLAGS};
use et312_types::{Mode, PowerLevel, SnapshotKind, StatusSnapshot, SystemFlags};

use crate::error::{Error, Result};
use crate::link::Link;

/// Named command sent by collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxCommand {
    SetMode(Mode),
    SetPowerLevel(PowerLevel),
    StartRamp,
    Stop,
}

impl BoxCommand {
    /// Parse a command name and its parameter
    ///
    /// # Examples
    ///
    /// ```
    /// use et312::BoxCommand;
    /// use et312_types::{Mode, PowerLevel};
    ///
    /// assert_eq!(BoxCommand::parse("setMode", Some(0x76)).unwrap(), BoxCommand::SetMode(Mode::WAVES));
    /// assert_eq!(BoxCommand::parse("setPowerLevel", Some(3)).unwrap(), BoxCommand::SetPowerLevel(PowerLevel::High));
    /// assert_eq!(BoxCommand::parse("stop", None).unwrap(), BoxCommand::Stop);
    /// assert!(BoxCommand::parse("selfDestruct", None).is_err());
    /// ```
    pub fn parse(name: &str, param: Option<u8>) -> Result<Self> {
        match name {
            "setMode" => {
                let id = param.ok_or(Error::MissingParameter("setMode"))?;
                Ok(Self::SetMode(Mode::validate(id)?))
            }
            "setPowerLevel" => {
                let level = param.ok_or(Error::MissingParameter("setPowerLevel"))?;
                Ok(Self::SetPowerLevel(PowerLevel::try_from(level)?))
            }
            "startRamp" => Ok(Self::StartRamp),
            "stop" => Ok(Self::Stop),
            other => Err(et312_types::Error::UnknownCommand(other.to_string()).into()),
        }
    }

    /// Command name as collaborators spell it
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetMode(_) => "setMode",
            Self::SetPowerLevel(_) => "setPowerLevel",
            Self::StartRamp => "startRamp",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for BoxCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetMode(mode) => write!(f, "setMode({mode})"),
            Self::SetPowerLevel(level) => write!(f, "setPowerLevel({level})"),
            _ => f.write_str(self.name()),
        }
    }
}

impl Link {
    /// Switch mode and return a full status read after the switch
    ///
    /// With remote control active, the multi-adjust value is moved to the
    /// middle of the new mode's range: the front panel knob is ignored, and
    /// the value left over from the old range could be far off.
    pub async fn set_mode(&mut self, mode: Mode) -> Result<StatusSnapshot> {
        debug!("Selecting mode {}", mode);

        self.write_address(addresses::COMMAND_ARG, &[mode.0], 1).await?;
        self.execute_opcodes(&[Opcode::SelectMode]).await?;

        let mut status = self.read_status(SnapshotKind::Full).await?;

        if status.remote_control() == Some(true) {
            if let Some(midpoint) = status.multi_adjust_midpoint() {
                debug!("Centering multi-adjust at {}", midpoint);
                self.write_address(MA_VALUE.address, &[midpoint], 1).await?;
                status.insert(&MA_VALUE, midpoint);
            }
        }

        Ok(status)
    }

    /// Change the power level of the running mode
    ///
    /// Returns `None` without touching anything if no mode is running.
    pub async fn set_power_level(&mut self, level: PowerLevel) -> Result<Option<StatusSnapshot>> {
        let mode = self.read_address(MODE_NUM.address).await?;
        if mode == 0 {
            warn!("No mode running, power level left unchanged");
            return Ok(None);
        }

        debug!("Setting power level {}", level);

        let item = POWER_LEVEL_MENU_BASE + u8::from(level);
        self.write_address(addresses::COMMAND_ARG, &[item], 1).await?;
        self.execute_opcodes(&[Opcode::ExecuteMenuItem]).await?;

        self.read_registers(&[&POWER_LEVEL]).await.map(Some)
    }

    /// Start the power ramp and return the ramp registers
    pub async fn start_ramp(&mut self) -> Result<StatusSnapshot> {
        self.execute_opcodes(&[Opcode::StartRamp]).await?;
        self.read_registers(&[&RAMP_SELECT, &RAMP_VALUE]).await
    }

    /// Read the remote-control bit
    pub async fn has_control(&mut self) -> Result<bool> {
        let flags = self.read_address(SYSTEM_FLAGS.address).await?;
        Ok(SystemFlags::remote_control(flags))
    }

    /// Set or clear the remote-control bit, leaving other flags alone
    ///
    /// Returns whether the bit changed.
    pub async fn set_control(&mut self, enable: bool) -> Result<bool> {
        let flags = self.read_address(SYSTEM_FLAGS.address).await?;
        let wanted = SystemFlags::with_remote_control(flags, enable);

        if wanted == flags {
            return Ok(false);
        }

        debug!("{} remote control", if enable { "Taking" } else { "Releasing" });
        self.write_address(SYSTEM_FLAGS.address, &[wanted], 1).await?;
        Ok(true)
    }
}
