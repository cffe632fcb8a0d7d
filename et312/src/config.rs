//! Device configuration

use std::time::Duration;

use et312_core::constants::{CLEAR_LINE_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS, SETTLE_MS_PER_OPCODE};

/// What [`Device::execute`](crate::Device::execute) returns when a command
/// yields no status of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFallback {
    /// Return `None`
    Nothing,

    /// Read and share a fresh heartbeat snapshot instead
    #[default]
    Heartbeat,
}

/// Device configuration
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use et312::{DeviceConfig, StatusFallback};
///
/// let config = DeviceConfig::default()
///     .with_read_timeout(Duration::from_millis(800))
///     .with_status_fallback(StatusFallback::Nothing);
///
/// assert_eq!(config.settle_per_opcode, Duration::from_millis(20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Bound on each individual transport read
    pub read_timeout: Duration,

    /// How long to wait for stale bytes before the handshake
    pub clear_line_timeout: Duration,

    /// Minimum dwell time per executed opcode
    pub settle_per_opcode: Duration,

    /// Heartbeat polling period
    pub heartbeat_interval: Duration,

    pub status_fallback: StatusFallback,

    /// Key the unit may still hold from an earlier session
    pub assumed_key: Option<u8>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            clear_line_timeout: Duration::from_millis(CLEAR_LINE_TIMEOUT_MS),
            settle_per_opcode: Duration::from_millis(SETTLE_MS_PER_OPCODE),
            heartbeat_interval: Duration::from_secs(5),
            status_fallback: StatusFallback::default(),
            assumed_key: None,
        }
    }
}

impl DeviceConfig {
    /// Set per-read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set line-clearing timeout
    pub fn with_clear_line_timeout(mut self, timeout: Duration) -> Self {
        self.clear_line_timeout = timeout;
        self
    }

    /// Set per-opcode settle time
    pub fn with_settle_per_opcode(mut self, settle: Duration) -> Self {
        self.settle_per_opcode = settle;
        self
    }

    /// Set heartbeat period
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the missing-status policy
    pub fn with_status_fallback(mut self, fallback: StatusFallback) -> Self {
        self.status_fallback = fallback;
        self
    }

    /// Try this key before handshaking unencrypted
    pub fn with_assumed_key(mut self, key: u8) -> Self {
        self.assumed_key = Some(key);
        self
    }
}
