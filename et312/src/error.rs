//! High-level error types

use bytes::Bytes;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] et312_core::Error),

    #[error("Transport error: {0}")]
    Transport(et312_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] et312_types::Error),

    /// No (or too few) reply bytes within the read timeout
    #[error("Timed out waiting for {expected} reply bytes (received [{}])", hex::encode(.partial))]
    Timeout { expected: usize, partial: Bytes },

    /// No sync reply after every handshake attempt
    #[error("Handshake failed{}", no_reply_suffix(.replied))]
    HandshakeFailed { replied: bool },

    #[error("Not a key exchange reply: [{}]", hex::encode(.0))]
    UnexpectedKeyExchangeReply(Bytes),

    /// Transport reported the unit gone
    #[error("Device lost: {0}")]
    DeviceLost(et312_transport::Error),

    #[error("Device not connected")]
    NotConnected,

    /// Write answered with something other than an ACK
    #[error("Write not acknowledged (reply 0x{0:02X})")]
    NotAcknowledged(u8),

    /// Unit is emitting a stream of 0x07 and must be power cycled
    #[error("Unit is in its error state - power cycle it")]
    UnitErrorState,

    #[error("Missing parameter for {0}")]
    MissingParameter(&'static str),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

fn no_reply_suffix(replied: &bool) -> &'static str {
    if *replied { "" } else { " - no reply" }
}

impl From<et312_transport::Error> for Error {
    fn from(err: et312_transport::Error) -> Self {
        use et312_transport::Error as T;

        match err {
            T::ReadTimeout => Self::Timeout {
                expected: 0,
                partial: Bytes::new(),
            },
            T::NotConnected => Self::NotConnected,
            e if e.is_device_lost() => Self::DeviceLost(e),
            e => Self::Transport(e),
        }
    }
}

/// Flat error taxonomy carried by error events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    ChecksumMismatch,
    HandshakeFailed,
    UnexpectedKeyExchangeReply,
    InvalidWriteSize,
    ReadOnlyRegister,
    InvalidRegister,
    InvalidArgument,
    DeviceLost,
    NotConnected,
    NotAcknowledged,
    UnitErrorState,
    Transport,
    Internal,
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        use et312_core::Error as C;
        use et312_types::Error as T;

        match self {
            Self::Core(C::ChecksumMismatch { .. } | C::PacketTooShort { .. }) => {
                ErrorKind::ChecksumMismatch
            }
            Self::Core(C::InvalidWriteSize(_)) => ErrorKind::InvalidWriteSize,
            Self::Core(C::InvalidAddress(_) | C::UnknownOpcode(_) | C::InvalidDisplayText(_)) => {
                ErrorKind::InvalidArgument
            }
            Self::Core(C::SessionNotReady | C::InvalidSessionState(_)) => ErrorKind::NotConnected,
            Self::Types(T::InvalidRegister(_)) => ErrorKind::InvalidRegister,
            Self::Types(T::ReadOnlyRegister(_)) => ErrorKind::ReadOnlyRegister,
            Self::Types(_) => ErrorKind::InvalidArgument,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::HandshakeFailed { .. } => ErrorKind::HandshakeFailed,
            Self::UnexpectedKeyExchangeReply(_) => ErrorKind::UnexpectedKeyExchangeReply,
            Self::DeviceLost(_) => ErrorKind::DeviceLost,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::NotAcknowledged(_) => ErrorKind::NotAcknowledged,
            Self::UnitErrorState => ErrorKind::UnitErrorState,
            Self::MissingParameter(_) => ErrorKind::InvalidArgument,
            Self::TaskFailed(_) => ErrorKind::Internal,
        }
    }

    /// Check if the session can no longer be trusted and must be torn down
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout
                | ErrorKind::ChecksumMismatch
                | ErrorKind::HandshakeFailed
                | ErrorKind::DeviceLost
        )
    }

    /// Check if the error was rejected before anything reached the wire
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidWriteSize
                | ErrorKind::ReadOnlyRegister
                | ErrorKind::InvalidRegister
                | ErrorKind::InvalidArgument
                | ErrorKind::NotConnected
        )
    }

    /// Check if the session stays usable after this error
    pub fn is_recoverable(&self) -> bool {
        !self.is_connection_fatal()
            && !matches!(
                self.kind(),
                ErrorKind::UnexpectedKeyExchangeReply | ErrorKind::UnitErrorState
            )
    }
}
