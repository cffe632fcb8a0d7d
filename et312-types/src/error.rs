pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid register: {0}")]
    InvalidRegister(String),

    #[error("Register {0} is read-only")]
    ReadOnlyRegister(&'static str),

    #[error("Invalid mode: 0x{0:02X}")]
    InvalidMode(u8),

    #[error("Invalid power level: {0} (must be 1-3)")]
    InvalidPowerLevel(u8),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}
