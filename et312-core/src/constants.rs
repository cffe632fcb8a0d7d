//! Protocol constants

/// Mask mixed into every encrypted byte alongside the session key
pub const CIPHER_MASK: u8 = 0x55;

/// Default per-read timeout (milliseconds)
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Timeout for draining stale bytes before a handshake (milliseconds)
pub const CLEAR_LINE_TIMEOUT_MS: u64 = 500;

/// Minimum dwell time the firmware needs per executed opcode (milliseconds)
pub const SETTLE_MS_PER_OPCODE: u64 = 20;

/// Sync attempts per handshake round
///
/// The longest frame is 11 bytes, so 12 zero bytes always complete
/// whatever partial frame the unit was waiting on.
pub const HANDSHAKE_ATTEMPTS: usize = 12;

/// Received-byte count after which some USB-serial adapters stall
pub const BUFFER_BOUNDARY: u64 = 255;

/// Wire bytes
pub mod wire {
    /// Sync byte sent during the handshake (before encryption)
    pub const SYNC: u8 = 0x00;

    /// Reply to a sync byte once packet boundaries agree
    pub const SYNC_REPLY: u8 = 0x07;

    /// Key exchange request opcode
    pub const KEY_EXCHANGE: u8 = 0x2F;

    /// Marker opening the key exchange reply
    pub const KEY_EXCHANGE_REPLY: u8 = 0x21;

    /// Read request opcode
    pub const READ: u8 = 0x3C;

    /// Marker opening a read reply
    pub const READ_REPLY: u8 = 0x22;

    /// Low nibble of every write request opcode
    pub const WRITE_LOW_NIBBLE: u8 = 0x0D;

    /// Standard acknowledgement
    pub const ACK: u8 = 0x06;

    /// Reply length of a read request
    pub const READ_REPLY_LEN: usize = 3;

    /// Reply length of a key exchange request
    pub const KEY_EXCHANGE_REPLY_LEN: usize = 3;
}

/// Fixed firmware addresses that are not part of the register table
pub mod addresses {
    /// Box command register: opcodes written here are executed
    pub const COMMAND: u16 = 0x4070;

    /// Command argument register (mode to select, power level opcode)
    pub const COMMAND_ARG: u16 = 0x4078;

    /// Display data register (character, position) / string table offset
    pub const DISPLAY: u16 = 0x4180;

    /// Session key register; writing 0 resets the key
    pub const KEY: u16 = 0x4213;
}

/// Memory window bounds
pub mod windows {
    /// Last 512 bytes of flash
    pub const ROM_BASE: u16 = 0x0000;
    pub const ROM_SIZE: u16 = 0x0200;

    /// First 1k of RAM
    pub const RAM_BASE: u16 = 0x4000;
    pub const RAM_SIZE: u16 = 0x0400;

    /// 512 bytes of EEPROM
    pub const EEPROM_BASE: u16 = 0x8000;
    pub const EEPROM_SIZE: u16 = 0x0200;
}

/// Display geometry
pub mod display {
    /// Characters per line
    pub const LINE_WIDTH: usize = 16;

    /// Number of lines
    pub const LINES: u8 = 2;

    /// Width of a mode name field
    pub const MODE_NAME_WIDTH: usize = 8;

    /// String table offset that renders blanks
    pub const BLANK_MODE_NAME: u8 = 0x64;
}
