//! Register reads, writes and box commands
//!
//! Requests are validated (write size, address window) before the session
//! is even checked, so a malformed request never reaches the wire.

use bytes::Bytes;
use tracing::debug;

use et312_core::constants::addresses;
use et312_core::{Opcode, Request, packet};
use et312_types::{REGISTERS, Register, SnapshotKind, StatusSnapshot};

use crate::error::Result;
use crate::link::Link;

impl Link {
    /// Read one byte
    pub async fn read_address(&mut self, address: u16) -> Result<u8> {
        let request = Request::read(address)?;
        self.session().ensure_ready()?;

        let encoded = request.encode(self.session().key());
        let reply = self.exchange(&encoded, request.reply_len()).await?;

        Ok(packet::read_value(&reply)?)
    }

    /// Write 1-8 consecutive bytes, returning the raw reply
    ///
    /// `reply_len` is normally 1 (a single ACK).
    pub async fn write_address(&mut self, address: u16, data: &[u8], reply_len: usize) -> Result<Bytes> {
        let request = Request::write(address, Bytes::copy_from_slice(data))?;
        self.session().ensure_ready()?;

        let encoded = request.encode(self.session().key());
        self.exchange(&encoded, reply_len).await
    }

    /// Execute opcodes through the command register
    ///
    /// Returns only once the unit has acknowledged and the settle time
    /// (per opcode) has elapsed, whichever comes last.
    pub async fn execute_opcodes(&mut self, opcodes: &[Opcode]) -> Result<Bytes> {
        let data: Vec<u8> = opcodes.iter().map(|op| u8::from(*op)).collect();
        let settle = self.settle * opcodes.len() as u32;

        debug!(?opcodes, "Executing");

        let (reply, ()) = tokio::join!(
            self.write_address(addresses::COMMAND, &data, 1),
            tokio::time::sleep(settle)
        );
        reply
    }

    /// Read registers into a snapshot of the given kind
    pub async fn read_status(&mut self, kind: SnapshotKind) -> Result<StatusSnapshot> {
        let mut snapshot = StatusSnapshot::new(kind);

        for register in REGISTERS.iter().filter(|r| kind.includes(r)) {
            let value = self.read_address(register.address).await?;
            snapshot.insert(register, value);
        }

        Ok(snapshot)
    }

    /// Read an explicit set of registers
    pub async fn read_registers(&mut self, registers: &[&'static Register]) -> Result<StatusSnapshot> {
        let mut snapshot = StatusSnapshot::new(SnapshotKind::Partial);

        for &register in registers {
            let value = self.read_address(register.address).await?;
            snapshot.insert(register, value);
        }

        Ok(snapshot)
    }

    /// Tell the unit to forget the session key
    pub async fn reset_key(&mut self) -> Result<()> {
        debug!("Resetting session key on the unit");
        self.write_address(addresses::KEY, &[0x00], 1).await?;
        Ok(())
    }
}
