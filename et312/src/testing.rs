//! Simulated unit for tests
//!
//! Emulates enough of the firmware to drive the whole stack: sync replies,
//! key exchange, XOR decryption, the memory map, command register side
//! effects and the display. Replies are sent unencrypted, like the real
//! unit. A write that arrives while reply bytes are still unread is counted
//! as an overlap.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use mockall::mock;
use parking_lot::Mutex;

use et312_core::constants::{addresses, wire};
use et312_core::opcode::POWER_LEVEL_MENU_BASE;
use et312_core::{Opcode, Session, address, checksum, cipher};
use et312_transport::{Error as TransportError, Result as TransportResult, Transport};
use et312_types::register::{self, Register};

use crate::config::DeviceConfig;
use crate::link::Link;

/// Key the simulated unit hands out during key exchange
pub(crate) const UNIT_KEY: u8 = 0x2A;

#[derive(Debug)]
struct UnitState {
    memory: Vec<u8>,
    key: Option<u8>,
    open: bool,
    lost: bool,
    rx: Vec<u8>,
    outbox: VecDeque<u8>,
    stale: Vec<u8>,
    silent_syncs: usize,
    read_chunk: usize,
    mode_range: (u8, u8),
    reported_mode: Option<u8>,
    muted: bool,
    corrupt_replies: bool,
    frames: Vec<Vec<u8>>,
    executed: Vec<u8>,
    display: [u8; 128],
    mode_names: Vec<u8>,
    corrupt: usize,
    overlaps: usize,
    writes: usize,
}

impl UnitState {
    fn new() -> Self {
        let mut state = Self {
            memory: vec![0; 0xC000],
            key: None,
            open: false,
            lost: false,
            rx: Vec::new(),
            outbox: VecDeque::new(),
            stale: Vec::new(),
            silent_syncs: 0,
            read_chunk: usize::MAX,
            mode_range: (10, 50),
            reported_mode: None,
            muted: false,
            corrupt_replies: false,
            frames: Vec::new(),
            executed: Vec::new(),
            display: [0; 128],
            mode_names: Vec::new(),
            corrupt: 0,
            overlaps: 0,
            writes: 0,
        };

        state.poke(register::MODE_NUM.address, 0x76);
        state.poke(register::TOP_MODE.address, 0x8C);
        state.poke(register::MA_LOW.address, 10);
        state.poke(register::MA_HIGH.address, 50);
        state.poke(register::MA_VALUE.address, 10);
        state.poke(register::POWER_LEVEL.address, 2);
        state.poke(register::BATTERY_LEVEL.address, 0xC8);
        state.poke(register::POWER_STATUS.address, 0x03);
        state
    }

    fn peek(&self, addr: u16) -> u8 {
        self.memory[usize::from(address::reduce(addr).expect("address in a window"))]
    }

    fn poke(&mut self, addr: u16, value: u8) {
        self.memory[usize::from(address::reduce(addr).expect("address in a window"))] = value;
    }

    fn receive(&mut self, byte: u8) {
        let byte = match self.key {
            Some(key) => cipher::decrypt_byte(byte, key),
            None => byte,
        };

        if self.muted {
            return;
        }

        if self.rx.is_empty() {
            if byte == wire::SYNC {
                self.frames.push(vec![byte]);
                if self.silent_syncs > 0 {
                    self.silent_syncs -= 1;
                } else {
                    self.outbox.push_back(wire::SYNC_REPLY);
                }
                return;
            }

            // Not the start of any frame: ignored
            if frame_len(byte).is_none() {
                return;
            }
        }

        self.rx.push(byte);

        if Some(self.rx.len()) == frame_len(self.rx[0]) {
            let frame = std::mem::take(&mut self.rx);
            self.handle(frame);
        }
    }

    fn handle(&mut self, frame: Vec<u8>) {
        if checksum::verify(&frame).is_err() {
            self.corrupt += 1;
            return;
        }

        self.frames.push(frame.clone());
        let addr = u16::from_be_bytes([frame[1], frame[2]]);

        match frame[0] {
            wire::KEY_EXCHANGE => {
                self.key = Some(UNIT_KEY);
                self.reply(&[wire::KEY_EXCHANGE_REPLY, UNIT_KEY]);
            }
            wire::READ => {
                let value = self.peek(addr);
                self.reply(&[wire::READ_REPLY, value]);
            }
            _ => {
                let data = &frame[3..frame.len() - 1];
                for (i, byte) in data.iter().enumerate() {
                    self.poke(addr + i as u16, *byte);
                }
                self.outbox.push_back(wire::ACK);

                if addr == addresses::COMMAND {
                    for opcode in data.iter().copied() {
                        self.run(opcode);
                    }
                } else if addr == addresses::KEY && data[0] == 0 {
                    self.key = None;
                }
            }
        }
    }

    fn reply(&mut self, body: &[u8]) {
        let mut frame = body.to_vec();
        checksum::append(&mut frame);
        if self.corrupt_replies {
            if let Some(cs) = frame.last_mut() {
                *cs ^= 0xFF;
            }
        }
        self.outbox.extend(frame);
    }

    fn run(&mut self, opcode: u8) {
        self.executed.push(opcode);

        match Opcode::try_from(opcode) {
            Ok(Opcode::SelectMode) => {
                let mode = self
                    .reported_mode
                    .unwrap_or_else(|| self.peek(addresses::COMMAND_ARG));
                let (low, high) = self.mode_range;
                self.poke(register::MODE_NUM.address, mode);
                self.poke(register::MA_LOW.address, low);
                self.poke(register::MA_HIGH.address, high);
                self.poke(register::MA_VALUE.address, low);
            }
            Ok(Opcode::ExecuteMenuItem) => {
                let item = self.peek(addresses::COMMAND_ARG);
                if (POWER_LEVEL_MENU_BASE + 1..=POWER_LEVEL_MENU_BASE + 3).contains(&item) {
                    self.poke(register::POWER_LEVEL.address, item - POWER_LEVEL_MENU_BASE);
                }
            }
            Ok(Opcode::StartRamp) => {
                self.poke(register::RAMP_SELECT.address, 0x01);
                self.poke(register::RAMP_VALUE.address, 0x9C);
            }
            Ok(Opcode::WriteCharacter) => {
                let character = self.peek(addresses::DISPLAY);
                let position = self.peek(addresses::DISPLAY + 1);
                self.display[usize::from(position) % 128] = character;
            }
            Ok(Opcode::WriteModeName) => {
                let offset = self.peek(addresses::DISPLAY);
                self.mode_names.push(offset);
            }
            Err(_) => {}
        }
    }
}

/// Total frame length implied by an opcode byte
fn frame_len(opcode: u8) -> Option<usize> {
    match opcode {
        wire::KEY_EXCHANGE => Some(3),
        wire::READ => Some(4),
        op if op & 0x0F == wire::WRITE_LOW_NIBBLE && (4..=11).contains(&(op >> 4)) => {
            Some(usize::from(op >> 4) + 1)
        }
        _ => None,
    }
}

/// Transport backed by an emulated unit
pub(crate) struct SimulatedUnit {
    state: Arc<Mutex<UnitState>>,
}

impl SimulatedUnit {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(UnitState::new())),
        }
    }

    /// Handle for scripting and inspecting the unit after the transport
    /// has been handed over
    pub fn handle(&self) -> UnitHandle {
        UnitHandle {
            state: self.state.clone(),
        }
    }
}

#[async_trait]
impl Transport for SimulatedUnit {
    async fn open(&mut self) -> TransportResult<()> {
        let mut unit = self.state.lock();
        if unit.open {
            return Err(TransportError::AlreadyConnected);
        }

        unit.open = true;
        let stale = std::mem::take(&mut unit.stale);
        unit.outbox.extend(stale);
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        let mut unit = self.state.lock();
        unit.open = false;
        unit.rx.clear();
        unit.outbox.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    async fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        let mut unit = self.state.lock();
        if !unit.open {
            return Err(TransportError::NotConnected);
        }
        if unit.lost {
            return Err(TransportError::ConnectionClosed);
        }

        unit.writes += 1;
        if !unit.outbox.is_empty() {
            unit.overlaps += 1;
        }

        for byte in data {
            unit.receive(*byte);
        }
        Ok(())
    }

    async fn read_timeout(&mut self, timeout: Duration) -> TransportResult<BytesMut> {
        let pending: Vec<u8> = {
            let mut unit = self.state.lock();
            if !unit.open {
                return Err(TransportError::NotConnected);
            }
            if unit.lost {
                return Err(TransportError::ConnectionClosed);
            }
            let n = unit.outbox.len().min(unit.read_chunk);
            unit.outbox.drain(..n).collect()
        };

        if pending.is_empty() {
            tokio::time::sleep(timeout).await;
            return Err(TransportError::ReadTimeout);
        }

        Ok(BytesMut::from(&pending[..]))
    }

    fn name(&self) -> String {
        "simulated".to_string()
    }
}

/// Scripting and inspection side of a [`SimulatedUnit`]
#[derive(Clone)]
pub(crate) struct UnitHandle {
    state: Arc<Mutex<UnitState>>,
}

impl UnitHandle {
    pub fn peek(&self, register: &Register) -> u8 {
        self.state.lock().peek(register.address)
    }

    pub fn poke(&self, register: &Register, value: u8) {
        self.state.lock().poke(register.address, value);
    }

    /// Key the unit currently decrypts with
    pub fn key(&self) -> Option<u8> {
        self.state.lock().key
    }

    pub fn set_key(&self, key: Option<u8>) {
        self.state.lock().key = key;
    }

    /// Leave the next `count` sync bytes unanswered
    pub fn silence_syncs(&self, count: usize) {
        self.state.lock().silent_syncs = count;
    }

    /// Bytes waiting on the line when the port is opened
    pub fn set_stale(&self, bytes: &[u8]) {
        self.state.lock().stale = bytes.to_vec();
    }

    /// Deliver at most `len` bytes per read
    pub fn limit_reads(&self, len: usize) {
        self.state.lock().read_chunk = len;
    }

    /// Push unsolicited bytes onto the line
    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().outbox.extend(bytes.iter().copied());
    }

    /// Multi-adjust range applied by the next mode change
    pub fn set_mode_range(&self, low: u8, high: u8) {
        self.state.lock().mode_range = (low, high);
    }

    /// Mode the unit reports after any mode change, whatever was selected
    pub fn report_mode(&self, mode: u8) {
        self.state.lock().reported_mode = Some(mode);
    }

    /// Stop answering anything; the line stays open
    pub fn mute(&self) {
        self.state.lock().muted = true;
    }

    /// Send replies with a wrong checksum
    pub fn corrupt_replies(&self) {
        self.state.lock().corrupt_replies = true;
    }

    /// Unplug the unit: every further transport call fails
    pub fn lose(&self) {
        self.state.lock().lost = true;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Opcodes executed through the command register, in order
    pub fn executed(&self) -> Vec<u8> {
        self.state.lock().executed.clone()
    }

    /// String table offsets drawn as mode names
    pub fn mode_names(&self) -> Vec<u8> {
        self.state.lock().mode_names.clone()
    }

    /// Characters drawn on a display line, blanks as spaces
    pub fn display_line(&self, line: usize) -> String {
        let unit = self.state.lock();
        unit.display[line * 64..line * 64 + 16]
            .iter()
            .map(|c| if *c == 0 { ' ' } else { char::from(*c) })
            .collect()
    }

    /// Decrypted frames received, syncs included
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().frames.clone()
    }

    pub fn sync_count(&self) -> usize {
        self.frames().iter().filter(|f| f.as_slice() == [wire::SYNC]).count()
    }

    pub fn corrupt_frames(&self) -> usize {
        self.state.lock().corrupt
    }

    /// Writes that arrived while a reply was still unread
    pub fn overlaps(&self) -> usize {
        self.state.lock().overlaps
    }

    pub fn writes(&self) -> usize {
        self.state.lock().writes
    }
}

mock! {
    /// Transport expectations for tests that must not touch the wire
    pub Wire {}

    #[async_trait]
    impl Transport for Wire {
        async fn open(&mut self) -> TransportResult<()>;
        async fn close(&mut self) -> TransportResult<()>;
        fn is_open(&self) -> bool;
        async fn write(&mut self, data: &[u8]) -> TransportResult<()>;
        async fn read_timeout(&mut self, timeout: Duration) -> TransportResult<BytesMut>;
        fn name(&self) -> String;
    }
}

/// Install a log subscriber honouring `RUST_LOG`
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Link to a simulated unit, handshake and key exchange done
pub(crate) async fn ready_link(unit: SimulatedUnit) -> Link {
    init_tracing();

    let mut link = Link::new(Box::new(unit), Session::new(), &DeviceConfig::default());
    link.connect().await.expect("connect to simulated unit");
    link
}
