//! High-level device interface

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use et312_core::Session;
use et312_core::constants::wire;
use et312_transport::{SerialTransport, TcpTransport, Transport};
use et312_types::register::TOP_MODE;
use et312_types::{Mode, PowerLevel, Register, SnapshotKind, StatusSnapshot};

use crate::command::BoxCommand;
use crate::config::{DeviceConfig, StatusFallback};
use crate::display::{DisplayRequest, DisplayUpdate};
use crate::error::{Error, Result};
use crate::event::DeviceEvent;
use crate::link::Link;

const EVENT_CAPACITY: usize = 64;

/// ET-312 controller
///
/// Cheap to clone; clones share one link, so callers on different tasks
/// are serialized and never interleave their exchanges.
///
/// # Examples
///
/// ```no_run
/// use et312::Device;
///
/// #[tokio::main]
/// async fn main() -> et312::Result<()> {
///     let device = Device::serial("/dev/ttyUSB0");
///
///     device.connect().await?;
///     device.take_control(true).await?;
///
///     let status = device.set_mode(0x76).await?;
///     println!("{}", status);
///
///     device.close(false).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Device {
    inner: Arc<Inner>,
}

struct Inner {
    link: AsyncMutex<Link>,
    session: Session,
    config: DeviceConfig,
    name: String,
    events: broadcast::Sender<DeviceEvent>,
    cache: Mutex<StatusSnapshot>,
    last_throttled: Mutex<Option<Instant>>,
}

/// Result of [`Device::take_control`]
#[derive(Debug)]
pub struct ControlOutcome {
    /// Full status read after the change
    pub status: StatusSnapshot,

    /// Redraw of the running mode's name, if one was started
    pub display: Option<DisplayUpdate>,
}

impl Device {
    /// Create a device over any transport, with default settings
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, DeviceConfig::default())
    }

    pub fn with_config(transport: impl Transport + 'static, config: DeviceConfig) -> Self {
        let session = match config.assumed_key {
            Some(key) => Session::with_retained_key(key),
            None => Session::new(),
        };

        let name = transport.name();
        let link = Link::new(Box::new(transport), session.clone(), &config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                link: AsyncMutex::new(link),
                session,
                config,
                name,
                events,
                cache: Mutex::new(StatusSnapshot::new(SnapshotKind::Full)),
                last_throttled: Mutex::new(None),
            }),
        }
    }

    /// Create a device on a serial port (19200 8N1)
    pub fn serial(path: impl Into<String>) -> Self {
        Self::new(SerialTransport::new(path))
    }

    /// Create a device behind a TCP serial bridge
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(TcpTransport::new(host, port))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    /// Check if the session is ready for register traffic
    pub fn is_connected(&self) -> bool {
        self.inner.session.is_ready()
    }

    /// Session key in use, or retained for the next connect
    pub fn session_key(&self) -> Option<u8> {
        self.inner.session.key()
    }

    /// Subscribe to device events
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }

    /// Everything read from the unit since the last connect, merged
    pub fn cached_status(&self) -> StatusSnapshot {
        self.inner.cache.lock().clone()
    }

    /// Open the transport, synchronize and negotiate a session key
    ///
    /// # Errors
    ///
    /// - [`Error::UnitErrorState`] if the unit is streaming its error pattern
    /// - [`Error::HandshakeFailed`] if no sync reply ever arrived
    /// - [`Error::UnexpectedKeyExchangeReply`] if the unit would not hand out a key
    ///
    /// The transport is closed again on any failure.
    pub async fn connect(&self) -> Result<()> {
        let result = {
            let mut link = self.inner.link.lock().await;

            if link.session().is_connected() {
                return Err(et312_core::Error::InvalidSessionState("Already connected".into()).into());
            }

            info!("Connecting to {}...", self.inner.name);

            let result = link.connect().await;
            if result.is_err() {
                if let Err(e) = link.shutdown(true).await {
                    warn!("Failed to close {}: {}", self.inner.name, e);
                }
            }
            result
        };

        match result {
            Ok(()) => {
                info!("Connected to {}", self.inner.name);
                self.emit(DeviceEvent::Connected);
                Ok(())
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", self.inner.name, e);
                self.emit(DeviceEvent::error(&e, "Connection Failure"));
                Err(e)
            }
        }
    }

    /// Close the session
    ///
    /// A graceful close hands control back to the front panel and tells the
    /// unit to forget the session key first. A forced close just drops the
    /// transport; the key is retained so the next connect can reuse it.
    pub async fn close(&self, force: bool) -> Result<()> {
        let mut released = false;

        let (was_connected, result) = {
            let mut link = self.inner.link.lock().await;
            let was_connected = link.session().is_connected();

            if !was_connected && !link.is_open() {
                return Ok(());
            }

            info!("Closing {}{}...", self.inner.name, if force { " (forced)" } else { "" });

            let mut key_reset = false;
            if !force && link.session().is_ready() {
                match link.set_control(false).await {
                    Ok(changed) => released = changed,
                    Err(e) => warn!("Failed to release remote control: {}", e),
                }
                match link.reset_key().await {
                    Ok(()) => key_reset = true,
                    Err(e) => warn!("Failed to reset session key: {}", e),
                }
            }

            (was_connected, link.shutdown(!key_reset).await)
        };

        let held = self.inner.cache.lock().remote_control() == Some(true);
        if released || (force && held) {
            self.emit(DeviceEvent::RemoteControl(false));
        }

        *self.inner.cache.lock() = StatusSnapshot::new(SnapshotKind::Full);
        *self.inner.last_throttled.lock() = None;

        if was_connected {
            info!("Closed {}", self.inner.name);
            self.emit(DeviceEvent::Closed);
        }

        result
    }

    /// Read a status snapshot: every register, or the heartbeat set
    pub async fn request_status(&self, full: bool) -> Result<StatusSnapshot> {
        let kind = if full {
            SnapshotKind::Full
        } else {
            SnapshotKind::Heartbeat
        };

        let result = { self.inner.link.lock().await.read_status(kind).await };
        let status = self.settle(result).await?;

        self.share(&status);
        Ok(status)
    }

    /// Read status unless the last throttled read was within `min_interval`
    pub async fn request_status_throttled(
        &self,
        full: bool,
        min_interval: Duration,
    ) -> Result<Option<StatusSnapshot>> {
        {
            let mut last = self.inner.last_throttled.lock();
            if last.is_some_and(|at| at.elapsed() < min_interval) {
                trace!("Throttled, skipping status read");
                return Ok(None);
            }
            *last = Some(Instant::now());
        }

        self.request_status(full).await.map(Some)
    }

    /// Read one register by name
    pub async fn read_register(&self, name: &str) -> Result<u8> {
        let register = Register::lookup(name)?;

        let result = { self.inner.link.lock().await.read_address(register.address).await };
        self.settle(result).await
    }

    /// Write 1-8 bytes starting at a named register
    ///
    /// # Errors
    ///
    /// Rejected before anything is sent if the register is unknown or
    /// read-only, or the data is empty or longer than 8 bytes.
    /// [`Error::NotAcknowledged`] if the unit answered without an ACK.
    pub async fn write_register(&self, name: &str, data: &[u8]) -> Result<()> {
        let register = Register::lookup(name)?;
        register.ensure_writable()?;

        let result = {
            self.inner
                .link
                .lock()
                .await
                .write_address(register.address, data, 1)
                .await
        };
        let reply = self.settle(result).await?;

        match reply.first() {
            Some(&wire::ACK) => Ok(()),
            other => Err(Error::NotAcknowledged(other.copied().unwrap_or_default())),
        }
    }

    /// Write a named register, reporting whether the unit acknowledged
    pub async fn set_value(&self, name: &str, data: &[u8]) -> Result<bool> {
        match self.write_register(name, data).await {
            Ok(()) => Ok(true),
            Err(Error::NotAcknowledged(reply)) => {
                debug!("Write to {} answered 0x{:02X}", name, reply);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Switch mode
    ///
    /// If the unit offers the new mode, its name is drawn on the display
    /// in the background.
    pub async fn set_mode(&self, id: u8) -> Result<StatusSnapshot> {
        let mode = Mode::validate(id)?;
        let status = self.switch_mode(mode).await?;

        if let Some(request) = mode_display(mode, &status) {
            self.spawn_display(request);
        }

        Ok(status)
    }

    /// Stop output and show the paused label
    pub async fn stop(&self) -> Result<StatusSnapshot> {
        let status = self.switch_mode(Mode::STOP).await?;
        self.spawn_display(DisplayRequest::paused());
        Ok(status)
    }

    async fn switch_mode(&self, mode: Mode) -> Result<StatusSnapshot> {
        let result = { self.inner.link.lock().await.set_mode(mode).await };
        let status = self.settle(result).await?;

        self.share(&status);
        Ok(status)
    }

    /// Change the power level (1-3)
    ///
    /// Returns `None` if no mode is running.
    pub async fn set_power_level(&self, level: u8) -> Result<Option<StatusSnapshot>> {
        let level = PowerLevel::try_from(level)?;

        let result = { self.inner.link.lock().await.set_power_level(level).await };
        let status = self.settle(result).await?;

        if let Some(status) = &status {
            self.share(status);
        }
        Ok(status)
    }

    /// Start the power ramp
    pub async fn start_ramp(&self) -> Result<StatusSnapshot> {
        let result = { self.inner.link.lock().await.start_ramp().await };
        let status = self.settle(result).await?;

        self.share(&status);
        Ok(status)
    }

    /// Run a named command
    ///
    /// If the command produced no status, the configured fallback decides
    /// whether a status read is made in its place.
    pub async fn execute(&self, command: BoxCommand) -> Result<Option<StatusSnapshot>> {
        debug!("Executing {}", command);

        let status = match command {
            BoxCommand::SetMode(mode) => Some(self.set_mode(mode.0).await?),
            BoxCommand::SetPowerLevel(level) => self.set_power_level(u8::from(level)).await?,
            BoxCommand::StartRamp => Some(self.start_ramp().await?),
            BoxCommand::Stop => Some(self.stop().await?),
        };

        match (status, self.inner.config.status_fallback) {
            (Some(status), _) => Ok(Some(status)),
            (None, StatusFallback::Nothing) => Ok(None),
            (None, StatusFallback::Heartbeat) => {
                debug!("{} returned no status, reading heartbeat", command.name());
                self.request_status(false).await.map(Some)
            }
        }
    }

    /// Check if the unit is under remote control
    ///
    /// Always false without a session.
    pub async fn has_control(&self) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }

        let result = { self.inner.link.lock().await.has_control().await };
        self.settle(result).await
    }

    /// Take (or give back) control from the front panel
    ///
    /// Reads full status afterwards and redraws the running mode's name,
    /// since the display is not refreshed by the unit itself.
    pub async fn take_control(&self, enable: bool) -> Result<ControlOutcome> {
        let result = {
            let mut link = self.inner.link.lock().await;
            match link.set_control(enable).await {
                Ok(_) => link.read_status(SnapshotKind::Full).await,
                Err(e) => Err(e),
            }
        };
        let status = self.settle(result).await?;

        self.emit(DeviceEvent::RemoteControl(status.remote_control().unwrap_or(enable)));
        self.share(&status);

        let display = status
            .mode()
            .and_then(|mode| mode_display(mode, &status))
            .map(|request| self.spawn_display(request));

        Ok(ControlOutcome { status, display })
    }

    /// Draw text on the display in the background
    ///
    /// The text is checked before anything is started.
    pub fn display_text(&self, text: &str, line: u8, start: u8) -> Result<DisplayUpdate> {
        let request = DisplayRequest::text(text, line, start)?;
        Ok(self.spawn_display(request))
    }

    /// Draw a mode name in the background
    pub fn display_mode_name(&self, mode: Mode) -> DisplayUpdate {
        self.spawn_display(DisplayRequest::mode_name(mode))
    }

    /// Draw on the display and wait for it
    pub async fn display(&self, request: DisplayRequest) -> Result<()> {
        let result = { self.inner.link.lock().await.display(&request).await };
        self.settle(result).await
    }

    fn spawn_display(&self, request: DisplayRequest) -> DisplayUpdate {
        trace!("Queueing display update {}", request);

        let device = self.clone();
        DisplayUpdate::new(tokio::spawn(async move { device.display(request).await }))
    }

    /// Report a failed operation and drop the session if it can no longer
    /// be trusted
    ///
    /// Runs after the link lock is released.
    async fn settle<T>(&self, result: Result<T>) -> Result<T> {
        let report = match &result {
            Err(e) if e.is_connection_fatal() => {
                warn!("Connection to {} lost: {}", self.inner.name, e);
                Some((DeviceEvent::error(e, "Connection Lost"), true))
            }
            Err(e) if !e.is_caller_error() => {
                warn!("{}", e);
                Some((DeviceEvent::error(e, "Unexpected Error"), false))
            }
            _ => None,
        };

        if let Some((event, fatal)) = report {
            self.emit(event);

            if fatal {
                if let Err(e) = self.close(true).await {
                    warn!("Failed to close {}: {}", self.inner.name, e);
                }
            }
        }

        result
    }

    fn share(&self, status: &StatusSnapshot) {
        self.inner.cache.lock().merge(status);
        self.emit(DeviceEvent::Status(status.clone()));
    }

    fn emit(&self, event: DeviceEvent) {
        if self.inner.events.send(event).is_err() {
            trace!("No event subscribers");
        }
    }
}

/// What the display should show for a mode, given the unit's top mode
fn mode_display(mode: Mode, status: &StatusSnapshot) -> Option<DisplayRequest> {
    if mode == Mode::STOP {
        return Some(DisplayRequest::paused());
    }
    if mode == Mode::NONE {
        return Some(DisplayRequest::ClearModeName);
    }

    let top = status.get(&TOP_MODE)?;
    (mode.name().is_some() && mode.is_available(top)).then(|| DisplayRequest::mode_name(mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{MockWire, SimulatedUnit, UNIT_KEY, UnitHandle, init_tracing};
    use et312_types::register::{MA_VALUE, MODE_NUM, POWER_LEVEL, SYSTEM_FLAGS};
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast::Receiver;

    async fn connected(config: DeviceConfig) -> (Device, UnitHandle) {
        init_tracing();

        let unit = SimulatedUnit::new();
        let handle = unit.handle();
        let device = Device::with_config(unit, config);
        device.connect().await.unwrap();
        (device, handle)
    }

    fn drain(events: &mut Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    fn is_status(event: &DeviceEvent) -> bool {
        matches!(event, DeviceEvent::Status(_))
    }

    #[test]
    fn test_device_create() {
        let device = Device::tcp("127.0.0.1", 8023);
        assert!(!device.is_connected());
        assert_eq!(device.session_key(), None);

        let device = Device::with_config(
            SimulatedUnit::new(),
            DeviceConfig::default().with_assumed_key(0x3C),
        );
        assert_eq!(device.session_key(), Some(0x3C));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_emits_connected() {
        let unit = SimulatedUnit::new();
        let device = Device::new(unit);
        let mut events = device.subscribe();

        device.connect().await.unwrap();

        assert!(device.is_connected());
        assert_eq!(device.session_key(), Some(UNIT_KEY));
        assert_eq!(drain(&mut events), vec![DeviceEvent::Connected]);

        // Second connect is refused without touching the session
        assert!(device.connect().await.is_err());
        assert!(device.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure() {
        let unit = SimulatedUnit::new();
        let handle = unit.handle();
        handle.silence_syncs(usize::MAX);
        let device = Device::new(unit);
        let mut events = device.subscribe();

        let err = device.connect().await.unwrap_err();

        assert!(matches!(err, Error::HandshakeFailed { replied: false }));
        assert!(!device.is_connected());
        assert!(!handle.is_open());

        let events = drain(&mut events);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            DeviceEvent::Error { kind: ErrorKind::HandshakeFailed, message }
                if message.starts_with("Connection Failure")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_status_updates_cache() {
        let (device, _handle) = connected(DeviceConfig::default()).await;
        let mut events = device.subscribe();

        let status = device.request_status(false).await.unwrap();
        assert!(status.is_heartbeat());

        assert_eq!(device.cached_status().get(&MODE_NUM), Some(0x76));
        assert_eq!(drain(&mut events), vec![DeviceEvent::Status(status)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_status() {
        let (device, _handle) = connected(DeviceConfig::default()).await;
        let interval = Duration::from_secs(5);

        assert!(device.request_status_throttled(false, interval).await.unwrap().is_some());
        assert!(device.request_status_throttled(false, interval).await.unwrap().is_none());

        tokio::time::advance(interval).await;
        assert!(device.request_status_throttled(false, interval).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_value() {
        let (device, handle) = connected(DeviceConfig::default()).await;

        assert!(device.set_value("MAVALUE", &[0x40]).await.unwrap());
        assert_eq!(handle.peek(&MA_VALUE), 0x40);
        assert_eq!(device.read_register("MAVALUE").await.unwrap(), 0x40);
    }

    #[tokio::test]
    async fn test_oversized_write_never_reaches_transport() {
        let mut wire = MockWire::new();
        wire.expect_name().return_const("mock".to_string());
        wire.expect_write().never();
        wire.expect_read_timeout().never();

        let device = Device::new(wire);
        let mut events = device.subscribe();

        let err = device.set_value("MAVALUE", &[0u8; 9]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidWriteSize);

        // Caller errors are not broadcast
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_only_and_unknown_registers() {
        let (device, handle) = connected(DeviceConfig::default()).await;
        let writes = handle.writes();

        let err = device.set_value("MODENUM", &[0x77]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadOnlyRegister);

        let err = device.read_register("NOPE").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRegister);

        assert_eq!(handle.writes(), writes);
        assert!(device.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_draws_mode_name() {
        let (device, handle) = connected(DeviceConfig::default()).await;

        let status = device.set_mode(0x78).await.unwrap();
        assert_eq!(status.mode(), Some(Mode(0x78)));

        // Let the background update run
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.mode_names(), vec![0x78]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_rejects_unknown_mode() {
        let (device, handle) = connected(DeviceConfig::default()).await;

        let err = device.set_mode(0x42).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(handle.executed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_shows_paused_label() {
        let (device, handle) = connected(DeviceConfig::default()).await;

        let status = device.stop().await.unwrap();
        assert_eq!(status.mode(), Some(Mode::STOP));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.display_line(0), "        -PAUSED-");
        assert!(handle.mode_names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_shows_paused_label_whatever_unit_reports() {
        let (device, handle) = connected(DeviceConfig::default()).await;
        handle.report_mode(0x00);

        let status = device.stop().await.unwrap();
        assert_eq!(status.mode(), Some(Mode::NONE));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.display_line(0), "        -PAUSED-");
        assert!(handle.mode_names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_draws_requested_mode() {
        let (device, handle) = connected(DeviceConfig::default()).await;
        handle.report_mode(0x00);

        device.set_mode(0x78).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.mode_names(), vec![0x78]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_falls_back_to_heartbeat() {
        let unit = SimulatedUnit::new();
        let handle = unit.handle();
        handle.poke(&MODE_NUM, 0);
        let device = Device::new(unit);
        device.connect().await.unwrap();

        let status = device
            .execute(BoxCommand::SetPowerLevel(PowerLevel::High))
            .await
            .unwrap()
            .unwrap();

        assert!(status.is_heartbeat());
        assert_eq!(handle.peek(&POWER_LEVEL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_without_fallback() {
        let unit = SimulatedUnit::new();
        unit.handle().poke(&MODE_NUM, 0);
        let device = Device::with_config(
            unit,
            DeviceConfig::default().with_status_fallback(StatusFallback::Nothing),
        );
        device.connect().await.unwrap();

        let status = device
            .execute(BoxCommand::SetPowerLevel(PowerLevel::High))
            .await
            .unwrap();
        assert_eq!(status, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_control() {
        let (device, handle) = connected(DeviceConfig::default()).await;
        let mut events = device.subscribe();

        assert!(!device.has_control().await.unwrap());

        let outcome = device.take_control(true).await.unwrap();
        assert_eq!(outcome.status.remote_control(), Some(true));
        outcome.display.unwrap().wait().await.unwrap();

        assert!(device.has_control().await.unwrap());
        assert_eq!(handle.mode_names(), vec![0x76]);

        let events = drain(&mut events);
        assert_eq!(events[0], DeviceEvent::RemoteControl(true));
        assert!(is_status(&events[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_close() {
        let (device, handle) = connected(DeviceConfig::default()).await;
        device.take_control(true).await.unwrap();
        let mut events = device.subscribe();

        device.close(false).await.unwrap();

        assert!(!device.is_connected());
        assert!(!handle.is_open());
        assert_eq!(handle.key(), None);
        assert_eq!(device.session_key(), None);
        assert_eq!(handle.peek(&SYSTEM_FLAGS) & 0x01, 0);
        assert!(device.cached_status().is_empty());
        assert!(!device.has_control().await.unwrap());

        assert_eq!(
            drain(&mut events),
            vec![DeviceEvent::RemoteControl(false), DeviceEvent::Closed]
        );

        // Closing again is a no-op
        device.close(false).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_lost_forces_close() {
        let (device, handle) = connected(DeviceConfig::default()).await;
        device.take_control(true).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut events = device.subscribe();

        handle.lose();
        let err = device.request_status(false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceLost);

        assert!(!device.is_connected());
        // The unit was never told to forget the key
        assert_eq!(device.session_key(), Some(UNIT_KEY));

        let events = drain(&mut events);
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            DeviceEvent::Error { kind: ErrorKind::DeviceLost, message }
                if message.starts_with("Connection Lost")
        ));
        assert_eq!(events[1], DeviceEvent::RemoteControl(false));
        assert_eq!(events[2], DeviceEvent::Closed);
    }

    fn assert_forced_close(device: &Device, events: &mut Receiver<DeviceEvent>, kind: ErrorKind) {
        assert!(!device.is_connected());
        assert_eq!(device.session_key(), Some(UNIT_KEY));

        let events = drain(events);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            DeviceEvent::Error { kind: k, message }
                if *k == kind && message.starts_with("Connection Lost")
        ));
        assert_eq!(events[1], DeviceEvent::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_forces_close() {
        let (device, handle) = connected(DeviceConfig::default()).await;
        let mut events = device.subscribe();

        handle.mute();
        let err = device.request_status(false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        assert_forced_close(&device, &mut events, ErrorKind::Timeout);
        assert!(!handle.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_checksum_mismatch_forces_close() {
        let (device, handle) = connected(DeviceConfig::default()).await;
        let mut events = device.subscribe();

        handle.corrupt_replies();
        let err = device.read_register("MODENUM").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);

        assert_forced_close(&device, &mut events, ErrorKind::ChecksumMismatch);
        assert_eq!(handle.key(), Some(UNIT_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_reuses_retained_key() {
        let (device, handle) = connected(DeviceConfig::default()).await;

        device.close(true).await.unwrap();
        assert_eq!(handle.key(), Some(UNIT_KEY));

        device.connect().await.unwrap();
        let key_exchanges = handle
            .frames()
            .iter()
            .filter(|f| f[0] == wire::KEY_EXCHANGE)
            .count();
        assert_eq!(key_exchanges, 1);
        assert_eq!(device.read_register("MODENUM").await.unwrap(), 0x76);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_never_interleave() {
        let config = DeviceConfig::default().with_clear_line_timeout(Duration::from_millis(10));
        let (device, handle) = connected(config).await;

        let writer = {
            let device = device.clone();
            tokio::spawn(async move {
                for value in 0..32u8 {
                    assert!(device.set_value("MAVALUE", &[value]).await.unwrap());
                }
            })
        };
        let reader = {
            let device = device.clone();
            tokio::spawn(async move {
                for _ in 0..8 {
                    device.request_status(false).await.unwrap();
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();

        assert_eq!(handle.overlaps(), 0);
        assert_eq!(handle.corrupt_frames(), 0);
        assert_eq!(handle.peek(&MA_VALUE), 31);
        assert!(device.is_connected());
    }
}
