//! Session management for the ET-312 protocol
//!
//! A session represents a link to a unit and tracks:
//! - Connection state (handshake, key exchange, ready)
//! - Session key (assigned by the unit during key exchange)
//! - Cumulative received-byte counter (for the buffer-boundary workaround)

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::BUFFER_BOUNDARY;
use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,

    /// Resynchronizing packet boundaries with the unit
    Handshaking,

    /// Handshake done, negotiating the session key
    KeyExchanging,

    /// Key established, ready for reads and writes
    Ready,
}

/// Session manager
///
/// Thread-safe and can be cloned cheaply (Arc internally).
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Session key (None until key exchange completes)
    key: parking_lot::RwLock<Option<u8>>,

    /// Bytes received since the link was opened
    received: AtomicU64,

    /// Current session state
    state: parking_lot::RwLock<SessionState>,
}

impl Session {
    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                key: parking_lot::RwLock::new(None),
                received: AtomicU64::new(0),
                state: parking_lot::RwLock::new(SessionState::Disconnected),
            }),
        }
    }

    /// Create a disconnected session that remembers a key from an earlier,
    /// abnormally terminated session
    pub fn with_retained_key(key: u8) -> Self {
        let session = Self::new();
        *session.inner.key.write() = Some(key);
        session
    }

    /// Get current session key
    pub fn key(&self) -> Option<u8> {
        *self.inner.key.read()
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Check if connected (any state past Disconnected)
    pub fn is_connected(&self) -> bool {
        !matches!(self.state(), SessionState::Disconnected)
    }

    /// Check if data-plane exchanges are allowed
    pub fn is_ready(&self) -> bool {
        matches!(self.state(), SessionState::Ready)
    }

    /// Fail unless the session is ready
    pub fn ensure_ready(&self) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::SessionNotReady);
        }
        Ok(())
    }

    /// Start a handshake
    ///
    /// Clears the session key and returns the key it held, if any, so the
    /// handshake can try it before falling back to an unencrypted sync.
    pub fn begin_handshake(&self) -> Result<Option<u8>> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Disconnected {
            return Err(Error::InvalidSessionState(format!(
                "Cannot handshake from state: {:?}",
                *state
            )));
        }

        self.inner.received.store(0, Ordering::Release);
        *state = SessionState::Handshaking;

        Ok(self.inner.key.write().take())
    }

    /// Handshake finished, move on to key exchange
    pub fn begin_key_exchange(&self) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Handshaking {
            return Err(Error::InvalidSessionState(format!(
                "Cannot exchange keys from state: {:?}",
                *state
            )));
        }

        *state = SessionState::KeyExchanging;
        Ok(())
    }

    /// Mark session as ready with the negotiated key
    pub fn establish(&self, key: u8) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::KeyExchanging {
            return Err(Error::InvalidSessionState(format!(
                "Cannot establish session from state: {:?}",
                *state
            )));
        }

        *self.inner.key.write() = Some(key);
        *state = SessionState::Ready;
        Ok(())
    }

    /// Clean close: forget the key so the next session starts from zero
    pub fn close(&self) {
        *self.inner.key.write() = None;
        self.inner.received.store(0, Ordering::Release);
        *self.inner.state.write() = SessionState::Disconnected;
    }

    /// Forced teardown: the unit still holds the key, so keep it for the
    /// next handshake
    pub fn teardown(&self) {
        self.inner.received.store(0, Ordering::Release);
        *self.inner.state.write() = SessionState::Disconnected;
    }

    /// Bytes received since the handshake started
    pub fn received(&self) -> u64 {
        self.inner.received.load(Ordering::Acquire)
    }

    /// Record received bytes
    pub fn record_received(&self, count: usize) {
        self.inner.received.fetch_add(count as u64, Ordering::AcqRel);
    }

    /// Number of single-byte sync rounds needed before an exchange
    /// expecting `reply_len` bytes, or 0 if none
    ///
    /// Some USB-serial adapters stall a read whose data crosses a multiple
    /// of 255 received bytes. When the reply would cross one, the counter
    /// is first pushed past the boundary with sync rounds.
    pub fn boundary_padding(&self, reply_len: usize) -> usize {
        let count = self.received();
        let next = (count + reply_len as u64) % BUFFER_BOUNDARY;

        if next > 0 && next < count % BUFFER_BOUNDARY {
            (next + 1) as usize
        } else {
            0
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_session(key: u8) -> Session {
        let session = Session::new();
        session.begin_handshake().unwrap();
        session.begin_key_exchange().unwrap();
        session.establish(key).unwrap();
        session
    }

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert_eq!(session.key(), None);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
        assert!(!session.is_ready());
    }

    #[test]
    fn test_session_lifecycle() {
        let session = Session::new();

        assert_eq!(session.begin_handshake().unwrap(), None);
        assert_eq!(session.state(), SessionState::Handshaking);
        assert!(session.is_connected());
        assert!(session.ensure_ready().is_err());

        session.begin_key_exchange().unwrap();
        assert_eq!(session.state(), SessionState::KeyExchanging);

        session.establish(0x2A).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.key(), Some(0x2A));
        assert!(session.ensure_ready().is_ok());
    }

    #[test]
    fn test_session_close_clears_key() {
        let session = ready_session(0x2A);
        session.close();

        assert_eq!(session.key(), None);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_session_teardown_keeps_key() {
        let session = ready_session(0x2A);
        session.teardown();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.key(), Some(0x2A));

        // The next handshake is handed the retained key and clears it
        assert_eq!(session.begin_handshake().unwrap(), Some(0x2A));
        assert_eq!(session.key(), None);
    }

    #[test]
    fn test_retained_key() {
        let session = Session::with_retained_key(0x11);
        assert_eq!(session.begin_handshake().unwrap(), Some(0x11));
    }

    #[test]
    fn test_invalid_state_transitions() {
        let session = Session::new();

        assert!(session.begin_key_exchange().is_err());
        assert!(session.establish(1).is_err());

        session.begin_handshake().unwrap();
        assert!(session.begin_handshake().is_err());
        assert!(session.establish(1).is_err());
    }

    #[test]
    fn test_boundary_padding() {
        let session = ready_session(0);

        // 0 -> 3: no boundary crossed
        assert_eq!(session.boundary_padding(3), 0);

        session.record_received(250);
        // 250 -> 253
        assert_eq!(session.boundary_padding(3), 0);
        // 250 -> 255 lands exactly on the boundary
        assert_eq!(session.boundary_padding(5), 0);
        // 250 -> 258 crosses it: 3 past, pad with 4 sync rounds
        assert_eq!(session.boundary_padding(8), 4);

        session.record_received(5);
        // 255 -> 256
        assert_eq!(session.boundary_padding(1), 0);
    }

    #[test]
    fn test_session_clone() {
        let session1 = Session::new();
        let session2 = session1.clone();

        session1.begin_handshake().unwrap();
        session1.record_received(3);

        assert_eq!(session2.state(), SessionState::Handshaking);
        assert_eq!(session2.received(), 3);
    }
}
