//! Session establishment
//!
//! ```text
//! Disconnected ──clear line──▶ Handshaking ──0x00 / 0x07──▶ KeyExchanging
//!                                                               │
//!                         Ready ◀──[0x2F 0x00 cs] / [0x21 key cs]┘
//! ```
//!
//! A key retained from an earlier session is tried first. If the unit
//! answers syncs encrypted with it, the key exchange is skipped.

use tracing::{debug, info, trace, warn};

use et312_core::constants::{HANDSHAKE_ATTEMPTS, wire};
use et312_core::{Request, checksum, packet};
use et312_transport::Error as TransportError;

use crate::error::{Error, Result};
use crate::link::Link;

impl Link {
    /// Open the transport and bring the session to Ready
    pub async fn connect(&mut self) -> Result<()> {
        if !self.is_open() {
            self.transport_mut().open().await?;
        }

        let retained = self.session().begin_handshake()?;

        self.clear_line().await?;

        let retained = self.handshake(retained, 1).await?;
        self.session().begin_key_exchange()?;

        let key = match retained {
            Some(key) => {
                debug!("Unit still holds key 0x{:02X}, skipping key exchange", key);
                key
            }
            None => self.key_exchange().await?,
        };

        self.session().establish(key)?;
        info!("Session established with {}", self.name());

        Ok(())
    }

    /// Drain whatever is pending on the line
    ///
    /// Fails with [`Error::UnitErrorState`] if the pending bytes are the
    /// unit's error pattern: every byte 0x07 or next to one.
    pub async fn clear_line(&mut self) -> Result<()> {
        let timeout = self.clear_line_timeout;

        match self.transport_mut().read_timeout(timeout).await {
            Ok(pending) => {
                debug!("Discarding {} stale bytes: {}", pending.len(), hex::encode(&pending));

                if is_error_pattern(&pending) {
                    return Err(Error::UnitErrorState);
                }
                Ok(())
            }
            Err(TransportError::ReadTimeout) => {
                trace!("Line is quiet");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resynchronize packet boundaries with the unit
    ///
    /// Sends sync bytes (encrypted with `key` if given) until the unit
    /// answers 0x07 on attempt `min_rounds` or later. If the unit never
    /// answers under `key`, the key is dropped and the handshake repeats
    /// unencrypted once. Returns the key the unit accepted.
    pub async fn handshake(&mut self, key: Option<u8>, min_rounds: usize) -> Result<Option<u8>> {
        let mut key = key;
        let mut replied = false;

        loop {
            if self.sync_round(key, min_rounds, &mut replied).await? {
                return Ok(key);
            }

            match key.take() {
                Some(stale) => {
                    warn!(
                        "Unit ignored syncs under key 0x{:02X}, retrying unencrypted",
                        stale
                    );
                }
                None => return Err(Error::HandshakeFailed { replied }),
            }
        }
    }

    /// One round of up to twelve sync attempts
    ///
    /// Timeouts and wrong replies are expected while stale bytes drain, so
    /// both just move on to the next attempt.
    pub(crate) async fn sync_round(
        &mut self,
        key: Option<u8>,
        min_rounds: usize,
        replied: &mut bool,
    ) -> Result<bool> {
        let sync = Request::sync().encode(key);

        for attempt in 1..=HANDSHAKE_ATTEMPTS {
            match self.transact(&sync, 1).await {
                Ok(reply) => {
                    *replied = true;

                    if reply[0] != wire::SYNC_REPLY {
                        warn!("Sync attempt {}: unexpected reply 0x{:02X}", attempt, reply[0]);
                    } else if attempt >= min_rounds {
                        trace!("Synchronized after {} attempts", attempt);
                        return Ok(true);
                    }
                }
                Err(Error::Timeout { .. }) => {
                    trace!("Sync attempt {} timed out", attempt);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(false)
    }

    /// Ask the unit for a session key
    ///
    /// Only the last three bytes read are kept, so noise ahead of the
    /// marker is bounded by the reply length. The reply checksum is not
    /// enforced before a key exists; a mismatch is only logged.
    pub async fn key_exchange(&mut self) -> Result<u8> {
        let request = Request::key_exchange();
        let mut reply = self
            .transact(&request.encode(None), request.reply_len())
            .await?
            .to_vec();

        let Some(offset) = packet::find_key_marker(&reply) else {
            return Err(Error::UnexpectedKeyExchangeReply(reply.into()));
        };

        if offset > 0 {
            // Noise ahead of the marker pushed the end of the frame out
            debug!("Key exchange reply preceded by {} noise bytes", offset);
            let rest = self.transact(&[], offset).await?;
            reply.extend_from_slice(&rest);
        }

        let frame = &reply[offset..offset + request.reply_len()];
        if let Err(e) = checksum::verify(frame) {
            warn!("Key exchange reply {}: {}", hex::encode(frame), e);
        }

        debug!("Negotiated session key 0x{:02X}", frame[1]);
        Ok(frame[1])
    }
}

fn is_error_pattern(bytes: &[u8]) -> bool {
    let is_reply = |i: usize| bytes.get(i) == Some(&wire::SYNC_REPLY);

    bytes
        .iter()
        .enumerate()
        .all(|(i, _)| is_reply(i) || (i > 0 && is_reply(i - 1)) || is_reply(i + 1))
}
