//! Transaction engine
//!
//! Every interaction with the unit is a write followed by a read of a known
//! number of reply bytes. [`Link`] owns the transport and the session; the
//! device keeps it behind its session lock, so holding `&mut Link` means
//! holding the lock and at most one exchange is ever in flight.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use et312_core::{Session, checksum};
use et312_transport::{Error as TransportError, Transport};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};

pub(crate) struct Link {
    transport: Box<dyn Transport>,
    session: Session,
    pub(crate) read_timeout: Duration,
    pub(crate) clear_line_timeout: Duration,
    pub(crate) settle: Duration,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>, session: Session, config: &DeviceConfig) -> Self {
        Self {
            transport,
            session,
            read_timeout: config.read_timeout,
            clear_line_timeout: config.clear_line_timeout,
            settle: config.settle_per_opcode,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn name(&self) -> String {
        self.transport.name()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub(crate) fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    /// Send an encoded request and return its reply
    ///
    /// If the reply would carry the received-byte counter across a buffer
    /// boundary, sync rounds are exchanged first to step over it.
    pub async fn exchange(&mut self, request: &[u8], expected: usize) -> Result<Bytes> {
        let padding = self.session.boundary_padding(expected);

        if padding > 0 {
            debug!(
                received = self.session.received(),
                padding, "Stepping over buffer boundary"
            );

            let mut replied = false;
            if !self.sync_round(self.session.key(), padding, &mut replied).await? {
                return Err(Error::HandshakeFailed { replied });
            }
        }

        self.transact(request, expected).await
    }

    /// Send `request` (nothing if empty) and read `expected` reply bytes
    ///
    /// Each read is bounded by the read timeout. If more bytes arrive than
    /// expected, the last `expected` are kept. Once a key is established,
    /// replies longer than one byte are checksum-verified.
    pub async fn transact(&mut self, request: &[u8], expected: usize) -> Result<Bytes> {
        if !request.is_empty() {
            trace!("-> {}", hex::encode(request));
            self.transport.write(request).await?;
        }

        let mut reply = BytesMut::with_capacity(expected);

        while reply.len() < expected {
            match self.transport.read_timeout(self.read_timeout).await {
                Ok(chunk) => {
                    self.session.record_received(chunk.len());
                    reply.extend_from_slice(&chunk);
                }
                Err(TransportError::ReadTimeout) => {
                    debug!(
                        expected,
                        partial = %hex::encode(&reply),
                        "Reply timed out"
                    );
                    return Err(Error::Timeout {
                        expected,
                        partial: reply.freeze(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        if reply.len() > expected {
            let excess = reply.len() - expected;
            warn!(
                "Discarding {} excess reply bytes: {}",
                excess,
                hex::encode(&reply[..excess])
            );
            let _ = reply.split_to(excess);
        }

        let reply = reply.freeze();
        trace!("<- {}", hex::encode(&reply));

        if self.session.key().is_some() && expected > 1 {
            checksum::verify(&reply)?;
        }

        Ok(reply)
    }

    /// Close the transport and reset the session
    ///
    /// `keep_key` leaves the session key in place for the next handshake,
    /// for when the unit was never told to forget it.
    pub async fn shutdown(&mut self, keep_key: bool) -> Result<()> {
        if keep_key {
            self.session.teardown();
        } else {
            self.session.close();
        }

        self.transport.close().await?;
        Ok(())
    }
}
