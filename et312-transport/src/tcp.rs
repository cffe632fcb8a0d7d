//! Serial link forwarded over TCP
//!
//! For units attached to a serial-to-network bridge (ser2net and similar).
//! The bridge forwards raw bytes in both directions; the protocol is the
//! same as on a local port.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{Transport, error::*};

/// Remote-forwarded transport
pub struct TcpTransport {
    host: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Bridge at `host:port`, connect timeout 5s
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            socket_addr: None,
            stream: None,
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Look up the bridge, once per open
    async fn resolve(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let target = format!("{}:{}", self.host, self.port);
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::InvalidAddress(format!("{target}: {e}")))?;

        let addr = addrs
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("{target}: no addresses")))?;

        self.socket_addr = Some(addr);
        Ok(addr)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve().await?;
        debug!("Opening bridge connection to {}", addr);

        let Ok(connected) = timeout(self.connect_timeout, TcpStream::connect(addr)).await else {
            return Err(Error::ConnectionTimeout);
        };
        let stream = connected?;

        // Frames are a handful of bytes; don't let Nagle hold them back
        stream.set_nodelay(true)?;

        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing bridge connection to {}", self.name());
            if let Err(e) = stream.shutdown().await {
                trace!("Shutdown of {} failed: {}", self.name(), e);
            }
        }

        self.socket_addr = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!(">> {}", hex::encode(data));
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_timeout(&mut self, read_timeout: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::with_capacity(32);

        // read_buf is cancel safe: a fired timer drops no data
        match timeout(read_timeout, stream.read_buf(&mut buf)).await {
            Err(_) => Err(Error::ReadTimeout),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(0)) => {
                warn!("Bridge {} hung up", self.host);
                Err(Error::ConnectionClosed)
            }
            Ok(Ok(_)) => {
                trace!("<< {}", hex::encode(&buf));
                Ok(buf)
            }
        }
    }

    fn name(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("Bridge connection to {} dropped without close", self.name());
        }
    }
}
