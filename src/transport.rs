//! Transport capability consumed by the session.
//!
//! The core never opens sockets itself: it is handed a [`Connector`] that
//! produces a fresh byte stream on demand (initial connect and every
//! reconnect attempt). Any `AsyncRead + AsyncWrite` stream qualifies, so a
//! TLS stream or an in-memory duplex can be injected the same way as TCP.

pub mod packet_io;

pub use packet_io::{PacketReader, PacketWriter};

use crate::error::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A bidirectional byte stream usable as the session transport.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

pub type BoxedTransport = Box<dyn ByteStream>;

/// Produces a connected transport. Called once by
/// [`MqttClient::connect`](crate::MqttClient::connect) and again for every
/// reconnect attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<BoxedTransport>;
}

/// Plain TCP connector.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<BoxedTransport> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
