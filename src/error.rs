use crate::types::ConnectReturnCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MqttError>;

#[derive(Debug, Clone, Error)]
pub enum MqttError {
    #[error("IO error: {0}")]
    Io(String),

    /// The transport returned fewer bytes than a frame requires.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("connection refused: {0:?}")]
    ConnectionRefused(ConnectReturnCode),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("not connected")]
    NotConnected,

    #[error("timeout")]
    Timeout,

    #[error("invalid topic name: {0}")]
    InvalidTopicName(String),

    #[error("invalid topic filter: {0}")]
    InvalidTopicFilter(String),

    #[error("invalid QoS: {0}")]
    InvalidQoS(u8),

    #[error("invalid packet type: {0}")]
    InvalidPacketType(u8),

    #[error("packet ID space exhausted")]
    PacketIdExhausted,

    #[error("string too long: {0} bytes exceeds maximum of 65535")]
    StringTooLong(usize),

    #[error("packet too large: {0} bytes exceeds maximum remaining length")]
    PacketTooLarge(usize),
}

impl MqttError {
    /// True for errors that mean the connection itself is gone and the
    /// receive loop should stop or reconnect, as opposed to a recoverable
    /// per-packet failure.
    #[must_use]
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof | Self::Io(_) | Self::ConnectionError(_)
        )
    }
}

impl From<std::io::Error> for MqttError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            MqttError::UnexpectedEof
        } else {
            MqttError::Io(err.to_string())
        }
    }
}
