//! Framed packet IO over any byte stream.
//!
//! Reading follows the wire format exactly: one fixed-header byte, then
//! the Remaining Length varint one byte at a time until the continuation
//! bit clears, then exactly that many body bytes. Short reads surface as
//! [`MqttError::UnexpectedEof`].

use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, Packet, PacketType};
use crate::types::QoS;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads whole packets from a byte stream.
pub trait PacketReader {
    fn read_packet(&mut self) -> impl std::future::Future<Output = Result<Packet>> + Send;
}

/// Writes whole packets to a byte stream.
pub trait PacketWriter {
    fn write_packet(&mut self, packet: &Packet)
        -> impl std::future::Future<Output = Result<()>> + Send;
}

impl<R: AsyncRead + Unpin + Send> PacketReader for R {
    async fn read_packet(&mut self) -> Result<Packet> {
        let first = self.read_u8().await?;
        let remaining_length = read_remaining_length(self).await?;

        let mut body = vec![0u8; remaining_length as usize];
        self.read_exact(&mut body).await?;

        let header = decode_first_byte(first, remaining_length)?;
        let packet = Packet::decode_body(&header, &mut Bytes::from(body))?;
        tracing::trace!(packet_type = ?packet.packet_type(), "received packet");
        Ok(packet)
    }
}

impl<W: AsyncWrite + Unpin + Send> PacketWriter for W {
    async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let mut buf = BytesMut::new();
        packet.encode(&mut buf)?;
        self.write_all(&buf).await?;
        self.flush().await?;
        tracing::trace!(packet_type = ?packet.packet_type(), "sent packet");
        Ok(())
    }
}

async fn read_remaining_length<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u32> {
    let mut value: u32 = 0;
    let mut multiplier: u32 = 1;
    for i in 0..4 {
        let byte = reader.read_u8().await?;
        value += u32::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        if i < 3 {
            multiplier *= 128;
        }
    }
    Err(MqttError::MalformedPacket(
        "remaining length exceeds 4 bytes".to_string(),
    ))
}

/// Validates the first frame byte the same way [`FixedHeader::decode`]
/// does for in-memory buffers.
fn decode_first_byte(byte: u8, remaining_length: u32) -> Result<FixedHeader> {
    let packet_type = PacketType::try_from(byte >> 4)?;
    let flags = byte & 0x0F;

    let (dup, qos, retain) = if packet_type == PacketType::Publish {
        (
            flags & 0x08 != 0,
            QoS::try_from((flags >> 1) & 0x03)?,
            flags & 0x01 != 0,
        )
    } else {
        let expected = packet_type.mandatory_flag_qos().as_u8() << 1;
        if flags != expected {
            return Err(MqttError::MalformedPacket(format!(
                "invalid fixed-header flags 0x{flags:02X} for {packet_type:?}"
            )));
        }
        (false, packet_type.mandatory_flag_qos(), false)
    };

    Ok(FixedHeader {
        packet_type,
        dup,
        qos,
        retain,
        remaining_length,
    })
}
