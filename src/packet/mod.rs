//! Packet model: the fourteen MQTT v3.1 control packets, their fixed
//! header, and the framing codec.
//!
//! Bodies (variable header + payload) are serialised into a scratch buffer
//! first; the fixed-header byte and the Remaining Length varint are
//! prepended afterwards, which is the simplest way to satisfy the framing
//! contract.

pub mod ack_common;
pub mod connack;
pub mod connect;
pub mod puback;
pub mod pubcomp;
pub mod publish;
pub mod pubrec;
pub mod pubrel;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

pub use connack::ConnAckPacket;
pub use connect::{ConnectPacket, PROTOCOL_LEVEL, PROTOCOL_NAME};
pub use puback::PubAckPacket;
pub use pubcomp::PubCompPacket;
pub use publish::PublishPacket;
pub use pubrec::PubRecPacket;
pub use pubrel::PubRelPacket;
pub use suback::SubAckPacket;
pub use subscribe::{SubscribePacket, TopicFilter};
pub use unsuback::UnsubAckPacket;
pub use unsubscribe::UnsubscribePacket;

use crate::encoding::{decode_remaining_length, encode_remaining_length};
use crate::error::{MqttError, Result};
use crate::types::QoS;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The fourteen MQTT 3.1 control-packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl PacketType {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = MqttError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Connect),
            2 => Ok(Self::ConnAck),
            3 => Ok(Self::Publish),
            4 => Ok(Self::PubAck),
            5 => Ok(Self::PubRec),
            6 => Ok(Self::PubRel),
            7 => Ok(Self::PubComp),
            8 => Ok(Self::Subscribe),
            9 => Ok(Self::SubAck),
            10 => Ok(Self::Unsubscribe),
            11 => Ok(Self::UnsubAck),
            12 => Ok(Self::PingReq),
            13 => Ok(Self::PingResp),
            14 => Ok(Self::Disconnect),
            other => Err(MqttError::InvalidPacketType(other)),
        }
    }
}

/// Fixed header: packet type, flag nibble, Remaining Length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub remaining_length: u32,
}

impl FixedHeader {
    #[must_use]
    pub fn new(packet_type: PacketType, remaining_length: u32) -> Self {
        Self {
            packet_type,
            dup: false,
            qos: packet_type.mandatory_flag_qos(),
            retain: false,
            remaining_length,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let flags = (u8::from(self.dup) << 3) | (self.qos.as_u8() << 1) | u8::from(self.retain);
        buf.put_u8((self.packet_type.as_u8() << 4) | flags);
        encode_remaining_length(buf, self.remaining_length as usize)
    }

    /// Decodes the first byte and Remaining Length, validating the flag
    /// nibble for every type except PUBLISH (whose flags are meaningful).
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if !buf.has_remaining() {
            return Err(MqttError::UnexpectedEof);
        }
        let byte = buf.get_u8();
        let packet_type = PacketType::try_from(byte >> 4)?;
        let flags = byte & 0x0F;
        let remaining_length = decode_remaining_length(buf)?;

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

        Ok(Self {
            packet_type,
            dup,
            qos,
            retain,
            remaining_length,
        })
    }
}

impl PacketType {
    /// PUBREL, SUBSCRIBE and UNSUBSCRIBE carry the 0x02 flag nibble in
    /// v3.1; every other non-PUBLISH type carries zero.
    #[must_use]
    pub fn mandatory_flag_qos(self) -> QoS {
        match self {
            Self::PubRel | Self::Subscribe | Self::Unsubscribe => QoS::AtLeastOnce,
            _ => QoS::AtMostOnce,
        }
    }
}

/// Variable header + payload codec implemented by every packet shape.
pub trait MqttPacket: Sized {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<()>;
    fn decode_body(buf: &mut Bytes, header: &FixedHeader) -> Result<Self>;
}

/// A parsed MQTT control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    PubAck(PubAckPacket),
    PubRec(PubRecPacket),
    PubRel(PubRelPacket),
    PubComp(PubCompPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubAck(UnsubAckPacket),
    PingReq,
    PingResp,
    Disconnect,
}

impl Packet {
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(_) => PacketType::Connect,
            Self::ConnAck(_) => PacketType::ConnAck,
            Self::Publish(_) => PacketType::Publish,
            Self::PubAck(_) => PacketType::PubAck,
            Self::PubRec(_) => PacketType::PubRec,
            Self::PubRel(_) => PacketType::PubRel,
            Self::PubComp(_) => PacketType::PubComp,
            Self::Subscribe(_) => PacketType::Subscribe,
            Self::SubAck(_) => PacketType::SubAck,
            Self::Unsubscribe(_) => PacketType::Unsubscribe,
            Self::UnsubAck(_) => PacketType::UnsubAck,
            Self::PingReq => PacketType::PingReq,
            Self::PingResp => PacketType::PingResp,
            Self::Disconnect => PacketType::Disconnect,
        }
    }

    /// The variable-header packet identifier, for the packet shapes that
    /// carry one.
    #[must_use]
    pub fn packet_id(&self) -> Option<u16> {
        match self {
            Self::Publish(p) => p.packet_id,
            Self::PubAck(p) => Some(p.packet_id),
            Self::PubRec(p) => Some(p.packet_id),
            Self::PubRel(p) => Some(p.packet_id),
            Self::PubComp(p) => Some(p.packet_id),
            Self::Subscribe(p) => Some(p.packet_id),
            Self::SubAck(p) => Some(p.packet_id),
            Self::Unsubscribe(p) => Some(p.packet_id),
            Self::UnsubAck(p) => Some(p.packet_id),
            _ => None,
        }
    }

    /// Serialises the packet with correct Remaining Length framing.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::new();
        match self {
            Self::Connect(p) => p.encode_body(&mut body)?,
            Self::ConnAck(p) => p.encode_body(&mut body)?,
            Self::Publish(p) => p.encode_body(&mut body)?,
            Self::PubAck(p) => p.encode_body(&mut body)?,
            Self::PubRec(p) => p.encode_body(&mut body)?,
            Self::PubRel(p) => p.encode_body(&mut body)?,
            Self::PubComp(p) => p.encode_body(&mut body)?,
            Self::Subscribe(p) => p.encode_body(&mut body)?,
            Self::SubAck(p) => p.encode_body(&mut body)?,
            Self::Unsubscribe(p) => p.encode_body(&mut body)?,
            Self::UnsubAck(p) => p.encode_body(&mut body)?,
            Self::PingReq | Self::PingResp | Self::Disconnect => {}
        }

        if body.len() > crate::encoding::MAX_REMAINING_LENGTH {
            return Err(MqttError::PacketTooLarge(body.len()));
        }
        let mut header = FixedHeader::new(self.packet_type(), body.len() as u32);
        if let Self::Publish(p) = self {
            header.dup = p.dup;
            header.qos = p.qos;
            header.retain = p.retain;
        }
        header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(())
    }

    /// Parses one complete frame from an in-memory buffer.
    pub fn decode(buf: &mut Bytes) -> Result<Packet> {
        let header = FixedHeader::decode(buf)?;
        let len = header.remaining_length as usize;
        if buf.remaining() < len {
            return Err(MqttError::UnexpectedEof);
        }
        let mut body = buf.copy_to_bytes(len);
        Self::decode_body(&header, &mut body)
    }

    /// Parses a packet body whose fixed header has already been read.
    pub fn decode_body(header: &FixedHeader, body: &mut Bytes) -> Result<Packet> {
        let packet = match header.packet_type {
            PacketType::Connect => Packet::Connect(ConnectPacket::decode_body(body, header)?),
            PacketType::ConnAck => Packet::ConnAck(ConnAckPacket::decode_body(body, header)?),
            PacketType::Publish => Packet::Publish(PublishPacket::decode_body(body, header)?),
            PacketType::PubAck => Packet::PubAck(PubAckPacket::decode_body(body, header)?),
            PacketType::PubRec => Packet::PubRec(PubRecPacket::decode_body(body, header)?),
            PacketType::PubRel => Packet::PubRel(PubRelPacket::decode_body(body, header)?),
            PacketType::PubComp => Packet::PubComp(PubCompPacket::decode_body(body, header)?),
            PacketType::Subscribe => Packet::Subscribe(SubscribePacket::decode_body(body, header)?),
            PacketType::SubAck => Packet::SubAck(SubAckPacket::decode_body(body, header)?),
            PacketType::Unsubscribe => {
                Packet::Unsubscribe(UnsubscribePacket::decode_body(body, header)?)
            }
            PacketType::UnsubAck => Packet::UnsubAck(UnsubAckPacket::decode_body(body, header)?),
            PacketType::PingReq => Packet::PingReq,
            PacketType::PingResp => Packet::PingResp,
            PacketType::Disconnect => Packet::Disconnect,
        };
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(packet: Packet) -> Packet {
        let mut buf = BytesMut::new();
        packet.encode(&mut buf).unwrap();
        Packet::decode(&mut buf.freeze()).unwrap()
    }

    #[test]
    fn test_empty_packets_round_trip() {
        for packet in [Packet::PingReq, Packet::PingResp, Packet::Disconnect] {
            assert_eq!(round_trip(packet.clone()), packet);
        }
    }

    #[test]
    fn test_empty_packet_wire_bytes() {
        let mut buf = BytesMut::new();
        Packet::PingReq.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0xC0, 0x00]);

        buf.clear();
        Packet::Disconnect.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0xE0, 0x00]);
    }

    #[test]
    fn test_reserved_packet_type_rejected() {
        let mut buf = Bytes::from_static(&[0x00, 0x00]);
        assert!(matches!(
            Packet::decode(&mut buf),
            Err(MqttError::InvalidPacketType(0))
        ));

        let mut buf = Bytes::from_static(&[0xF0, 0x00]);
        assert!(matches!(
            Packet::decode(&mut buf),
            Err(MqttError::InvalidPacketType(15))
        ));
    }

    #[test]
    fn test_bad_flags_rejected() {
        // PINGREQ with a non-zero flag nibble
        let mut buf = Bytes::from_static(&[0xC1, 0x00]);
        assert!(matches!(
            Packet::decode(&mut buf),
            Err(MqttError::MalformedPacket(_))
        ));

        // SUBSCRIBE missing the 0x02 nibble
        let mut buf = Bytes::from_static(&[0x80, 0x05, 0x00, 0x01, 0x00, 0x01, b'a']);
        assert!(matches!(
            Packet::decode(&mut buf),
            Err(MqttError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_publish_qos3_rejected() {
        let mut buf = Bytes::from_static(&[0x36, 0x05, 0x00, 0x03, b'a', b'/', b'b']);
        assert!(matches!(
            Packet::decode(&mut buf),
            Err(MqttError::InvalidQoS(3))
        ));
    }

    #[test]
    fn test_truncated_frame_is_eof() {
        // Remaining length says 4 bytes, only 2 present
        let mut buf = Bytes::from_static(&[0x40, 0x04, 0x00, 0x01]);
        assert!(matches!(
            Packet::decode(&mut buf),
            Err(MqttError::UnexpectedEof)
        ));
    }
}
