use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket};
use crate::types::ConnectReturnCode;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// CONNACK: one reserved byte followed by the return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAckPacket {
    pub return_code: ConnectReturnCode,
}

impl ConnAckPacket {
    #[must_use]
    pub fn new(return_code: ConnectReturnCode) -> Self {
        Self { return_code }
    }
}

impl MqttPacket for ConnAckPacket {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(0);
        buf.put_u8(self.return_code.as_u8());
        Ok(())
    }

    fn decode_body(buf: &mut Bytes, _header: &FixedHeader) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(MqttError::MalformedPacket(
                "truncated CONNACK".to_string(),
            ));
        }
        let _reserved = buf.get_u8();
        let return_code = ConnectReturnCode::try_from(buf.get_u8())?;
        Ok(Self { return_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn test_connack_accepted_wire_bytes() {
        let mut buf = BytesMut::new();
        Packet::ConnAck(ConnAckPacket::new(ConnectReturnCode::Accepted))
            .encode(&mut buf)
            .unwrap();
        assert_eq!(&buf[..], &[0x20, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn test_connack_rejection_round_trip() {
        let mut buf = Bytes::from_static(&[0x20, 0x02, 0x00, 0x05]);
        let packet = Packet::decode(&mut buf).unwrap();
        assert_eq!(
            packet,
            Packet::ConnAck(ConnAckPacket::new(ConnectReturnCode::NotAuthorized))
        );
    }

    #[test]
    fn test_connack_unknown_return_code() {
        let mut buf = Bytes::from_static(&[0x20, 0x02, 0x00, 0x2A]);
        assert!(matches!(
            Packet::decode(&mut buf),
            Err(MqttError::MalformedPacket(_))
        ));
    }
}
