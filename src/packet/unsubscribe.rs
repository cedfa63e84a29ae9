use crate::encoding::{decode_string, decode_u16, encode_string};
use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// UNSUBSCRIBE: packet id plus a non-empty list of filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_id: u16,
    pub filters: Vec<String>,
}

impl UnsubscribePacket {
    #[must_use]
    pub fn single(packet_id: u16, filter: impl Into<String>) -> Self {
        Self {
            packet_id,
            filters: vec![filter.into()],
        }
    }
}

impl MqttPacket for UnsubscribePacket {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.packet_id);
        for filter in &self.filters {
            encode_string(buf, filter)?;
        }
        Ok(())
    }

    fn decode_body(buf: &mut Bytes, _header: &FixedHeader) -> Result<Self> {
        let packet_id = decode_u16(buf)?;
        let mut filters = Vec::new();
        while buf.has_remaining() {
            filters.push(decode_string(buf)?);
        }
        if filters.is_empty() {
            return Err(MqttError::MalformedPacket(
                "UNSUBSCRIBE with empty filter list".to_string(),
            ));
        }
        Ok(Self { packet_id, filters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn test_unsubscribe_wire_bytes() {
        let packet = UnsubscribePacket::single(3, "a/b");
        let mut buf = BytesMut::new();
        Packet::Unsubscribe(packet).encode(&mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0xA2, 0x07, 0x00, 0x03, 0x00, 0x03, b'a', b'/', b'b']
        );
    }

    #[test]
    fn test_unsubscribe_round_trip() {
        let packet = UnsubscribePacket {
            packet_id: 9,
            filters: vec!["x".to_string(), "y/#".to_string()],
        };
        let mut buf = BytesMut::new();
        let wrapped = Packet::Unsubscribe(packet);
        wrapped.encode(&mut buf).unwrap();
        assert_eq!(Packet::decode(&mut buf.freeze()).unwrap(), wrapped);
    }
}
