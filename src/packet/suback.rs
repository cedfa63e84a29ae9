use crate::encoding::decode_u16;
use crate::error::Result;
use crate::packet::{FixedHeader, MqttPacket};
use crate::types::QoS;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// SUBACK: packet id plus one granted-QoS byte per subscribed filter, in
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAckPacket {
    pub packet_id: u16,
    pub granted: Vec<QoS>,
}

impl SubAckPacket {
    #[must_use]
    pub fn new(packet_id: u16, granted: Vec<QoS>) -> Self {
        Self { packet_id, granted }
    }
}

impl MqttPacket for SubAckPacket {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.packet_id);
        for qos in &self.granted {
            buf.put_u8(qos.as_u8());
        }
        Ok(())
    }

    fn decode_body(buf: &mut Bytes, _header: &FixedHeader) -> Result<Self> {
        let packet_id = decode_u16(buf)?;
        let mut granted = Vec::with_capacity(buf.remaining());
        while buf.has_remaining() {
            granted.push(QoS::try_from(buf.get_u8())?);
        }
        Ok(Self { packet_id, granted })
    }
}
