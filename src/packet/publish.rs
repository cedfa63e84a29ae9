use crate::encoding::{decode_string, decode_u16, encode_string};
use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket};
use crate::types::{Message, QoS};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// PUBLISH: topic, packet id when QoS > 0, opaque payload to the end of
/// the frame. The dup/qos/retain bits live in the fixed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub topic: String,
    pub packet_id: Option<u16>,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
}

impl PublishPacket {
    #[must_use]
    pub fn message(&self) -> Message {
        Message {
            topic: self.topic.clone(),
            payload: self.payload.clone(),
            qos: self.qos,
            retain: self.retain,
            dup: self.dup,
        }
    }
}

impl MqttPacket for PublishPacket {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        encode_string(buf, &self.topic)?;
        if self.qos > QoS::AtMostOnce {
            let packet_id = self.packet_id.ok_or_else(|| {
                MqttError::ProtocolError("PUBLISH above QoS 0 requires a packet id".to_string())
            })?;
            buf.put_u16(packet_id);
        }
        buf.put_slice(&self.payload);
        Ok(())
    }

    fn decode_body(buf: &mut Bytes, header: &FixedHeader) -> Result<Self> {
        let topic = decode_string(buf)?;
        let packet_id = if header.qos > QoS::AtMostOnce {
            Some(decode_u16(buf)?)
        } else {
            None
        };
        let payload = buf.copy_to_bytes(buf.remaining()).to_vec();
        Ok(Self {
            topic,
            packet_id,
            payload,
            qos: header.qos,
            retain: header.retain,
            dup: header.dup,
        })
    }
}
