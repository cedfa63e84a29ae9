use crate::encoding::{decode_string, decode_u16, encode_string};
use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket};
use crate::types::QoS;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// One (topic filter, requested QoS) pair in a SUBSCRIBE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    pub filter: String,
    pub qos: QoS,
}

/// SUBSCRIBE: packet id plus a non-empty list of filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub filters: Vec<TopicFilter>,
}

impl SubscribePacket {
    /// The single-filter form used by `MqttClient::subscribe`.
    #[must_use]
    pub fn single(packet_id: u16, filter: impl Into<String>, qos: QoS) -> Self {
        Self {
            packet_id,
            filters: vec![TopicFilter {
                filter: filter.into(),
                qos,
            }],
        }
    }
}

impl MqttPacket for SubscribePacket {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.packet_id);
        for entry in &self.filters {
            encode_string(buf, &entry.filter)?;
            buf.put_u8(entry.qos.as_u8());
        }
        Ok(())
    }

    fn decode_body(buf: &mut Bytes, _header: &FixedHeader) -> Result<Self> {
        let packet_id = decode_u16(buf)?;
        let mut filters = Vec::new();
        while buf.has_remaining() {
            let filter = decode_string(buf)?;
            if !buf.has_remaining() {
                return Err(MqttError::MalformedPacket(
                    "SUBSCRIBE filter missing QoS byte".to_string(),
                ));
            }
            let qos = QoS::try_from(buf.get_u8())?;
            filters.push(TopicFilter { filter, qos });
        }
        if filters.is_empty() {
            return Err(MqttError::MalformedPacket(
                "SUBSCRIBE with empty filter list".to_string(),
            ));
        }
        Ok(Self { packet_id, filters })
    }
}
