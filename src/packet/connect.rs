use crate::encoding::{decode_bytes, decode_string, decode_u16, encode_bytes, encode_string};
use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket};
use crate::types::{ConnectOptions, QoS, WillMessage};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Protocol name carried in the CONNECT variable header.
pub const PROTOCOL_NAME: &str = "MQIsdp";
/// Protocol level for MQTT v3.1.
pub const PROTOCOL_LEVEL: u8 = 3;

const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_WILL: u8 = 0x04;
const FLAG_WILL_RETAIN: u8 = 0x20;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_USERNAME: u8 = 0x80;

/// CONNECT: opens the session.
///
/// Variable header: protocol name, protocol level, connect flags,
/// keep-alive seconds. Payload: client id, then will topic/message,
/// username and password, each present iff its flag is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    pub client_id: String,
    pub keep_alive: u16,
    pub clean_session: bool,
    pub will: Option<WillMessage>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl ConnectPacket {
    #[must_use]
    pub fn from_options(options: &ConnectOptions) -> Self {
        Self {
            client_id: options.client_id.clone(),
            keep_alive: options.keep_alive_secs(),
            clean_session: options.clean_session,
            will: options.will.clone(),
            username: options.username.clone(),
            password: options.password.clone(),
        }
    }

    fn connect_flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.clean_session {
            flags |= FLAG_CLEAN_SESSION;
        }
        if let Some(will) = &self.will {
            flags |= FLAG_WILL;
            flags |= will.qos.as_u8() << 3;
            if will.retain {
                flags |= FLAG_WILL_RETAIN;
            }
        }
        if self.password.is_some() {
            flags |= FLAG_PASSWORD;
        }
        if self.username.is_some() {
            flags |= FLAG_USERNAME;
        }
        flags
    }
}

impl MqttPacket for ConnectPacket {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        encode_string(buf, PROTOCOL_NAME)?;
        buf.put_u8(PROTOCOL_LEVEL);
        buf.put_u8(self.connect_flags());
        buf.put_u16(self.keep_alive);

        encode_string(buf, &self.client_id)?;
        if let Some(will) = &self.will {
            encode_string(buf, &will.topic)?;
            encode_bytes(buf, &will.payload)?;
        }
        if let Some(username) = &self.username {
            encode_string(buf, username)?;
        }
        if let Some(password) = &self.password {
            encode_bytes(buf, password)?;
        }
        Ok(())
    }

    fn decode_body(buf: &mut Bytes, _header: &FixedHeader) -> Result<Self> {
        let name = decode_string(buf)?;
        if name != PROTOCOL_NAME {
            return Err(MqttError::MalformedPacket(format!(
                "unsupported protocol name: {name:?}"
            )));
        }
        if !buf.has_remaining() {
            return Err(MqttError::MalformedPacket(
                "truncated CONNECT variable header".to_string(),
            ));
        }
        let level = buf.get_u8();
        if level != PROTOCOL_LEVEL {
            return Err(MqttError::MalformedPacket(format!(
                "unsupported protocol level: {level}"
            )));
        }
        if !buf.has_remaining() {
            return Err(MqttError::MalformedPacket(
                "truncated CONNECT variable header".to_string(),
            ));
        }
        let flags = buf.get_u8();
        let keep_alive = decode_u16(buf)?;

        let client_id = decode_string(buf)?;
        let will = if flags & FLAG_WILL != 0 {
            let topic = decode_string(buf)?;
            let payload = decode_bytes(buf)?;
            Some(WillMessage {
                topic,
                payload,
                qos: QoS::try_from((flags >> 3) & 0x03)?,
                retain: flags & FLAG_WILL_RETAIN != 0,
            })
        } else {
            None
        };
        let username = if flags & FLAG_USERNAME != 0 {
            Some(decode_string(buf)?)
        } else {
            None
        };
        let password = if flags & FLAG_PASSWORD != 0 {
            Some(decode_bytes(buf)?)
        } else {
            None
        };

        Ok(Self {
            client_id,
            keep_alive,
            clean_session: flags & FLAG_CLEAN_SESSION != 0,
            will,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn test_minimal_connect_wire_bytes() {
        let packet = ConnectPacket {
            client_id: "mqtt-test-01".to_string(),
            keep_alive: 0,
            clean_session: true,
            will: None,
            username: None,
            password: None,
        };
        let mut buf = BytesMut::new();
        Packet::Connect(packet).encode(&mut buf).unwrap();

        #[rustfmt::skip]
        let expected = [
            0x10, 26,
            0x00, 0x06, b'M', b'Q', b'I', b's', b'd', b'p',
            0x03,
            0x02,
            0x00, 0x00,
            0x00, 0x0C, b'm', b'q', b't', b't', b'-', b't', b'e', b's', b't', b'-', b'0', b'1',
        ];
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn test_full_connect_round_trip() {
        let packet = ConnectPacket {
            client_id: "c1".to_string(),
            keep_alive: 120,
            clean_session: false,
            will: Some(
                WillMessage::new("status/c1", b"gone".to_vec())
                    .with_qos(QoS::AtLeastOnce)
                    .with_retain(true),
            ),
            username: Some("alice".to_string()),
            password: Some(b"hunter2".to_vec()),
        };
        let mut buf = BytesMut::new();
        let wrapped = Packet::Connect(packet);
        wrapped.encode(&mut buf).unwrap();
        assert_eq!(Packet::decode(&mut buf.freeze()).unwrap(), wrapped);
    }

    #[test]
    fn test_connect_flags_byte() {
        let packet = ConnectPacket {
            client_id: "c".to_string(),
            keep_alive: 0,
            clean_session: true,
            will: Some(
                WillMessage::new("t", b"m".to_vec())
                    .with_qos(QoS::ExactlyOnce)
                    .with_retain(true),
            ),
            username: Some("u".to_string()),
            password: Some(b"p".to_vec()),
        };
        // clean | will | will-qos=2 | will-retain | password | username
        assert_eq!(packet.connect_flags(), 0x02 | 0x04 | 0x10 | 0x20 | 0x40 | 0x80);
    }

    #[test]
    fn test_wrong_protocol_name_rejected() {
        let mut buf = BytesMut::new();
        encode_string(&mut buf, "MQTT").unwrap();
        buf.put_u8(4);
        let header = FixedHeader::new(crate::packet::PacketType::Connect, buf.len() as u32);
        assert!(matches!(
            ConnectPacket::decode_body(&mut buf.freeze(), &header),
            Err(MqttError::MalformedPacket(_))
        ));
    }
}
