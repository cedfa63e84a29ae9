//! Shared definition for the acknowledgement packets whose body is a bare
//! 16-bit packet identifier: PUBACK, PUBREC, PUBREL, PUBCOMP, UNSUBACK.

macro_rules! define_ack_packet {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub packet_id: u16,
        }

        impl $name {
            #[must_use]
            pub fn new(packet_id: u16) -> Self {
                Self { packet_id }
            }
        }

        impl $crate::packet::MqttPacket for $name {
            fn encode_body(
                &self,
                buf: &mut bytes::BytesMut,
            ) -> $crate::error::Result<()> {
                bytes::BufMut::put_u16(buf, self.packet_id);
                Ok(())
            }

            fn decode_body(
                buf: &mut bytes::Bytes,
                _header: &$crate::packet::FixedHeader,
            ) -> $crate::error::Result<Self> {
                let packet_id = $crate::encoding::decode_u16(buf)?;
                Ok(Self { packet_id })
            }
        }
    };
}

pub(crate) use define_ack_packet;
