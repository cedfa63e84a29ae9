use super::ack_common::define_ack_packet;

define_ack_packet! {
    /// PUBREC: first acknowledgement of the QoS 2 handshake.
    pub struct PubRecPacket;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;
    use bytes::BytesMut;

    #[test]
    fn test_pubrec_wire_bytes() {
        let mut buf = BytesMut::new();
        Packet::PubRec(PubRecPacket::new(7)).encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x50, 0x02, 0x00, 0x07]);
    }
}
