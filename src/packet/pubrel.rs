use super::ack_common::define_ack_packet;

define_ack_packet! {
    /// PUBREL: release step of the QoS 2 handshake. Carries the 0x02
    /// fixed-header flag nibble on the wire.
    pub struct PubRelPacket;
}
