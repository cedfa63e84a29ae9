use super::ack_common::define_ack_packet;

define_ack_packet! {
    /// PUBACK: acknowledges a QoS 1 PUBLISH.
    pub struct PubAckPacket;
}
