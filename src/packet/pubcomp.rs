use super::ack_common::define_ack_packet;

define_ack_packet! {
    /// PUBCOMP: completes the QoS 2 handshake.
    pub struct PubCompPacket;
}
