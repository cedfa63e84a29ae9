use super::ack_common::define_ack_packet;

define_ack_packet! {
    /// UNSUBACK: acknowledges an UNSUBSCRIBE.
    pub struct UnsubAckPacket;
}
