//! The receive task: exclusive reader of the transport, inbound PUBLISH
//! handling including the QoS 2 receiver handshake, and the reconnect
//! loop.

use crate::error::{MqttError, Result};
use crate::packet::{
    ConnectPacket, Packet, PacketType, PubAckPacket, PubCompPacket, PubRecPacket, PublishPacket,
};
use crate::transport::{BoxedTransport, PacketReader, PacketWriter};
use crate::types::{ConnectOptions, QoS};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};

use super::{SessionContext, ACK_TIMEOUT};

/// Reads packets until the connection is lost, then either reconnects or
/// exits depending on configuration. Malformed packets are dropped with a
/// warning; the loop resumes at the next frame boundary.
pub(crate) async fn reader_task(mut reader: ReadHalf<BoxedTransport>, ctx: SessionContext) {
    loop {
        match reader.read_packet().await {
            Ok(packet) => ctx.dispatcher.dispatch(&packet),
            Err(error) if !error.is_connection_loss() => {
                tracing::warn!(error = %error, "dropping malformed packet");
            }
            Err(error) => {
                if !ctx.connected.load(Ordering::SeqCst) {
                    // disconnect() closed the transport under us
                    break;
                }
                tracing::error!(error = %error, "connection lost");
                let Some(period) = ctx.options.reconnect_period else {
                    break;
                };
                reader = reestablish(&ctx, period).await;
            }
        }
    }
    ctx.connected.store(false, Ordering::SeqCst);
    let mut slot = ctx.writer.lock().await;
    if let Some(mut writer) = slot.take() {
        let _ = writer.shutdown().await;
    }
    drop(slot);
    ctx.dispatcher.drop_waiters();
}

/// Sends CONNECT and waits for an accepting CONNACK, inline on the
/// unsplit transport, under the configured connect deadline.
pub(crate) async fn handshake(
    transport: &mut BoxedTransport,
    options: &ConnectOptions,
) -> Result<()> {
    let exchange = async {
        transport
            .write_packet(&Packet::Connect(ConnectPacket::from_options(options)))
            .await?;
        match transport.read_packet().await? {
            Packet::ConnAck(connack) => {
                if connack.return_code.is_accepted() {
                    Ok(())
                } else {
                    Err(MqttError::ConnectionRefused(connack.return_code))
                }
            }
            other => Err(MqttError::ProtocolError(format!(
                "expected CONNACK, received {:?}",
                other.packet_type()
            ))),
        }
    };
    match options.connect_timeout {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .map_err(|_| MqttError::Timeout)?,
        None => exchange.await,
    }
}

/// Opens a fresh transport and performs the handshake, returning the
/// split halves.
pub(crate) async fn open_session(
    ctx: &SessionContext,
) -> Result<(ReadHalf<BoxedTransport>, WriteHalf<BoxedTransport>)> {
    let mut transport = ctx.connector.connect().await?;
    if let Err(error) = handshake(&mut transport, &ctx.options).await {
        let _ = transport.shutdown().await;
        return Err(error);
    }
    Ok(tokio::io::split(transport))
}

/// The reconnect sequence: take the writer slot (blocking every sender),
/// close the old transport, then retry {connect, handshake} every
/// `period` until it succeeds. On success the slot is refilled, the
/// reconnect callback fires in a detached task, and the new read half is
/// handed back to the receive loop.
pub(crate) async fn reestablish(
    ctx: &SessionContext,
    period: Duration,
) -> ReadHalf<BoxedTransport> {
    let mut slot = ctx.writer.lock().await;
    if let Some(mut writer) = slot.take() {
        let _ = writer.shutdown().await;
    }
    ctx.connected.store(false, Ordering::SeqCst);
    // Pending request/response waits can never complete on the new
    // connection; release them now.
    ctx.dispatcher.drop_waiters();

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match open_session(ctx).await {
            Ok((read_half, write_half)) => {
                *slot = Some(write_half);
                ctx.connected.store(true, Ordering::SeqCst);
                tracing::info!(attempt, "session re-established");
                let callback = ctx.reconnect_callback.lock().clone();
                if let Some(callback) = callback {
                    tokio::spawn(async move {
                        callback();
                    });
                }
                return read_half;
            }
            Err(error) => {
                tracing::warn!(attempt, error = %error, "reconnect attempt failed");
                tokio::time::sleep(period).await;
            }
        }
    }
}

/// Registers the internal PUBLISH handler on the dispatcher. Runs once
/// per session.
pub(crate) fn register_publish_handler(ctx: &SessionContext) {
    let ctx_for_handler = ctx.clone();
    ctx.dispatcher.add_handler(
        PacketType::Publish,
        Arc::new(move |packet| {
            if let Packet::Publish(publish) = packet {
                let ctx = ctx_for_handler.clone();
                tokio::spawn(async move {
                    handle_inbound_publish(ctx, publish).await;
                });
            }
        }),
    );
}

/// Inbound PUBLISH: deliver to matching topic handlers, and complete the
/// acknowledgement the sender's QoS calls for. The QoS 2 receiver answers
/// PUBREC, waits for the PUBREL carrying the same packet id, and answers
/// PUBCOMP.
async fn handle_inbound_publish(ctx: SessionContext, publish: PublishPacket) {
    ctx.callbacks.dispatch(&publish.message());

    match (publish.qos, publish.packet_id) {
        (QoS::AtMostOnce, _) | (_, None) => {}
        (QoS::AtLeastOnce, Some(packet_id)) => {
            if let Err(error) = ctx
                .send_packet(&Packet::PubAck(PubAckPacket::new(packet_id)))
                .await
            {
                tracing::warn!(packet_id, error = %error, "failed to send PUBACK");
            }
        }
        (QoS::ExactlyOnce, Some(packet_id)) => {
            let pubrel = ctx
                .dispatcher
                .register_waiter(PacketType::PubRel, Some(packet_id));
            if let Err(error) = ctx
                .send_packet(&Packet::PubRec(PubRecPacket::new(packet_id)))
                .await
            {
                tracing::warn!(packet_id, error = %error, "failed to send PUBREC");
                return;
            }
            match pubrel.recv_timeout(ACK_TIMEOUT).await {
                Ok(_) => {
                    if let Err(error) = ctx
                        .send_packet(&Packet::PubComp(PubCompPacket::new(packet_id)))
                        .await
                    {
                        tracing::warn!(packet_id, error = %error, "failed to send PUBCOMP");
                    }
                }
                Err(error) => {
                    tracing::warn!(packet_id, error = %error, "no PUBREL for inbound publish");
                }
            }
        }
    }
}
