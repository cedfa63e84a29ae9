//! The MQTT v3.1 client.
//!
//! A session is a small constellation of shared state and two background
//! tasks. The receive task is the transport's only reader; callers that
//! need a response (PUBACK, SUBACK, ...) park a one-shot waiter on the
//! dispatcher and the receive task completes it by packet id. Writers
//! serialise through a single mutex-guarded slot; an empty slot means a
//! reconnect holds the transport and senders wait for it to be refilled.

mod dispatcher;
mod keepalive;
mod reader;

pub use dispatcher::{Dispatcher, HandlerId, PacketCallback};

use crate::callback::{CallbackManager, MessageCallback};
use crate::error::{MqttError, Result};
use crate::packet::{
    Packet, PacketType, PubRelPacket, PublishPacket, SubAckPacket, SubscribePacket,
    UnsubscribePacket,
};
use crate::packet_id::PacketIdGenerator;
use crate::topic_matching::{is_valid_topic_filter, is_valid_topic_name};
use crate::transport::{BoxedTransport, Connector, PacketWriter};
use crate::types::{ConnectOptions, Message, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Fired (in a detached task) after every successful automatic or manual
/// reconnect.
pub type ReconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Deadline for every awaited acknowledgement.
pub(crate) const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared session state handed to the background tasks.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) options: ConnectOptions,
    pub(crate) connector: Arc<dyn Connector>,
    /// `None` while a reconnect holds the transport; senders block on the
    /// mutex until the slot is refilled.
    pub(crate) writer: Arc<tokio::sync::Mutex<Option<WriteHalf<BoxedTransport>>>>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) callbacks: Arc<CallbackManager>,
    pub(crate) packet_ids: Arc<PacketIdGenerator>,
    pub(crate) connected: Arc<AtomicBool>,
    pub(crate) send_activity: Arc<Notify>,
    pub(crate) reconnect_callback: Arc<parking_lot::Mutex<Option<ReconnectCallback>>>,
}

impl SessionContext {
    /// Writes one packet under the writer lock and signals send activity
    /// so the keep-alive window restarts.
    pub(crate) async fn send_packet(&self, packet: &Packet) -> Result<()> {
        let mut slot = self.writer.lock().await;
        let writer = slot.as_mut().ok_or(MqttError::NotConnected)?;
        writer.write_packet(packet).await?;
        drop(slot);
        self.send_activity.notify_one();
        Ok(())
    }
}

#[derive(Default)]
struct TaskHandles {
    reader: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
}

/// Handle to a live MQTT v3.1 session. Cheap to clone; all clones share
/// the session.
#[derive(Clone)]
pub struct MqttClient {
    ctx: SessionContext,
    tasks: Arc<parking_lot::Mutex<TaskHandles>>,
}

impl MqttClient {
    /// Opens the transport, performs the CONNECT/CONNACK handshake and
    /// starts the background tasks.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, on a CONNACK carrying a non-zero return
    /// code (the transport is closed first) and on `connect_timeout`
    /// expiry.
    pub async fn connect(
        connector: impl Connector + 'static,
        options: ConnectOptions,
    ) -> Result<Self> {
        let connector: Arc<dyn Connector> = Arc::new(connector);

        let mut transport = connector.connect().await?;
        if let Err(error) = reader::handshake(&mut transport, &options).await {
            let _ = transport.shutdown().await;
            return Err(error);
        }
        let (read_half, write_half) = tokio::io::split(transport);

        let ctx = SessionContext {
            options,
            connector,
            writer: Arc::new(tokio::sync::Mutex::new(Some(write_half))),
            dispatcher: Arc::new(Dispatcher::new()),
            callbacks: Arc::new(CallbackManager::new()),
            packet_ids: Arc::new(PacketIdGenerator::new()),
            connected: Arc::new(AtomicBool::new(true)),
            send_activity: Arc::new(Notify::new()),
            reconnect_callback: Arc::new(parking_lot::Mutex::new(None)),
        };
        reader::register_publish_handler(&ctx);

        let client = Self {
            ctx,
            tasks: Arc::new(parking_lot::Mutex::new(TaskHandles::default())),
        };
        client.spawn_tasks(read_half);
        Ok(client)
    }

    fn spawn_tasks(&self, read_half: ReadHalf<BoxedTransport>) {
        let mut tasks = self.tasks.lock();
        tasks.reader = Some(tokio::spawn(reader::reader_task(
            read_half,
            self.ctx.clone(),
        )));
        if !self.ctx.options.keep_alive.is_zero() {
            tasks.keepalive = Some(tokio::spawn(keepalive::keepalive_task(
                self.ctx.clone(),
                self.ctx.options.keep_alive,
            )));
        }
    }

    fn abort_tasks(&self) {
        let mut tasks = self.tasks.lock();
        if let Some(handle) = tasks.reader.take() {
            handle.abort();
        }
        if let Some(handle) = tasks.keepalive.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.ctx.connected.load(Ordering::SeqCst)
    }

    /// Writes DISCONNECT, terminates the background tasks and closes the
    /// transport. Idempotent; any in-flight `await_msg` is released with
    /// failure.
    pub async fn disconnect(&self) -> Result<()> {
        // Kill the tasks first: an in-progress reconnect holds the writer
        // slot and would otherwise block us forever.
        self.abort_tasks();
        self.ctx.connected.store(false, Ordering::SeqCst);

        let mut slot = self.ctx.writer.lock().await;
        if let Some(mut writer) = slot.take() {
            let _ = writer.write_packet(&Packet::Disconnect).await;
            let _ = writer.shutdown().await;
        }
        drop(slot);

        self.ctx.dispatcher.drop_waiters();
        Ok(())
    }

    /// Tears down the current transport and re-runs {connect, handshake}
    /// every `period` until it succeeds, then restarts the background
    /// tasks. The automatic variant of this sequence runs inside the
    /// receive task when `reconnect_period` is configured.
    pub async fn reconnect(&self, period: Duration) -> Result<()> {
        self.abort_tasks();
        let read_half = reader::reestablish(&self.ctx, period).await;
        self.spawn_tasks(read_half);
        Ok(())
    }

    /// Replaces the reconnect callback; the previous one is discarded.
    pub fn on_reconnect(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.ctx.reconnect_callback.lock() = Some(Arc::new(callback));
    }

    /// Publishes `payload` on `topic`.
    ///
    /// QoS 0 returns once the bytes are written. QoS 1 waits for PUBACK.
    /// QoS 2 runs the full PUBREC/PUBREL/PUBCOMP handshake. Wildcards are
    /// not allowed in a publish topic.
    pub async fn publish(
        &self,
        topic: impl Into<String>,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<()> {
        let topic = topic.into();
        if !is_valid_topic_name(&topic) {
            return Err(MqttError::InvalidTopicName(topic));
        }

        if qos == QoS::AtMostOnce {
            let publish = PublishPacket {
                topic,
                packet_id: None,
                payload,
                qos,
                retain,
                dup: false,
            };
            return self.ctx.send_packet(&Packet::Publish(publish)).await;
        }

        let packet_id = self.ctx.packet_ids.next()?;
        let publish = PublishPacket {
            topic,
            packet_id: Some(packet_id),
            payload,
            qos,
            retain,
            dup: false,
        };
        let result = self.publish_confirmed(publish, packet_id, qos).await;
        self.ctx.packet_ids.release(packet_id);
        result
    }

    async fn publish_confirmed(
        &self,
        publish: PublishPacket,
        packet_id: u16,
        qos: QoS,
    ) -> Result<()> {
        match qos {
            QoS::AtMostOnce => Ok(()),
            QoS::AtLeastOnce => {
                let puback = self
                    .ctx
                    .dispatcher
                    .register_waiter(PacketType::PubAck, Some(packet_id));
                self.ctx.send_packet(&Packet::Publish(publish)).await?;
                puback.recv_timeout(ACK_TIMEOUT).await?;
                Ok(())
            }
            QoS::ExactlyOnce => {
                let pubrec = self
                    .ctx
                    .dispatcher
                    .register_waiter(PacketType::PubRec, Some(packet_id));
                self.ctx.send_packet(&Packet::Publish(publish)).await?;
                pubrec.recv_timeout(ACK_TIMEOUT).await?;

                let pubcomp = self
                    .ctx
                    .dispatcher
                    .register_waiter(PacketType::PubComp, Some(packet_id));
                self.ctx
                    .send_packet(&Packet::PubRel(PubRelPacket::new(packet_id)))
                    .await?;
                pubcomp.recv_timeout(ACK_TIMEOUT).await?;
                Ok(())
            }
        }
    }

    /// Subscribes `callback` to `topic_filter` at `qos`, returning the
    /// QoS the broker granted. The handler persists for the life of the
    /// session and is replayed by [`resubscribe`](Self::resubscribe).
    pub async fn subscribe(
        &self,
        topic_filter: impl Into<String>,
        qos: QoS,
        callback: impl Fn(Message) + Send + Sync + 'static,
    ) -> Result<QoS> {
        let filter = topic_filter.into();
        if !is_valid_topic_filter(&filter) {
            return Err(MqttError::InvalidTopicFilter(filter));
        }

        let granted = self.request_subscription(&filter, qos).await?;
        self.ctx
            .callbacks
            .register(filter, granted, Arc::new(callback) as MessageCallback);
        Ok(granted)
    }

    /// One SUBSCRIBE/SUBACK round-trip for a single filter.
    async fn request_subscription(&self, filter: &str, qos: QoS) -> Result<QoS> {
        let packet_id = self.ctx.packet_ids.next()?;
        let result = async {
            let suback = self
                .ctx
                .dispatcher
                .register_waiter(PacketType::SubAck, Some(packet_id));
            self.ctx
                .send_packet(&Packet::Subscribe(SubscribePacket::single(
                    packet_id, filter, qos,
                )))
                .await?;
            let packet = suback.recv_timeout(ACK_TIMEOUT).await?;
            suback_granted(&packet)
        }
        .await;
        self.ctx.packet_ids.release(packet_id);
        result
    }

    /// Removes every topic handler whose filter equals `topic_filter`
    /// exactly, then runs the UNSUBSCRIBE/UNSUBACK round-trip.
    pub async fn unsubscribe(&self, topic_filter: &str) -> Result<()> {
        self.ctx.callbacks.unregister(topic_filter);

        let packet_id = self.ctx.packet_ids.next()?;
        let result: Result<()> = async {
            let unsuback = self
                .ctx
                .dispatcher
                .register_waiter(PacketType::UnsubAck, Some(packet_id));
            self.ctx
                .send_packet(&Packet::Unsubscribe(UnsubscribePacket::single(
                    packet_id,
                    topic_filter,
                )))
                .await?;
            unsuback.recv_timeout(ACK_TIMEOUT).await?;
            Ok(())
        }
        .await;
        self.ctx.packet_ids.release(packet_id);
        result
    }

    /// Re-issues SUBSCRIBE for every persisted topic handler at its
    /// previously granted QoS, typically from an
    /// [`on_reconnect`](Self::on_reconnect) callback. The broker's new
    /// grants become the stored values and are returned in order.
    pub async fn resubscribe(&self) -> Result<Vec<QoS>> {
        let mut granted_all = Vec::new();
        for (filter, qos) in self.ctx.callbacks.subscriptions() {
            let granted = self.request_subscription(&filter, qos).await?;
            self.ctx.callbacks.set_granted_qos(&filter, granted);
            granted_all.push(granted);
        }
        Ok(granted_all)
    }

    /// Low-level send of an arbitrary packet, serialised with every other
    /// writer.
    pub async fn send(&self, packet: &Packet) -> Result<()> {
        self.ctx.send_packet(packet).await
    }

    /// Registers a persistent handler for a packet type. Handlers run in
    /// detached tasks and must not block the receive path.
    pub fn add_handler(&self, packet_type: PacketType, callback: PacketCallback) -> HandlerId {
        self.ctx.dispatcher.add_handler(packet_type, callback)
    }

    /// Removes a handler registered with
    /// [`add_handler`](Self::add_handler). Idempotent.
    pub fn remove_handler(&self, packet_type: PacketType, id: HandlerId) {
        self.ctx.dispatcher.remove_handler(packet_type, id);
    }

    /// Waits for the next packet of `packet_type`; with a `packet_id`,
    /// only a packet carrying that id completes the wait. Released with
    /// failure on disconnect.
    pub async fn await_msg(&self, packet_type: PacketType, packet_id: Option<u16>) -> Result<Packet> {
        self.ctx
            .dispatcher
            .register_waiter(packet_type, packet_id)
            .recv()
            .await
    }
}

fn suback_granted(packet: &Packet) -> Result<QoS> {
    let Packet::SubAck(SubAckPacket { granted, .. }) = packet else {
        return Err(MqttError::ProtocolError(
            "dispatcher delivered a non-SUBACK packet to a SUBACK wait".to_string(),
        ));
    };
    granted.first().copied().ok_or_else(|| {
        MqttError::ProtocolError("SUBACK carried no granted QoS".to_string())
    })
}
