//! Inbound packet routing.
//!
//! Two kinds of consumers hang off the dispatcher: persistent handlers
//! (a `PacketType` → callback-list registry, used for inbound PUBLISH and
//! available to applications through `add_handler`) and one-shot waiters
//! that turn asynchronous inbound packets into request/response semantics.
//! A waiter registered with a packet id only consumes packets whose
//! variable-header id equals it and stays installed otherwise.

use crate::error::{MqttError, Result};
use crate::packet::{Packet, PacketType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Opaque token returned by `add_handler`, used for removal.
pub type HandlerId = u64;

/// Callback invoked with each inbound packet of a registered type.
pub type PacketCallback = Arc<dyn Fn(Packet) + Send + Sync>;

struct Waiter {
    token: u64,
    packet_id: Option<u16>,
    tx: oneshot::Sender<Packet>,
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<PacketType, Vec<(HandlerId, PacketCallback)>>>,
    waiters: Mutex<HashMap<PacketType, Vec<Waiter>>>,
    next_token: AtomicU64,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a persistent handler for `packet_type`.
    pub fn add_handler(&self, packet_type: PacketType, callback: PacketCallback) -> HandlerId {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .entry(packet_type)
            .or_default()
            .push((id, callback));
        id
    }

    /// Drops the matching handler. Idempotent.
    pub fn remove_handler(&self, packet_type: PacketType, id: HandlerId) {
        if let Some(list) = self.handlers.lock().get_mut(&packet_type) {
            list.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// Installs a one-shot waiter for the next packet of `packet_type`
    /// whose id matches `packet_id` (`None` matches any).
    pub(crate) fn register_waiter(
        self: &Arc<Self>,
        packet_type: PacketType,
        packet_id: Option<u16>,
    ) -> MsgWaiter {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().entry(packet_type).or_default().push(Waiter {
            token,
            packet_id,
            tx,
        });
        MsgWaiter {
            dispatcher: Arc::clone(self),
            packet_type,
            token,
            rx,
        }
    }

    fn remove_waiter(&self, packet_type: PacketType, token: u64) {
        if let Some(list) = self.waiters.lock().get_mut(&packet_type) {
            list.retain(|waiter| waiter.token != token);
        }
    }

    /// Routes one inbound packet: completes at most one matching waiter,
    /// then fans out to every persistent handler in its own task so slow
    /// callbacks cannot stall the receive loop.
    pub fn dispatch(&self, packet: &Packet) {
        let packet_type = packet.packet_type();
        let packet_id = packet.packet_id();

        {
            let mut waiters = self.waiters.lock();
            if let Some(list) = waiters.get_mut(&packet_type) {
                let mut i = 0;
                while i < list.len() {
                    let matches = match list[i].packet_id {
                        None => true,
                        Some(id) => packet_id == Some(id),
                    };
                    if matches {
                        let waiter = list.remove(i);
                        if waiter.tx.send(packet.clone()).is_ok() {
                            break;
                        }
                        // receiver dropped (caller timed out); keep looking
                    } else {
                        i += 1;
                    }
                }
            }
        }

        let snapshot: Vec<PacketCallback> = self
            .handlers
            .lock()
            .get(&packet_type)
            .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for callback in snapshot {
            let packet = packet.clone();
            tokio::spawn(async move {
                callback(packet);
            });
        }
    }

    /// Releases every pending waiter with failure. Called on disconnect
    /// and connection loss.
    pub(crate) fn drop_waiters(&self) {
        self.waiters.lock().clear();
    }
}

/// A registered one-shot rendezvous. Consume with [`MsgWaiter::recv`] or
/// [`MsgWaiter::recv_timeout`].
pub(crate) struct MsgWaiter {
    dispatcher: Arc<Dispatcher>,
    packet_type: PacketType,
    token: u64,
    rx: oneshot::Receiver<Packet>,
}

impl MsgWaiter {
    /// Waits until a matching packet arrives or the session releases its
    /// waiters.
    pub(crate) async fn recv(self) -> Result<Packet> {
        self.rx.await.map_err(|_| MqttError::NotConnected)
    }

    /// Like [`recv`](Self::recv) but bounded; the waiter is deregistered
    /// on timeout.
    pub(crate) async fn recv_timeout(self, duration: Duration) -> Result<Packet> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let packet_type = self.packet_type;
        let token = self.token;
        match tokio::time::timeout(duration, self.rx).await {
            Ok(Ok(packet)) => Ok(packet),
            Ok(Err(_)) => Err(MqttError::NotConnected),
            Err(_) => {
                dispatcher.remove_waiter(packet_type, token);
                Err(MqttError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PubAckPacket;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn test_waiter_matches_packet_id() {
        let dispatcher = Arc::new(Dispatcher::new());
        let waiter = dispatcher.register_waiter(PacketType::PubAck, Some(7));

        // Wrong id: the waiter stays installed.
        dispatcher.dispatch(&Packet::PubAck(PubAckPacket::new(8)));
        dispatcher.dispatch(&Packet::PubAck(PubAckPacket::new(7)));

        let packet = waiter.recv().await.unwrap();
        assert_eq!(packet.packet_id(), Some(7));
    }

    #[tokio::test]
    async fn test_waiter_without_id_takes_first_of_type() {
        let dispatcher = Arc::new(Dispatcher::new());
        let waiter = dispatcher.register_waiter(PacketType::PingResp, None);
        dispatcher.dispatch(&Packet::PingResp);
        assert_eq!(waiter.recv().await.unwrap(), Packet::PingResp);
    }

    #[tokio::test]
    async fn test_each_packet_satisfies_one_waiter() {
        let dispatcher = Arc::new(Dispatcher::new());
        let first = dispatcher.register_waiter(PacketType::PubAck, Some(1));
        let second = dispatcher.register_waiter(PacketType::PubAck, Some(2));

        dispatcher.dispatch(&Packet::PubAck(PubAckPacket::new(2)));
        dispatcher.dispatch(&Packet::PubAck(PubAckPacket::new(1)));

        assert_eq!(first.recv().await.unwrap().packet_id(), Some(1));
        assert_eq!(second.recv().await.unwrap().packet_id(), Some(2));
    }

    #[tokio::test]
    async fn test_waiter_timeout_deregisters() {
        let dispatcher = Arc::new(Dispatcher::new());
        let waiter = dispatcher.register_waiter(PacketType::PubAck, Some(1));
        let result = waiter.recv_timeout(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(MqttError::Timeout)));
        assert!(dispatcher.waiters.lock().get(&PacketType::PubAck).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_waiters_releases_with_failure() {
        let dispatcher = Arc::new(Dispatcher::new());
        let waiter = dispatcher.register_waiter(PacketType::SubAck, None);
        dispatcher.drop_waiters();
        assert!(matches!(waiter.recv().await, Err(MqttError::NotConnected)));
    }

    #[tokio::test]
    async fn test_persistent_handlers_fan_out() {
        let dispatcher = Arc::new(Dispatcher::new());
        let counter = Arc::new(AtomicU32::new(0));

        let counter_clone = Arc::clone(&counter);
        let id = dispatcher.add_handler(
            PacketType::PingResp,
            Arc::new(move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch(&Packet::PingResp);
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        dispatcher.remove_handler(PacketType::PingResp, id);
        // Removing twice is fine.
        dispatcher.remove_handler(PacketType::PingResp, id);
        dispatcher.dispatch(&Packet::PingResp);
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
