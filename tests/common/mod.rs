//! Shared scaffolding for the integration suites: an in-memory connector
//! fed with pre-created duplex streams, and a few broker-side helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use mqtt3::packet::{ConnAckPacket, ConnectPacket};
use mqtt3::{
    BoxedTransport, ConnectOptions, ConnectReturnCode, Connector, MqttClient, MqttError, Packet,
    PacketReader, PacketWriter, Result,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::io::DuplexStream;

/// Hands out pre-created transports, one per `connect` call, failing when
/// the script runs dry.
pub struct ScriptedConnector {
    streams: Mutex<VecDeque<DuplexStream>>,
}

impl ScriptedConnector {
    pub fn new(streams: Vec<DuplexStream>) -> Self {
        Self {
            streams: Mutex::new(streams.into_iter().collect()),
        }
    }

    pub fn single(stream: DuplexStream) -> Self {
        Self::new(vec![stream])
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<BoxedTransport> {
        self.streams
            .lock()
            .pop_front()
            .map(|stream| Box::new(stream) as BoxedTransport)
            .ok_or_else(|| MqttError::ConnectionError("no transport available".to_string()))
    }
}

/// Broker side of the handshake: read CONNECT, accept it.
pub async fn accept_connect(broker: &mut DuplexStream) -> ConnectPacket {
    match broker.read_packet().await.unwrap() {
        Packet::Connect(connect) => {
            broker
                .write_packet(&Packet::ConnAck(ConnAckPacket::new(
                    ConnectReturnCode::Accepted,
                )))
                .await
                .unwrap();
            connect
        }
        other => panic!("expected CONNECT, got {other:?}"),
    }
}

/// Connects a client to a fresh scripted broker stream.
pub async fn connect_client(options: ConnectOptions) -> (MqttClient, DuplexStream) {
    let (client_side, mut broker) = tokio::io::duplex(4096);
    let (client, _connect) = tokio::join!(
        MqttClient::connect(ScriptedConnector::single(client_side), options),
        accept_connect(&mut broker),
    );
    (client.unwrap(), broker)
}
