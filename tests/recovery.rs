//! Connection-loss recovery: automatic reconnect, the reconnect callback,
//! sender blocking during the outage, and resubscription.

mod common;

use common::{accept_connect, ScriptedConnector};
use mqtt3::packet::{PubAckPacket, SubAckPacket};
use mqtt3::{
    ConnectOptions, MqttClient, Packet, PacketReader, PacketWriter, QoS,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn eof_triggers_reconnect_and_fires_callback_once() {
    let (first_side, mut first_broker) = tokio::io::duplex(4096);
    // A transport whose peer is already gone: the first reconnect attempt
    // fails and the loop retries after the configured period.
    let (dead_side, dead_broker) = tokio::io::duplex(4096);
    drop(dead_broker);
    let (second_side, mut second_broker) = tokio::io::duplex(4096);

    let connector = ScriptedConnector::new(vec![first_side, dead_side, second_side]);
    let options = ConnectOptions::new("recover")
        .with_reconnect_period(Duration::from_millis(20))
        .with_connect_timeout(Duration::from_millis(200));

    let (client, _) = tokio::join!(
        MqttClient::connect(connector, options),
        accept_connect(&mut first_broker),
    );
    let client = client.unwrap();

    let reconnects = Arc::new(AtomicU32::new(0));
    let reconnects_clone = Arc::clone(&reconnects);
    client.on_reconnect(move || {
        reconnects_clone.fetch_add(1, Ordering::SeqCst);
    });

    // Kill the first transport; the receive task drives the reconnect.
    drop(first_broker);
    accept_connect(&mut second_broker).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.is_connected());
    assert_eq!(reconnects.load(Ordering::SeqCst), 1);

    // The re-established session carries traffic.
    let publish_fut = client.publish("up", b"again".to_vec(), QoS::AtLeastOnce, false);
    let broker_fut = async {
        let Packet::Publish(publish) = second_broker.read_packet().await.unwrap() else {
            panic!("expected PUBLISH");
        };
        second_broker
            .write_packet(&Packet::PubAck(PubAckPacket::new(publish.packet_id.unwrap())))
            .await
            .unwrap();
    };
    let (result, ()) = tokio::join!(publish_fut, broker_fut);
    result.unwrap();

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn sends_block_during_reconnect_until_slot_refilled() {
    let (first_side, mut first_broker) = tokio::io::duplex(4096);
    let (second_side, mut second_broker) = tokio::io::duplex(4096);

    let connector = ScriptedConnector::new(vec![first_side, second_side]);
    let options = ConnectOptions::new("block")
        .with_reconnect_period(Duration::from_millis(20));

    let (client, _) = tokio::join!(
        MqttClient::connect(connector, options),
        accept_connect(&mut first_broker),
    );
    let client = client.unwrap();

    drop(first_broker);
    // Give the receive task a moment to take the writer slot.
    tokio::time::sleep(Duration::from_millis(10)).await;

    // This publish starts while the transport slot is empty; it must
    // block until the reconnect refills it, then land on the new broker.
    let publish_fut = client.publish("t", b"queued".to_vec(), QoS::AtMostOnce, false);
    let broker_fut = async {
        accept_connect(&mut second_broker).await;
        let Packet::Publish(publish) = second_broker.read_packet().await.unwrap() else {
            panic!("expected PUBLISH");
        };
        assert_eq!(publish.payload, b"queued");
    };
    let (result, ()) = tokio::join!(publish_fut, broker_fut);
    result.unwrap();

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn resubscribe_replays_persisted_handlers() {
    let (first_side, mut first_broker) = tokio::io::duplex(4096);
    let (second_side, mut second_broker) = tokio::io::duplex(4096);

    let connector = ScriptedConnector::new(vec![first_side, second_side]);
    let options = ConnectOptions::new("resub")
        .with_reconnect_period(Duration::from_millis(20));

    let (client, _) = tokio::join!(
        MqttClient::connect(connector, options),
        accept_connect(&mut first_broker),
    );
    let client = client.unwrap();

    for filter in ["sensors/+/temp", "alerts/#"] {
        let subscribe_fut = client.subscribe(filter, QoS::AtLeastOnce, |_msg| {});
        let broker_fut = async {
            let Packet::Subscribe(subscribe) = first_broker.read_packet().await.unwrap() else {
                panic!("expected SUBSCRIBE");
            };
            first_broker
                .write_packet(&Packet::SubAck(SubAckPacket::new(
                    subscribe.packet_id,
                    vec![QoS::AtLeastOnce],
                )))
                .await
                .unwrap();
        };
        let (granted, ()) = tokio::join!(subscribe_fut, broker_fut);
        assert_eq!(granted.unwrap(), QoS::AtLeastOnce);
    }

    drop(first_broker);
    accept_connect(&mut second_broker).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Replay both subscriptions; the broker now grants QoS 0 for each,
    // which becomes the stored value.
    let resubscribe_fut = client.resubscribe();
    let broker_fut = async {
        let mut filters = Vec::new();
        for _ in 0..2 {
            let Packet::Subscribe(subscribe) = second_broker.read_packet().await.unwrap() else {
                panic!("expected SUBSCRIBE");
            };
            assert_eq!(subscribe.filters[0].qos, QoS::AtLeastOnce);
            filters.push(subscribe.filters[0].filter.clone());
            second_broker
                .write_packet(&Packet::SubAck(SubAckPacket::new(
                    subscribe.packet_id,
                    vec![QoS::AtMostOnce],
                )))
                .await
                .unwrap();
        }
        filters.sort();
        assert_eq!(filters, vec!["alerts/#".to_string(), "sensors/+/temp".to_string()]);
    };
    let (granted, ()) = tokio::join!(resubscribe_fut, broker_fut);
    assert_eq!(granted.unwrap(), vec![QoS::AtMostOnce, QoS::AtMostOnce]);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn no_reconnect_without_period_configured() {
    let (first_side, mut first_broker) = tokio::io::duplex(4096);
    let (spare_side, _spare_broker) = tokio::io::duplex(4096);

    let connector = ScriptedConnector::new(vec![first_side, spare_side]);
    let (client, _) = tokio::join!(
        MqttClient::connect(connector, ConnectOptions::new("one-shot")),
        accept_connect(&mut first_broker),
    );
    let client = client.unwrap();

    drop(first_broker);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!client.is_connected());
    assert!(matches!(
        client.publish("t", vec![], QoS::AtMostOnce, false).await,
        Err(mqtt3::MqttError::NotConnected)
    ));
}
