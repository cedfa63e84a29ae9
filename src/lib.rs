//! # MQTT v3.1 Client
//!
//! An asynchronous client for MQTT v3.1 (protocol name "MQIsdp", protocol
//! level 3) built on Tokio.
//!
//! The client maintains a single session with a broker over an injected
//! byte stream: a background reader task multiplexes inbound packets to
//! awaiting callers by packet identifier, a keep-alive task emits PINGREQ
//! when the send side has been idle, and (when configured) the session
//! reconnects automatically after a connection loss.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mqtt3::{ConnectOptions, MqttClient, QoS, TcpConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ConnectOptions::new("weather-station")
//!         .with_keep_alive(std::time::Duration::from_secs(30))
//!         .with_reconnect_period(std::time::Duration::from_secs(5));
//!
//!     let client = MqttClient::connect(
//!         TcpConnector::new("test.mosquitto.org", 1883),
//!         options,
//!     )
//!     .await?;
//!
//!     client
//!         .subscribe("sensors/+/temp", QoS::AtLeastOnce, |msg| {
//!             println!("{}: {:?}", msg.topic, msg.payload);
//!         })
//!         .await?;
//!
//!     client
//!         .publish("sensors/roof/temp", b"21.5".to_vec(), QoS::AtLeastOnce, false)
//!         .await?;
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

pub mod callback;
pub mod client;
pub mod encoding;
pub mod error;
pub mod packet;
pub mod packet_id;
pub mod topic_matching;
pub mod transport;
pub mod types;

pub use callback::{CallbackManager, MessageCallback};
pub use client::{Dispatcher, HandlerId, MqttClient, PacketCallback, ReconnectCallback};
pub use error::{MqttError, Result};
pub use packet::{FixedHeader, Packet, PacketType};
pub use packet_id::PacketIdGenerator;
pub use topic_matching::{is_valid_topic_filter, is_valid_topic_name, topic_matches_filter};
pub use transport::{
    BoxedTransport, ByteStream, Connector, PacketReader, PacketWriter, TcpConnector,
};
pub use types::{ConnectOptions, ConnectReturnCode, Message, QoS, WillMessage};
