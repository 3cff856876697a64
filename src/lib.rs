//! # mqtt-wire
//!
//! Zero-copy MQTT 3.1/3.1.1 packet codec with pluggable session persistence.
//!
//! ## Modules
//! - [`core`]: Fixed header, primitive field codecs, QoS, stream codec
//! - [`protocol`]: The fourteen control packets and the decode dispatcher
//! - [`transport`]: Outbound [`Sink`](transport::Sink) and ring buffer
//! - [`persistence`]: Session, subscription and retained message store
//! - [`config`]: TOML and environment configuration
//! - [`utils`]: Logging setup
//!
//! ## Quick Start
//! ```rust
//! use mqtt_wire::{decode, Packet, Publish, QoS, RingBuffer};
//!
//! let mut ring = RingBuffer::new(1024);
//! let packet = Packet::from(Publish::new("a/b", QoS::AtLeastOnce, "hi").with_packet_id(7));
//! packet.send(&mut ring)?;
//!
//! let frame = ring.read_packet()?.expect("one frame buffered");
//! let (decoded, _) = decode(&frame)?;
//! assert_eq!(decoded, packet);
//! # Ok::<(), mqtt_wire::ProtocolError>(())
//! ```

#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod config;
pub mod core;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::WireConfig;
pub use crate::core::codec::MqttCodec;
pub use crate::core::header::{FixedHeader, PacketType};
pub use crate::core::qos::QoS;
pub use error::{ProtocolError, Result};
pub use persistence::{Direction, Store};
pub use protocol::dispatcher::decode;
pub use protocol::packet::Packet;
pub use protocol::publish::Publish;
pub use transport::{RingBuffer, Sink};
