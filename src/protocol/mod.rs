//! # Control Packets
//!
//! Typed representations of the fourteen MQTT 3.1/3.1.1 control packets and
//! the dispatcher that decodes them from raw bytes.
//!
//! ## Components
//! - **Packet**: Closed sum type over every control packet
//! - **Dispatcher**: Fixed header parse and exhaustive routing to body decoders
//! - **Bodies**: One module per packet family (CONNECT, PUBLISH, acks, ...)
//! - **Topic**: Topic name and topic filter validation
//!
//! ## Example
//! ```rust
//! use mqtt_wire::core::qos::QoS;
//! use mqtt_wire::protocol::{dispatcher, packet::Packet, publish::Publish};
//!
//! let packet = Packet::from(Publish::new("sensors/1", QoS::AtLeastOnce, "21.5").with_packet_id(1));
//! let wire = packet.to_bytes().unwrap();
//! let (decoded, consumed) = dispatcher::decode(&wire).unwrap();
//! assert_eq!(decoded, packet);
//! assert_eq!(consumed, wire.len());
//! ```

pub mod ack;
pub mod connack;
pub mod connect;
pub mod dispatcher;
pub mod packet;
pub mod publish;
pub mod subscribe;
pub mod topic;
pub mod unsubscribe;

#[cfg(test)]
mod tests;
