//! # Core Protocol Components
//!
//! Low-level framing shared by every control packet.
//!
//! This module provides the foundation for the protocol: the fixed header,
//! the primitive field codecs, QoS levels, and a stream codec for framing
//! packets over byte streams.
//!
//! ## Components
//! - **Header**: Packet type, flags and remaining length
//! - **Primitives**: Varint, length-prefixed strings, packet identifiers
//! - **QoS**: Delivery levels and SUBACK return codes
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Type(4 bits) | Flags(4 bits)] [Remaining Length(1-4)] [Body(N)]
//! ```
//!
//! ## Security
//! - Remaining length capped at 268,435,455 (four varint bytes)
//! - Stream codec rejects frames above a configurable size before buffering them
//! - Every read is bounds-checked; malformed input returns an error, never panics

pub mod codec;
pub mod header;
pub mod primitives;
pub mod qos;
