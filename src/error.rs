//! # Error Types
//!
//! Error handling for the MQTT wire codec and the persistence layer.
//!
//! This module defines every error variant that can surface from decoding,
//! encoding, transport sinks and session stores. Decode errors are local to
//! the packet being parsed; whether a failure is fatal for the connection is
//! decided by the caller.
//!
//! ## Error Categories
//! - **Framing Errors**: Truncated buffers, malformed remaining length, unknown packet types
//! - **Field Errors**: Invalid return codes, QoS values, topic names and UTF-8 strings
//! - **Encode Errors**: Unset packet identifiers, undersized destination buffers
//! - **Persistence Errors**: Missing or duplicate sessions, closed stores, engine failures
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use bytes::Bytes;
//! use mqtt_wire::error::ProtocolError;
//! use mqtt_wire::protocol::dispatcher;
//!
//! let src = Bytes::from_static(&[0x20, 0x02, 0x00, 0x06]);
//! match dispatcher::decode(&src) {
//!     Err(ProtocolError::InvalidReturnCode(code)) => assert_eq!(code, 6),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::core::header::PacketType;
use crate::protocol::connack::ConnAckCode;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Structural violations reported through `ProtocolError::MalformedPacket`
    pub const ERR_CONNACK_RESERVED_BITS: &str = "CONNACK acknowledge flags reserved bits set";
    pub const ERR_CONNECT_RESERVED_FLAG: &str = "CONNECT reserved flag set";
    pub const ERR_CONNECT_WILL_FLAGS: &str = "will QoS or will retain set without will flag";
    pub const ERR_CONNECT_PASSWORD_FLAG: &str = "password flag set without username flag";
    pub const ERR_PROTOCOL_NAME: &str = "protocol name does not match protocol level";
    pub const ERR_EMPTY_SUBSCRIBE: &str = "SUBSCRIBE must carry at least one topic filter";
    pub const ERR_EMPTY_UNSUBSCRIBE: &str = "UNSUBSCRIBE must carry at least one topic filter";
    pub const ERR_SUBSCRIBE_RESERVED_BITS: &str = "requested QoS reserved bits set";
    pub const ERR_QOS0_PACKET_ID: &str = "QoS 0 PUBLISH cannot carry a packet id";

    /// Persistence errors
    pub const ERR_CORRUPT_RECORD: &str = "stored message record is incomplete";
}

// ProtocolError is the primary error type for all codec and store operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("insufficient buffer size")]
    InsufficientBufferSize,

    #[error("invalid length")]
    InvalidLength,

    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("invalid flags {flags:#06b} for {packet_type}")]
    InvalidMessageTypeFlags { packet_type: PacketType, flags: u8 },

    #[error("length-prefixed field too large: {0} bytes")]
    InvalidLPStringSize(usize),

    #[error("invalid return code: {0:#04x}")]
    InvalidReturnCode(u8),

    #[error("invalid QoS: {0}")]
    InvalidQos(u8),

    #[error("packet identifier must not be zero")]
    PacketIdZero,

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),

    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    #[error("{0}")]
    ConnectRefused(ConnAckCode),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("store is not open")]
    NotOpen,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Return code a server should answer a refused CONNECT with, if this
    /// error is a connection refusal.
    pub fn connack_code(&self) -> Option<ConnAckCode> {
        match self {
            ProtocolError::ConnectRefused(code) => Some(*code),
            _ => None,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
