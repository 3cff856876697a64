//! # CONNECT
//!
//! First packet a client sends after opening a network connection.
//!
//! ## Wire Format
//! ```text
//! [0x10] [Remaining Length]
//! [Protocol Name (lp)] [Protocol Level] [Connect Flags] [Keep Alive (u16)]
//! [Client ID (lp)] [Will Topic (lp)]? [Will Message (lp)]? [Username (lp)]? [Password (lp)]?
//!
//! Connect Flags:
//!   bit 7    username
//!   bit 6    password
//!   bit 5    will retain
//!   bit 4-3  will QoS
//!   bit 2    will flag
//!   bit 1    clean session
//!   bit 0    reserved, must be 0
//! ```
//!
//! Optional fields are present exactly when their flag bit is set. A flagged
//! field missing from the body fails with `InvalidLength`.
//!
//! ## Refusals
//! Some violations map onto a CONNACK return code rather than a bare decode
//! error. These surface as `ProtocolError::ConnectRefused(code)`, and
//! [`ProtocolError::connack_code`](crate::error::ProtocolError::connack_code)
//! hands the code back so a server can answer before closing.

use crate::core::header::{FixedHeader, PacketType};
use crate::core::primitives::{lp_len, Reader, Writer};
use crate::core::qos::QoS;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::connack::ConnAckCode;
use crate::protocol::packet::PacketBody;
use crate::protocol::topic::validate_topic_name;
use bytes::Bytes;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_WILL_RETAIN: u8 = 0x20;
const FLAG_WILL_QOS_MASK: u8 = 0x18;
const FLAG_WILL_QOS_SHIFT: u8 = 3;
const FLAG_WILL: u8 = 0x04;
const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_RESERVED: u8 = 0x01;

/// Protocol revisions understood by the codec.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ProtocolVersion {
    /// MQTT 3.1, protocol name "MQIsdp"
    V31 = 3,
    /// MQTT 3.1.1, protocol name "MQTT"
    #[default]
    V311 = 4,
}

impl ProtocolVersion {
    pub fn protocol_name(self) -> &'static str {
        match self {
            ProtocolVersion::V31 => "MQIsdp",
            ProtocolVersion::V311 => "MQTT",
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = ProtocolError;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            3 => Ok(ProtocolVersion::V31),
            4 => Ok(ProtocolVersion::V311),
            _ => Err(ProtocolError::ConnectRefused(
                ConnAckCode::UnacceptableProtocolVersion,
            )),
        }
    }
}

/// Last-will message published by the server on an unexpected disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub message: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

impl Will {
    pub fn new(topic: impl Into<String>, message: impl Into<Bytes>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
            qos,
            retain: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub protocol_version: ProtocolVersion,
    pub clean_session: bool,
    /// Keep-alive interval in seconds; 0 disables the mechanism.
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
}

impl Default for Connect {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::V311,
            clean_session: true,
            keep_alive: 0,
            client_id: String::new(),
            will: None,
            username: None,
            password: None,
        }
    }
}

impl Connect {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Connect flags byte for the fields currently set.
    pub fn connect_flags(&self) -> u8 {
        let mut flags = 0;
        if self.clean_session {
            flags |= FLAG_CLEAN_SESSION;
        }
        if let Some(will) = &self.will {
            flags |= FLAG_WILL | ((will.qos as u8) << FLAG_WILL_QOS_SHIFT);
            if will.retain {
                flags |= FLAG_WILL_RETAIN;
            }
        }
        if self.username.is_some() {
            flags |= FLAG_USERNAME;
        }
        if self.password.is_some() {
            flags |= FLAG_PASSWORD;
        }
        flags
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() && !self.clean_session {
            return Err(ProtocolError::ConnectRefused(ConnAckCode::IdentifierRejected));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ProtocolError::MalformedPacket(
                constants::ERR_CONNECT_PASSWORD_FLAG,
            ));
        }
        if let Some(will) = &self.will {
            validate_topic_name(&will.topic)?;
        }
        Ok(())
    }
}

// Flagged optional fields that run past the body are a length mismatch, not
// a short destination buffer.
fn optional<T>(read: Result<T>) -> Result<T> {
    read.map_err(|e| match e {
        ProtocolError::InsufficientBufferSize => ProtocolError::InvalidLength,
        other => other,
    })
}

impl PacketBody for Connect {
    const PACKET_TYPE: PacketType = PacketType::Connect;

    fn body_len(&self) -> Result<usize> {
        self.validate()?;

        let mut len = lp_len(self.protocol_version.protocol_name().as_bytes())?
            + 1 // level
            + 1 // flags
            + 2 // keep alive
            + lp_len(self.client_id.as_bytes())?;

        if let Some(will) = &self.will {
            len += lp_len(will.topic.as_bytes())? + lp_len(&will.message)?;
        }
        if let Some(username) = &self.username {
            len += lp_len(username.as_bytes())?;
        }
        if let Some(password) = &self.password {
            len += lp_len(password)?;
        }
        Ok(len)
    }

    fn decode_body(_header: &FixedHeader, body: &mut Reader<'_>) -> Result<Self> {
        let name = body.read_lp_string()?;
        let protocol_version = ProtocolVersion::try_from(body.read_u8()?)?;
        if name != protocol_version.protocol_name() {
            return Err(ProtocolError::MalformedPacket(constants::ERR_PROTOCOL_NAME));
        }

        let flags = body.read_u8()?;
        if flags & FLAG_RESERVED != 0 {
            return Err(ProtocolError::MalformedPacket(
                constants::ERR_CONNECT_RESERVED_FLAG,
            ));
        }

        let will_flag = flags & FLAG_WILL != 0;
        let will_qos = (flags & FLAG_WILL_QOS_MASK) >> FLAG_WILL_QOS_SHIFT;
        let will_retain = flags & FLAG_WILL_RETAIN != 0;
        if !will_flag && (will_qos != 0 || will_retain) {
            return Err(ProtocolError::MalformedPacket(constants::ERR_CONNECT_WILL_FLAGS));
        }
        let will_qos = QoS::try_from(will_qos)?;

        let has_username = flags & FLAG_USERNAME != 0;
        let has_password = flags & FLAG_PASSWORD != 0;
        if has_password && !has_username {
            return Err(ProtocolError::MalformedPacket(
                constants::ERR_CONNECT_PASSWORD_FLAG,
            ));
        }

        let clean_session = flags & FLAG_CLEAN_SESSION != 0;
        let keep_alive = body.read_u16()?;

        let client_id = body.read_lp_string()?;
        if client_id.is_empty() && !clean_session {
            return Err(ProtocolError::ConnectRefused(ConnAckCode::IdentifierRejected));
        }

        let will = if will_flag {
            let topic = optional(body.read_lp_string())?;
            validate_topic_name(&topic)?;
            let message = optional(body.read_lp_bytes())?;
            Some(Will {
                topic,
                message,
                qos: will_qos,
                retain: will_retain,
            })
        } else {
            None
        };

        let username = if has_username {
            Some(optional(body.read_lp_string())?)
        } else {
            None
        };

        let password = if has_password {
            Some(optional(body.read_lp_bytes())?)
        } else {
            None
        };

        Ok(Self {
            protocol_version,
            clean_session,
            keep_alive,
            client_id,
            will,
            username,
            password,
        })
    }

    fn encode_body(&self, out: &mut Writer<'_>) -> Result<()> {
        out.put_lp_bytes(self.protocol_version.protocol_name().as_bytes())?;
        out.put_u8(self.protocol_version.level())?;
        out.put_u8(self.connect_flags())?;
        out.put_u16(self.keep_alive)?;
        out.put_lp_bytes(self.client_id.as_bytes())?;

        if let Some(will) = &self.will {
            out.put_lp_bytes(will.topic.as_bytes())?;
            out.put_lp_bytes(&will.message)?;
        }
        if let Some(username) = &self.username {
            out.put_lp_bytes(username.as_bytes())?;
        }
        if let Some(password) = &self.password {
            out.put_lp_bytes(password)?;
        }
        Ok(())
    }
}
