//! CONNACK: the server's answer to CONNECT.
//!
//! ```text
//! [0x20] [0x02] [0000000 | Session Present] [Return Code]
//! ```

use crate::core::header::{FixedHeader, PacketType};
use crate::core::primitives::{Reader, Writer};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::packet::PacketBody;
use std::fmt;

/// CONNACK return codes. Values from 6 upward are reserved.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnAckCode {
    #[default]
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUsernameOrPassword = 4,
    NotAuthorized = 5,
}

impl ConnAckCode {
    pub fn is_accepted(self) -> bool {
        self == ConnAckCode::Accepted
    }

    /// Long-form explanation of the code.
    pub fn description(self) -> &'static str {
        match self {
            ConnAckCode::Accepted => "Connection accepted",
            ConnAckCode::UnacceptableProtocolVersion => {
                "The Server does not support the level of the MQTT protocol requested by the Client"
            }
            ConnAckCode::IdentifierRejected => {
                "The Client identifier is correct UTF-8 but not allowed by the server"
            }
            ConnAckCode::ServerUnavailable => {
                "The Network Connection has been made but the MQTT service is unavailable"
            }
            ConnAckCode::BadUsernameOrPassword => "The data in the user name or password is malformed",
            ConnAckCode::NotAuthorized => "The Client is not authorized to connect",
        }
    }
}

impl TryFrom<u8> for ConnAckCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => ConnAckCode::Accepted,
            1 => ConnAckCode::UnacceptableProtocolVersion,
            2 => ConnAckCode::IdentifierRejected,
            3 => ConnAckCode::ServerUnavailable,
            4 => ConnAckCode::BadUsernameOrPassword,
            5 => ConnAckCode::NotAuthorized,
            other => return Err(ProtocolError::InvalidReturnCode(other)),
        })
    }
}

impl fmt::Display for ConnAckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnAckCode::Accepted => "Connection accepted",
            ConnAckCode::UnacceptableProtocolVersion => {
                "Connection Refused, unacceptable protocol version"
            }
            ConnAckCode::IdentifierRejected => "Connection Refused, identifier rejected",
            ConnAckCode::ServerUnavailable => "Connection Refused, Server unavailable",
            ConnAckCode::BadUsernameOrPassword => "Connection Refused, bad user name or password",
            ConnAckCode::NotAuthorized => "Connection Refused, not authorized",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnAck {
    pub session_present: bool,
    pub return_code: ConnAckCode,
}

impl ConnAck {
    pub fn new(return_code: ConnAckCode, session_present: bool) -> Self {
        Self {
            session_present,
            return_code,
        }
    }
}

impl PacketBody for ConnAck {
    const PACKET_TYPE: PacketType = PacketType::ConnAck;

    fn body_len(&self) -> Result<usize> {
        Ok(2)
    }

    fn decode_body(_header: &FixedHeader, body: &mut Reader<'_>) -> Result<Self> {
        if body.remaining() != 2 {
            return Err(ProtocolError::InvalidLength);
        }

        let ack_flags = body.read_u8()?;
        if ack_flags & 0xFE != 0 {
            return Err(ProtocolError::MalformedPacket(constants::ERR_CONNACK_RESERVED_BITS));
        }

        Ok(Self {
            session_present: ack_flags & 0x01 != 0,
            return_code: ConnAckCode::try_from(body.read_u8()?)?,
        })
    }

    fn encode_body(&self, out: &mut Writer<'_>) -> Result<()> {
        out.put_u8(self.session_present as u8)?;
        out.put_u8(self.return_code as u8)
    }
}
