//! PUBLISH: application message transport in either direction.
//!
//! ```text
//! [0x3 | DUP QoS QoS RETAIN] [Remaining Length]
//! [Topic Name (lp)] [Packet ID (u16), QoS > 0 only] [Payload ...]
//! ```
//!
//! The payload is everything after the variable header. On decode it is a
//! `Bytes` slice of the source buffer, so no payload bytes are copied.

use crate::core::header::{FixedHeader, PacketType};
use crate::core::primitives::{lp_len, Reader, Writer};
use crate::core::qos::QoS;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::packet::PacketBody;
use crate::protocol::topic::validate_topic_name;
use bytes::Bytes;

const FLAG_DUP: u8 = 0x08;
const FLAG_QOS_SHIFT: u8 = 1;
const FLAG_RETAIN: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Only carried on the wire for QoS 1 and 2. Must stay 0 at QoS 0,
    /// otherwise encoding fails with `MalformedPacket`.
    pub packet_id: u16,
    pub payload: Bytes,
}

impl Publish {
    pub fn new(topic: impl Into<String>, qos: QoS, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            qos,
            payload: payload.into(),
            ..Self::default()
        }
    }

    pub fn with_packet_id(mut self, packet_id: u16) -> Self {
        self.packet_id = packet_id;
        self
    }
}

impl PacketBody for Publish {
    const PACKET_TYPE: PacketType = PacketType::Publish;

    fn flags(&self) -> u8 {
        let mut flags = (self.qos as u8) << FLAG_QOS_SHIFT;
        if self.dup {
            flags |= FLAG_DUP;
        }
        if self.retain {
            flags |= FLAG_RETAIN;
        }
        flags
    }

    fn body_len(&self) -> Result<usize> {
        validate_topic_name(&self.topic)?;
        Self::PACKET_TYPE.validate_flags(self.flags())?;

        let mut len = lp_len(self.topic.as_bytes())? + self.payload.len();
        if self.qos != QoS::AtMostOnce {
            if self.packet_id == 0 {
                return Err(ProtocolError::PacketIdZero);
            }
            len += 2;
        } else if self.packet_id != 0 {
            return Err(ProtocolError::MalformedPacket(constants::ERR_QOS0_PACKET_ID));
        }
        Ok(len)
    }

    fn decode_body(header: &FixedHeader, body: &mut Reader<'_>) -> Result<Self> {
        let qos = QoS::try_from((header.flags >> FLAG_QOS_SHIFT) & 0x03)?;

        let topic = body.read_lp_string()?;
        validate_topic_name(&topic)?;

        let packet_id = if qos != QoS::AtMostOnce {
            body.read_packet_id()?
        } else {
            0
        };

        Ok(Self {
            dup: header.flags & FLAG_DUP != 0,
            qos,
            retain: header.flags & FLAG_RETAIN != 0,
            topic,
            packet_id,
            payload: body.read_rest(),
        })
    }

    fn encode_body(&self, out: &mut Writer<'_>) -> Result<()> {
        out.put_lp_bytes(self.topic.as_bytes())?;
        if self.qos != QoS::AtMostOnce {
            out.put_packet_id(self.packet_id)?;
        }
        out.put_slice(&self.payload)
    }
}
