//! SUBSCRIBE and its acknowledgement SUBACK.
//!
//! ```text
//! SUBSCRIBE: [0x82] [Remaining Length] [Packet ID] ([Topic Filter (lp)] [Requested QoS])+
//! SUBACK:    [0x90] [Remaining Length] [Packet ID] ([Return Code])*
//! ```
//!
//! SUBACK return codes line up one-to-one with the filters of the SUBSCRIBE
//! they answer, in the same order.

use crate::core::header::{FixedHeader, PacketType};
use crate::core::primitives::{lp_len, Reader, Writer};
use crate::core::qos::{QoS, SubscribeReturnCode};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::packet::PacketBody;
use crate::protocol::topic::validate_topic_filter;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subscribe {
    pub packet_id: u16,
    /// Topic filters with their requested maximum QoS, in request order.
    pub topics: Vec<(String, QoS)>,
}

impl Subscribe {
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            topics: Vec::new(),
        }
    }

    pub fn add_topic(mut self, filter: impl Into<String>, qos: QoS) -> Self {
        self.topics.push((filter.into(), qos));
        self
    }
}

impl PacketBody for Subscribe {
    const PACKET_TYPE: PacketType = PacketType::Subscribe;

    fn body_len(&self) -> Result<usize> {
        if self.packet_id == 0 {
            return Err(ProtocolError::PacketIdZero);
        }
        if self.topics.is_empty() {
            return Err(ProtocolError::MalformedPacket(constants::ERR_EMPTY_SUBSCRIBE));
        }

        let mut len = 2;
        for (filter, _) in &self.topics {
            validate_topic_filter(filter)?;
            len += lp_len(filter.as_bytes())? + 1;
        }
        Ok(len)
    }

    fn decode_body(_header: &FixedHeader, body: &mut Reader<'_>) -> Result<Self> {
        let packet_id = body.read_packet_id()?;

        let mut topics = Vec::new();
        while !body.is_empty() {
            let filter = body.read_lp_string()?;
            validate_topic_filter(&filter)?;

            let requested = body.read_u8()?;
            if requested & 0xFC != 0 {
                return Err(ProtocolError::MalformedPacket(
                    constants::ERR_SUBSCRIBE_RESERVED_BITS,
                ));
            }
            topics.push((filter, QoS::try_from(requested)?));
        }

        if topics.is_empty() {
            return Err(ProtocolError::MalformedPacket(constants::ERR_EMPTY_SUBSCRIBE));
        }

        Ok(Self { packet_id, topics })
    }

    fn encode_body(&self, out: &mut Writer<'_>) -> Result<()> {
        out.put_packet_id(self.packet_id)?;
        for (filter, qos) in &self.topics {
            out.put_lp_bytes(filter.as_bytes())?;
            out.put_u8(*qos as u8)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubAck {
    pub packet_id: u16,
    pub return_codes: Vec<SubscribeReturnCode>,
}

impl SubAck {
    pub fn new(packet_id: u16, return_codes: Vec<SubscribeReturnCode>) -> Self {
        Self {
            packet_id,
            return_codes,
        }
    }
}

impl PacketBody for SubAck {
    const PACKET_TYPE: PacketType = PacketType::SubAck;

    fn body_len(&self) -> Result<usize> {
        if self.packet_id == 0 {
            return Err(ProtocolError::PacketIdZero);
        }
        Ok(2 + self.return_codes.len())
    }

    fn decode_body(_header: &FixedHeader, body: &mut Reader<'_>) -> Result<Self> {
        let packet_id = body.read_packet_id()?;

        let mut return_codes = Vec::with_capacity(body.remaining());
        while !body.is_empty() {
            return_codes.push(SubscribeReturnCode::try_from(body.read_u8()?)?);
        }

        Ok(Self {
            packet_id,
            return_codes,
        })
    }

    fn encode_body(&self, out: &mut Writer<'_>) -> Result<()> {
        out.put_packet_id(self.packet_id)?;
        for code in &self.return_codes {
            out.put_u8(u8::from(*code))?;
        }
        Ok(())
    }
}
