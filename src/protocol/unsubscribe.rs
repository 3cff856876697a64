//! UNSUBSCRIBE: `[0xA2] [Remaining Length] [Packet ID] ([Topic Filter (lp)])+`

use crate::core::header::{FixedHeader, PacketType};
use crate::core::primitives::{lp_len, Reader, Writer};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::packet::PacketBody;
use crate::protocol::topic::validate_topic_filter;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unsubscribe {
    pub packet_id: u16,
    pub topics: Vec<String>,
}

impl Unsubscribe {
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            topics: Vec::new(),
        }
    }

    pub fn add_topic(mut self, filter: impl Into<String>) -> Self {
        self.topics.push(filter.into());
        self
    }
}

impl PacketBody for Unsubscribe {
    const PACKET_TYPE: PacketType = PacketType::Unsubscribe;

    fn body_len(&self) -> Result<usize> {
        if self.packet_id == 0 {
            return Err(ProtocolError::PacketIdZero);
        }
        if self.topics.is_empty() {
            return Err(ProtocolError::MalformedPacket(
                constants::ERR_EMPTY_UNSUBSCRIBE,
            ));
        }

        self.topics.iter().try_fold(2, |len, filter| -> Result<usize> {
            validate_topic_filter(filter)?;
            Ok(len + lp_len(filter.as_bytes())?)
        })
    }

    fn decode_body(_header: &FixedHeader, body: &mut Reader<'_>) -> Result<Self> {
        let packet_id = body.read_packet_id()?;

        let mut topics = Vec::new();
        while !body.is_empty() {
            let filter = body.read_lp_string()?;
            validate_topic_filter(&filter)?;
            topics.push(filter);
        }

        if topics.is_empty() {
            return Err(ProtocolError::MalformedPacket(
                constants::ERR_EMPTY_UNSUBSCRIBE,
            ));
        }

        Ok(Self { packet_id, topics })
    }

    fn encode_body(&self, out: &mut Writer<'_>) -> Result<()> {
        out.put_packet_id(self.packet_id)?;
        for filter in &self.topics {
            out.put_lp_bytes(filter.as_bytes())?;
        }
        Ok(())
    }
}
