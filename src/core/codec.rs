//! # Stream Codec
//!
//! [`MqttCodec`] adapts the packet decoder to `tokio_util::codec`, so a
//! `Framed` transport yields typed packets.
//!
//! Decoding waits until a complete frame is buffered, then splits it off the
//! read buffer and freezes it. The split is zero-copy and the decoded packet
//! borrows its payload from the frozen frame.

use crate::config::CodecConfig;
use crate::core::header::{FixedHeader, MAX_HEADER_LEN, MAX_REMAINING_LENGTH};
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher;
use crate::protocol::packet::Packet;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Largest frame the protocol can describe.
pub const MAX_PACKET_SIZE: usize = MAX_REMAINING_LENGTH + MAX_HEADER_LEN;

#[derive(Debug, Clone, Copy)]
pub struct MqttCodec {
    max_packet_size: usize,
}

impl Default for MqttCodec {
    fn default() -> Self {
        Self::new(MAX_PACKET_SIZE)
    }
}

impl MqttCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size: max_packet_size.min(MAX_PACKET_SIZE),
        }
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new(config.max_packet_size)
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Decoder for MqttCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        let Some((header, header_len)) = FixedHeader::peek(&src[..])? else {
            return Ok(None);
        };

        let frame_len = header_len + header.remaining_length;
        if frame_len > self.max_packet_size {
            trace!(
                packet_type = %header.packet_type,
                frame_len,
                max = self.max_packet_size,
                "frame exceeds maximum packet size"
            );
            return Err(ProtocolError::InvalidLength);
        }

        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len).freeze();
        match dispatcher::decode(&frame) {
            Ok((packet, _)) => Ok(Some(packet)),
            Err(e) => {
                trace!(packet_type = %header.packet_type, error = %e, "packet decode failed");
                Err(e)
            }
        }
    }
}

impl Encoder<Packet> for MqttCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&Packet>>::encode(self, &item, dst)
    }
}

impl Encoder<&Packet> for MqttCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &Packet, dst: &mut BytesMut) -> Result<()> {
        let len = item.encoded_len()?;
        if len > self.max_packet_size {
            return Err(ProtocolError::InvalidLength);
        }
        item.encode_to(dst)?;
        Ok(())
    }
}
