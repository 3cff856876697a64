//! # Dispatcher
//!
//! The single place where a packet type byte turns into a typed packet.
//!
//! [`decode`] parses the fixed header, hands a cursor over exactly
//! `remaining_length` bytes to the matching body decoder, and then checks
//! that the body decoder consumed all of them. The match over
//! [`PacketType`] is exhaustive, so a new packet type cannot be added
//! without a decoder.

use crate::core::header::{FixedHeader, PacketType};
use crate::core::primitives::Reader;
use crate::error::Result;
use crate::protocol::ack::{PubAck, PubComp, PubRec, PubRel, UnsubAck};
use crate::protocol::connack::ConnAck;
use crate::protocol::connect::Connect;
use crate::protocol::packet::{Packet, PacketBody};
use crate::protocol::publish::Publish;
use crate::protocol::subscribe::{SubAck, Subscribe};
use crate::protocol::unsubscribe::Unsubscribe;
use bytes::Bytes;

/// Decode one packet from the front of `src`.
///
/// Returns the packet and the total number of bytes it occupied, header
/// included. Bytes past the packet are left untouched. Byte-string fields
/// and PUBLISH payloads are slices of `src` and keep its allocation alive.
pub fn decode(src: &Bytes) -> Result<(Packet, usize)> {
    let (header, header_len) = FixedHeader::decode(src)?;
    let mut body = Reader::new(src, header_len, header.remaining_length);

    let packet = match header.packet_type {
        PacketType::Connect => Packet::Connect(Connect::decode_body(&header, &mut body)?),
        PacketType::ConnAck => Packet::ConnAck(ConnAck::decode_body(&header, &mut body)?),
        PacketType::Publish => Packet::Publish(Publish::decode_body(&header, &mut body)?),
        PacketType::PubAck => Packet::PubAck(PubAck::decode_body(&header, &mut body)?),
        PacketType::PubRec => Packet::PubRec(PubRec::decode_body(&header, &mut body)?),
        PacketType::PubRel => Packet::PubRel(PubRel::decode_body(&header, &mut body)?),
        PacketType::PubComp => Packet::PubComp(PubComp::decode_body(&header, &mut body)?),
        PacketType::Subscribe => Packet::Subscribe(Subscribe::decode_body(&header, &mut body)?),
        PacketType::SubAck => Packet::SubAck(SubAck::decode_body(&header, &mut body)?),
        PacketType::Unsubscribe => {
            Packet::Unsubscribe(Unsubscribe::decode_body(&header, &mut body)?)
        }
        PacketType::UnsubAck => Packet::UnsubAck(UnsubAck::decode_body(&header, &mut body)?),
        // header-only packets; a non-zero remaining length fails `finish`
        PacketType::PingReq => Packet::PingReq,
        PacketType::PingResp => Packet::PingResp,
        PacketType::Disconnect => Packet::Disconnect,
    };

    body.finish()?;
    Ok((packet, header_len + header.remaining_length))
}

/// Decode from a borrowed slice.
///
/// The frame is copied once into an owned buffer so the returned packet does
/// not borrow from `src`. Use [`decode`] with a `Bytes` source to avoid the
/// copy.
pub fn decode_from_slice(src: &[u8]) -> Result<(Packet, usize)> {
    let (header, header_len) = FixedHeader::decode(src)?;
    let frame = Bytes::copy_from_slice(&src[..header_len + header.remaining_length]);
    decode(&frame)
}

/// Peek at the type of the packet at the front of `src` without decoding it.
pub fn peek_type(src: &[u8]) -> Result<Option<PacketType>> {
    match src.first() {
        Some(&first) => PacketType::try_from(first >> 4).map(Some),
        None => Ok(None),
    }
}
