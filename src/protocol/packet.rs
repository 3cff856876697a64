//! # Packet
//!
//! Closed sum type over the fourteen control packets. Every operation that
//! needs "any packet" (size, encode, send) matches on this enum; there is no
//! open trait object for packets.
//!
//! Encoding is two-phase: [`Packet::encoded_len`] computes the exact wire
//! size (failing if a required packet identifier is unset), then
//! [`Packet::encode`] writes the fixed header followed by the body fields in
//! protocol order.

use crate::core::header::{FixedHeader, PacketType, MAX_REMAINING_LENGTH};
use crate::core::primitives::{Reader, Writer};
use crate::core::qos::QoS;
use crate::error::{ProtocolError, Result};
use crate::protocol::ack::{PubAck, PubComp, PubRec, PubRel, UnsubAck};
use crate::protocol::connack::ConnAck;
use crate::protocol::connect::Connect;
use crate::protocol::publish::Publish;
use crate::protocol::subscribe::{SubAck, Subscribe};
use crate::protocol::unsubscribe::Unsubscribe;
use crate::transport::Sink;
use bytes::{BufMut, Bytes, BytesMut};

/// Per-variant body codec. Implementors see only the bytes after the fixed
/// header; the dispatcher checks that the whole body was consumed.
pub(crate) trait PacketBody: Sized {
    const PACKET_TYPE: PacketType;

    /// Flags nibble to emit in the fixed header.
    fn flags(&self) -> u8 {
        Self::PACKET_TYPE.default_flags()
    }

    /// Exact remaining length of the encoded body.
    fn body_len(&self) -> Result<usize>;

    fn decode_body(header: &FixedHeader, body: &mut Reader<'_>) -> Result<Self>;

    fn encode_body(&self, out: &mut Writer<'_>) -> Result<()>;
}

/// A decoded or application-built control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnAck(ConnAck),
    Publish(Publish),
    PubAck(PubAck),
    PubRec(PubRec),
    PubRel(PubRel),
    PubComp(PubComp),
    Subscribe(Subscribe),
    SubAck(SubAck),
    Unsubscribe(Unsubscribe),
    UnsubAck(UnsubAck),
    PingReq,
    PingResp,
    Disconnect,
}

// Apply an expression to the body of whichever variant carries one.
macro_rules! with_body {
    ($packet:expr, $body:ident => $some:expr, _ => $none:expr) => {
        match $packet {
            Packet::Connect($body) => $some,
            Packet::ConnAck($body) => $some,
            Packet::Publish($body) => $some,
            Packet::PubAck($body) => $some,
            Packet::PubRec($body) => $some,
            Packet::PubRel($body) => $some,
            Packet::PubComp($body) => $some,
            Packet::Subscribe($body) => $some,
            Packet::SubAck($body) => $some,
            Packet::Unsubscribe($body) => $some,
            Packet::UnsubAck($body) => $some,
            Packet::PingReq | Packet::PingResp | Packet::Disconnect => $none,
        }
    };
}

impl Packet {
    /// Decode one packet from the front of `src`. See [`crate::protocol::dispatcher::decode`].
    pub fn decode(src: &Bytes) -> Result<(Packet, usize)> {
        crate::protocol::dispatcher::decode(src)
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnAck(_) => PacketType::ConnAck,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PubAck(_) => PacketType::PubAck,
            Packet::PubRec(_) => PacketType::PubRec,
            Packet::PubRel(_) => PacketType::PubRel,
            Packet::PubComp(_) => PacketType::PubComp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubAck(_) => PacketType::SubAck,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubAck(_) => PacketType::UnsubAck,
            Packet::PingReq => PacketType::PingReq,
            Packet::PingResp => PacketType::PingResp,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }

    /// Packet identifier, for the variants (and PUBLISH QoS levels) that
    /// carry one. Zero means "not yet assigned".
    pub fn packet_id(&self) -> Option<u16> {
        match self {
            Packet::Publish(p) if p.qos != QoS::AtMostOnce => Some(p.packet_id),
            Packet::PubAck(p) => Some(p.packet_id),
            Packet::PubRec(p) => Some(p.packet_id),
            Packet::PubRel(p) => Some(p.packet_id),
            Packet::PubComp(p) => Some(p.packet_id),
            Packet::Subscribe(p) => Some(p.packet_id),
            Packet::SubAck(p) => Some(p.packet_id),
            Packet::Unsubscribe(p) => Some(p.packet_id),
            Packet::UnsubAck(p) => Some(p.packet_id),
            _ => None,
        }
    }

    /// Fixed header this packet encodes with.
    pub fn header(&self) -> Result<FixedHeader> {
        let (flags, remaining_length) = with_body!(self, body => (body.flags(), body.body_len()?), _ => (0, 0));
        if remaining_length > MAX_REMAINING_LENGTH {
            return Err(ProtocolError::InvalidLength);
        }
        Ok(FixedHeader {
            packet_type: self.packet_type(),
            flags,
            remaining_length,
        })
    }

    /// Total encoded size, fixed header included.
    pub fn encoded_len(&self) -> Result<usize> {
        Ok(self.header()?.packet_len())
    }

    /// Encode into `dst`, returning the number of bytes written.
    ///
    /// Fails with `InsufficientBufferSize` before writing anything if `dst`
    /// is smaller than [`Packet::encoded_len`].
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize> {
        let header = self.header()?;
        if dst.len() < header.packet_len() {
            return Err(ProtocolError::InsufficientBufferSize);
        }
        self.encode_with_header(&header, dst)
    }

    fn encode_with_header(&self, header: &FixedHeader, dst: &mut [u8]) -> Result<usize> {
        let header_len = header.encode(dst)?;
        let mut out = Writer::new(&mut dst[header_len..]);
        with_body!(self, body => body.encode_body(&mut out)?, _ => ());
        Ok(header_len + out.position())
    }

    /// Append the encoded packet to `dst`, reserving exactly the space needed.
    pub fn encode_to(&self, dst: &mut BytesMut) -> Result<usize> {
        let header = self.header()?;
        let len = header.packet_len();
        let start = dst.len();
        dst.reserve(len);
        dst.put_bytes(0, len);
        match self.encode_with_header(&header, &mut dst[start..]) {
            Ok(written) => Ok(written),
            Err(e) => {
                dst.truncate(start);
                Err(e)
            }
        }
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_to(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode straight into the sink's reusable external buffer and hand the
    /// encoded slice to the sink. The external buffer is only reallocated if
    /// it is smaller than this packet.
    pub fn send<S: Sink + ?Sized>(&self, to: &mut S) -> Result<usize> {
        let header = self.header()?;
        let len = header.packet_len();
        let scratch = to.external_buf(len);
        let written = self.encode_with_header(&header, scratch)?;
        to.send_external(written)
    }
}

macro_rules! impl_from_body {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Packet {
                fn from(body: $variant) -> Packet {
                    Packet::$variant(body)
                }
            }
        )*
    };
}

impl_from_body!(
    Connect,
    ConnAck,
    Publish,
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
);
