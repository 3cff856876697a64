//! # Fixed Header
//!
//! Every packet starts with a type/flags byte followed by the remaining length:
//!
//! ```text
//! [Type(4 bits) | Flags(4 bits)] [Remaining Length (1-4 byte varint)]
//! ```
//!
//! Flags are fixed per packet type, except for PUBLISH (DUP/QoS/Retain) and
//! the `0b0010` pattern required on PUBREL, SUBSCRIBE and UNSUBSCRIBE.

use crate::core::primitives::{decode_remaining_length, encode_remaining_length, remaining_length_len};
use crate::error::{ProtocolError, Result};
use std::fmt;

/// Maximum value the remaining length field can carry (four varint bytes).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Largest fixed header: one type byte plus four length bytes.
pub const MAX_HEADER_LEN: usize = 5;

/// Control packet types. The boundary values 0 and 15 are reserved and
/// never produced by a successful parse.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl PacketType {
    /// Upper-case protocol name of the packet type.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Connect => "CONNECT",
            PacketType::ConnAck => "CONNACK",
            PacketType::Publish => "PUBLISH",
            PacketType::PubAck => "PUBACK",
            PacketType::PubRec => "PUBREC",
            PacketType::PubRel => "PUBREL",
            PacketType::PubComp => "PUBCOMP",
            PacketType::Subscribe => "SUBSCRIBE",
            PacketType::SubAck => "SUBACK",
            PacketType::Unsubscribe => "UNSUBSCRIBE",
            PacketType::UnsubAck => "UNSUBACK",
            PacketType::PingReq => "PINGREQ",
            PacketType::PingResp => "PINGRESP",
            PacketType::Disconnect => "DISCONNECT",
        }
    }

    /// Flags mandated by the protocol for this type. For PUBLISH this is the
    /// value used when DUP, QoS and Retain are all clear.
    pub fn default_flags(self) -> u8 {
        match self {
            PacketType::PubRel | PacketType::Subscribe | PacketType::Unsubscribe => 0x02,
            _ => 0x00,
        }
    }

    /// Check a flags nibble against the pattern this type allows.
    pub fn validate_flags(self, flags: u8) -> Result<()> {
        if self == PacketType::Publish {
            let qos = (flags >> 1) & 0x03;
            if qos == 3 {
                return Err(ProtocolError::InvalidQos(qos));
            }
            // [MQTT-3.3.1-2] DUP must be 0 for QoS 0 messages
            if qos == 0 && flags & 0x08 != 0 {
                return Err(ProtocolError::InvalidMessageTypeFlags {
                    packet_type: self,
                    flags,
                });
            }
            return Ok(());
        }

        if flags != self.default_flags() {
            return Err(ProtocolError::InvalidMessageTypeFlags {
                packet_type: self,
                flags,
            });
        }
        Ok(())
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            1 => PacketType::Connect,
            2 => PacketType::ConnAck,
            3 => PacketType::Publish,
            4 => PacketType::PubAck,
            5 => PacketType::PubRec,
            6 => PacketType::PubRel,
            7 => PacketType::PubComp,
            8 => PacketType::Subscribe,
            9 => PacketType::SubAck,
            10 => PacketType::Unsubscribe,
            11 => PacketType::UnsubAck,
            12 => PacketType::PingReq,
            13 => PacketType::PingResp,
            14 => PacketType::Disconnect,
            other => return Err(ProtocolError::InvalidMessageType(other)),
        })
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub remaining_length: usize,
}

impl FixedHeader {
    /// Build a header with the type's mandated flags.
    pub fn new(packet_type: PacketType, remaining_length: usize) -> Self {
        Self {
            packet_type,
            flags: packet_type.default_flags(),
            remaining_length,
        }
    }

    /// Parse the header from the start of `buf` without requiring the body to
    /// be present. Returns `Ok(None)` while more bytes are needed.
    pub fn peek(buf: &[u8]) -> Result<Option<(FixedHeader, usize)>> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };

        let packet_type = PacketType::try_from(first >> 4)?;
        let flags = first & 0x0F;
        packet_type.validate_flags(flags)?;

        match decode_remaining_length(&buf[1..])? {
            Some((remaining_length, len)) => Ok(Some((
                FixedHeader {
                    packet_type,
                    flags,
                    remaining_length,
                },
                1 + len,
            ))),
            None => Ok(None),
        }
    }

    /// Parse a complete header. The declared remaining length must fit in
    /// `buf`; returns the header and the number of header bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(FixedHeader, usize)> {
        let (header, consumed) = Self::peek(buf)?.ok_or(ProtocolError::InvalidLength)?;
        if buf.len() - consumed < header.remaining_length {
            return Err(ProtocolError::InvalidLength);
        }
        Ok((header, consumed))
    }

    /// Bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        1 + remaining_length_len(self.remaining_length)
    }

    /// Header length plus the body it announces.
    pub fn packet_len(&self) -> usize {
        self.encoded_len() + self.remaining_length
    }

    /// Write the header into `dst`, returning the bytes written.
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize> {
        if self.remaining_length > MAX_REMAINING_LENGTH {
            return Err(ProtocolError::InvalidLength);
        }
        let first = dst.first_mut().ok_or(ProtocolError::InsufficientBufferSize)?;
        *first = ((self.packet_type as u8) << 4) | (self.flags & 0x0F);
        let written = encode_remaining_length(self.remaining_length, &mut dst[1..])?;
        Ok(1 + written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_codes() {
        for code in 1u8..=14 {
            let packet_type = PacketType::try_from(code).unwrap();
            assert_eq!(packet_type as u8, code);
        }
        assert!(matches!(
            PacketType::try_from(0),
            Err(ProtocolError::InvalidMessageType(0))
        ));
        assert!(matches!(
            PacketType::try_from(15),
            Err(ProtocolError::InvalidMessageType(15))
        ));
    }

    #[test]
    fn test_default_flags() {
        assert_eq!(PacketType::PubRel.default_flags(), 2);
        assert_eq!(PacketType::Subscribe.default_flags(), 2);
        assert_eq!(PacketType::Unsubscribe.default_flags(), 2);
        assert_eq!(PacketType::Publish.default_flags(), 0);
        assert_eq!(PacketType::Disconnect.default_flags(), 0);
        assert_eq!(PacketType::Unsubscribe.name(), "UNSUBSCRIBE");
    }

    #[test]
    fn test_publish_flags() {
        assert!(PacketType::Publish.validate_flags(0b0000).is_ok());
        assert!(PacketType::Publish.validate_flags(0b0001).is_ok());
        assert!(PacketType::Publish.validate_flags(0b1011).is_ok());
        assert!(PacketType::Publish.validate_flags(0b1101).is_ok());
        assert!(matches!(
            PacketType::Publish.validate_flags(0b0110),
            Err(ProtocolError::InvalidQos(3))
        ));
        assert!(matches!(
            PacketType::Publish.validate_flags(0b1000),
            Err(ProtocolError::InvalidMessageTypeFlags { .. })
        ));
    }

    #[test]
    fn test_decode_header() {
        let (header, consumed) = FixedHeader::decode(&[0x62, 0x02, 0x00, 0x07]).unwrap();
        assert_eq!(header.packet_type, PacketType::PubRel);
        assert_eq!(header.flags, 0x02);
        assert_eq!(header.remaining_length, 2);
        assert_eq!(consumed, 2);
        assert_eq!(header.packet_len(), 4);
    }

    #[test]
    fn test_decode_rejects_short_body() {
        assert!(matches!(
            FixedHeader::decode(&[0x20, 0x03, 0x00, 0x00]),
            Err(ProtocolError::InvalidLength)
        ));
        assert!(matches!(
            FixedHeader::decode(&[]),
            Err(ProtocolError::InvalidLength)
        ));
    }

    #[test]
    fn test_peek_needs_more() {
        assert!(FixedHeader::peek(&[]).unwrap().is_none());
        assert!(FixedHeader::peek(&[0x30]).unwrap().is_none());
        assert!(FixedHeader::peek(&[0x30, 0x80]).unwrap().is_none());
        let (header, len) = FixedHeader::peek(&[0x30, 0x80, 0x01]).unwrap().unwrap();
        assert_eq!(header.remaining_length, 128);
        assert_eq!(len, 3);
    }

    #[test]
    fn test_encode_header() {
        let header = FixedHeader::new(PacketType::Subscribe, 321);
        let mut buf = [0u8; 5];
        let written = header.encode(&mut buf).unwrap();
        assert_eq!(written, 3);
        assert_eq!(&buf[..3], &[0x82, 0xC1, 0x02]);
        assert_eq!(header.encoded_len(), 3);

        let mut tiny = [0u8; 2];
        assert!(matches!(
            header.encode(&mut tiny),
            Err(ProtocolError::InsufficientBufferSize)
        ));
    }
}
