//! # Primitive Codecs
//!
//! Building blocks shared by every packet: the remaining-length varint,
//! 16-bit length-prefixed byte strings and big-endian packet identifiers.
//!
//! ## Wire Format
//! ```text
//! varint:     [7 bits | continuation] x 1..4
//! lp-bytes:   [Length MSB] [Length LSB] [Bytes(N)]
//! packet id:  [MSB] [LSB]
//! ```
//!
//! `Reader` and `Writer` are bounds-checked cursors used by the packet
//! decoders and encoders; they never panic on short buffers.

use crate::core::header::MAX_REMAINING_LENGTH;
use crate::error::{ProtocolError, Result};
use bytes::Bytes;

/// Largest payload a length-prefixed field can describe.
pub const MAX_LP_STRING: usize = u16::MAX as usize;

/// Decode a remaining-length varint from the start of `buf`.
///
/// Returns `Ok(None)` if `buf` ends before the terminating byte, and
/// `InvalidLength` if the encoding runs past four bytes.
pub fn decode_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>> {
    let mut value = 0usize;

    for (i, &byte) in buf.iter().enumerate() {
        if i == 4 {
            return Err(ProtocolError::InvalidLength);
        }
        value |= ((byte & 0x7F) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }

    if buf.len() >= 4 {
        return Err(ProtocolError::InvalidLength);
    }
    Ok(None)
}

/// Write the minimal varint encoding of `value` into `dst`.
pub fn encode_remaining_length(mut value: usize, dst: &mut [u8]) -> Result<usize> {
    if value > MAX_REMAINING_LENGTH {
        return Err(ProtocolError::InvalidLength);
    }

    let mut i = 0;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        *dst.get_mut(i).ok_or(ProtocolError::InsufficientBufferSize)? = byte;
        i += 1;
        if value == 0 {
            return Ok(i);
        }
    }
}

/// Number of bytes the varint encoding of `value` occupies.
pub fn remaining_length_len(value: usize) -> usize {
    match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}

/// Read a length-prefixed byte string. Returns the bytes and the total
/// number of bytes consumed including the two-byte prefix.
pub fn read_lp_bytes(buf: &[u8]) -> Result<(&[u8], usize)> {
    if buf.len() < 2 {
        return Err(ProtocolError::InsufficientBufferSize);
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let end = 2 + len;
    if buf.len() < end {
        return Err(ProtocolError::InsufficientBufferSize);
    }
    Ok((&buf[2..end], end))
}

/// Write `data` with a two-byte big-endian length prefix.
pub fn write_lp_bytes(dst: &mut [u8], data: &[u8]) -> Result<usize> {
    if data.len() > MAX_LP_STRING {
        return Err(ProtocolError::InvalidLPStringSize(data.len()));
    }
    let total = 2 + data.len();
    if dst.len() < total {
        return Err(ProtocolError::InsufficientBufferSize);
    }
    dst[..2].copy_from_slice(&(data.len() as u16).to_be_bytes());
    dst[2..total].copy_from_slice(data);
    Ok(total)
}

/// Encoded size of a length-prefixed field.
pub fn lp_len(data: &[u8]) -> Result<usize> {
    if data.len() > MAX_LP_STRING {
        return Err(ProtocolError::InvalidLPStringSize(data.len()));
    }
    Ok(2 + data.len())
}

/// Cursor over a packet body. Byte strings are returned as slices of the
/// source `Bytes`, sharing its allocation.
pub(crate) struct Reader<'a> {
    src: &'a Bytes,
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    /// Read `src[start..start + len]`. The caller has already checked bounds
    /// through the fixed header.
    pub(crate) fn new(src: &'a Bytes, start: usize, len: usize) -> Self {
        Self {
            src,
            pos: start,
            end: start + len,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.end
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(ProtocolError::InsufficientBufferSize);
        }
        let byte = self.src[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(ProtocolError::InsufficientBufferSize);
        }
        let value = u16::from_be_bytes([self.src[self.pos], self.src[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    /// Packet identifiers are never zero on the wire ([MQTT-2.3.1-1]).
    pub(crate) fn read_packet_id(&mut self) -> Result<u16> {
        match self.read_u16()? {
            0 => Err(ProtocolError::PacketIdZero),
            id => Ok(id),
        }
    }

    pub(crate) fn read_lp_bytes(&mut self) -> Result<Bytes> {
        let (data, consumed) = read_lp_bytes(&self.src[self.pos..self.end])?;
        let start = self.pos + 2;
        let slice = self.src.slice(start..start + data.len());
        self.pos += consumed;
        Ok(slice)
    }

    pub(crate) fn read_lp_string(&mut self) -> Result<String> {
        let (data, consumed) = read_lp_bytes(&self.src[self.pos..self.end])?;
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;
        let text = text.to_owned();
        self.pos += consumed;
        Ok(text)
    }

    /// Everything left in the body, without copying.
    pub(crate) fn read_rest(&mut self) -> Bytes {
        let rest = self.src.slice(self.pos..self.end);
        self.pos = self.end;
        rest
    }

    /// Fail if the body declared more bytes than the packet's fields use.
    pub(crate) fn finish(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::InvalidLength)
        }
    }
}

/// Cursor over an encode destination.
pub(crate) struct Writer<'a> {
    dst: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(dst: &'a mut [u8]) -> Self {
        Self { dst, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn put_u8(&mut self, value: u8) -> Result<()> {
        *self
            .dst
            .get_mut(self.pos)
            .ok_or(ProtocolError::InsufficientBufferSize)? = value;
        self.pos += 1;
        Ok(())
    }

    pub(crate) fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put_slice(&value.to_be_bytes())
    }

    /// Write a packet identifier, refusing the unset value.
    pub(crate) fn put_packet_id(&mut self, id: u16) -> Result<()> {
        if id == 0 {
            return Err(ProtocolError::PacketIdZero);
        }
        self.put_u16(id)
    }

    pub(crate) fn put_slice(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos + data.len();
        let target = self
            .dst
            .get_mut(self.pos..end)
            .ok_or(ProtocolError::InsufficientBufferSize)?;
        target.copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    pub(crate) fn put_lp_bytes(&mut self, data: &[u8]) -> Result<()> {
        let written = write_lp_bytes(&mut self.dst[self.pos..], data)?;
        self.pos += written;
        Ok(())
    }
}
