//! # Ring Buffer
//!
//! Fixed-capacity byte ring that packets are encoded into on their way to
//! the network, plus the reusable external buffer used by
//! [`Packet::send`](crate::protocol::packet::Packet::send).
//!
//! ## Send Path
//! 1. The packet asks for a scratch slice of at least its encoded size
//! 2. The external buffer grows only if it is smaller than that
//! 3. The packet encodes into the slice and the sink copies it into the ring
//!
//! Once the external buffer has reached the size of the largest packet sent,
//! sending allocates nothing.
//!
//! A `RingBuffer` has a single writer. Callers sharing one across tasks must
//! synchronize externally.

use crate::config::CodecConfig;
use crate::core::header::{FixedHeader, MAX_HEADER_LEN};
use crate::error::{ProtocolError, Result};
use crate::transport::Sink;
use bytes::Bytes;
use tracing::trace;

#[derive(Debug)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
    external: Vec<u8>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
            external: Vec::new(),
        }
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new(config.ring_buffer_capacity)
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Size of the reusable encode buffer.
    pub fn external_capacity(&self) -> usize {
        self.external.len()
    }

    /// Append all of `data` or nothing.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() > self.free() {
            return Err(ProtocolError::InsufficientBufferSize);
        }

        let cap = self.capacity();
        if cap == 0 {
            return Ok(0);
        }
        let tail = (self.head + self.len) % cap;
        let first = data.len().min(cap - tail);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        self.buf[..data.len() - first].copy_from_slice(&data[first..]);
        self.len += data.len();
        Ok(data.len())
    }

    /// Copy buffered bytes into `dst` without consuming them.
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.len);
        if n == 0 {
            return 0;
        }
        let cap = self.capacity();
        let first = n.min(cap - self.head);
        dst[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        dst[first..n].copy_from_slice(&self.buf[..n - first]);
        n
    }

    /// Move up to `dst.len()` buffered bytes into `dst`.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = self.peek(dst);
        self.consume(n);
        n
    }

    fn consume(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.head = (self.head + n) % self.capacity();
        self.len -= n;
        if self.len == 0 {
            self.head = 0;
        }
    }

    /// Length of the complete packet at the front of the ring, if one is
    /// fully buffered.
    pub fn peek_packet(&self) -> Result<Option<usize>> {
        let mut header = [0u8; MAX_HEADER_LEN];
        let n = self.peek(&mut header);
        match FixedHeader::peek(&header[..n])? {
            Some((header, header_len)) if header_len + header.remaining_length <= self.len => {
                Ok(Some(header_len + header.remaining_length))
            }
            _ => Ok(None),
        }
    }

    /// Remove the complete packet at the front of the ring as one frame,
    /// ready for [`dispatcher::decode`](crate::protocol::dispatcher::decode).
    pub fn read_packet(&mut self) -> Result<Option<Bytes>> {
        let Some(len) = self.peek_packet()? else {
            return Ok(None);
        };
        let mut frame = vec![0u8; len];
        self.read(&mut frame);
        Ok(Some(Bytes::from(frame)))
    }
}

impl Sink for RingBuffer {
    fn external_buf(&mut self, min_len: usize) -> &mut [u8] {
        if self.external.len() < min_len {
            trace!(from = self.external.len(), to = min_len, "growing external encode buffer");
            self.external.resize(min_len, 0);
        }
        &mut self.external[..min_len]
    }

    fn send_external(&mut self, len: usize) -> Result<usize> {
        if len > self.external.len() {
            return Err(ProtocolError::InvalidLength);
        }
        // taking the Vec out leaves an unallocated placeholder behind
        let external = std::mem::take(&mut self.external);
        let written = self.write(&external[..len]);
        self.external = external;
        written
    }
}
