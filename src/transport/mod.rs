//! # Transport
//!
//! The boundary between encoded packets and whatever moves bytes to the
//! peer. Connection handling itself lives outside this crate; a transport
//! only has to implement [`Sink`].

use crate::error::Result;

pub mod ring;

pub use ring::RingBuffer;

/// Destination for encoded packets that owns a reusable encode buffer.
pub trait Sink {
    /// Scratch slice of exactly `min_len` bytes for the caller to encode
    /// into. Implementations grow their buffer only when it is too small.
    fn external_buf(&mut self, min_len: usize) -> &mut [u8];

    /// Hand the first `len` bytes of the scratch slice to the transport.
    fn send_external(&mut self, len: usize) -> Result<usize>;
}
