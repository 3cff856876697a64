//! Packets whose body is a packet identifier and nothing else:
//! PUBACK, PUBREC, PUBREL, PUBCOMP and UNSUBACK.
//!
//! ```text
//! [Header] [0x02] [Packet ID MSB] [Packet ID LSB]
//! ```

use crate::core::header::{FixedHeader, PacketType};
use crate::core::primitives::{Reader, Writer};
use crate::error::{ProtocolError, Result};
use crate::protocol::packet::PacketBody;

macro_rules! id_only_packet {
    ($(#[$doc:meta])* $name:ident, $packet_type:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name {
            pub packet_id: u16,
        }

        impl $name {
            pub fn new(packet_id: u16) -> Self {
                Self { packet_id }
            }
        }

        impl PacketBody for $name {
            const PACKET_TYPE: PacketType = $packet_type;

            fn body_len(&self) -> Result<usize> {
                if self.packet_id == 0 {
                    return Err(ProtocolError::PacketIdZero);
                }
                Ok(2)
            }

            fn decode_body(_header: &FixedHeader, body: &mut Reader<'_>) -> Result<Self> {
                if body.remaining() != 2 {
                    return Err(ProtocolError::InvalidLength);
                }
                Ok(Self {
                    packet_id: body.read_packet_id()?,
                })
            }

            fn encode_body(&self, out: &mut Writer<'_>) -> Result<()> {
                out.put_packet_id(self.packet_id)
            }
        }
    };
}

id_only_packet!(
    /// Response to a QoS 1 PUBLISH.
    PubAck,
    PacketType::PubAck
);

id_only_packet!(
    /// First response in the QoS 2 exchange.
    PubRec,
    PacketType::PubRec
);

id_only_packet!(
    /// Response to a PUBREC, the third packet of the QoS 2 exchange.
    /// Always sent with flags `0b0010`.
    PubRel,
    PacketType::PubRel
);

id_only_packet!(
    /// Final packet of the QoS 2 exchange.
    PubComp,
    PacketType::PubComp
);

id_only_packet!(
    /// Confirms an UNSUBSCRIBE.
    UnsubAck,
    PacketType::UnsubAck
);
