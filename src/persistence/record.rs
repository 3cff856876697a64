//! Storage projection of queued and retained packets.
//!
//! Only PUBLISH and PUBREL are ever persisted. A record keeps the fields
//! needed to rebuild them and nothing else:
//!
//! | field     | bytes                | present                      |
//! |-----------|----------------------|------------------------------|
//! | `type`    | 1, packet type value | always                       |
//! | `id`      | 2, big-endian        | packet id is non-zero        |
//! | `qos`     | 1                    | PUBLISH                      |
//! | `topic`   | raw                  | PUBLISH                      |
//! | `payload` | raw                  | PUBLISH with a payload       |
//!
//! DUP and RETAIN flags are not part of the record.

use crate::core::header::PacketType;
use crate::core::qos::QoS;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::ack::PubRel;
use crate::protocol::packet::Packet;
use crate::protocol::publish::Publish;
use bytes::Bytes;

pub(crate) const FIELD_TYPE: &[u8] = b"type";
pub(crate) const FIELD_ID: &[u8] = b"id";
pub(crate) const FIELD_QOS: &[u8] = b"qos";
pub(crate) const FIELD_TOPIC: &[u8] = b"topic";
pub(crate) const FIELD_PAYLOAD: &[u8] = b"payload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub packet_type: PacketType,
    pub packet_id: u16,
    pub qos: QoS,
    pub topic: String,
    pub payload: Bytes,
}

impl StoredMessage {
    /// Project a packet into its stored form.
    ///
    /// Fails with `InvalidMessageType` for anything but PUBLISH and PUBREL.
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        match packet {
            Packet::Publish(publish) => Ok(Self {
                packet_type: PacketType::Publish,
                packet_id: publish.packet_id,
                qos: publish.qos,
                topic: publish.topic.clone(),
                payload: publish.payload.clone(),
            }),
            Packet::PubRel(pubrel) => Ok(Self {
                packet_type: PacketType::PubRel,
                packet_id: pubrel.packet_id,
                qos: QoS::AtMostOnce,
                topic: String::new(),
                payload: Bytes::new(),
            }),
            other => Err(ProtocolError::InvalidMessageType(other.packet_type() as u8)),
        }
    }

    pub fn to_packet(&self) -> Result<Packet> {
        match self.packet_type {
            PacketType::Publish => Ok(Packet::Publish(Publish {
                dup: false,
                qos: self.qos,
                retain: false,
                topic: self.topic.clone(),
                packet_id: self.packet_id,
                payload: self.payload.clone(),
            })),
            PacketType::PubRel => Ok(Packet::PubRel(PubRel::new(self.packet_id))),
            other => Err(ProtocolError::InvalidMessageType(other as u8)),
        }
    }

    /// Field name/value pairs in the order they are written.
    pub(crate) fn fields(&self) -> Vec<(&'static [u8], Vec<u8>)> {
        let mut fields = vec![(FIELD_TYPE, vec![self.packet_type as u8])];
        if self.packet_id != 0 {
            fields.push((FIELD_ID, self.packet_id.to_be_bytes().to_vec()));
        }
        if self.packet_type == PacketType::Publish {
            fields.push((FIELD_QOS, vec![self.qos as u8]));
            fields.push((FIELD_TOPIC, self.topic.as_bytes().to_vec()));
            if !self.payload.is_empty() {
                fields.push((FIELD_PAYLOAD, self.payload.to_vec()));
            }
        }
        fields
    }
}

fn corrupt() -> ProtocolError {
    ProtocolError::Storage(constants::ERR_CORRUPT_RECORD.to_string())
}

/// Accumulates fields read back from storage into a [`StoredMessage`].
#[derive(Debug, Default)]
pub(crate) struct RecordBuilder {
    packet_type: Option<PacketType>,
    packet_id: u16,
    qos: Option<QoS>,
    topic: Option<String>,
    payload: Bytes,
}

impl RecordBuilder {
    pub(crate) fn field(&mut self, name: &[u8], value: &[u8]) -> Result<()> {
        match name {
            FIELD_TYPE => {
                let byte = *value.first().ok_or_else(corrupt)?;
                self.packet_type = Some(PacketType::try_from(byte)?);
            }
            FIELD_ID => {
                let bytes: [u8; 2] = value.try_into().map_err(|_| corrupt())?;
                self.packet_id = u16::from_be_bytes(bytes);
            }
            FIELD_QOS => {
                let byte = *value.first().ok_or_else(corrupt)?;
                self.qos = Some(QoS::try_from(byte)?);
            }
            FIELD_TOPIC => {
                self.topic = Some(
                    String::from_utf8(value.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?,
                );
            }
            FIELD_PAYLOAD => self.payload = Bytes::copy_from_slice(value),
            // unknown fields are ignored
            _ => {}
        }
        Ok(())
    }

    /// Fails when `type` is missing, or when a PUBLISH lacks `qos` or `topic`.
    pub(crate) fn finish(self) -> Result<StoredMessage> {
        let packet_type = self.packet_type.ok_or_else(corrupt)?;
        let (qos, topic) = match packet_type {
            PacketType::Publish => (
                self.qos.ok_or_else(corrupt)?,
                self.topic.ok_or_else(corrupt)?,
            ),
            _ => (
                self.qos.unwrap_or_default(),
                self.topic.unwrap_or_default(),
            ),
        };
        Ok(StoredMessage {
            packet_type,
            packet_id: self.packet_id,
            qos,
            topic,
            payload: self.payload,
        })
    }
}
