//! Integration tests for zero-copy codec operations
//!
//! These tests check that decoded payloads share the source allocation, that
//! stream framing handles partial input, and that the send path does not
//! reallocate once its buffer is large enough.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use mqtt_wire::core::codec::MqttCodec;
use mqtt_wire::core::qos::QoS;
use mqtt_wire::error::ProtocolError;
use mqtt_wire::protocol::ack::PubAck;
use mqtt_wire::protocol::dispatcher::decode;
use mqtt_wire::protocol::packet::Packet;
use mqtt_wire::protocol::publish::Publish;
use mqtt_wire::transport::RingBuffer;
use tokio_util::codec::{Decoder, Encoder};

fn publish(payload: Vec<u8>) -> Packet {
    Packet::from(Publish::new("zero/copy", QoS::AtLeastOnce, payload).with_packet_id(11))
}

fn contains(outer: &Bytes, inner: &Bytes) -> bool {
    let range = outer.as_ptr_range();
    inner.is_empty() || range.contains(&inner.as_ptr())
}

#[test]
fn test_publish_payload_borrows_source() {
    let wire = publish(vec![0xAB; 256]).to_bytes().unwrap();

    let (decoded, _) = decode(&wire).unwrap();
    let Packet::Publish(publish) = decoded else {
        panic!("expected PUBLISH");
    };
    assert_eq!(publish.payload.len(), 256);
    assert!(contains(&wire, &publish.payload));
}

#[test]
fn test_codec_decode_zero_copy_split() {
    let mut codec = MqttCodec::default();
    let wire = publish(vec![1, 2, 3, 4, 5]).to_bytes().unwrap();

    let mut buffer = BytesMut::from(&wire[..]);
    buffer.extend_from_slice(&[0x40, 0x02]);
    let base = buffer.as_ptr_range();

    let decoded = codec.decode(&mut buffer).unwrap().unwrap();
    let Packet::Publish(publish) = decoded else {
        panic!("expected PUBLISH");
    };
    assert_eq!(&publish.payload[..], &[1, 2, 3, 4, 5]);
    assert!(base.contains(&publish.payload.as_ptr()));

    // the start of the next frame stays buffered
    assert_eq!(&buffer[..], &[0x40, 0x02]);
    assert!(codec.decode(&mut buffer).unwrap().is_none());
}

#[test]
fn test_codec_partial_decode_preserves_buffer() {
    let mut codec = MqttCodec::default();
    let wire = publish(vec![9; 300]).to_bytes().unwrap();

    let mut buffer = BytesMut::new();
    for chunk in wire.chunks(64) {
        assert!(buffer.is_empty() || codec.decode(&mut buffer).unwrap().is_none());
        buffer.extend_from_slice(chunk);
    }
    let decoded = codec.decode(&mut buffer).unwrap().unwrap();
    assert_eq!(decoded, publish(vec![9; 300]));
    assert!(buffer.is_empty());
}

#[test]
fn test_codec_rejects_oversized_frame_early() {
    let mut codec = MqttCodec::new(64);
    // header announces 16384 bytes, body not yet received
    let mut buffer = BytesMut::from(&[0x30, 0x80, 0x80, 0x01][..]);
    assert!(matches!(
        codec.decode(&mut buffer),
        Err(ProtocolError::InvalidLength)
    ));
}

#[test]
fn test_codec_encode_appends_frames() {
    let mut codec = MqttCodec::default();
    let mut buffer = BytesMut::new();

    codec.encode(Packet::from(PubAck::new(1)), &mut buffer).unwrap();
    codec.encode(&Packet::PingReq, &mut buffer).unwrap();
    assert_eq!(&buffer[..], &[0x40, 0x02, 0x00, 0x01, 0xC0, 0x00]);

    let first = codec.decode(&mut buffer).unwrap().unwrap();
    let second = codec.decode(&mut buffer).unwrap().unwrap();
    assert_eq!(first, Packet::from(PubAck::new(1)));
    assert_eq!(second, Packet::PingReq);
}

#[test]
fn test_codec_encode_failure_leaves_buffer_untouched() {
    let mut codec = MqttCodec::default();
    let mut buffer = BytesMut::from(&[0xC0, 0x00][..]);

    let result = codec.encode(Packet::from(PubAck::new(0)), &mut buffer);
    assert!(matches!(result, Err(ProtocolError::PacketIdZero)));
    assert_eq!(&buffer[..], &[0xC0, 0x00]);
}

#[test]
fn test_ring_send_reuses_external_buffer() {
    let mut ring = RingBuffer::new(4096);
    let large = publish(vec![7; 512]);
    let small = publish(vec![1; 16]);

    large.send(&mut ring).unwrap();
    let grown_to = ring.external_capacity();
    assert!(grown_to >= large.encoded_len().unwrap());

    for _ in 0..10 {
        small.send(&mut ring).unwrap();
        assert_eq!(ring.external_capacity(), grown_to);
    }

    assert_eq!(ring.read_packet().unwrap().unwrap(), large.to_bytes().unwrap());
    assert_eq!(ring.read_packet().unwrap().unwrap(), small.to_bytes().unwrap());
}

#[test]
fn test_ring_send_without_room_writes_nothing() {
    let packet = publish(vec![0; 32]);
    let len = packet.encoded_len().unwrap();
    let mut ring = RingBuffer::new(len + 4);

    packet.send(&mut ring).unwrap();
    assert!(matches!(
        packet.send(&mut ring),
        Err(ProtocolError::InsufficientBufferSize)
    ));
    assert_eq!(ring.len(), len);
}
