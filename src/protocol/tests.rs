// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::header::PacketType;
use crate::core::qos::{QoS, SubscribeReturnCode};
use crate::error::ProtocolError;
use crate::protocol::ack::{PubAck, PubComp, PubRec, PubRel, UnsubAck};
use crate::protocol::connack::{ConnAck, ConnAckCode};
use crate::protocol::connect::{Connect, Will};
use crate::protocol::dispatcher::{decode, decode_from_slice, peek_type};
use crate::protocol::packet::Packet;
use crate::protocol::publish::Publish;
use crate::protocol::subscribe::{SubAck, Subscribe};
use crate::protocol::unsubscribe::Unsubscribe;
use bytes::{Bytes, BytesMut};

fn sample_packets() -> Vec<Packet> {
    vec![
        Connect {
            keep_alive: 30,
            will: Some(Will::new("status/c1", "offline", QoS::AtLeastOnce)),
            username: Some("user".into()),
            password: Some(Bytes::from_static(b"pass")),
            ..Connect::new("c1")
        }
        .into(),
        ConnAck::new(ConnAckCode::NotAuthorized, false).into(),
        Publish::new("a/b", QoS::ExactlyOnce, "payload")
            .with_packet_id(9)
            .into(),
        PubAck::new(1).into(),
        PubRec::new(2).into(),
        PubRel::new(3).into(),
        PubComp::new(4).into(),
        Subscribe::new(5).add_topic("a/+", QoS::AtMostOnce).into(),
        SubAck::new(5, vec![SubscribeReturnCode::Success(QoS::AtMostOnce)]).into(),
        Unsubscribe::new(6).add_topic("a/+").into(),
        UnsubAck::new(6).into(),
        Packet::PingReq,
        Packet::PingResp,
        Packet::Disconnect,
    ]
}

#[test]
fn test_every_packet_type_round_trips() {
    let packets = sample_packets();
    assert_eq!(packets.len(), 14);

    for packet in packets {
        let len = packet.encoded_len().unwrap();
        let mut dst = vec![0u8; len];
        let written = packet.encode(&mut dst).unwrap();
        assert_eq!(written, len, "{}", packet.packet_type());

        let (decoded, consumed) = decode(&Bytes::from(dst)).unwrap();
        assert_eq!(consumed, len);
        assert_eq!(decoded, packet);
    }
}

#[test]
fn test_decode_leaves_trailing_packets() {
    let mut stream = BytesMut::new();
    for packet in sample_packets() {
        packet.encode_to(&mut stream).unwrap();
    }

    let mut src = stream.freeze();
    let mut seen = Vec::new();
    while !src.is_empty() {
        let (packet, consumed) = decode(&src).unwrap();
        seen.push(packet.packet_type());
        src = src.slice(consumed..);
    }
    assert_eq!(seen.len(), 14);
    assert_eq!(seen.first(), Some(&PacketType::Connect));
    assert_eq!(seen.last(), Some(&PacketType::Disconnect));
}

#[test]
fn test_header_only_packets() {
    for (first, expected) in [
        (0xC0u8, Packet::PingReq),
        (0xD0, Packet::PingResp),
        (0xE0, Packet::Disconnect),
    ] {
        let (packet, n) = decode(&Bytes::copy_from_slice(&[first, 0x00])).unwrap();
        assert_eq!(packet, expected);
        assert_eq!(n, 2);

        let with_body = Bytes::copy_from_slice(&[first, 0x01, 0x00]);
        assert!(matches!(decode(&with_body), Err(ProtocolError::InvalidLength)));
    }
}

#[test]
fn test_reserved_packet_types() {
    for first in [0x00u8, 0xF0] {
        let src = Bytes::copy_from_slice(&[first, 0x00]);
        assert!(matches!(
            decode(&src),
            Err(ProtocolError::InvalidMessageType(_))
        ));
    }
    assert!(peek_type(&[0xF0]).is_err());
    assert_eq!(peek_type(&[]).unwrap(), None);
    assert_eq!(peek_type(&[0x30]).unwrap(), Some(PacketType::Publish));
}

#[test]
fn test_trailing_bytes_inside_remaining_length() {
    // PUBACK declares three bytes but only uses two
    let src = Bytes::from_static(&[0x40, 0x03, 0x00, 0x01, 0xFF]);
    assert!(matches!(decode(&src), Err(ProtocolError::InvalidLength)));

    // UNSUBSCRIBE whose last filter is cut short
    let src = Bytes::from_static(&[0xA2, 0x05, 0x00, 0x01, 0x00, 0x05, b'a']);
    assert!(matches!(
        decode(&src),
        Err(ProtocolError::InsufficientBufferSize)
    ));
}

#[test]
fn test_decode_from_slice_owns_frame() {
    let packet = Packet::from(Publish::new("t", QoS::AtMostOnce, "abc"));
    let mut wire = packet.to_bytes().unwrap().to_vec();
    wire.extend_from_slice(&[0xC0, 0x00]);

    let (decoded, consumed) = decode_from_slice(&wire).unwrap();
    wire.clear();
    assert_eq!(decoded, packet);
    assert_eq!(consumed, 8);
}

#[test]
fn test_encode_to_rolls_back_on_error() {
    let mut dst = BytesMut::from(&b"keep"[..]);
    let bad = Packet::from(PubAck::new(0));
    assert!(bad.encode_to(&mut dst).is_err());
    assert_eq!(&dst[..], b"keep");

    let good = Packet::from(PubAck::new(1));
    assert_eq!(good.encode_to(&mut dst).unwrap(), 4);
    assert_eq!(&dst[..], b"keep\x40\x02\x00\x01");
}

#[test]
fn test_large_publish_uses_multi_byte_length() {
    let payload = vec![0xAB; 20_000];
    let packet = Packet::from(Publish::new("big", QoS::AtMostOnce, payload));
    let bytes = packet.to_bytes().unwrap();
    // 5 (topic) + 20_000 payload = 20_005 => three varint bytes
    assert_eq!(bytes.len(), 1 + 3 + 20_005);
    assert_eq!(decode(&bytes).unwrap().0, packet);
}
