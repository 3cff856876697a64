#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for the wire codec
//! Boundary conditions, flag validation, truncated input and malformed bodies

use bytes::Bytes;
use mqtt_wire::core::header::{FixedHeader, PacketType, MAX_REMAINING_LENGTH};
use mqtt_wire::core::primitives::{
    decode_remaining_length, encode_remaining_length, read_lp_bytes, write_lp_bytes,
    MAX_LP_STRING,
};
use mqtt_wire::core::qos::QoS;
use mqtt_wire::error::ProtocolError;
use mqtt_wire::protocol::ack::PubRel;
use mqtt_wire::protocol::connack::{ConnAck, ConnAckCode};
use mqtt_wire::protocol::connect::Connect;
use mqtt_wire::protocol::dispatcher::decode;
use mqtt_wire::protocol::packet::Packet;
use mqtt_wire::protocol::publish::Publish;
use mqtt_wire::protocol::subscribe::Subscribe;

fn decode_static(bytes: &'static [u8]) -> Result<(Packet, usize), ProtocolError> {
    decode(&Bytes::from_static(bytes))
}

// ============================================================================
// CONCRETE SCENARIOS
// ============================================================================

#[test]
fn test_connack_accepted() {
    let (packet, consumed) = decode_static(&[0x20, 0x02, 0x00, 0x00]).unwrap();
    assert_eq!(consumed, 4);
    match packet {
        Packet::ConnAck(connack) => {
            assert!(!connack.session_present);
            assert_eq!(connack.return_code, ConnAckCode::Accepted);
        }
        other => panic!("expected CONNACK, got {other:?}"),
    }
}

#[test]
fn test_connack_return_code_six_rejected() {
    assert!(matches!(
        decode_static(&[0x20, 0x02, 0x00, 0x06]),
        Err(ProtocolError::InvalidReturnCode(6))
    ));
}

#[test]
fn test_connack_reserved_bits_rejected() {
    for byte1 in [0x02u8, 0x80, 0xFE] {
        let wire = Bytes::from(vec![0x20, 0x02, byte1, 0x00]);
        assert!(
            matches!(decode(&wire), Err(ProtocolError::MalformedPacket(_))),
            "byte1 {byte1:#04x}"
        );
    }
}

#[test]
fn test_connack_return_codes_zero_to_five() {
    for code in 0u8..=5 {
        let wire = Bytes::from(vec![0x20, 0x02, 0x01, code]);
        let (packet, _) = decode(&wire).unwrap();
        let expected = ConnAck::new(ConnAckCode::try_from(code).unwrap(), true);
        assert_eq!(packet, Packet::ConnAck(expected));
    }
}

#[test]
fn test_pubrel_encoding() {
    assert!(matches!(
        Packet::PubRel(PubRel::new(0)).to_bytes(),
        Err(ProtocolError::PacketIdZero)
    ));
    assert_eq!(
        &Packet::PubRel(PubRel::new(7)).to_bytes().unwrap()[..],
        &[0x62, 0x02, 0x00, 0x07]
    );
}

// ============================================================================
// FIXED HEADER
// ============================================================================

#[test]
fn test_reserved_packet_types_rejected() {
    assert!(matches!(
        decode_static(&[0x00, 0x00]),
        Err(ProtocolError::InvalidMessageType(0))
    ));
    assert!(matches!(
        decode_static(&[0xF0, 0x00]),
        Err(ProtocolError::InvalidMessageType(15))
    ));
}

#[test]
fn test_flag_validation_grid() {
    for code in 1u8..=14 {
        let packet_type = PacketType::try_from(code).unwrap();
        for flags in 0u8..16 {
            let result = packet_type.validate_flags(flags);
            let expected_ok = match packet_type {
                PacketType::Publish => {
                    let qos = (flags >> 1) & 0x03;
                    qos != 3 && !(qos == 0 && flags & 0x08 != 0)
                }
                PacketType::PubRel | PacketType::Subscribe | PacketType::Unsubscribe => {
                    flags == 0x02
                }
                _ => flags == 0,
            };
            assert_eq!(result.is_ok(), expected_ok, "{packet_type} flags {flags:#06b}");
        }
    }
}

#[test]
fn test_publish_qos_three_in_flags() {
    assert!(matches!(
        decode_static(&[0x36, 0x05, 0x00, 0x01, b'a', 0x00, 0x01]),
        Err(ProtocolError::InvalidQos(3))
    ));
}

#[test]
fn test_remaining_length_boundaries() {
    let cases: [(usize, &[u8]); 8] = [
        (0, &[0x00]),
        (127, &[0x7F]),
        (128, &[0x80, 0x01]),
        (16_383, &[0xFF, 0x7F]),
        (16_384, &[0x80, 0x80, 0x01]),
        (2_097_151, &[0xFF, 0xFF, 0x7F]),
        (2_097_152, &[0x80, 0x80, 0x80, 0x01]),
        (MAX_REMAINING_LENGTH, &[0xFF, 0xFF, 0xFF, 0x7F]),
    ];

    for (value, wire) in cases {
        let mut dst = [0u8; 4];
        let written = encode_remaining_length(value, &mut dst).unwrap();
        assert_eq!(&dst[..written], wire, "encode {value}");
        assert_eq!(
            decode_remaining_length(wire).unwrap(),
            Some((value, wire.len()))
        );
    }

    let mut dst = [0u8; 4];
    assert!(matches!(
        encode_remaining_length(MAX_REMAINING_LENGTH + 1, &mut dst),
        Err(ProtocolError::InvalidLength)
    ));
    assert!(matches!(
        decode_remaining_length(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Err(ProtocolError::InvalidLength)
    ));
}

#[test]
fn test_header_waits_for_more_bytes() {
    assert!(FixedHeader::peek(&[]).unwrap().is_none());
    assert!(FixedHeader::peek(&[0x30, 0x80]).unwrap().is_none());
    assert!(matches!(
        FixedHeader::decode(&[0x30, 0x80]),
        Err(ProtocolError::InvalidLength)
    ));
}

#[test]
fn test_remaining_length_past_buffer() {
    assert!(matches!(
        decode_static(&[0x40, 0x02, 0x00]),
        Err(ProtocolError::InvalidLength)
    ));
}

// ============================================================================
// LENGTH-PREFIXED FIELDS
// ============================================================================

#[test]
fn test_lp_bytes_limits() {
    let mut dst = vec![0u8; MAX_LP_STRING + 2];
    let max = vec![0x5A; MAX_LP_STRING];
    assert_eq!(write_lp_bytes(&mut dst, &max).unwrap(), MAX_LP_STRING + 2);
    let (read, consumed) = read_lp_bytes(&dst).unwrap();
    assert_eq!(read.len(), MAX_LP_STRING);
    assert_eq!(consumed, MAX_LP_STRING + 2);

    let too_long = vec![0u8; MAX_LP_STRING + 1];
    assert!(matches!(
        write_lp_bytes(&mut vec![0u8; MAX_LP_STRING + 3], &too_long),
        Err(ProtocolError::InvalidLPStringSize(_))
    ));
    assert!(matches!(
        write_lp_bytes(&mut [0u8; 3], b"abc"),
        Err(ProtocolError::InsufficientBufferSize)
    ));
}

#[test]
fn test_lp_bytes_empty_and_short() {
    let (read, consumed) = read_lp_bytes(&[0x00, 0x00, 0xFF]).unwrap();
    assert!(read.is_empty());
    assert_eq!(consumed, 2);

    assert!(matches!(
        read_lp_bytes(&[0x00, 0x05, b'a']),
        Err(ProtocolError::InsufficientBufferSize)
    ));
}

// ============================================================================
// PACKET BODIES
// ============================================================================

#[test]
fn test_truncated_bodies_never_panic() {
    let packets = [
        Packet::from(Connect::new("client")),
        Packet::from(Publish::new("t/1", QoS::ExactlyOnce, "payload").with_packet_id(3)),
        Packet::from(Subscribe::new(2).add_topic("a/#", QoS::AtLeastOnce)),
    ];

    for packet in packets {
        let wire = packet.to_bytes().unwrap();
        for cut in 0..wire.len() {
            let truncated = wire.slice(..cut);
            assert!(decode(&truncated).is_err(), "{} cut at {cut}", packet.packet_type());
        }
    }
}

#[test]
fn test_ack_with_wrong_remaining_length() {
    assert!(matches!(
        decode_static(&[0x40, 0x03, 0x00, 0x01, 0x00]),
        Err(ProtocolError::InvalidLength)
    ));
    assert!(matches!(
        decode_static(&[0xC0, 0x01, 0x00]),
        Err(ProtocolError::InvalidLength)
    ));
}

#[test]
fn test_subscribe_without_topics() {
    assert!(matches!(
        decode_static(&[0x82, 0x02, 0x00, 0x01]),
        Err(ProtocolError::MalformedPacket(_))
    ));
    assert!(matches!(
        Packet::from(Subscribe::new(1)).to_bytes(),
        Err(ProtocolError::MalformedPacket(_))
    ));
}

#[test]
fn test_subscribe_requested_qos_out_of_range() {
    // packet id 1, filter "a", requested QoS 3
    assert!(matches!(
        decode_static(&[0x82, 0x06, 0x00, 0x01, 0x00, 0x01, b'a', 0x03]),
        Err(ProtocolError::InvalidQos(3))
    ));
}

#[test]
fn test_publish_topic_rules() {
    for topic in ["", "a/+", "a/#"] {
        let packet = Packet::from(Publish::new(topic, QoS::AtMostOnce, "x"));
        assert!(
            matches!(packet.to_bytes(), Err(ProtocolError::InvalidTopic(_))),
            "topic {topic:?}"
        );
    }

    let unassigned = Packet::from(Publish::new("a", QoS::AtLeastOnce, "x"));
    assert!(matches!(
        unassigned.to_bytes(),
        Err(ProtocolError::PacketIdZero)
    ));
}

#[test]
fn test_connect_refusals() {
    let mut connect = Connect::new("");
    connect.clean_session = false;
    match Packet::from(connect).to_bytes() {
        Err(ProtocolError::ConnectRefused(code)) => {
            assert_eq!(code, ConnAckCode::IdentifierRejected)
        }
        other => panic!("unexpected: {other:?}"),
    }

    // protocol level 5 is not MQTT 3.x
    let wire: &'static [u8] = &[
        0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x05, 0x02, 0x00, 0x0A, 0x00, 0x00,
    ];
    match decode_static(wire) {
        Err(err) => assert_eq!(
            err.connack_code(),
            Some(ConnAckCode::UnacceptableProtocolVersion)
        ),
        Ok(packet) => panic!("decoded {packet:?}"),
    }
}
