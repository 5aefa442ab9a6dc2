//! Property-based tests for the packet codec and sequence arithmetic
//!
//! These tests use proptest to generate random packets and verify that
//! encoding/decoding roundtrips and that damage is always detected.

use bytes::Bytes;
use proptest::prelude::*;
use reliable_protocol::packet::{
    AckPacket, DataPacket, Packet, PacketError, ACK_PACKET_LEN, DATA_HEADER_LEN, MAX_PAYLOAD_SIZE,
};
use reliable_protocol::sequence::SeqNumber;

// Property test strategies

fn seq_number_strategy() -> impl Strategy<Value = SeqNumber> {
    any::<u32>().prop_map(SeqNumber::new)
}

fn payload_strategy() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_SIZE).prop_map(Bytes::from)
}

fn packet_strategy() -> impl Strategy<Value = Packet> {
    prop_oneof![
        seq_number_strategy().prop_map(|ack| Packet::Ack(AckPacket::new(ack))),
        (seq_number_strategy(), payload_strategy())
            .prop_map(|(seq, payload)| Packet::Data(DataPacket::new(seq, payload).unwrap())),
    ]
}

// Property tests

proptest! {
    #[test]
    fn prop_packet_roundtrip(packet in packet_strategy()) {
        let encoded = packet.encode();
        prop_assert_eq!(encoded.len(), packet.size());

        let decoded = Packet::decode(&encoded).unwrap();
        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn prop_length_field_matches_size(packet in packet_strategy()) {
        let encoded = packet.encode();
        let declared = u16::from_be_bytes([encoded[2], encoded[3]]) as usize;
        prop_assert_eq!(declared, encoded.len());
    }

    #[test]
    fn prop_data_ack_field_is_zero(seq in seq_number_strategy(), payload in payload_strategy()) {
        let encoded = Packet::Data(DataPacket::new(seq, payload).unwrap()).encode();
        prop_assert_eq!(&encoded[4..8], &[0u8; 4][..]);
        prop_assert!(encoded.len() >= DATA_HEADER_LEN);
    }

    #[test]
    fn prop_single_bit_flip_detected(
        packet in packet_strategy(),
        bit in any::<prop::sample::Index>(),
    ) {
        let mut encoded = packet.encode().to_vec();
        // Anything past the checksum field itself.
        let covered_bits = (encoded.len() - 2) * 8;
        let bit = 16 + bit.index(covered_bits);
        encoded[bit / 8] ^= 0x80 >> (bit % 8);

        let result = Packet::decode(&encoded);
        prop_assert!(
            matches!(result, Err(PacketError::Corrupt { .. })),
            "bit {} flip gave {:?}",
            bit,
            result
        );
    }

    #[test]
    fn prop_truncated_datagram_rejected(packet in packet_strategy(), cut in any::<prop::sample::Index>()) {
        let encoded = packet.encode();
        let keep = cut.index(encoded.len());
        let result = Packet::decode(&encoded[..keep]);

        if keep < ACK_PACKET_LEN {
            prop_assert!(
                matches!(result, Err(PacketError::Truncated { actual }) if actual == keep),
                "expected truncation error, got {:?}",
                result
            );
        } else {
            prop_assert!(result.is_err());
        }
    }

    #[test]
    fn prop_oversized_payload_refused(seq in seq_number_strategy(), extra in 1usize..64) {
        let payload = Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE + extra]);
        let result = DataPacket::new(seq, payload);
        prop_assert!(
            matches!(result, Err(PacketError::PayloadTooLarge { size, .. }) if size == MAX_PAYLOAD_SIZE + extra),
            "oversized payload accepted"
        );
    }

    #[test]
    fn prop_sequence_distance_roundtrip(base in any::<u32>(), delta in (i32::MIN + 1)..=i32::MAX) {
        let a = SeqNumber::new(base);
        let b = SeqNumber::new(base.wrapping_add(delta as u32));

        prop_assert_eq!(a.distance_to(b), delta);
        prop_assert_eq!(b.distance_to(a), -delta);
        prop_assert_eq!(a.lt(b), delta > 0);
        prop_assert_eq!(a.gt(b), delta < 0);
    }

    #[test]
    fn prop_sequence_window_membership(start in any::<u32>(), offset in 0u32..1024, len in 1usize..512) {
        let start = SeqNumber::new(start);
        let seq = SeqNumber::new(start.as_raw().wrapping_add(offset));
        prop_assert_eq!(seq.in_window(start, len), (offset as usize) < len);
    }
}
