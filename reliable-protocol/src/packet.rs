//! Packet Structures and Serialization
//!
//! Two packet variants share one 8-byte prefix. All multi-byte fields are
//! big-endian:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Checksum            |            Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Acknowledgment Number                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Sequence Number (data only)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Payload, 0-500 bytes (data only)              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! An ACK is exactly [`ACK_PACKET_LEN`] bytes. A data packet is
//! [`DATA_HEADER_LEN`] bytes plus its payload. The length field always holds
//! the full encoded size, so the variant is recovered from it on decode.
//!
//! Checksum and length are not stored in the packet values; they are derived
//! on every [`Packet::encode`].

use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Size of an ACK packet on the wire
pub const ACK_PACKET_LEN: usize = 8;

/// Size of the data packet header (checksum, length, ack, seq)
pub const DATA_HEADER_LEN: usize = 12;

/// Maximum payload carried by one data packet
pub const MAX_PAYLOAD_SIZE: usize = 500;

/// Largest datagram the protocol ever produces
pub const MAX_PACKET_SIZE: usize = DATA_HEADER_LEN + MAX_PAYLOAD_SIZE;

/// Largest size the length field can describe
pub const MAX_DATAGRAM_LEN: usize = u16::MAX as usize;

const CHECKSUM_LEN: usize = 2;

/// Cumulative acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPacket {
    /// Next sequence number the receiver expects
    pub ack_number: SeqNumber,
}

impl AckPacket {
    pub fn new(ack_number: SeqNumber) -> Self {
        AckPacket { ack_number }
    }

    /// Total size of the packet
    pub fn size(&self) -> usize {
        ACK_PACKET_LEN
    }
}

/// Data packet
///
/// Built only by [`DataPacket::new`] or [`Packet::decode`], so the encoded
/// size always fits the 16-bit length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Carried on the wire but never interpreted by receivers
    pub(crate) ack_number: u32,
    pub(crate) seq: SeqNumber,
    pub(crate) payload: Bytes,
}

impl DataPacket {
    /// Create a new data packet
    ///
    /// Fails if `payload` exceeds [`MAX_PAYLOAD_SIZE`].
    pub fn new(seq: SeqNumber, payload: Bytes) -> Result<Self, PacketError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(DataPacket {
            ack_number: 0,
            seq,
            payload,
        })
    }

    pub fn seq(&self) -> SeqNumber {
        self.seq
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Acknowledgment field as received; zero on packets this crate sends
    pub fn ack_number(&self) -> u32 {
        self.ack_number
    }

    /// Total size of the packet (header + payload)
    pub fn size(&self) -> usize {
        DATA_HEADER_LEN + self.payload.len()
    }
}

/// Unified packet type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Ack(AckPacket),
    Data(DataPacket),
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Ack(_) => PacketKind::Ack,
            Packet::Data(_) => PacketKind::Data,
        }
    }

    /// Total size of the packet
    pub fn size(&self) -> usize {
        match self {
            Packet::Ack(p) => p.size(),
            Packet::Data(p) => p.size(),
        }
    }

    /// Serialize the packet with a freshly computed checksum
    pub fn encode(&self) -> Bytes {
        let size = self.size();
        let mut buf = BytesMut::with_capacity(size);

        // Checksum is computed with this field zeroed.
        buf.put_u16(0);
        debug_assert!(size <= MAX_DATAGRAM_LEN);
        buf.put_u16(size as u16);

        match self {
            Packet::Ack(p) => {
                buf.put_u32(p.ack_number.as_raw());
            }
            Packet::Data(p) => {
                buf.put_u32(p.ack_number);
                buf.put_u32(p.seq.as_raw());
                buf.put_slice(&p.payload);
            }
        }

        let checksum = internet_checksum(&buf);
        buf[..CHECKSUM_LEN].copy_from_slice(&checksum.to_be_bytes());
        buf.freeze()
    }

    /// Parse a packet, verifying the checksum before reading any other field
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < ACK_PACKET_LEN {
            return Err(PacketError::Truncated {
                actual: bytes.len(),
            });
        }

        let stored = u16::from_be_bytes([bytes[0], bytes[1]]);
        // The checksum occupies the first 16-bit word, so skipping it is the
        // same as summing with the field zeroed.
        let computed = internet_checksum(&bytes[CHECKSUM_LEN..]);
        if stored != computed {
            return Err(PacketError::Corrupt { stored, computed });
        }

        let mut buf = &bytes[CHECKSUM_LEN..];
        let declared = buf.get_u16() as usize;
        let ack_number = buf.get_u32();

        if declared != bytes.len() {
            return Err(PacketError::LengthMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        match declared {
            ACK_PACKET_LEN => Ok(Packet::Ack(AckPacket::new(SeqNumber::new(ack_number)))),
            n if n >= DATA_HEADER_LEN => {
                let seq = SeqNumber::new(buf.get_u32());
                // Over-length payloads are left for the receive window to reject.
                Ok(Packet::Data(DataPacket {
                    ack_number,
                    seq,
                    payload: Bytes::copy_from_slice(buf),
                }))
            }
            _ => Err(PacketError::LengthMismatch {
                declared,
                actual: bytes.len(),
            }),
        }
    }
}

impl From<AckPacket> for Packet {
    fn from(p: AckPacket) -> Self {
        Packet::Ack(p)
    }
}

impl From<DataPacket> for Packet {
    fn from(p: DataPacket) -> Self {
        Packet::Data(p)
    }
}

/// Packet type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Ack,
    Data,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketKind::Ack => write!(f, "ACK"),
            PacketKind::Data => write!(f, "DATA"),
        }
    }
}

/// Packet parsing and construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Corrupt packet: stored checksum {stored:#06x}, computed {computed:#06x}")]
    Corrupt { stored: u16, computed: u16 },

    #[error("Truncated packet: {actual} bytes, need at least {}", ACK_PACKET_LEN)]
    Truncated { actual: usize },

    #[error("Length field says {declared} bytes, datagram has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Compute the Internet checksum (RFC 1071) over `data`
///
/// Sums big-endian 16-bit words, folds the carries and returns the ones'
/// complement. An odd trailing byte is padded with zero on the right.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);

    for word in &mut chunks {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
