//! Fragment and Acknowledgment Wire Formats
//!
//! Two packet shapes travel over the link. A data fragment carries its payload
//! first, followed by a fixed 12-byte trailer of three little-endian `u32`
//! fields:
//!
//! ```text
//! [payload bytes][sequence_id: u32 LE][fragment_count: u32 LE][crc32(payload): u32 LE]
//! ```
//!
//! An acknowledgment is a bare `[sequence_id: u32 LE]`, exactly 4 bytes.
//!
//! The codec never rejects a fragment because of its checksum. Decoding hands
//! back whatever was on the wire and [`Fragment::checksum_ok`] tells the caller
//! whether the payload survived the trip.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the fragment trailer in bytes (3 fields × 4 bytes each)
pub const HEADER_SIZE: usize = 12;

/// Size of an acknowledgment packet in bytes
pub const ACK_SIZE: usize = 4;

/// Link MTU used when nothing else is configured
pub const DEFAULT_MTU: usize = 1500;

/// CRC-32 (IEEE, zlib polynomial) of a payload
#[inline]
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Decoded data fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Application bytes carried by this fragment
    pub payload: Bytes,
    /// Sequence id assigned by the sender
    pub sequence_id: u32,
    /// Number of fragments the originating write was split into
    pub fragment_count: u32,
    /// Checksum as it arrived on the wire
    pub checksum: u32,
}

impl Fragment {
    /// Whether the embedded checksum matches the payload
    pub fn checksum_ok(&self) -> bool {
        checksum(&self.payload) == self.checksum
    }

    /// Total size of the encoded fragment
    pub fn size(&self) -> usize {
        self.payload.len() + HEADER_SIZE
    }
}

/// Encode a data fragment, computing the payload checksum.
///
/// Fails with [`PacketError::PayloadTooLarge`] when the encoded fragment would
/// not fit in `mtu` bytes.
pub fn encode_fragment(
    payload: &[u8],
    sequence_id: u32,
    fragment_count: u32,
    mtu: usize,
) -> Result<Bytes, PacketError> {
    let max = mtu.saturating_sub(HEADER_SIZE);
    if payload.len() > max {
        return Err(PacketError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }

    let mut buf = BytesMut::with_capacity(payload.len() + HEADER_SIZE);
    buf.put_slice(payload);
    buf.put_u32_le(sequence_id);
    buf.put_u32_le(fragment_count);
    buf.put_u32_le(checksum(payload));
    Ok(buf.freeze())
}

/// Decode a data fragment. The payload is everything before the trailer.
pub fn decode_fragment(bytes: &[u8]) -> Result<Fragment, PacketError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PacketError::InsufficientData {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let split = bytes.len() - HEADER_SIZE;
    let mut trailer = &bytes[split..];
    Ok(Fragment {
        payload: Bytes::copy_from_slice(&bytes[..split]),
        sequence_id: trailer.get_u32_le(),
        fragment_count: trailer.get_u32_le(),
        checksum: trailer.get_u32_le(),
    })
}

/// Encode an acknowledgment for `sequence_id`
pub fn encode_ack(sequence_id: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(ACK_SIZE);
    buf.put_u32_le(sequence_id);
    buf.freeze()
}

/// Decode an acknowledgment
pub fn decode_ack(bytes: &[u8]) -> Result<u32, PacketError> {
    if bytes.len() != ACK_SIZE {
        return Err(PacketError::InvalidAckLength(bytes.len()));
    }

    let mut buf = bytes;
    Ok(buf.get_u32_le())
}

/// Packet encoding and decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Invalid acknowledgment length: {0} bytes (expected 4)")]
    InvalidAckLength(usize),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_layout() {
        let bytes = encode_fragment(b"abc", 7, 2, DEFAULT_MTU).unwrap();

        assert_eq!(bytes.len(), 3 + HEADER_SIZE);
        assert_eq!(&bytes[..3], b"abc");
        assert_eq!(&bytes[3..7], &7u32.to_le_bytes());
        assert_eq!(&bytes[7..11], &2u32.to_le_bytes());
        assert_eq!(&bytes[11..15], &checksum(b"abc").to_le_bytes());
    }

    #[test]
    fn test_checksum_matches_zlib() {
        // zlib.crc32(b"123456789")
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
        assert_eq!(checksum(b""), 0);
    }

    #[test]
    fn test_fragment_decode() {
        let bytes = encode_fragment(b"hello", 1999, 3, DEFAULT_MTU).unwrap();
        let fragment = decode_fragment(&bytes).unwrap();

        assert_eq!(&fragment.payload[..], b"hello");
        assert_eq!(fragment.sequence_id, 1999);
        assert_eq!(fragment.fragment_count, 3);
        assert!(fragment.checksum_ok());
        assert_eq!(fragment.size(), bytes.len());
    }

    #[test]
    fn test_empty_payload() {
        let bytes = encode_fragment(b"", 0, 1, DEFAULT_MTU).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let fragment = decode_fragment(&bytes).unwrap();
        assert!(fragment.payload.is_empty());
        assert!(fragment.checksum_ok());
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; 39];
        let err = encode_fragment(&payload, 0, 1, 50).unwrap_err();
        assert_eq!(err, PacketError::PayloadTooLarge { size: 39, max: 38 });

        // Exactly filling the MTU is fine
        assert!(encode_fragment(&payload[..38], 0, 1, 50).is_ok());
    }

    #[test]
    fn test_short_fragment_rejected() {
        let err = decode_fragment(&[0u8; 11]).unwrap_err();
        assert_eq!(
            err,
            PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: 11
            }
        );
    }

    #[test]
    fn test_corruption_reported_not_rejected() {
        let mut bytes = encode_fragment(b"payload", 5, 1, DEFAULT_MTU).unwrap().to_vec();
        bytes[2] ^= 0x10;

        let fragment = decode_fragment(&bytes).unwrap();
        assert_eq!(fragment.sequence_id, 5);
        assert!(!fragment.checksum_ok());
    }

    #[test]
    fn test_ack_layout() {
        let ack = encode_ack(0x0102_0304);
        assert_eq!(&ack[..], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(decode_ack(&ack).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_ack_wrong_length() {
        assert_eq!(decode_ack(&[1, 2, 3]), Err(PacketError::InvalidAckLength(3)));
        assert_eq!(
            decode_ack(&[1, 2, 3, 4, 5]),
            Err(PacketError::InvalidAckLength(5))
        );
    }
}
