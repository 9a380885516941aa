use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Size of the `header_length` prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Fixed header: pad (1) + crc (4) + payload_length (4) = 9 bytes, unpadded.
pub const HEADER_SIZE: usize = 9;

/// Maximum payload length accepted on the wire.
pub const MAX_PAYLOAD_LEN: u32 = 0x60_0000;

/// Payload limit of first-generation coprocessors.
pub const FIRST_GEN_MAX_PAYLOAD_LEN: u32 = 0x20_0000;

/// Additive checksum: the sum of every byte, modulo 2^32.
///
/// Detects accidental corruption only. Byte permutations and sums that wrap
/// to the same value collide.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)))
}

/// Parsed frame header.
///
/// Wire format (all fields little-endian, no padding between them):
/// ```text
/// ┌──────────────┬──────────┬───────────┬──────────────┬──────────────────┐
/// │ header_len   │ pad      │ crc       │ payload_len  │ payload          │
/// │ (4B)         │ (1B)     │ (4B)      │ (4B)         │ (payload_len B)  │
/// └──────────────┴──────────┴───────────┴──────────────┴──────────────────┘
///                └────────── header_len bytes ─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub pad: u8,
    pub crc: u32,
    pub payload_len: u32,
}

impl FrameHeader {
    /// Header describing `payload`.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            pad: 0,
            crc: checksum(payload),
            payload_len: payload.len() as u32,
        }
    }

    /// Parse `raw` header bytes.
    ///
    /// `raw` is either the full [`HEADER_SIZE`] layout or a shorter prefix
    /// sent by older peers. Fields, or parts of fields, past the end of a
    /// prefix read as zero. Callers must reject `raw.len() > HEADER_SIZE`
    /// before calling; extra bytes are ignored.
    pub fn parse(raw: &[u8]) -> Self {
        let mut full = [0u8; HEADER_SIZE];
        let n = raw.len().min(HEADER_SIZE);
        full[..n].copy_from_slice(&raw[..n]);

        let mut fields = &full[..];
        Self {
            pad: fields.get_u8(),
            crc: fields.get_u32_le(),
            payload_len: fields.get_u32_le(),
        }
    }

    /// Validate `payload_len` against `max`.
    ///
    /// Uses the unsigned-underflow rule `payload_len - 1 < max`, which rejects
    /// zero as well as anything above `max`.
    pub fn checked_payload_len(&self, max: u32) -> Result<usize> {
        if self.payload_len.wrapping_sub(1) >= max {
            return Err(FrameError::InvalidPayloadLength {
                len: self.payload_len,
                max,
            });
        }
        Ok(self.payload_len as usize)
    }

    /// Verify `payload` against the header checksum.
    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        let actual = checksum(payload);
        if actual != self.crc {
            return Err(FrameError::ChecksumMismatch {
                expected: self.crc,
                actual,
            });
        }
        Ok(())
    }

    fn put(&self, dst: &mut BytesMut) {
        dst.put_u8(self.pad);
        dst.put_u32_le(self.crc);
        dst.put_u32_le(self.payload_len);
    }
}

/// Read the `header_length` prefix and reject oversized headers.
pub(crate) fn parse_header_len(prefix: [u8; LENGTH_PREFIX_SIZE]) -> Result<usize> {
    let header_len = u32::from_le_bytes(prefix);
    if header_len as usize > HEADER_SIZE {
        return Err(FrameError::HeaderTooLarge {
            len: header_len,
            max: HEADER_SIZE,
        });
    }
    Ok(header_len as usize)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload length. Default: [`MAX_PAYLOAD_LEN`].
    pub max_payload_len: u32,
}

impl FrameConfig {
    /// Limits for first-generation coprocessors.
    pub fn first_generation() -> Self {
        Self {
            max_payload_len: FIRST_GEN_MAX_PAYLOAD_LEN,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_len: MAX_PAYLOAD_LEN,
        }
    }
}

/// Encode `payload` as one frame into `dst`.
///
/// Payloads must be `1..=max_payload_len - 1` bytes.
pub fn encode_frame(payload: &[u8], config: &FrameConfig, dst: &mut BytesMut) -> Result<()> {
    let max = (config.max_payload_len as usize).saturating_sub(1);
    if payload.is_empty() || payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }

    dst.reserve(LENGTH_PREFIX_SIZE + HEADER_SIZE + payload.len());
    dst.put_u32_le(HEADER_SIZE as u32);
    FrameHeader::for_payload(payload).put(dst);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// Validation happens as soon as each part is buffered: the header length
/// before the header, the payload length before the payload. On success the
/// frame bytes are consumed and the verified payload is returned.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
    let header_len = parse_header_len(prefix)?;

    let header_end = LENGTH_PREFIX_SIZE + header_len;
    if src.len() < header_end {
        return Ok(None);
    }

    let header = FrameHeader::parse(&src[LENGTH_PREFIX_SIZE..header_end]);
    let payload_len = header.checked_payload_len(config.max_payload_len)?;

    if src.len() < header_end + payload_len {
        src.reserve(header_end + payload_len - src.len());
        return Ok(None);
    }

    src.advance(header_end);
    let payload = src.split_to(payload_len).freeze();
    header.verify(&payload)?;
    Ok(Some(payload))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Raw frame bytes with arbitrary header fields.
    pub(crate) fn raw_frame(header_len: u32, header: &[u8], payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32_le(header_len);
        buf.put_slice(header);
        buf.put_slice(payload);
        buf
    }

    pub(crate) fn header_bytes(crc: u32, payload_len: u32) -> Vec<u8> {
        let mut h = BytesMut::new();
        FrameHeader {
            pad: 0,
            crc,
            payload_len,
        }
        .put(&mut h);
        h.to_vec()
    }

    #[test]
    fn checksum_is_additive() {
        assert_eq!(checksum(b""), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xFF; 4]), 0x3FC);
        // Permutations collide.
        assert_eq!(checksum(b"abc"), checksum(b"cba"));
        // Distinct sums differ.
        assert_ne!(checksum(b"abc"), checksum(b"abd"));
    }

    #[test]
    fn checksum_wraps_modulo_u32() {
        assert_eq!(checksum(&[0xFF, 0xFF, 0xFF]), 0xFF * 3);
        // Large payloads keep summing without overflow panics.
        let big = vec![0xFFu8; 0x10_0000];
        assert_eq!(checksum(&big), 0xFF * 0x10_0000);
    }

    #[test]
    fn encode_layout() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &FrameConfig::default(), &mut buf).unwrap();

        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + HEADER_SIZE + 5);
        assert_eq!(&buf[..4], &(HEADER_SIZE as u32).to_le_bytes());
        assert_eq!(buf[4], 0);
        assert_eq!(&buf[5..9], &checksum(b"hello").to_le_bytes());
        assert_eq!(&buf[9..13], &5u32.to_le_bytes());
        assert_eq!(&buf[13..], b"hello");
    }

    #[test]
    fn encode_decode_roundtrip() {
        let config = FrameConfig::default();
        let mut buf = BytesMut::new();
        let payload = b"hello, coprocessor";

        encode_frame(payload, &config, &mut buf).unwrap();
        let decoded = decode_frame(&mut buf, &config).unwrap().unwrap();

        assert_eq!(decoded.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_empty_and_oversized() {
        let config = FrameConfig { max_payload_len: 8 };
        let mut buf = BytesMut::new();

        let err = encode_frame(b"", &config, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 0, max: 7 }));

        let err = encode_frame(&[1u8; 8], &config, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 8, .. }));

        encode_frame(&[1u8; 7], &config, &mut buf).unwrap();
        assert!(!buf.is_empty());
    }

    #[test]
    fn decode_incomplete_returns_none() {
        let config = FrameConfig::default();
        let mut full = BytesMut::new();
        encode_frame(b"partial", &config, &mut full).unwrap();

        for cut in [0, 3, 4, 8, LENGTH_PREFIX_SIZE + HEADER_SIZE, full.len() - 1] {
            let mut buf = BytesMut::from(&full[..cut]);
            assert!(decode_frame(&mut buf, &config).unwrap().is_none(), "cut {cut}");
        }
    }

    #[test]
    fn decode_rejects_oversized_header_before_header_bytes_arrive() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(HEADER_SIZE as u32 + 1);

        let err = decode_frame(&mut buf, &FrameConfig::default()).unwrap_err();
        assert!(matches!(err, FrameError::HeaderTooLarge { len: 10, max: 9 }));
    }

    #[test]
    fn decode_rejects_zero_payload_length() {
        let mut buf = raw_frame(HEADER_SIZE as u32, &header_bytes(0, 0), b"");
        let err = decode_frame(&mut buf, &FrameConfig::default()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidPayloadLength { len: 0, .. }));
    }

    #[test]
    fn decode_rejects_payload_length_above_max() {
        let mut buf = raw_frame(
            HEADER_SIZE as u32,
            &header_bytes(0, MAX_PAYLOAD_LEN + 1),
            b"",
        );
        let err = decode_frame(&mut buf, &FrameConfig::default()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidPayloadLength { .. }));
    }

    #[test]
    fn decode_accepts_payload_length_at_max() {
        let header = FrameHeader {
            pad: 0,
            crc: 0,
            payload_len: MAX_PAYLOAD_LEN,
        };
        assert_eq!(
            header.checked_payload_len(MAX_PAYLOAD_LEN).unwrap(),
            MAX_PAYLOAD_LEN as usize
        );
    }

    #[test]
    fn decode_detects_checksum_mismatch() {
        let config = FrameConfig::default();
        let mut buf = BytesMut::new();
        encode_frame(b"integrity", &config, &mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0x01;

        let err = decode_frame(&mut buf, &config).unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
    }

    #[test]
    fn every_single_byte_flip_is_detected() {
        let config = FrameConfig::default();
        let payload = b"{\"Command\":6}";
        let mut wire = BytesMut::new();
        encode_frame(payload, &config, &mut wire).unwrap();
        let start = LENGTH_PREFIX_SIZE + HEADER_SIZE;

        for i in start..wire.len() {
            let mut corrupted = wire.clone();
            corrupted[i] ^= 0x80;
            let err = decode_frame(&mut corrupted, &config).unwrap_err();
            assert!(matches!(err, FrameError::ChecksumMismatch { .. }), "byte {i}");
        }
    }

    #[test]
    fn equal_sum_substitution_is_accepted() {
        // The checksum is additive: a different payload with the same byte
        // sum passes verification.
        let config = FrameConfig::default();
        let mut buf = raw_frame(
            HEADER_SIZE as u32,
            &header_bytes(checksum(b"ab"), 2),
            b"ba",
        );
        let payload = decode_frame(&mut buf, &config).unwrap().unwrap();
        assert_eq!(payload.as_ref(), b"ba");
    }

    #[test]
    fn legacy_short_header_zero_fills() {
        // A 5-byte header carries pad + crc only; payload_len reads as zero.
        let header = FrameHeader::parse(&[0x00, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(header.crc, 0x10);
        assert_eq!(header.payload_len, 0);

        // Partially present fields keep their low-order bytes.
        let header = FrameHeader::parse(&[0x07, 0x01, 0x02]);
        assert_eq!(header.pad, 7);
        assert_eq!(header.crc, 0x0201);

        assert_eq!(FrameHeader::parse(&[]), FrameHeader::default());
    }

    #[test]
    fn legacy_short_header_without_length_is_rejected() {
        let mut buf = raw_frame(5, &[0, 0, 0, 0, 0], b"x");
        let err = decode_frame(&mut buf, &FrameConfig::default()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidPayloadLength { len: 0, .. }));
    }

    #[test]
    fn first_generation_limit() {
        let config = FrameConfig::first_generation();
        let mut buf = raw_frame(
            HEADER_SIZE as u32,
            &header_bytes(0, FIRST_GEN_MAX_PAYLOAD_LEN + 1),
            b"",
        );
        let err = decode_frame(&mut buf, &config).unwrap_err();
        assert!(matches!(err, FrameError::InvalidPayloadLength { .. }));
    }

    #[test]
    fn multiple_frames() {
        let config = FrameConfig::default();
        let mut buf = BytesMut::new();
        encode_frame(b"first", &config, &mut buf).unwrap();
        encode_frame(b"second", &config, &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, &config).unwrap().unwrap();
        let f2 = decode_frame(&mut buf, &config).unwrap().unwrap();

        assert_eq!(f1.as_ref(), b"first");
        assert_eq!(f2.as_ref(), b"second");
        assert!(buf.is_empty());
    }
}
