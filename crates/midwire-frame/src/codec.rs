use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame terminator.
pub const DELIMITER: u8 = b'\n';

/// Default maximum payload size: 5 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 5 * 1024 * 1024;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (hex digits + delimiter).
    pub fn wire_size(&self) -> usize {
        frame_len(self.payload.len())
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Wire size of a frame carrying `payload_len` bytes.
pub const fn frame_len(payload_len: usize) -> usize {
    payload_len * 2 + 1
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────────────────────┬──────┐
/// │ hex(payload), lowercase        │ '\n' │
/// │ (2 × len bytes)                │ (1B) │
/// └────────────────────────────────┴──────┘
/// ```
pub fn encode_frame(payload: &[u8], max_payload: usize, dst: &mut BytesMut) -> Result<()> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }

    dst.reserve(frame_len(payload.len()));
    for &byte in payload {
        dst.put_u8(HEX_DIGITS[usize::from(byte >> 4)]);
        dst.put_u8(HEX_DIGITS[usize::from(byte & 0x0f)]);
    }
    dst.put_u8(DELIMITER);
    Ok(())
}

/// Decode one frame line.
///
/// A trailing delimiter is ignored if present. Upper- and lowercase digits
/// are accepted. A bare delimiter decodes to an empty payload.
pub fn decode_frame(line: &[u8]) -> Result<Bytes> {
    let digits = line.strip_suffix(&[DELIMITER]).unwrap_or(line);
    if digits.len() % 2 != 0 {
        return Err(FrameError::OddLength { len: digits.len() });
    }

    let mut out = BytesMut::with_capacity(digits.len() / 2);
    for (pair_idx, pair) in digits.chunks_exact(2).enumerate() {
        let offset = pair_idx * 2;
        let hi = hex_value(pair[0]).ok_or(FrameError::InvalidHex {
            offset,
            byte: pair[0],
        })?;
        let lo = hex_value(pair[1]).ok_or(FrameError::InvalidHex {
            offset: offset + 1,
            byte: pair[1],
        })?;
        out.put_u8((hi << 4) | lo);
    }

    Ok(out.freeze())
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 5 MiB.
    pub max_payload_size: usize,
}

impl FrameConfig {
    /// Longest accepted line, delimiter included.
    pub fn max_frame_len(&self) -> usize {
        self.max_payload_size.saturating_mul(2).saturating_add(1)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"GET / HTTP/1.1\r\n\r\n";

        encode_frame(payload, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        assert_eq!(buf.len(), frame_len(payload.len()));

        let decoded = decode_frame(&buf).unwrap();
        assert_eq!(decoded.as_ref(), payload);
    }

    #[test]
    fn test_encode_is_lowercase_hex() {
        let mut buf = BytesMut::new();
        encode_frame(&[0x00, 0xAB, 0x7f, 0xff], DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"00ab7fff\n");
    }

    #[test]
    fn test_encode_appends_to_existing_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(b"a", DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        encode_frame(b"b", DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"61\n62\n");
    }

    #[test]
    fn test_empty_payload_rejected() {
        let mut buf = BytesMut::new();
        let err = encode_frame(b"", DEFAULT_MAX_PAYLOAD, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::EmptyPayload));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_payload_too_large() {
        let mut buf = BytesMut::new();
        let err = encode_frame(b"12345", 4, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size: 5, max: 4 }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_payload_at_limit_accepted() {
        let mut buf = BytesMut::new();
        encode_frame(b"1234", 4, &mut buf).unwrap();
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn test_decode_without_delimiter() {
        assert_eq!(decode_frame(b"616263").unwrap().as_ref(), b"abc");
    }

    #[test]
    fn test_decode_accepts_uppercase() {
        assert_eq!(decode_frame(b"4A4b\n").unwrap().as_ref(), b"JK");
    }

    #[test]
    fn test_decode_odd_length() {
        let err = decode_frame(b"616\n").unwrap_err();
        assert!(matches!(err, FrameError::OddLength { len: 3 }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_invalid_digit() {
        let err = decode_frame(b"61zz\n").unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidHex {
                offset: 2,
                byte: b'z'
            }
        ));
    }

    #[test]
    fn test_decode_rejects_carriage_return() {
        let err = decode_frame(b"6162\r\n").unwrap_err();
        assert!(matches!(err, FrameError::OddLength { len: 5 }));
    }

    #[test]
    fn test_decode_bare_delimiter_is_empty() {
        assert!(decode_frame(b"\n").unwrap().is_empty());
    }

    #[test]
    fn test_all_byte_values() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let mut buf = BytesMut::new();
        encode_frame(&payload, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        assert!(!buf[..buf.len() - 1].contains(&DELIMITER));
        assert_eq!(decode_frame(&buf).unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), 9);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_config_max_frame_len() {
        let cfg = FrameConfig::default();
        assert_eq!(cfg.max_payload_size, 5 * 1024 * 1024);
        assert_eq!(cfg.max_frame_len(), 10 * 1024 * 1024 + 1);

        let unbounded = FrameConfig {
            max_payload_size: usize::MAX,
        };
        assert_eq!(unbounded.max_frame_len(), usize::MAX);
    }
}
