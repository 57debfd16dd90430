use crate::{Error, Result};

const CONTINUATION_BIT: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Returns the bytes of the varint starting at `offset` together with the offset
/// of the first byte after it.
///
/// The varint ends with the first byte whose high bit is clear.
pub fn read_varint(bytes: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let tail = bytes
        .get(offset..)
        .ok_or(Error::TruncatedVarint { offset })?;

    match tail.iter().position(|b| b & CONTINUATION_BIT == 0) {
        Some(last) => Ok((&tail[..=last], offset + last + 1)),
        None => Err(Error::TruncatedVarint { offset }),
    }
}

/// Decodes Bitcoin Core's MSB-first varint.
///
/// Every continuation byte adds one to the accumulator, which keeps the
/// encoding minimal: `[0x80, 0x01]` is 129, not 1.
/// Ref: <https://github.com/bitcoin/bitcoin/blob/aa87e0b44600a32b32a4b123d4f90d097f1f106f/src/serialize.h#L452>
pub fn decode_varint(bytes: &[u8]) -> Result<u64> {
    let mut n = 0u64;

    for &byte in bytes {
        if n > (u64::MAX >> 7) {
            return Err(Error::VarintOverflow);
        }

        n = (n << 7) | u64::from(byte & PAYLOAD_MASK);

        if byte & CONTINUATION_BIT != 0 {
            n = n.checked_add(1).ok_or(Error::VarintOverflow)?;
        }
    }

    Ok(n)
}

/// Reads and decodes the varint at `*offset`, advancing the offset past it.
pub fn next_varint(bytes: &[u8], offset: &mut usize) -> Result<u64> {
    let (raw, next) = read_varint(bytes, *offset)?;
    let value = decode_varint(raw)?;
    *offset = next;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chainstate_test_utils::encode_varint;

    fn decode_all(bytes: &[u8]) -> Result<u64> {
        let mut offset = 0;
        next_varint(bytes, &mut offset)
    }

    #[test]
    fn test_single_byte() {
        assert_eq!(decode_varint(&[0x00]).unwrap(), 0);
        assert_eq!(decode_varint(&[0x03]).unwrap(), 3);
        assert_eq!(decode_varint(&[0x7F]).unwrap(), 127);
    }

    #[test]
    fn test_multi_byte() {
        assert_eq!(decode_varint(&[0x80, 0x00]).unwrap(), 128);
        assert_eq!(decode_varint(&[0x80, 0x01]).unwrap(), 129);
        assert_eq!(decode_varint(&[0x81, 0x00]).unwrap(), 256);
        assert_eq!(decode_varint(&[0xFF, 0x7F]).unwrap(), 16511);
        assert_eq!(decode_varint(&[0x80, 0x80, 0x00]).unwrap(), 16512);
    }

    #[test]
    fn test_bitcoin_core_vectors() {
        // Ref: <https://github.com/bitcoin/bitcoin/blob/8d801e3efbf1e3b1f9a0060b777788f271cb21c9/src/test/streams_tests.cpp#L179>
        assert_eq!(decode_all(&[0x82, 0xA7, 0x31]).unwrap(), 54321);
        assert_eq!(decode_all(&[0x8A, 0x95, 0xC0, 0xBB, 0x00]).unwrap(), 3_000_000_000);
    }

    #[test]
    fn test_read_stops_at_terminator() {
        let bytes = [0x05, 0x80, 0x01, 0xAA];
        let (raw, offset) = read_varint(&bytes, 0).unwrap();
        assert_eq!(raw, &[0x05]);
        assert_eq!(offset, 1);

        let (raw, offset) = read_varint(&bytes, offset).unwrap();
        assert_eq!(raw, &[0x80, 0x01]);
        assert_eq!(offset, 3);
    }

    #[test]
    fn test_truncated() {
        assert_matches!(
            read_varint(&[0x80, 0xFF, 0x81], 0),
            Err(Error::TruncatedVarint { offset: 0 })
        );
        assert_matches!(read_varint(&[], 0), Err(Error::TruncatedVarint { .. }));
        assert_matches!(read_varint(&[0x01], 5), Err(Error::TruncatedVarint { offset: 5 }));
    }

    #[test]
    fn test_overflow() {
        assert_eq!(decode_varint(&[0xFF; 10]), Err(Error::VarintOverflow));
    }

    #[test]
    fn test_next_varint_advances_offset() {
        let mut bytes = encode_varint(300);
        bytes.extend(encode_varint(7));
        let mut offset = 0;
        assert_eq!(next_varint(&bytes, &mut offset).unwrap(), 300);
        assert_eq!(next_varint(&bytes, &mut offset).unwrap(), 7);
        assert_eq!(offset, bytes.len());
    }

    #[test]
    fn test_encoder_agrees() {
        for n in [0, 1, 127, 128, 129, 16511, 16512, 54321, u32::MAX as u64, u64::MAX] {
            assert_eq!(decode_all(&encode_varint(n)).unwrap(), n, "value {}", n);
        }
    }
}
