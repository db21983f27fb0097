//! `VarInt` and `VarLong` encoding/decoding for Minecraft protocol.
//!
//! Minecraft uses a variable-length integer encoding where each byte
//! uses 7 bits for data and 1 bit to indicate if more bytes follow.
//! Groups are emitted least significant first.

use crate::error::{ProtocolError, Result};

/// Segment bits mask (lower 7 bits).
pub const SEGMENT_BITS: u8 = 0x7F;

/// Continue bit (high bit).
pub const CONTINUE_BIT: u8 = 0x80;

/// Longest possible `VarInt` encoding.
pub const MAX_VARINT_LEN: usize = 5;

/// Longest possible `VarLong` encoding.
pub const MAX_VARLONG_LEN: usize = 10;

/// Write a `VarInt` to a byte buffer synchronously.
///
/// Returns the number of bytes written.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub fn write_varint_sync(buf: &mut Vec<u8>, mut value: i32) -> usize {
    let mut bytes_written = 0;

    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = (value & i32::from(SEGMENT_BITS)) as u8;
        value = ((value as u32) >> 7) as i32;

        if value != 0 {
            byte |= CONTINUE_BIT;
        }

        buf.push(byte);
        bytes_written += 1;

        if value == 0 {
            break;
        }
    }

    bytes_written
}

/// Write a `VarLong` to a byte buffer synchronously.
///
/// Returns the number of bytes written.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub fn write_varlong_sync(buf: &mut Vec<u8>, mut value: i64) -> usize {
    let mut bytes_written = 0;

    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = (value & i64::from(SEGMENT_BITS)) as u8;
        value = ((value as u64) >> 7) as i64;

        if value != 0 {
            byte |= CONTINUE_BIT;
        }

        buf.push(byte);
        bytes_written += 1;

        if value == 0 {
            break;
        }
    }

    bytes_written
}

/// Decode a `VarInt` from the front of a slice.
///
/// Returns `Ok(None)` when the slice ends before the terminating byte,
/// otherwise the value and the number of bytes it occupied.
///
/// # Errors
///
/// Returns [`ProtocolError::VarIntTooLong`] for encodings longer than 5 bytes.
pub fn peek_varint(bytes: &[u8]) -> Result<Option<(i32, usize)>> {
    let mut value: i32 = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(ProtocolError::VarIntTooLong);
        }

        #[allow(clippy::cast_possible_truncation)]
        let shift = (i * 7) as u32;
        value |= i32::from(byte & SEGMENT_BITS) << shift;

        if byte & CONTINUE_BIT == 0 {
            return Ok(Some((value, i + 1)));
        }
    }

    if bytes.len() >= MAX_VARINT_LEN {
        return Err(ProtocolError::VarIntTooLong);
    }

    Ok(None)
}

/// Calculate the number of bytes needed to encode a `VarInt`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn varint_len(value: i32) -> usize {
    // Convert to unsigned for bit manipulation
    let value = value as u32;

    if value == 0 {
        return 1;
    }

    // Calculate the number of 7-bit segments needed
    let bits_needed = 32 - value.leading_zeros();
    (bits_needed as usize).div_ceil(7)
}

/// Map a signed value onto the unsigned range so small magnitudes stay short.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub const fn zigzag_encode(value: i32) -> i32 {
    ((value << 1) ^ (value >> 31)) as u32 as i32
}

/// Inverse of [`zigzag_encode`].
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub const fn zigzag_decode(value: i32) -> i32 {
    let value = value as u32;
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: i32) {
        let mut buf = Vec::new();
        let written = write_varint_sync(&mut buf, value);
        assert_eq!(written, varint_len(value));

        let read = peek_varint(&buf).unwrap();
        assert_eq!(read, Some((value, written)));
    }

    #[test]
    fn test_varint_zero() {
        roundtrip(0);
    }

    #[test]
    fn test_varint_positive() {
        roundtrip(1);
        roundtrip(127);
        roundtrip(128);
        roundtrip(255);
        roundtrip(25565);
        roundtrip(2_097_151);
        roundtrip(i32::MAX);
    }

    #[test]
    fn test_varint_negative() {
        roundtrip(-1);
        roundtrip(-127);
        roundtrip(i32::MIN);
    }

    #[test]
    fn test_varint_len() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(16383), 2);
        assert_eq!(varint_len(16384), 3);
        assert_eq!(varint_len(2_097_152), 4);
        assert_eq!(varint_len(268_435_456), 5);
        // Negative numbers always use 5 bytes
        assert_eq!(varint_len(-1), 5);
        assert_eq!(varint_len(i32::MIN), 5);
    }

    #[test]
    fn test_minimal_encoding() {
        // A value must never be padded with empty continuation groups.
        for value in [0, 1, 127, 128, 300, 16_384, 1 << 21, 1 << 28, i32::MAX, -1] {
            let mut buf = Vec::new();
            write_varint_sync(&mut buf, value);
            assert_eq!(buf.len(), varint_len(value), "value {value}");
            assert_ne!(buf.last(), Some(&CONTINUE_BIT), "value {value}");
        }
    }

    #[test]
    fn test_known_values() {
        // Test vectors from wiki.vg
        let test_cases = [
            (0, vec![0x00]),
            (1, vec![0x01]),
            (127, vec![0x7f]),
            (128, vec![0x80, 0x01]),
            (255, vec![0xff, 0x01]),
            (25565, vec![0xdd, 0xc7, 0x01]),
            (2_097_151, vec![0xff, 0xff, 0x7f]),
            (2_147_483_647, vec![0xff, 0xff, 0xff, 0xff, 0x07]),
            (-1, vec![0xff, 0xff, 0xff, 0xff, 0x0f]),
            (-2_147_483_648, vec![0x80, 0x80, 0x80, 0x80, 0x08]),
        ];

        for (value, expected_bytes) in test_cases {
            let mut buf = Vec::new();
            write_varint_sync(&mut buf, value);
            assert_eq!(buf, expected_bytes, "write failed for {value}");

            let (read_value, _) = peek_varint(&expected_bytes).unwrap().unwrap();
            assert_eq!(read_value, value, "read failed for {value}");
        }
    }

    #[test]
    fn test_peek_varint() {
        assert_eq!(peek_varint(&[0xdd, 0xc7, 0x01, 0xff]).unwrap(), Some((25565, 3)));
        assert_eq!(peek_varint(&[0xdd, 0xc7]).unwrap(), None);
        assert_eq!(peek_varint(&[]).unwrap(), None);
        assert!(matches!(
            peek_varint(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]),
            Err(ProtocolError::VarIntTooLong)
        ));
    }

    #[test]
    fn test_write_varlong_sync() {
        let mut buf = Vec::new();
        assert_eq!(write_varlong_sync(&mut buf, 2_147_483_648), 5);
        assert_eq!(buf, vec![0x80, 0x80, 0x80, 0x80, 0x08]);

        buf.clear();
        assert_eq!(write_varlong_sync(&mut buf, -1), MAX_VARLONG_LEN);
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        for value in [0, 1, -1, 63, -64, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }
    }
}
