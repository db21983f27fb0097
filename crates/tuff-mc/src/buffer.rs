//! Byte cursors over packet payloads.
//!
//! [`ByteReader`] is a forward-only read cursor: every read checks that
//! enough bytes remain and fails with [`ProtocolError::TruncatedInput`]
//! instead of panicking. [`ByteWriter`] is an append-only buffer that
//! grows to fit. All multi-byte primitives are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{ProtocolError, Result};
use crate::varint::{
    CONTINUE_BIT, SEGMENT_BITS, write_varint_sync, write_varlong_sync, zigzag_decode,
    zigzag_encode,
};

/// Forward-only read cursor over an immutable byte sequence.
#[derive(Debug, Clone)]
pub struct ByteReader {
    inner: Bytes,
    consumed: usize,
}

impl ByteReader {
    /// Wrap a byte sequence, positioned at its start.
    #[must_use]
    pub const fn new(inner: Bytes) -> Self {
        Self { inner, consumed: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.consumed
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.inner.remaining()
    }

    /// Whether any bytes are left.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.inner.has_remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(ProtocolError::TruncatedInput { needed, remaining });
        }
        Ok(())
    }

    /// Read exactly `N` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than `N` bytes remain.
    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.inner.copy_to_slice(&mut out);
        self.consumed += N;
        Ok(out)
    }

    /// Read `n` bytes without copying.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.ensure(n)?;
        self.consumed += n;
        Ok(self.inner.split_to(n))
    }

    /// Take everything that is left.
    pub fn read_remaining(&mut self) -> Bytes {
        let n = self.remaining();
        self.consumed += n;
        self.inner.split_to(n)
    }

    /// Read one unsigned byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] on an empty cursor.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed::<1>()?[0])
    }

    /// Read one signed byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] on an empty cursor.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.read_fixed()?))
    }

    /// Read a boolean byte (any non-zero value is `true`).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] on an empty cursor.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_fixed()?))
    }

    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than 2 bytes remain.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_fixed()?))
    }

    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_fixed()?))
    }

    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_fixed()?))
    }

    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_fixed()?))
    }

    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than 4 bytes remain.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.read_fixed()?))
    }

    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_fixed()?))
    }

    /// Read a `VarInt`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if the cursor ends mid-value
    /// and [`ProtocolError::VarIntTooLong`] for encodings over 5 bytes.
    pub fn read_varint(&mut self) -> Result<i32> {
        let mut value: i32 = 0;
        let mut position: u32 = 0;

        loop {
            let byte = self.read_u8()?;
            value |= i32::from(byte & SEGMENT_BITS) << position;

            if byte & CONTINUE_BIT == 0 {
                break;
            }

            position += 7;
            if position >= 32 {
                return Err(ProtocolError::VarIntTooLong);
            }
        }

        Ok(value)
    }

    /// Read a zig-zag encoded signed `VarInt`.
    ///
    /// # Errors
    ///
    /// Same as [`ByteReader::read_varint`].
    pub fn read_varint_zigzag(&mut self) -> Result<i32> {
        self.read_varint().map(zigzag_decode)
    }

    /// Read a `VarLong`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if the cursor ends mid-value
    /// and [`ProtocolError::VarLongTooLong`] for encodings over 10 bytes.
    pub fn read_varlong(&mut self) -> Result<i64> {
        let mut value: i64 = 0;
        let mut position: u32 = 0;

        loop {
            let byte = self.read_u8()?;
            value |= i64::from(byte & SEGMENT_BITS) << position;

            if byte & CONTINUE_BIT == 0 {
                break;
            }

            position += 7;
            if position >= 64 {
                return Err(ProtocolError::VarLongTooLong);
            }
        }

        Ok(value)
    }

    /// Read a `VarInt` that must be a non-negative length.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPacket`] for negative values.
    pub fn read_length(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        usize::try_from(len).map_err(|_| ProtocolError::malformed(format!("negative length {len}")))
    }

    /// Read a Minecraft string: `[VarInt length][UTF-8 bytes]`.
    ///
    /// `max_len` is in characters; the byte limit is four times that.
    ///
    /// # Errors
    ///
    /// Returns an error if the string exceeds the maximum length, runs past
    /// the end of the cursor or is not valid UTF-8.
    pub fn read_string(&mut self, max_len: usize) -> Result<String> {
        let len = self.read_varint()?;

        // Validate length is non-negative
        let len = usize::try_from(len).map_err(|_| ProtocolError::StringTooLong {
            len: 0,
            max: max_len * 4,
        })?;

        if len > max_len * 4 {
            return Err(ProtocolError::StringTooLong {
                len,
                max: max_len * 4,
            });
        }

        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ProtocolError::malformed(format!("invalid UTF-8 string: {e}")))
    }

    /// Read a `VarInt`-prefixed byte array.
    ///
    /// # Errors
    ///
    /// Returns an error if the declared length is negative, over `max_len`,
    /// or longer than the remaining input.
    pub fn read_byte_array(&mut self, max_len: usize) -> Result<Bytes> {
        let len = self.read_length()?;
        if len > max_len {
            return Err(ProtocolError::StringTooLong { len, max: max_len });
        }
        self.read_bytes(len)
    }

    /// Read an `i16`-prefixed byte array (1.7 login packets).
    ///
    /// # Errors
    ///
    /// Same as [`ByteReader::read_byte_array`].
    pub fn read_short_byte_array(&mut self, max_len: usize) -> Result<Bytes> {
        let len = self.read_i16()?;
        let len = usize::try_from(len)
            .map_err(|_| ProtocolError::malformed(format!("negative array length {len}")))?;
        if len > max_len {
            return Err(ProtocolError::StringTooLong { len, max: max_len });
        }
        self.read_bytes(len)
    }

    /// Read a UUID as two big-endian longs.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedInput`] if fewer than 16 bytes remain.
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        Ok(Uuid::from_bytes(self.read_fixed()?))
    }
}

impl From<Bytes> for ByteReader {
    fn from(inner: Bytes) -> Self {
        Self::new(inner)
    }
}

impl From<&'static [u8]> for ByteReader {
    fn from(inner: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(inner))
    }
}

impl From<Vec<u8>> for ByteReader {
    fn from(inner: Vec<u8>) -> Self {
        Self::new(Bytes::from(inner))
    }
}

/// Append-only write buffer.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    inner: BytesMut,
}

impl ByteWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Finish writing and hand out the buffer.
    #[must_use]
    pub fn into_inner(self) -> BytesMut {
        self.inner
    }

    pub fn write_u8(&mut self, value: u8) {
        self.inner.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.inner.put_i8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.inner.put_u8(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.inner.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.inner.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.inner.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.inner.put_i64(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.inner.put_u64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.inner.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.inner.put_f64(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.inner.put_slice(bytes);
    }

    /// Write a `VarInt` in its minimal form.
    pub fn write_varint(&mut self, value: i32) {
        let mut scratch = Vec::with_capacity(5);
        write_varint_sync(&mut scratch, value);
        self.inner.put_slice(&scratch);
    }

    /// Write a zig-zag encoded signed `VarInt`.
    pub fn write_varint_zigzag(&mut self, value: i32) {
        self.write_varint(zigzag_encode(value));
    }

    /// Write a `VarLong` in its minimal form.
    pub fn write_varlong(&mut self, value: i64) {
        let mut scratch = Vec::with_capacity(10);
        write_varlong_sync(&mut scratch, value);
        self.inner.put_slice(&scratch);
    }

    /// Write a Minecraft string: `[VarInt length][UTF-8 bytes]`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.write_varint(bytes.len() as i32);
        self.inner.put_slice(bytes);
    }

    /// Write a `VarInt`-prefixed byte array.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn write_byte_array(&mut self, data: &[u8]) {
        self.write_varint(data.len() as i32);
        self.inner.put_slice(data);
    }

    /// Write an `i16`-prefixed byte array (1.7 login packets).
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn write_short_byte_array(&mut self, data: &[u8]) {
        self.inner.put_i16(data.len() as i16);
        self.inner.put_slice(data);
    }

    pub fn write_uuid(&mut self, uuid: Uuid) {
        self.inner.put_slice(uuid.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_string() {
        let original = "Hello, Minecraft!";

        let mut writer = ByteWriter::new();
        writer.write_string(original);

        let mut reader = ByteReader::new(writer.into_inner().freeze());
        assert_eq!(reader.read_string(256).unwrap(), original);
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_string_too_long() {
        let mut writer = ByteWriter::new();
        // A string that claims to be very long
        writer.write_varint(10000);

        let mut reader = ByteReader::new(writer.into_inner().freeze());
        let result = reader.read_string(16);
        assert!(matches!(result, Err(ProtocolError::StringTooLong { .. })));
    }

    #[test]
    fn test_string_past_end_is_truncated() {
        let mut writer = ByteWriter::new();
        writer.write_varint(10);
        writer.write_bytes(b"abc");

        let mut reader = ByteReader::new(writer.into_inner().freeze());
        assert!(matches!(
            reader.read_string(16),
            Err(ProtocolError::TruncatedInput {
                needed: 10,
                remaining: 3
            })
        ));
    }

    #[test]
    fn test_truncated_fixed_reads() {
        let mut reader = ByteReader::from(&[0x00, 0x01, 0x02][..]);
        assert!(matches!(
            reader.read_i32(),
            Err(ProtocolError::TruncatedInput {
                needed: 4,
                remaining: 3
            })
        ));
        // A failed read leaves the cursor untouched.
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u16().unwrap(), 0x0001);
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn test_truncated_varint() {
        let mut reader = ByteReader::from(&[0xdd, 0xc7][..]);
        assert!(matches!(
            reader.read_varint(),
            Err(ProtocolError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_primitives_are_big_endian() {
        let mut writer = ByteWriter::new();
        writer.write_i32(0x0102_0304);
        writer.write_i16(-2);
        writer.write_i64(-9_876_543_210);
        writer.write_bool(true);
        writer.write_f32(1.5);
        writer.write_f64(-0.25);
        let bytes = writer.into_inner().freeze();
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        assert_eq!(&bytes[15..19], &[0x3F, 0xC0, 0, 0]);

        let mut reader = ByteReader::new(bytes);
        assert_eq!(reader.read_i32().unwrap(), 0x0102_0304);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_i64().unwrap(), -9_876_543_210);
        assert!(reader.read_bool().unwrap());
        assert!((reader.read_f32().unwrap() - 1.5).abs() < f32::EPSILON);
        assert!((reader.read_f64().unwrap() + 0.25).abs() < f64::EPSILON);
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_varlong_and_zigzag() {
        let mut writer = ByteWriter::new();
        writer.write_varlong(i64::MIN);
        writer.write_varint_zigzag(-3);
        let bytes = writer.into_inner().freeze();
        assert_eq!(bytes[10], 5);

        let mut reader = ByteReader::new(bytes);
        assert_eq!(reader.read_varlong().unwrap(), i64::MIN);
        assert_eq!(reader.read_varint_zigzag().unwrap(), -3);
    }

    #[test]
    fn test_short_byte_array() {
        let mut writer = ByteWriter::new();
        writer.write_short_byte_array(b"token");
        let bytes = writer.into_inner().freeze();
        assert_eq!(&bytes[..2], &[0x00, 0x05]);

        let mut reader = ByteReader::new(bytes);
        assert_eq!(&reader.read_short_byte_array(16).unwrap()[..], b"token");
    }

    #[test]
    fn test_uuid_roundtrip() {
        let uuid = Uuid::new_v4();
        let mut writer = ByteWriter::new();
        writer.write_uuid(uuid);
        let mut reader = ByteReader::new(writer.into_inner().freeze());
        assert_eq!(reader.read_uuid().unwrap(), uuid);
    }
}
