//! Packet framing codec for Minecraft protocol.
//!
//! Without compression a frame is:
//! - `[VarInt length][VarInt packet_id][payload...]`
//!
//! Once the server enables compression every frame becomes:
//! - `[VarInt length][VarInt data_length][packet_id + payload, maybe zlib]`
//!
//! `data_length` is the uncompressed size of the id and payload, or `0` if
//! they were sent as-is because they are below the threshold.
//!
//! This module is byte-in/byte-out only; [`crate::transport`] drives it
//! over an async stream.

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};

use crate::compression::{Compressor, Zlib};
use crate::error::{ProtocolError, Result};
use crate::varint::{peek_varint, varint_len, write_varint_sync};

/// Maximum packet size (2 MiB, same as vanilla).
pub const MAX_PACKET_SIZE: usize = 2 * 1024 * 1024;

/// Largest uncompressed size a compressed frame may declare (8 MiB, same as vanilla).
pub const MAX_UNCOMPRESSED_SIZE: usize = 8 * 1024 * 1024;

/// A raw packet with its ID and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// The packet ID.
    pub id: i32,
    /// The packet payload (without the packet ID).
    pub payload: Bytes,
}

impl RawPacket {
    /// Create a new raw packet with the given ID and payload.
    #[must_use]
    pub const fn new(id: i32, payload: Bytes) -> Self {
        Self { id, payload }
    }

    /// Create a new raw packet with the given ID and an empty payload.
    #[must_use]
    pub const fn empty(id: i32) -> Self {
        Self {
            id,
            payload: Bytes::new(),
        }
    }

    /// Length of the id and payload as they appear inside a frame.
    #[must_use]
    pub fn body_len(&self) -> usize {
        varint_len(self.id) + self.payload.len()
    }
}

/// Splits a byte stream into packets and builds frames from packets.
#[derive(Clone)]
pub struct FrameCodec {
    threshold: Option<usize>,
    compressor: Arc<dyn Compressor>,
}

impl FrameCodec {
    /// A codec with compression disabled.
    #[must_use]
    pub fn new(compressor: Arc<dyn Compressor>) -> Self {
        Self {
            threshold: None,
            compressor,
        }
    }

    /// The current compression threshold, if compression is enabled.
    #[must_use]
    pub const fn compression_threshold(&self) -> Option<usize> {
        self.threshold
    }

    /// Apply a threshold as the server sends it: negative disables compression.
    pub fn set_compression(&mut self, threshold: i32) {
        self.threshold = usize::try_from(threshold).ok();
    }

    /// Encode one packet into a complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PacketTooLong`] if the frame would exceed
    /// [`MAX_PACKET_SIZE`], or an error from the compressor.
    pub fn encode(&self, packet: &RawPacket) -> Result<Bytes> {
        let body_len = packet.body_len();
        let mut body = Vec::with_capacity(body_len);
        write_varint_sync(&mut body, packet.id);
        body.extend_from_slice(&packet.payload);

        let frame_body = match self.threshold {
            None => body,
            Some(threshold) if body_len < threshold => {
                let mut out = Vec::with_capacity(body_len + 1);
                write_varint_sync(&mut out, 0);
                out.extend_from_slice(&body);
                out
            }
            Some(_) => {
                let compressed = self.compressor.compress(&body)?;
                let mut out = Vec::with_capacity(compressed.len() + 5);
                write_varint_sync(&mut out, length_to_i32(body_len)?);
                out.extend_from_slice(&compressed);
                out
            }
        };

        if frame_body.len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::PacketTooLong {
                len: frame_body.len(),
                max: MAX_PACKET_SIZE,
            });
        }

        let mut frame = Vec::with_capacity(frame_body.len() + 3);
        write_varint_sync(&mut frame, length_to_i32(frame_body.len())?);
        frame.extend_from_slice(&frame_body);
        Ok(Bytes::from(frame))
    }

    /// Take one complete frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched when it does not yet
    /// hold a whole frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PacketTooLong`] or
    /// [`ProtocolError::FrameCorrupt`] if the framing is broken. Both are
    /// fatal to the connection since the stream cannot be resynchronised.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<RawPacket>> {
        let Some((length, header_len)) = peek_varint(buf)? else {
            return Ok(None);
        };

        let length = usize::try_from(length)
            .map_err(|_| ProtocolError::FrameCorrupt(format!("negative frame length {length}")))?;
        if length > MAX_PACKET_SIZE {
            return Err(ProtocolError::PacketTooLong {
                len: length,
                max: MAX_PACKET_SIZE,
            });
        }

        if buf.len() < header_len + length {
            buf.reserve(header_len + length - buf.len());
            return Ok(None);
        }

        buf.advance(header_len);
        let body = buf.split_to(length).freeze();
        self.decode_body(body).map(Some)
    }

    fn decode_body(&self, body: Bytes) -> Result<RawPacket> {
        let data = match self.threshold {
            None => body,
            Some(threshold) => self.inflate(body, threshold)?,
        };

        let Some((id, id_len)) = peek_varint(&data)? else {
            return Err(ProtocolError::FrameCorrupt(
                "frame too short for a packet id".into(),
            ));
        };

        Ok(RawPacket::new(id, data.slice(id_len..)))
    }

    fn inflate(&self, body: Bytes, threshold: usize) -> Result<Bytes> {
        let Some((data_length, prefix_len)) = peek_varint(&body)? else {
            return Err(ProtocolError::FrameCorrupt(
                "frame too short for a data length".into(),
            ));
        };

        if data_length == 0 {
            return Ok(body.slice(prefix_len..));
        }

        let declared = usize::try_from(data_length).map_err(|_| {
            ProtocolError::FrameCorrupt(format!("negative data length {data_length}"))
        })?;
        if declared < threshold {
            return Err(ProtocolError::FrameCorrupt(format!(
                "compressed data length {declared} is below threshold {threshold}"
            )));
        }
        if declared > MAX_UNCOMPRESSED_SIZE {
            return Err(ProtocolError::FrameCorrupt(format!(
                "data length {declared} exceeds {MAX_UNCOMPRESSED_SIZE}"
            )));
        }

        let inflated = self.compressor.decompress(&body[prefix_len..], declared)?;
        Ok(Bytes::from(inflated))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(Arc::new(Zlib::default()))
    }
}

impl fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCodec")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

fn length_to_i32(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| ProtocolError::PacketTooLong {
        len,
        max: MAX_PACKET_SIZE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressed(threshold: i32) -> FrameCodec {
        let mut codec = FrameCodec::default();
        codec.set_compression(threshold);
        codec
    }

    fn roundtrip(codec: &FrameCodec, packet: &RawPacket) -> RawPacket {
        let frame = codec.encode(packet).unwrap();
        let mut buf = BytesMut::from(&frame[..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        decoded
    }

    fn payload(len: usize) -> Bytes {
        #[allow(clippy::cast_possible_truncation)]
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_uncompressed_frame_layout() {
        let codec = FrameCodec::default();
        let frame = codec
            .encode(&RawPacket::new(0x00, Bytes::from_static(b"hi")))
            .unwrap();
        assert_eq!(&frame[..], &[0x03, 0x00, b'h', b'i']);
    }

    #[test]
    fn test_roundtrip_without_compression() {
        let codec = FrameCodec::default();
        for len in [0, 1, 300, 70_000] {
            let packet = RawPacket::new(0x21, payload(len));
            assert_eq!(roundtrip(&codec, &packet), packet);
        }
    }

    #[test]
    fn test_roundtrip_with_compression() {
        let codec = compressed(256);
        for len in [0, 10, 254, 255, 256, 70_000] {
            let packet = RawPacket::new(0x26, payload(len));
            assert_eq!(roundtrip(&codec, &packet), packet);
        }
    }

    #[test]
    fn test_below_threshold_has_zero_data_length() {
        let codec = compressed(256);
        let frame = codec.encode(&RawPacket::new(0x01, payload(3))).unwrap();
        // length, data length 0, id, payload
        assert_eq!(frame[0], 5);
        assert_eq!(frame[1], 0);
        assert_eq!(frame[2], 0x01);
    }

    #[test]
    fn test_above_threshold_declares_uncompressed_size() {
        let codec = compressed(64);
        let packet = RawPacket::new(0x01, Bytes::from(vec![0u8; 1000]));
        let frame = codec.encode(&packet).unwrap();

        let (_, header) = peek_varint(&frame).unwrap().unwrap();
        let (data_length, _) = peek_varint(&frame[header..]).unwrap().unwrap();
        assert_eq!(data_length, 1001);
        assert!(frame.len() < 1000);
    }

    #[test]
    fn test_partial_frame_waits() {
        let codec = FrameCodec::default();
        let frame = codec.encode(&RawPacket::new(0x02, payload(40))).unwrap();

        let mut buf = BytesMut::from(&frame[..20]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 20);

        buf.extend_from_slice(&frame[20..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().id, 0x02);
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&codec.encode(&RawPacket::empty(0x01)).unwrap());
        buf.extend_from_slice(&codec.encode(&RawPacket::empty(0x02)).unwrap());

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().id, 0x01);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().id, 0x02);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_declared_size_mismatch_is_corrupt() {
        let codec = compressed(16);
        let zlib = Zlib::default();
        let data = zlib.compress(&[0u8; 100]).unwrap();

        let mut body = Vec::new();
        write_varint_sync(&mut body, 120);
        body.extend_from_slice(&data);
        let mut frame = Vec::new();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        write_varint_sync(&mut frame, body.len() as i32);
        frame.extend_from_slice(&body);

        let mut buf = BytesMut::from(&frame[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FrameCorrupt(_))
        ));
    }

    #[test]
    fn test_compressed_below_threshold_is_corrupt() {
        let codec = compressed(256);
        let data = Zlib::default().compress(&[0u8; 10]).unwrap();

        let mut body = Vec::new();
        write_varint_sync(&mut body, 10);
        body.extend_from_slice(&data);
        let mut frame = Vec::new();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        write_varint_sync(&mut frame, body.len() as i32);
        frame.extend_from_slice(&body);

        let mut buf = BytesMut::from(&frame[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FrameCorrupt(_))
        ));
    }

    #[test]
    fn test_empty_frame_is_corrupt() {
        let codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[0x00][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FrameCorrupt(_))
        ));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let codec = FrameCodec::default();
        let mut frame = Vec::new();
        write_varint_sync(&mut frame, 3 * 1024 * 1024);
        let mut buf = BytesMut::from(&frame[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::PacketTooLong { .. })
        ));
    }

    #[test]
    fn test_negative_threshold_disables() {
        let mut codec = compressed(256);
        assert_eq!(codec.compression_threshold(), Some(256));
        codec.set_compression(-1);
        assert_eq!(codec.compression_threshold(), None);
    }
}
