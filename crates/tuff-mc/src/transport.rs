//! Async frame reader and writer.
//!
//! These own one half of a byte stream each and run every byte through the
//! optional transport cipher before (reading) or after (writing) the frame
//! codec, so framing never sees ciphertext.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{FrameCodec, RawPacket};
use crate::crypt::Cfb8Cipher;
use crate::error::{ProtocolError, Result};

const READ_CHUNK: usize = 8 * 1024;

/// Reads whole packets from the inbound half of a stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    codec: FrameCodec,
    cipher: Option<Cfb8Cipher>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap `inner` with compression and encryption disabled.
    pub fn new(inner: R, codec: FrameCodec) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            codec,
            cipher: None,
        }
    }

    /// Apply a compression threshold to every frame after the current one.
    pub fn set_compression(&mut self, threshold: i32) {
        self.codec.set_compression(threshold);
    }

    /// Decrypt everything from here on.
    ///
    /// Bytes already buffered but not yet framed arrived after the switch
    /// and are decrypted in place.
    pub fn enable_encryption(&mut self, mut cipher: Cfb8Cipher) {
        cipher.decrypt(&mut self.buf);
        self.cipher = Some(cipher);
    }

    /// Whether inbound bytes are being decrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Read the next packet.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between frames.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, [`ProtocolError::FrameCorrupt`] if the stream
    /// ends inside a frame, or any framing error from the codec.
    pub async fn read_packet(&mut self) -> Result<Option<RawPacket>> {
        loop {
            if let Some(packet) = self.codec.decode(&mut self.buf)? {
                return Ok(Some(packet));
            }

            let start = self.buf.len();
            self.buf.reserve(READ_CHUNK);
            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError::FrameCorrupt(format!(
                    "stream ended with {} bytes of an unfinished frame",
                    self.buf.len()
                )));
            }

            if let Some(cipher) = &mut self.cipher {
                cipher.decrypt(&mut self.buf[start..]);
            }
        }
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes whole packets to the outbound half of a stream.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    codec: FrameCodec,
    cipher: Option<Cfb8Cipher>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap `inner` with compression and encryption disabled.
    pub const fn new(inner: W, codec: FrameCodec) -> Self {
        Self {
            inner,
            codec,
            cipher: None,
        }
    }

    /// Compress frames from the next write on.
    pub fn set_compression(&mut self, threshold: i32) {
        self.codec.set_compression(threshold);
    }

    /// Encrypt frames from the next write on.
    pub fn enable_encryption(&mut self, cipher: Cfb8Cipher) {
        self.cipher = Some(cipher);
    }

    /// Encode, encrypt and write one packet, then flush.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub async fn write_packet(&mut self, packet: &RawPacket) -> Result<()> {
        let frame = self.codec.encode(packet)?;
        match &mut self.cipher {
            Some(cipher) => {
                let mut frame = BytesMut::from(&frame[..]);
                cipher.encrypt(&mut frame);
                self.inner.write_all(&frame).await?;
            }
            None => self.inner.write_all(&frame).await?,
        }
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the outbound half.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
