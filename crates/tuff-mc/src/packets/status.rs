//! Status protocol packets.
//!
//! The status protocol is used by clients to query server information
//! without joining. This packet format is stable across all supported
//! protocol versions.

use crate::buffer::{ByteReader, ByteWriter};
use crate::error::Result;

/// Maximum JSON response length (32 KiB).
const MAX_JSON_LENGTH: usize = 32 * 1024;

/// Status Request packet (client -> server).
///
/// This is an empty packet that requests server status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusRequest;

/// Status Response packet (server -> client).
///
/// Contains a JSON object with server information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// JSON response containing server status.
    pub json: String,
}

impl StatusResponse {
    /// Create a new status response with the given JSON.
    #[must_use]
    pub fn new(json: impl Into<String>) -> Self {
        Self { json: json.into() }
    }

    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        let json = reader.read_string(MAX_JSON_LENGTH)?;
        Ok(Self { json })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_string(&self.json);
    }
}

/// Ping packet (client -> server).
///
/// Client sends a timestamp, server echoes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    /// Arbitrary payload (usually a timestamp).
    pub payload: i64,
}

impl Ping {
    /// Create a new ping with the given payload.
    #[must_use]
    pub const fn new(payload: i64) -> Self {
        Self { payload }
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_i64(self.payload);
    }

    /// # Errors
    ///
    /// Returns an error if fewer than 8 bytes remain.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self::new(reader.read_i64()?))
    }
}

/// Pong packet (server -> client).
///
/// Server echoes back the ping payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong {
    /// The payload from the ping packet.
    pub payload: i64,
}

impl Pong {
    /// Create a new pong with the given payload.
    #[must_use]
    pub const fn new(payload: i64) -> Self {
        Self { payload }
    }

    /// # Errors
    ///
    /// Returns an error if fewer than 8 bytes remain.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            payload: reader.read_i64()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_i64(self.payload);
    }
}
