//! Login protocol packets.
//!
//! The login protocol handles player authentication. In online mode this
//! includes encryption negotiation. Before 1.8 the byte arrays in the
//! encryption packets are prefixed with an `i16` length; from 1.8 on with a
//! `VarInt`.

use bytes::Bytes;
use uuid::Uuid;

use crate::buffer::{ByteReader, ByteWriter};
use crate::error::{ProtocolError, Result};

/// Maximum username length (16 characters).
pub const MAX_USERNAME_LENGTH: usize = 16;

/// Maximum public key length (512 bytes for RSA-1024).
const MAX_PUBLIC_KEY_LENGTH: usize = 512;

/// Maximum verify token length (typically 4 bytes).
const MAX_VERIFY_TOKEN_LENGTH: usize = 256;

/// Maximum encrypted shared secret length.
const MAX_SHARED_SECRET_LENGTH: usize = 256;

/// Maximum server id length.
const MAX_SERVER_ID_LENGTH: usize = 20;

/// Maximum disconnect reason length.
const MAX_DISCONNECT_REASON_LENGTH: usize = 262_144;

/// Maximum UUID string length (hyphenated form).
const MAX_UUID_STRING_LENGTH: usize = 36;

// =============================================================================
// LoginStart (Client -> Server)
// =============================================================================

/// Login Start packet (client -> server).
///
/// Sent by the client to begin the login process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    /// The player's username.
    pub name: String,
}

impl LoginStart {
    /// Create a new login start packet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_string(&self.name);
    }

    /// # Errors
    ///
    /// Returns an error if the name is longer than 16 characters.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self::new(reader.read_string(MAX_USERNAME_LENGTH)?))
    }
}

// =============================================================================
// EncryptionRequest (Server -> Client)
// =============================================================================

/// Encryption Request packet (server -> client).
///
/// Sent by the server to initiate encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRequest {
    /// Server ID (empty string for online-mode servers).
    pub server_id: String,
    /// The server's public key (DER-encoded).
    pub public_key: Bytes,
    /// Random verify token.
    pub verify_token: Bytes,
}

impl EncryptionRequest {
    /// Create a new encryption request.
    #[must_use]
    pub const fn new(public_key: Bytes, verify_token: Bytes) -> Self {
        Self {
            server_id: String::new(),
            public_key,
            verify_token,
        }
    }

    /// Parse the 1.7 layout (`i16`-prefixed arrays).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read_v1_7(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            server_id: reader.read_string(MAX_SERVER_ID_LENGTH)?,
            public_key: reader.read_short_byte_array(MAX_PUBLIC_KEY_LENGTH)?,
            verify_token: reader.read_short_byte_array(MAX_VERIFY_TOKEN_LENGTH)?,
        })
    }

    /// Parse the 1.8+ layout (`VarInt`-prefixed arrays).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            server_id: reader.read_string(MAX_SERVER_ID_LENGTH)?,
            public_key: reader.read_byte_array(MAX_PUBLIC_KEY_LENGTH)?,
            verify_token: reader.read_byte_array(MAX_VERIFY_TOKEN_LENGTH)?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_string(&self.server_id);
        writer.write_byte_array(&self.public_key);
        writer.write_byte_array(&self.verify_token);
    }
}

// =============================================================================
// EncryptionResponse (Client -> Server)
// =============================================================================

/// Encryption Response packet (client -> server).
///
/// Sent by the client in response to an encryption request. Both fields
/// are encrypted with the server's public key by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResponse {
    /// The shared secret, encrypted with the server's public key.
    pub shared_secret: Bytes,
    /// The verify token, encrypted with the server's public key.
    pub verify_token: Bytes,
}

impl EncryptionResponse {
    #[must_use]
    pub const fn new(shared_secret: Bytes, verify_token: Bytes) -> Self {
        Self {
            shared_secret,
            verify_token,
        }
    }

    /// Encode the 1.7 layout.
    pub fn write_v1_7(&self, writer: &mut ByteWriter) {
        writer.write_short_byte_array(&self.shared_secret);
        writer.write_short_byte_array(&self.verify_token);
    }

    /// Encode the 1.8+ layout.
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_byte_array(&self.shared_secret);
        writer.write_byte_array(&self.verify_token);
    }

    /// Parse the 1.8+ layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            shared_secret: reader.read_byte_array(MAX_SHARED_SECRET_LENGTH)?,
            verify_token: reader.read_byte_array(MAX_VERIFY_TOKEN_LENGTH)?,
        })
    }
}

// =============================================================================
// LoginSuccess (Server -> Client)
// =============================================================================

/// Login Success packet (server -> client).
///
/// Sent when login is complete. Client should transition to Play state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    /// The player's UUID.
    pub uuid: Uuid,
    /// The player's username.
    pub username: String,
}

impl LoginSuccess {
    /// Create a new login success packet.
    #[must_use]
    pub fn new(uuid: Uuid, username: impl Into<String>) -> Self {
        Self {
            uuid,
            username: username.into(),
        }
    }

    /// Parse the string-UUID layout used up to 1.12.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed or the UUID does not parse.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        let uuid = reader.read_string(MAX_UUID_STRING_LENGTH)?;
        let uuid = Uuid::parse_str(&uuid)
            .map_err(|e| ProtocolError::malformed(format!("login uuid {uuid:?}: {e}")))?;
        let username = reader.read_string(MAX_USERNAME_LENGTH)?;

        Ok(Self { uuid, username })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_string(&self.uuid.hyphenated().to_string());
        writer.write_string(&self.username);
    }
}

// =============================================================================
// SetCompression (Server -> Client)
// =============================================================================

/// Set Compression packet (server -> client).
///
/// Enables packet compression for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCompression {
    /// Compression threshold. Packets larger than this will be compressed.
    /// A negative value disables compression.
    pub threshold: i32,
}

impl SetCompression {
    /// Create a new set compression packet.
    #[must_use]
    pub const fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            threshold: reader.read_varint()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_varint(self.threshold);
    }
}

// =============================================================================
// Disconnect (Server -> Client, login and play)
// =============================================================================

/// Disconnect packet (server -> client).
///
/// The reason is a JSON text component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    /// The disconnect reason as JSON.
    pub reason: String,
}

impl Disconnect {
    /// Create a disconnect with the given JSON reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            reason: reader.read_string(MAX_DISCONNECT_REASON_LENGTH)?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_string(&self.reason);
    }
}
