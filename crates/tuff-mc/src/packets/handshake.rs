//! Handshake packet definitions.
//!
//! The handshake is the first packet sent by the client and determines
//! whether this is a status ping or a login attempt. Its layout is the same
//! in every supported version.

use crate::buffer::{ByteReader, ByteWriter};
use crate::error::{ProtocolError, Result};
use crate::state::ConnectionState;

/// Maximum server address length.
const MAX_SERVER_ADDRESS: usize = 255;

/// Protocol number sent when probing a server whose version is unknown.
pub const PROBE_PROTOCOL: i32 = -1;

/// The next state after handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    /// Status request (server list ping).
    Status = 1,
    /// Login request.
    Login = 2,
}

impl NextState {
    /// The connection state this intent moves to.
    #[must_use]
    pub const fn target(self) -> ConnectionState {
        match self {
            Self::Status => ConnectionState::Status,
            Self::Login => ConnectionState::Login,
        }
    }
}

impl TryFrom<i32> for NextState {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::Status),
            2 => Ok(Self::Login),
            _ => Err(ProtocolError::InvalidNextState(value)),
        }
    }
}

/// Handshake packet sent by the client.
///
/// This is always the first packet in a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// The protocol version the client is using.
    pub protocol_version: i32,
    /// The server address the client connected to.
    pub server_address: String,
    /// The server port the client connected to.
    pub server_port: u16,
    /// The next state: Status (1) or Login (2).
    pub next_state: NextState,
}

impl Handshake {
    /// Create a handshake.
    #[must_use]
    pub fn new(
        protocol_version: i32,
        server_address: impl Into<String>,
        server_port: u16,
        next_state: NextState,
    ) -> Self {
        Self {
            protocol_version,
            server_address: server_address.into(),
            server_port,
            next_state,
        }
    }

    /// Parse a handshake payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        let protocol_version = reader.read_varint()?;
        let server_address = reader.read_string(MAX_SERVER_ADDRESS)?;
        let server_port = reader.read_u16()?;
        let next_state = NextState::try_from(reader.read_varint()?)?;

        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            next_state,
        })
    }

    /// Encode the handshake payload.
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_varint(self.protocol_version);
        writer.write_string(&self.server_address);
        writer.write_u16(self.server_port);
        writer.write_varint(self.next_state as i32);
    }
}
