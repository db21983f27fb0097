//! Protocol error types.

use std::io;

use thiserror::Error;

use crate::packets::PacketKind;
use crate::state::{ConnectionState, Direction};
use crate::version::ProtocolVersion;

/// Errors that can occur when reading or writing Minecraft protocol data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A `VarInt` was too long (more than 5 bytes).
    #[error("VarInt too long")]
    VarIntTooLong,

    /// A `VarLong` was too long (more than 10 bytes).
    #[error("VarLong too long")]
    VarLongTooLong,

    /// A string exceeded the maximum length.
    #[error("String too long: {len} bytes (max {max})")]
    StringTooLong {
        /// The actual length of the string.
        len: usize,
        /// The maximum allowed length.
        max: usize,
    },

    /// A packet exceeded the maximum length.
    #[error("Packet too long: {len} bytes (max {max})")]
    PacketTooLong {
        /// The actual length of the packet.
        len: usize,
        /// The maximum allowed length.
        max: usize,
    },

    /// A read asked for more bytes than the frame has left.
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        /// Bytes the read required.
        needed: usize,
        /// Bytes that were left in the frame.
        remaining: usize,
    },

    /// The framing itself is broken; the stream cannot be resynchronised.
    #[error("Corrupt frame: {0}")]
    FrameCorrupt(String),

    /// A registered decoder found the packet body inconsistent.
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// No decoder is registered for the id in the current state and version.
    #[error("Unknown packet 0x{id:02X} ({direction} {state}, protocol {version})")]
    UnknownPacket {
        /// State the connection was in.
        state: ConnectionState,
        /// Direction of the frame.
        direction: Direction,
        /// The numeric packet id.
        id: i32,
        /// Negotiated protocol version.
        version: ProtocolVersion,
    },

    /// No encoder is registered for this packet kind at the negotiated version.
    #[error("{kind:?} cannot be encoded for protocol {version}")]
    UnsupportedForVersion {
        /// The packet kind that was being sent.
        kind: PacketKind,
        /// Negotiated protocol version.
        version: ProtocolVersion,
    },

    /// The packet belongs to a different connection state than the current one.
    #[error("{kind:?} is a {expected} packet, connection is in {actual}")]
    WrongState {
        /// The packet kind that was being sent.
        kind: PacketKind,
        /// State the packet is registered in.
        expected: ConnectionState,
        /// State the connection is in.
        actual: ConnectionState,
    },

    /// Two packet kinds resolved to the same id at one version.
    #[error("Packet id 0x{id:02X} registered twice for {direction} {state} ({first:?}, {second:?})")]
    DuplicatePacketId {
        /// Connection state of the clash.
        state: ConnectionState,
        /// Direction of the clash.
        direction: Direction,
        /// The clashing id.
        id: i32,
        /// Kind registered first.
        first: PacketKind,
        /// Kind registered second.
        second: PacketKind,
    },

    /// An invalid next state was received in a handshake.
    #[error("Invalid next state: {0}")]
    InvalidNextState(i32),

    /// A state change that the connection state machine does not allow.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted change.
        from: ConnectionState,
        /// Requested state.
        to: ConnectionState,
    },

    /// No data arrived within the configured read timeout.
    #[error("Read timed out")]
    Timeout,

    /// The connection has already been torn down.
    #[error("Connection is disconnected")]
    Disconnected,
}

/// How far the damage of an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The offending packet is dropped; the connection keeps going.
    Packet,
    /// Only the current send fails; surfaced to the caller.
    Send,
    /// The connection must be torn down.
    Connection,
}

impl ProtocolError {
    /// Classify the error for the read loop.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::TruncatedInput { .. }
            | Self::MalformedPacket(_)
            | Self::UnknownPacket { .. }
            | Self::StringTooLong { .. }
            | Self::VarLongTooLong
            | Self::InvalidNextState(_) => Severity::Packet,
            Self::UnsupportedForVersion { .. } | Self::WrongState { .. } => Severity::Send,
            Self::Io(_)
            | Self::VarIntTooLong
            | Self::PacketTooLong { .. }
            | Self::FrameCorrupt(_)
            | Self::DuplicatePacketId { .. }
            | Self::InvalidTransition { .. }
            | Self::Timeout
            | Self::Disconnected => Severity::Connection,
        }
    }

    /// Shorthand for [`ProtocolError::MalformedPacket`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPacket(reason.into())
    }
}

/// Result type alias using [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;
