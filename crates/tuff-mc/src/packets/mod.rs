//! Minecraft protocol packets.
//!
//! Packets are organized by connection state:
//! - Handshake: Initial connection state
//! - Status: Server list ping
//! - Login: Authentication and compression setup
//! - Play: In-game; chunk packets live in [`chunk`]
//!
//! Packet structs only know how to read and write their layouts. Which id
//! and which layout applies at a given protocol version is decided by the
//! tables in [`vanilla`].

pub mod chunk;
pub mod handshake;
pub mod login;
pub mod play;
pub mod status;
pub mod vanilla;

use std::fmt;
use std::sync::Arc;

pub use chunk::{ChunkBulk, ChunkData};
pub use handshake::{Handshake, NextState};
pub use login::{
    Disconnect, EncryptionRequest, EncryptionResponse, LoginStart, LoginSuccess, SetCompression,
};
pub use play::{ChatMessage, ChatPosition, ChatSend, JoinGame, KeepAlive};
pub use status::{Ping, Pong, StatusRequest, StatusResponse};

use crate::block::BlockLookup;
use crate::compression::Compressor;
use crate::version::ProtocolVersion;

/// Identifies a packet independent of version and numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketKind {
    Handshake,
    StatusRequest,
    StatusResponse,
    StatusPing,
    StatusPong,
    LoginStart,
    LoginDisconnect,
    EncryptionRequest,
    EncryptionResponse,
    LoginSuccess,
    SetCompression,
    KeepAlive,
    JoinGame,
    ChatMessage,
    ChatSend,
    Disconnect,
    ChunkData,
    ChunkBulk,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A decoded server-to-client packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundPacket {
    StatusResponse(StatusResponse),
    StatusPong(Pong),
    LoginDisconnect(Disconnect),
    EncryptionRequest(EncryptionRequest),
    LoginSuccess(LoginSuccess),
    SetCompression(SetCompression),
    KeepAlive(KeepAlive),
    JoinGame(JoinGame),
    ChatMessage(ChatMessage),
    Disconnect(Disconnect),
    ChunkData(ChunkData),
    ChunkBulk(ChunkBulk),
}

impl ClientboundPacket {
    /// The kind handlers are registered under.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::StatusResponse(_) => PacketKind::StatusResponse,
            Self::StatusPong(_) => PacketKind::StatusPong,
            Self::LoginDisconnect(_) => PacketKind::LoginDisconnect,
            Self::EncryptionRequest(_) => PacketKind::EncryptionRequest,
            Self::LoginSuccess(_) => PacketKind::LoginSuccess,
            Self::SetCompression(_) => PacketKind::SetCompression,
            Self::KeepAlive(_) => PacketKind::KeepAlive,
            Self::JoinGame(_) => PacketKind::JoinGame,
            Self::ChatMessage(_) => PacketKind::ChatMessage,
            Self::Disconnect(_) => PacketKind::Disconnect,
            Self::ChunkData(_) => PacketKind::ChunkData,
            Self::ChunkBulk(_) => PacketKind::ChunkBulk,
        }
    }
}

/// A client-to-server packet ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerboundPacket {
    Handshake(Handshake),
    StatusRequest(StatusRequest),
    StatusPing(Ping),
    LoginStart(LoginStart),
    EncryptionResponse(EncryptionResponse),
    KeepAlive(KeepAlive),
    ChatSend(ChatSend),
}

impl ServerboundPacket {
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::Handshake(_) => PacketKind::Handshake,
            Self::StatusRequest(_) => PacketKind::StatusRequest,
            Self::StatusPing(_) => PacketKind::StatusPing,
            Self::LoginStart(_) => PacketKind::LoginStart,
            Self::EncryptionResponse(_) => PacketKind::EncryptionResponse,
            Self::KeepAlive(_) => PacketKind::KeepAlive,
            Self::ChatSend(_) => PacketKind::ChatSend,
        }
    }
}

/// What a decoder may need beyond the payload bytes.
#[derive(Clone)]
pub struct DecodeContext {
    /// Negotiated protocol version.
    pub version: ProtocolVersion,
    /// Block definitions for chunk decoding.
    pub blocks: Arc<dyn BlockLookup>,
    /// Inflater for compressed chunk payloads.
    pub compressor: Arc<dyn Compressor>,
}

impl fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
