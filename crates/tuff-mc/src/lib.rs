//! Versioned Minecraft protocol engine for tuff.
//!
//! This crate provides the client side of the protocol from 1.7.10 to
//! 1.12.2: byte cursors, packet framing with compression and encryption,
//! the connection state machine, a version-aware packet registry with
//! handler dispatch, and the chunk column decoders.

pub mod block;
pub mod buffer;
pub mod chunk;
pub mod codec;
pub mod compression;
pub mod crypt;
pub mod dispatch;
pub mod error;
pub mod packets;
pub mod registry;
pub mod state;
pub mod transport;
pub mod varint;
pub mod version;

pub use codec::{FrameCodec, RawPacket};
pub use dispatch::{Dispatcher, HandlerError};
pub use error::{ProtocolError, Severity};
pub use packets::{ClientboundPacket, PacketKind, ServerboundPacket};
pub use registry::{PacketRegistry, ResolvedProtocol};
pub use state::{ConnectionState, StateMachine};
pub use version::ProtocolVersion;
