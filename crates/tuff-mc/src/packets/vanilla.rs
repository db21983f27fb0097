//! Packet ids and layouts of the vanilla releases from 1.7.10 to 1.12.2.
//!
//! Each table lists the versions at which a packet's id or layout changed;
//! versions in between inherit the entry below them.

use crate::buffer::{ByteReader, ByteWriter};
use crate::chunk::{flat, legacy, paletted};
use crate::error::{ProtocolError, Result};
use crate::packets::{
    ChatMessage, ChatSend, ClientboundPacket, DecodeContext, Disconnect, EncryptionRequest,
    EncryptionResponse, Handshake, JoinGame, KeepAlive, LoginStart, LoginSuccess, PacketKind,
    Ping, Pong, ServerboundPacket, SetCompression, StatusResponse,
};
use crate::registry::{Codec, DecodeFn, EncodeFn, PacketRegistry, VersionTable};
use crate::state::ConnectionState::{Handshake as HandshakeState, Login, Play, Status};
use crate::version::ProtocolVersion as V;

/// Wrap a reader into a [`DecodeFn`] producing `ClientboundPacket::$variant`.
macro_rules! decoder {
    ($variant:ident <- $read:path) => {{
        fn decode(reader: &mut ByteReader, _: &DecodeContext) -> Result<ClientboundPacket> {
            $read(reader).map(ClientboundPacket::$variant)
        }
        decode as DecodeFn
    }};
    ($variant:ident <- $read:path, ctx) => {{
        fn decode(reader: &mut ByteReader, ctx: &DecodeContext) -> Result<ClientboundPacket> {
            $read(reader, ctx).map(ClientboundPacket::$variant)
        }
        decode as DecodeFn
    }};
}

/// Wrap a writer into an [`EncodeFn`] accepting `ServerboundPacket::$variant`.
macro_rules! encoder {
    ($variant:ident -> $write:path) => {{
        fn encode(packet: &ServerboundPacket, writer: &mut ByteWriter) -> Result<()> {
            match packet {
                ServerboundPacket::$variant(inner) => {
                    $write(inner, writer);
                    Ok(())
                }
                other => Err(mismatch(PacketKind::$variant, other)),
            }
        }
        encode as EncodeFn
    }};
}

fn mismatch(expected: PacketKind, got: &ServerboundPacket) -> ProtocolError {
    ProtocolError::malformed(format!("{expected} encoder given {}", got.kind()))
}

fn write_nothing<T>(_: &T, _: &mut ByteWriter) {}

/// Build the vanilla registry.
///
/// Each connection owns its own registry; nothing here is global.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn registry() -> PacketRegistry {
    let mut registry = PacketRegistry::new();

    // Handshake
    registry.serverbound(
        HandshakeState,
        PacketKind::Handshake,
        VersionTable::new().since(V::V1_7_10, Codec::new(0x00, encoder!(Handshake -> Handshake::write))),
    );

    // Status
    registry
        .serverbound(
            Status,
            PacketKind::StatusRequest,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x00, encoder!(StatusRequest -> write_nothing))),
        )
        .serverbound(
            Status,
            PacketKind::StatusPing,
            VersionTable::new().since(V::V1_7_10, Codec::new(0x01, encoder!(StatusPing -> Ping::write))),
        )
        .clientbound(
            Status,
            PacketKind::StatusResponse,
            VersionTable::new().since(
                V::V1_7_10,
                Codec::new(0x00, decoder!(StatusResponse <- StatusResponse::read)),
            ),
        )
        .clientbound(
            Status,
            PacketKind::StatusPong,
            VersionTable::new().since(V::V1_7_10, Codec::new(0x01, decoder!(StatusPong <- Pong::read))),
        );

    // Login
    registry
        .serverbound(
            Login,
            PacketKind::LoginStart,
            VersionTable::new().since(V::V1_7_10, Codec::new(0x00, encoder!(LoginStart -> LoginStart::write))),
        )
        .serverbound(
            Login,
            PacketKind::EncryptionResponse,
            VersionTable::new()
                .since(
                    V::V1_7_10,
                    Codec::new(0x01, encoder!(EncryptionResponse -> EncryptionResponse::write_v1_7)),
                )
                .since(
                    V::V1_8,
                    Codec::new(0x01, encoder!(EncryptionResponse -> EncryptionResponse::write)),
                ),
        )
        .clientbound(
            Login,
            PacketKind::LoginDisconnect,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x00, decoder!(LoginDisconnect <- Disconnect::read))),
        )
        .clientbound(
            Login,
            PacketKind::EncryptionRequest,
            VersionTable::new()
                .since(
                    V::V1_7_10,
                    Codec::new(0x01, decoder!(EncryptionRequest <- EncryptionRequest::read_v1_7)),
                )
                .since(
                    V::V1_8,
                    Codec::new(0x01, decoder!(EncryptionRequest <- EncryptionRequest::read)),
                ),
        )
        .clientbound(
            Login,
            PacketKind::LoginSuccess,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x02, decoder!(LoginSuccess <- LoginSuccess::read))),
        )
        .clientbound(
            Login,
            PacketKind::SetCompression,
            VersionTable::new()
                .since(V::V1_8, Codec::new(0x03, decoder!(SetCompression <- SetCompression::read))),
        );

    // Play, server to client
    registry
        .clientbound(
            Play,
            PacketKind::KeepAlive,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x00, decoder!(KeepAlive <- KeepAlive::read_v1_7)))
                .since(V::V1_8, Codec::new(0x00, decoder!(KeepAlive <- KeepAlive::read_v1_8)))
                .since(V::V1_9, Codec::new(0x1F, decoder!(KeepAlive <- KeepAlive::read_v1_8)))
                .since(V::V1_12_2, Codec::new(0x1F, decoder!(KeepAlive <- KeepAlive::read_v1_12_2))),
        )
        .clientbound(
            Play,
            PacketKind::JoinGame,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x01, decoder!(JoinGame <- JoinGame::read_v1_7)))
                .since(V::V1_8, Codec::new(0x01, decoder!(JoinGame <- JoinGame::read_v1_8)))
                .since(V::V1_9, Codec::new(0x23, decoder!(JoinGame <- JoinGame::read_v1_8)))
                .since(V::V1_9_1, Codec::new(0x23, decoder!(JoinGame <- JoinGame::read_v1_9_1))),
        )
        .clientbound(
            Play,
            PacketKind::ChatMessage,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x02, decoder!(ChatMessage <- ChatMessage::read_v1_7)))
                .since(V::V1_8, Codec::new(0x02, decoder!(ChatMessage <- ChatMessage::read_v1_8)))
                .since(V::V1_9, Codec::new(0x0F, decoder!(ChatMessage <- ChatMessage::read_v1_8))),
        )
        .clientbound(
            Play,
            PacketKind::Disconnect,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x40, decoder!(Disconnect <- Disconnect::read)))
                .since(V::V1_9, Codec::new(0x1A, decoder!(Disconnect <- Disconnect::read))),
        )
        .clientbound(
            Play,
            PacketKind::SetCompression,
            VersionTable::new()
                .since(V::V1_8, Codec::new(0x46, decoder!(SetCompression <- SetCompression::read)))
                .removed_in(V::V1_9),
        )
        .clientbound(
            Play,
            PacketKind::ChunkData,
            VersionTable::new()
                .since(
                    V::V1_7_10,
                    Codec::new(0x21, decoder!(ChunkData <- legacy::read_chunk_data, ctx)),
                )
                .since(
                    V::V1_8,
                    Codec::new(0x21, decoder!(ChunkData <- flat::read_chunk_data, ctx)),
                )
                .since(
                    V::V1_9,
                    Codec::new(0x20, decoder!(ChunkData <- paletted::read_chunk_data, ctx)),
                )
                .since(
                    V::V1_9_4,
                    Codec::new(
                        0x20,
                        decoder!(ChunkData <- paletted::read_chunk_data_with_block_entities, ctx),
                    ),
                ),
        )
        .clientbound(
            Play,
            PacketKind::ChunkBulk,
            VersionTable::new()
                .since(
                    V::V1_7_10,
                    Codec::new(0x26, decoder!(ChunkBulk <- legacy::read_chunk_bulk, ctx)),
                )
                .since(
                    V::V1_8,
                    Codec::new(0x26, decoder!(ChunkBulk <- flat::read_chunk_bulk, ctx)),
                )
                .removed_in(V::V1_9),
        );

    // Play, client to server
    registry
        .serverbound(
            Play,
            PacketKind::KeepAlive,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x00, encoder!(KeepAlive -> KeepAlive::write_v1_7)))
                .since(V::V1_8, Codec::new(0x00, encoder!(KeepAlive -> KeepAlive::write_v1_8)))
                .since(V::V1_9, Codec::new(0x0B, encoder!(KeepAlive -> KeepAlive::write_v1_8)))
                .since(V::V1_12, Codec::new(0x0C, encoder!(KeepAlive -> KeepAlive::write_v1_8)))
                .since(V::V1_12_1, Codec::new(0x0B, encoder!(KeepAlive -> KeepAlive::write_v1_8)))
                .since(V::V1_12_2, Codec::new(0x0B, encoder!(KeepAlive -> KeepAlive::write_v1_12_2))),
        )
        .serverbound(
            Play,
            PacketKind::ChatSend,
            VersionTable::new()
                .since(V::V1_7_10, Codec::new(0x01, encoder!(ChatSend -> ChatSend::write)))
                .since(V::V1_9, Codec::new(0x02, encoder!(ChatSend -> ChatSend::write)))
                .since(V::V1_12, Codec::new(0x03, encoder!(ChatSend -> ChatSend::write)))
                .since(V::V1_12_1, Codec::new(0x02, encoder!(ChatSend -> ChatSend::write))),
        );

    registry
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use uuid::Uuid;

    use super::*;
    use crate::block::LegacyBlocks;
    use crate::codec::RawPacket;
    use crate::compression::Zlib;
    use crate::state::ConnectionState;

    fn ctx(version: V) -> DecodeContext {
        DecodeContext {
            version,
            blocks: Arc::new(LegacyBlocks),
            compressor: Arc::new(Zlib::default()),
        }
    }

    #[test]
    fn test_every_known_version_resolves() {
        for version in V::KNOWN {
            let resolved = registry().resolve(*version).unwrap();
            assert!(resolved.serverbound_id(PacketKind::Handshake).is_some());
            assert!(resolved.serverbound_id(PacketKind::KeepAlive).is_some());
        }
    }

    #[test]
    fn test_play_ids_move_in_1_9() {
        let v1_8 = registry().resolve(V::V1_8).unwrap();
        assert_eq!(v1_8.clientbound_kind(Play, 0x00), Some(PacketKind::KeepAlive));
        assert_eq!(v1_8.clientbound_kind(Play, 0x26), Some(PacketKind::ChunkBulk));
        assert_eq!(v1_8.clientbound_kind(Play, 0x46), Some(PacketKind::SetCompression));

        let v1_12_2 = registry().resolve(V::V1_12_2).unwrap();
        assert_eq!(v1_12_2.clientbound_kind(Play, 0x1F), Some(PacketKind::KeepAlive));
        assert_eq!(v1_12_2.clientbound_kind(Play, 0x26), None);
        assert_eq!(v1_12_2.clientbound_kind(Play, 0x46), None);
        assert_eq!(v1_12_2.serverbound_id(PacketKind::KeepAlive), Some((Play, 0x0B)));
    }

    #[test]
    fn test_unlisted_version_uses_floor() {
        let resolved = registry().resolve(V::new(200, "1.9.x")).unwrap();
        assert_eq!(resolved.clientbound_kind(Play, 0x20), Some(PacketKind::ChunkData));
        assert_eq!(resolved.serverbound_id(PacketKind::ChatSend), Some((Play, 0x02)));
    }

    #[test]
    fn test_1_12_shuffle_and_revert() {
        let at = |v| registry().resolve(v).unwrap().serverbound_id(PacketKind::ChatSend);
        assert_eq!(at(V::V1_11_2), Some((Play, 0x02)));
        assert_eq!(at(V::V1_12), Some((Play, 0x03)));
        assert_eq!(at(V::V1_12_1), Some((Play, 0x02)));
    }

    #[test]
    fn test_keep_alive_width_by_version() {
        let packet = ServerboundPacket::KeepAlive(KeepAlive::new(5));
        let encoded = |v| registry().resolve(v).unwrap().encode(Play, &packet).unwrap();

        assert_eq!(encoded(V::V1_7_10).payload.len(), 4);
        assert_eq!(encoded(V::V1_8).payload.len(), 1);
        assert_eq!(encoded(V::V1_12_1).payload.len(), 1);
        assert_eq!(encoded(V::V1_12_2).payload.len(), 8);
    }

    #[test]
    fn test_set_compression_absent_in_1_7_login() {
        let resolved = registry().resolve(V::V1_7_10).unwrap();
        let packet = RawPacket::new(0x03, Bytes::from_static(&[0x80, 0x02]));
        assert!(matches!(
            resolved.decode(Login, &packet, &ctx(V::V1_7_10)),
            Err(ProtocolError::UnknownPacket { .. })
        ));
    }

    #[test]
    fn test_login_success_through_registry() {
        let uuid = Uuid::new_v4();
        let mut writer = ByteWriter::new();
        LoginSuccess::new(uuid, "Steve").write(&mut writer);
        let packet = RawPacket::new(0x02, writer.into_inner().freeze());

        let resolved = registry().resolve(V::V1_12_2).unwrap();
        let decoded = resolved.decode(Login, &packet, &ctx(V::V1_12_2)).unwrap();
        assert_eq!(decoded, ClientboundPacket::LoginSuccess(LoginSuccess::new(uuid, "Steve")));
    }

    #[test]
    fn test_handshake_only_in_handshake_state() {
        let resolved = registry().resolve(V::V1_8).unwrap();
        let handshake = ServerboundPacket::Handshake(Handshake::new(
            47,
            "localhost",
            25565,
            crate::packets::NextState::Login,
        ));
        assert!(resolved.encode(ConnectionState::Handshake, &handshake).is_ok());
        assert!(matches!(
            resolved.encode(Play, &handshake),
            Err(ProtocolError::WrongState { .. })
        ));
    }
}
