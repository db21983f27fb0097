//! Play state packets other than chunks.
//!
//! Layouts that changed between releases have one reader or writer per
//! layout, named after the first release that used it. The registry picks
//! the right one for the negotiated version.

use crate::buffer::{ByteReader, ByteWriter};
use crate::error::Result;
use crate::version::ProtocolVersion;

/// Maximum chat message a client may send (pre-1.11 limit).
pub const MAX_CHAT_LENGTH: usize = 100;

/// Maximum chat message a client may send from 1.11 on.
pub const MAX_CHAT_LENGTH_V1_11: usize = 256;

/// Longest chat message the server accepts at `version`, in characters.
#[must_use]
pub fn max_chat_length(version: ProtocolVersion) -> usize {
    if version >= ProtocolVersion::V1_11 {
        MAX_CHAT_LENGTH_V1_11
    } else {
        MAX_CHAT_LENGTH
    }
}

/// Maximum JSON chat component length.
const MAX_CHAT_JSON_LENGTH: usize = 262_144;

/// Maximum level type length.
const MAX_LEVEL_TYPE_LENGTH: usize = 16;

// =============================================================================
// KeepAlive (both directions)
// =============================================================================

/// Keep Alive packet.
///
/// The server sends one periodically and the client echoes the id back.
/// The id is an `i32` in 1.7, a `VarInt` from 1.8 and an `i64` from 1.12.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub id: i64,
}

impl KeepAlive {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self { id }
    }

    /// # Errors
    ///
    /// Returns an error if fewer than 4 bytes remain.
    pub fn read_v1_7(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self::new(i64::from(reader.read_i32()?)))
    }

    /// # Errors
    ///
    /// Returns an error if the `VarInt` is malformed.
    pub fn read_v1_8(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self::new(i64::from(reader.read_varint()?)))
    }

    /// # Errors
    ///
    /// Returns an error if fewer than 8 bytes remain.
    pub fn read_v1_12_2(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self::new(reader.read_i64()?))
    }

    // Truncates ids that do not fit the older layouts.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_v1_7(&self, writer: &mut ByteWriter) {
        writer.write_i32(self.id as i32);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn write_v1_8(&self, writer: &mut ByteWriter) {
        writer.write_varint(self.id as i32);
    }

    pub fn write_v1_12_2(&self, writer: &mut ByteWriter) {
        writer.write_i64(self.id);
    }
}

// =============================================================================
// JoinGame (Server -> Client)
// =============================================================================

/// Join Game packet (server -> client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGame {
    /// The player's entity id.
    pub entity_id: i32,
    /// Game mode (0 survival, 1 creative, 2 adventure, 3 spectator).
    pub game_mode: u8,
    /// Hardcore flag, sent as bit 3 of the game mode byte.
    pub hardcore: bool,
    /// Dimension (-1 nether, 0 overworld, 1 end).
    pub dimension: i32,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,
    /// Always `false` before 1.8.
    pub reduced_debug_info: bool,
}

impl JoinGame {
    fn read_common(reader: &mut ByteReader, wide_dimension: bool) -> Result<Self> {
        let entity_id = reader.read_i32()?;
        let mode = reader.read_u8()?;
        let dimension = if wide_dimension {
            reader.read_i32()?
        } else {
            i32::from(reader.read_i8()?)
        };

        Ok(Self {
            entity_id,
            game_mode: mode & 0x7,
            hardcore: mode & 0x8 != 0,
            dimension,
            difficulty: reader.read_u8()?,
            max_players: reader.read_u8()?,
            level_type: reader.read_string(MAX_LEVEL_TYPE_LENGTH)?,
            reduced_debug_info: false,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read_v1_7(reader: &mut ByteReader) -> Result<Self> {
        Self::read_common(reader, false)
    }

    /// 1.8 adds the reduced debug info flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read_v1_8(reader: &mut ByteReader) -> Result<Self> {
        let mut packet = Self::read_common(reader, false)?;
        packet.reduced_debug_info = reader.read_bool()?;
        Ok(packet)
    }

    /// 1.9.1 widens the dimension to an `i32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read_v1_9_1(reader: &mut ByteReader) -> Result<Self> {
        let mut packet = Self::read_common(reader, true)?;
        packet.reduced_debug_info = reader.read_bool()?;
        Ok(packet)
    }

    /// Encode the 1.9.1+ layout.
    pub fn write_v1_9_1(&self, writer: &mut ByteWriter) {
        writer.write_i32(self.entity_id);
        writer.write_u8(self.game_mode | if self.hardcore { 0x8 } else { 0 });
        writer.write_i32(self.dimension);
        writer.write_u8(self.difficulty);
        writer.write_u8(self.max_players);
        writer.write_string(&self.level_type);
        writer.write_bool(self.reduced_debug_info);
    }
}

// =============================================================================
// ChatMessage (Server -> Client)
// =============================================================================

/// Where a chat message is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPosition {
    Chat,
    System,
    ActionBar,
}

impl ChatPosition {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::System,
            2 => Self::ActionBar,
            _ => Self::Chat,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Chat => 0,
            Self::System => 1,
            Self::ActionBar => 2,
        }
    }
}

/// Chat Message packet (server -> client).
///
/// The message is a JSON text component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub json: String,
    /// Always [`ChatPosition::Chat`] before 1.8.
    pub position: ChatPosition,
}

impl ChatMessage {
    #[must_use]
    pub fn new(json: impl Into<String>, position: ChatPosition) -> Self {
        Self {
            json: json.into(),
            position,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read_v1_7(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self::new(
            reader.read_string(MAX_CHAT_JSON_LENGTH)?,
            ChatPosition::Chat,
        ))
    }

    /// 1.8 appends the position byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read_v1_8(reader: &mut ByteReader) -> Result<Self> {
        let json = reader.read_string(MAX_CHAT_JSON_LENGTH)?;
        let position = ChatPosition::from_u8(reader.read_u8()?);
        Ok(Self { json, position })
    }

    pub fn write_v1_8(&self, writer: &mut ByteWriter) {
        writer.write_string(&self.json);
        writer.write_u8(self.position.as_u8());
    }
}

// =============================================================================
// ChatSend (Client -> Server)
// =============================================================================

/// Chat Message packet (client -> server).
///
/// Plain text, not JSON. Messages starting with `/` are commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSend {
    pub message: String,
}

impl ChatSend {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_string(&self.message);
    }

    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self::new(reader.read_string(MAX_CHAT_LENGTH_V1_11)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(writer: ByteWriter) -> ByteReader {
        ByteReader::new(writer.into_inner().freeze())
    }

    #[test]
    fn test_keep_alive_layouts() {
        let keep_alive = KeepAlive::new(300);

        let mut writer = ByteWriter::new();
        keep_alive.write_v1_7(&mut writer);
        assert_eq!(writer.len(), 4);
        assert_eq!(KeepAlive::read_v1_7(&mut reader(writer)).unwrap(), keep_alive);

        let mut writer = ByteWriter::new();
        keep_alive.write_v1_8(&mut writer);
        assert_eq!(writer.len(), 2);
        assert_eq!(KeepAlive::read_v1_8(&mut reader(writer)).unwrap(), keep_alive);

        let mut writer = ByteWriter::new();
        keep_alive.write_v1_12_2(&mut writer);
        assert_eq!(writer.len(), 8);
        assert_eq!(KeepAlive::read_v1_12_2(&mut reader(writer)).unwrap(), keep_alive);
    }

    #[test]
    fn test_join_game_hardcore_bit() {
        let mut writer = ByteWriter::new();
        writer.write_i32(42);
        writer.write_u8(0x8 | 1);
        writer.write_i8(-1);
        writer.write_u8(2);
        writer.write_u8(20);
        writer.write_string("default");

        let join = JoinGame::read_v1_7(&mut reader(writer)).unwrap();
        assert_eq!(join.entity_id, 42);
        assert_eq!(join.game_mode, 1);
        assert!(join.hardcore);
        assert_eq!(join.dimension, -1);
        assert_eq!(join.level_type, "default");
        assert!(!join.reduced_debug_info);
    }

    #[test]
    fn test_join_game_wide_dimension() {
        let join = JoinGame {
            entity_id: 7,
            game_mode: 3,
            hardcore: false,
            dimension: 1,
            difficulty: 0,
            max_players: 8,
            level_type: "flat".to_string(),
            reduced_debug_info: true,
        };
        let mut writer = ByteWriter::new();
        join.write_v1_9_1(&mut writer);
        assert_eq!(JoinGame::read_v1_9_1(&mut reader(writer)).unwrap(), join);
    }

    #[test]
    fn test_chat_length_limit() {
        assert_eq!(max_chat_length(ProtocolVersion::V1_8), 100);
        assert_eq!(max_chat_length(ProtocolVersion::V1_10), 100);
        assert_eq!(max_chat_length(ProtocolVersion::V1_11), 256);
        assert_eq!(max_chat_length(ProtocolVersion::V1_12_2), 256);
    }

    #[test]
    fn test_chat_position() {
        let message = ChatMessage::new(r#"{"text":"hi"}"#, ChatPosition::ActionBar);
        let mut writer = ByteWriter::new();
        message.write_v1_8(&mut writer);
        assert_eq!(ChatMessage::read_v1_8(&mut reader(writer)).unwrap(), message);
    }
}
