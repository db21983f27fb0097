//! Chunk packets.
//!
//! The payload layouts live in [`crate::chunk`]; these are the decoded
//! packet values.

use bytes::Bytes;

use crate::chunk::ChunkColumn;

/// Chunk Data packet (server -> client): one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    pub column: ChunkColumn,
    /// Ground-up: the column replaces any existing one and carries biomes.
    pub full: bool,
    /// Sections sent, as on the wire.
    pub section_mask: u16,
    /// Undecoded block entity NBT (1.9.4+), empty otherwise.
    pub block_entities: Bytes,
}

/// Map Chunk Bulk packet (server -> client), 1.7 and 1.8 only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBulk {
    /// Columns in wire order.
    pub columns: Vec<ChunkColumn>,
    pub sky_light: bool,
}
