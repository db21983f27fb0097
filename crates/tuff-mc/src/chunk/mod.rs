//! Chunk columns and the wire formats they arrive in.
//!
//! A column is 16x16 blocks wide and up to 16 sections tall. Only sections
//! whose bit is set in the section bitmask exist in a [`Chunk`]; a missing
//! section means "nothing was sent", not "full of air". Inside a section
//! blocks are stored sparsely and air is never stored.
//!
//! Layouts by protocol version:
//! - [`legacy`]: 1.7, zlib blob of byte ids + nibble metadata/light + extended ids
//! - [`flat`]: 1.8, little-endian `u16` block states, uncompressed
//! - [`paletted`]: 1.9 - 1.12, palette + packed long arrays per section

pub mod flat;
pub mod legacy;
pub mod paletted;

use std::collections::{BTreeMap, HashMap};

use crate::block::Block;
use crate::error::{ProtocolError, Result};

/// Blocks per section edge.
pub const SECTION_WIDTH: usize = 16;

/// Blocks per section (16 * 16 * 16).
pub const SECTION_VOLUME: usize = SECTION_WIDTH * SECTION_WIDTH * SECTION_WIDTH;

/// Bytes of a nibble array covering one section.
pub const SECTION_NIBBLE_BYTES: usize = SECTION_VOLUME / 2;

/// Bytes of the per-column biome array.
pub const BIOME_BYTES: usize = 256;

/// Sections in a column for the supported versions.
pub const SECTIONS_PER_COLUMN: u8 = 16;

/// Column coordinate (block coordinate divided by 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkLocation {
    pub x: i32,
    pub z: i32,
}

impl ChunkLocation {
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Position of a block inside a section, each axis in `0..16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    /// # Panics
    ///
    /// Panics in debug builds if an axis is 16 or more.
    #[must_use]
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!(x < 16 && y < 16 && z < 16, "local position out of range");
        Self { x, y, z }
    }

    /// Linear index within a section: Y outermost, then Z, then X.
    #[must_use]
    pub const fn index(self) -> usize {
        ((self.y as usize) << 8) | ((self.z as usize) << 4) | self.x as usize
    }

    /// Inverse of [`LocalPos::index`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_index(index: usize) -> Self {
        Self {
            x: (index & 0xF) as u8,
            y: ((index >> 8) & 0xF) as u8,
            z: ((index >> 4) & 0xF) as u8,
        }
    }
}

/// Read the 4-bit value at `index` from a packed nibble array.
///
/// Even indices live in the low nibble of `bytes[index / 2]`, odd ones in
/// the high nibble.
#[must_use]
pub fn nibble(bytes: &[u8], index: usize) -> u8 {
    let byte = bytes[index / 2];
    if index % 2 == 0 {
        byte & 0x0F
    } else {
        byte >> 4
    }
}

/// One section's worth of 4-bit values (light levels).
#[derive(Clone, PartialEq, Eq)]
pub struct NibbleArray(Box<[u8]>);

impl NibbleArray {
    /// Wrap exactly [`SECTION_NIBBLE_BYTES`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPacket`] for any other length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECTION_NIBBLE_BYTES {
            return Err(ProtocolError::malformed(format!(
                "nibble array of {} bytes",
                bytes.len()
            )));
        }
        Ok(Self(bytes.into()))
    }

    /// Value at a local position.
    #[must_use]
    pub fn get(&self, pos: LocalPos) -> u8 {
        nibble(&self.0, pos.index())
    }

    /// The packed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for NibbleArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NibbleArray").field(&self.0.len()).finish()
    }
}

/// A 16x16x16 sub-volume of a column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSection {
    blocks: HashMap<LocalPos, Block>,
    block_light: Option<NibbleArray>,
    sky_light: Option<NibbleArray>,
}

impl ChunkSection {
    /// Create an empty section.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block; air is dropped instead of stored.
    pub fn set(&mut self, pos: LocalPos, block: Block) {
        if block.is_air() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, block);
        }
    }

    /// The block at `pos`, `None` for air.
    #[must_use]
    pub fn get(&self, pos: LocalPos) -> Option<&Block> {
        self.blocks.get(&pos)
    }

    /// Number of non-air blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterate over the non-air blocks.
    pub fn blocks(&self) -> impl Iterator<Item = (&LocalPos, &Block)> {
        self.blocks.iter()
    }

    #[must_use]
    pub const fn block_light(&self) -> Option<&NibbleArray> {
        self.block_light.as_ref()
    }

    #[must_use]
    pub const fn sky_light(&self) -> Option<&NibbleArray> {
        self.sky_light.as_ref()
    }

    pub(crate) fn set_light(&mut self, block: NibbleArray, sky: Option<NibbleArray>) {
        self.block_light = Some(block);
        self.sky_light = sky;
    }
}

/// A decoded chunk column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    sections: BTreeMap<u8, ChunkSection>,
    biomes: Option<Box<[u8]>>,
}

impl Chunk {
    /// Create a column with no sections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Section at height index `y`, if it was sent.
    #[must_use]
    pub fn section(&self, y: u8) -> Option<&ChunkSection> {
        self.sections.get(&y)
    }

    /// Sections in ascending height order.
    pub fn sections(&self) -> impl Iterator<Item = (u8, &ChunkSection)> {
        self.sections.iter().map(|(y, s)| (*y, s))
    }

    /// Number of sections present.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Bitmask of the sections present.
    #[must_use]
    pub fn section_mask(&self) -> u16 {
        self.sections.keys().fold(0u16, |mask, y| mask | (1u16 << y))
    }

    /// Biome ids, one byte per `(x, z)` column, if they were sent.
    #[must_use]
    pub fn biomes(&self) -> Option<&[u8]> {
        self.biomes.as_deref()
    }

    /// Block at column-local coordinates; `y` spans all sections.
    #[must_use]
    pub fn block(&self, x: u8, y: u8, z: u8) -> Option<&Block> {
        self.section(y >> 4)?.get(LocalPos::new(x, y & 0xF, z))
    }

    pub(crate) fn insert_section(&mut self, y: u8, section: ChunkSection) {
        self.sections.insert(y, section);
    }

    pub(crate) fn set_biomes(&mut self, biomes: &[u8]) {
        self.biomes = Some(biomes.into());
    }
}

/// A column with its location, as produced by the decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkColumn {
    pub location: ChunkLocation,
    pub chunk: Chunk,
}

/// Per-column header of the bulk packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnHeader {
    pub location: ChunkLocation,
    /// Sections present in the payload.
    pub section_mask: u16,
    /// Sections carrying an extended id nibble array (1.7 only).
    pub add_mask: u16,
}

/// Sections present in `mask`, lowest first.
pub(crate) fn mask_sections(mask: u16) -> impl Iterator<Item = u8> {
    (0..SECTIONS_PER_COLUMN).filter(move |y| mask & (1u16 << y) != 0)
}

/// Split `n` bytes off the front of `data`.
///
/// Short reads become [`ProtocolError::MalformedPacket`] so a bad column
/// drops its packet rather than the connection.
pub(crate) fn take<'a>(data: &mut &'a [u8], n: usize, what: &str) -> Result<&'a [u8]> {
    if data.len() < n {
        return Err(ProtocolError::malformed(format!(
            "chunk data ends inside {what}: needed {n} bytes, {} left",
            data.len()
        )));
    }
    let (head, tail) = data.split_at(n);
    *data = tail;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_parity() {
        let bytes = [0xAB, 0xCD];
        assert_eq!(nibble(&bytes, 0), 0xB);
        assert_eq!(nibble(&bytes, 1), 0xA);
        assert_eq!(nibble(&bytes, 2), 0xD);
        assert_eq!(nibble(&bytes, 3), 0xC);
    }

    #[test]
    fn test_local_pos_index_order() {
        // X is innermost, then Z, then Y.
        assert_eq!(LocalPos::new(1, 0, 0).index(), 1);
        assert_eq!(LocalPos::new(0, 0, 1).index(), 16);
        assert_eq!(LocalPos::new(0, 1, 0).index(), 256);
        for index in [0, 1, 17, 255, 256, 4095] {
            assert_eq!(LocalPos::from_index(index).index(), index);
        }
    }

    #[test]
    fn test_section_never_stores_air() {
        let mut section = ChunkSection::new();
        let pos = LocalPos::new(3, 4, 5);
        section.set(pos, Block::AIR);
        assert_eq!(section.block_count(), 0);

        let stone = Block {
            id: 1,
            meta: 0,
            name: "minecraft:stone",
        };
        section.set(pos, stone);
        assert_eq!(section.get(pos), Some(&stone));
        section.set(pos, Block::AIR);
        assert!(section.get(pos).is_none());
    }

    #[test]
    fn test_mask_sections() {
        assert_eq!(mask_sections(0b1000_0000_0000_0101).collect::<Vec<_>>(), [0, 2, 15]);
        assert_eq!(mask_sections(0).count(), 0);
    }

    #[test]
    fn test_take_short_read() {
        let mut data: &[u8] = &[1, 2, 3];
        assert_eq!(take(&mut data, 2, "ids").unwrap(), &[1, 2]);
        assert!(matches!(
            take(&mut data, 2, "ids"),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }
}
