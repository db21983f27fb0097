//! 1.9 - 1.12 chunk layout.
//!
//! Each section present in the bitmask is: bits per block (`u8`), a
//! `VarInt`-prefixed palette of `VarInt` block states, a `VarInt`-prefixed
//! array of `u64`s holding the packed palette indices, block light nibbles
//! and, in the overworld, sky light nibbles. Values may straddle two longs.
//! The biome array follows the last section in ground-up packets.

use bytes::Bytes;

use super::{
    BIOME_BYTES, Chunk, ChunkColumn, ChunkLocation, ChunkSection, LocalPos, NibbleArray,
    SECTION_NIBBLE_BYTES, SECTION_VOLUME, SECTION_WIDTH, mask_sections,
};
use crate::block::BlockLookup;
use crate::buffer::ByteReader;
use crate::error::{ProtocolError, Result};
use crate::packets::DecodeContext;
use crate::packets::chunk::ChunkData;

/// Widest palette-indexed section; wider sections carry global states.
pub const MAX_PALETTE_BITS: u8 = 8;

/// Bits per global block state in these versions.
pub const GLOBAL_BITS: u8 = 13;

const MIN_PALETTE_BITS: u8 = 4;
const MAX_PALETTE_LEN: usize = 1 << MAX_PALETTE_BITS;

/// Longs needed to pack a section at `bits` per block.
#[must_use]
pub const fn packed_len(bits: u8) -> usize {
    (SECTION_VOLUME * bits as usize).div_ceil(64)
}

/// Read the value at `index` from an array packed at `bits` per entry.
///
/// Returns `None` if the array is too short.
fn unpack(longs: &[u64], bits: u8, index: usize) -> Option<u32> {
    let bits = usize::from(bits);
    let mask = (1u64 << bits) - 1;
    let bit = index * bits;
    let start = bit / 64;
    let offset = bit % 64;

    let mut value = *longs.get(start)? >> offset;
    if offset + bits > 64 {
        value |= *longs.get(start + 1)? << (64 - offset);
    }

    #[allow(clippy::cast_possible_truncation)]
    Some((value & mask) as u32)
}

struct SectionHeader {
    bits: u8,
    palette: Vec<u32>,
    longs: Vec<u64>,
}

#[allow(clippy::cast_sign_loss)]
fn read_section_header(reader: &mut ByteReader) -> Result<SectionHeader> {
    let declared = reader.read_u8()?;
    if declared == 0 || declared > 32 {
        return Err(ProtocolError::malformed(format!(
            "section with {declared} bits per block"
        )));
    }
    let bits = if declared <= MAX_PALETTE_BITS {
        declared.max(MIN_PALETTE_BITS)
    } else {
        declared
    };

    let palette_len = reader.read_length()?;
    if palette_len > MAX_PALETTE_LEN {
        return Err(ProtocolError::malformed(format!(
            "palette of {palette_len} entries"
        )));
    }
    let palette = (0..palette_len)
        .map(|_| reader.read_varint().map(|state| state as u32))
        .collect::<Result<Vec<_>>>()?;

    let longs_len = reader.read_length()?;
    if longs_len != packed_len(bits) {
        return Err(ProtocolError::malformed(format!(
            "{longs_len} longs for {bits} bits per block, expected {}",
            packed_len(bits)
        )));
    }
    let longs = (0..longs_len)
        .map(|_| reader.read_u64())
        .collect::<Result<Vec<_>>>()?;

    Ok(SectionHeader {
        bits,
        palette,
        longs,
    })
}

fn read_section(
    reader: &mut ByteReader,
    sky_light: bool,
    blocks: &dyn BlockLookup,
) -> Result<ChunkSection> {
    let header = read_section_header(reader)?;
    let indirect = header.bits <= MAX_PALETTE_BITS;

    let mut section = ChunkSection::new();
    for y in 0..SECTION_WIDTH {
        for z in 0..SECTION_WIDTH {
            for x in 0..SECTION_WIDTH {
                let index = (y << 8) | (z << 4) | x;
                let value = unpack(&header.longs, header.bits, index)
                    .ok_or_else(|| ProtocolError::malformed("packed block array too short"))?;

                let state = if indirect {
                    *header.palette.get(value as usize).ok_or_else(|| {
                        ProtocolError::malformed(format!(
                            "palette index {value} out of {} entries",
                            header.palette.len()
                        ))
                    })?
                } else {
                    value
                };

                let block = blocks.by_state(state);
                if !block.is_air() {
                    section.set(LocalPos::from_index(index), block);
                }
            }
        }
    }

    let block_light = NibbleArray::from_slice(&reader.read_bytes(SECTION_NIBBLE_BYTES)?)?;
    let sky = if sky_light {
        Some(NibbleArray::from_slice(
            &reader.read_bytes(SECTION_NIBBLE_BYTES)?,
        )?)
    } else {
        None
    };
    section.set_light(block_light, sky);

    Ok(section)
}

/// Step over one section without decoding its blocks.
fn skip_section(reader: &mut ByteReader, sky_light: bool) -> Result<()> {
    read_section_header(reader)?;
    reader.read_bytes(SECTION_NIBBLE_BYTES)?;
    if sky_light {
        reader.read_bytes(SECTION_NIBBLE_BYTES)?;
    }
    Ok(())
}

/// Whether `data` parses as exactly `mask`'s sections with or without sky
/// light.
fn fits(data: &Bytes, section_mask: u16, sky_light: bool, biomes: bool) -> bool {
    let mut reader = ByteReader::new(data.clone());
    for _ in mask_sections(section_mask) {
        if skip_section(&mut reader, sky_light).is_err() {
            return false;
        }
    }
    if biomes && reader.read_bytes(BIOME_BYTES).is_err() {
        return false;
    }
    !reader.has_remaining()
}

/// Decode a column payload.
///
/// Whether sky light is present is not on the wire, so the payload is
/// walked once with and once without it and the layout that consumes it
/// exactly wins.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPacket`] if neither layout fits or a
/// section is inconsistent.
pub fn decode_column(
    data: &Bytes,
    section_mask: u16,
    biomes: bool,
    blocks: &dyn BlockLookup,
) -> Result<Chunk> {
    let sky_light = if fits(data, section_mask, true, biomes) {
        true
    } else if fits(data, section_mask, false, biomes) {
        false
    } else {
        return Err(ProtocolError::malformed(format!(
            "{} byte column does not match section mask {section_mask:#06x}",
            data.len()
        )));
    };

    let mut reader = ByteReader::new(data.clone());
    let mut chunk = Chunk::new();
    for section_y in mask_sections(section_mask) {
        let section = read_section(&mut reader, sky_light, blocks).map_err(|e| match e {
            ProtocolError::TruncatedInput { .. } => {
                ProtocolError::malformed(format!("section {section_y}: {e}"))
            }
            other => other,
        })?;
        chunk.insert_section(section_y, section);
    }
    if biomes {
        chunk.set_biomes(&reader.read_bytes(BIOME_BYTES)?);
    }

    Ok(chunk)
}

fn read_header(reader: &mut ByteReader) -> Result<(ChunkLocation, bool, u16, Bytes)> {
    let location = ChunkLocation::new(reader.read_i32()?, reader.read_i32()?);
    let full = reader.read_bool()?;
    let mask = reader.read_varint()?;
    let section_mask = u16::try_from(mask)
        .map_err(|_| ProtocolError::malformed(format!("section mask {mask:#x} out of range")))?;
    let size = reader.read_length()?;
    let data = reader.read_bytes(size)?;
    Ok((location, full, section_mask, data))
}

/// Read a 1.9 - 1.9.2 chunk data packet.
///
/// # Errors
///
/// See [`decode_column`].
pub fn read_chunk_data(reader: &mut ByteReader, ctx: &DecodeContext) -> Result<ChunkData> {
    let (location, full, section_mask, data) = read_header(reader)?;
    let chunk = decode_column(&data, section_mask, full, ctx.blocks.as_ref())?;
    Ok(ChunkData {
        column: ChunkColumn { location, chunk },
        full,
        section_mask,
        block_entities: Bytes::new(),
    })
}

/// Read a 1.9.4+ chunk data packet, which ends with block entity NBT.
///
/// The NBT is kept undecoded.
///
/// # Errors
///
/// See [`decode_column`].
pub fn read_chunk_data_with_block_entities(
    reader: &mut ByteReader,
    ctx: &DecodeContext,
) -> Result<ChunkData> {
    let mut packet = read_chunk_data(reader, ctx)?;
    let count = reader.read_length()?;
    let block_entities = reader.read_remaining();
    if count > 0 && block_entities.is_empty() {
        return Err(ProtocolError::malformed(format!(
            "{count} block entities declared, none sent"
        )));
    }
    packet.block_entities = block_entities;
    Ok(packet)
}
