//! 1.8 chunk layout.
//!
//! Uncompressed. For the sections in the bitmask: little-endian `u16`
//! block states (`id << 4 | meta`), block light nibbles, optional sky light
//! nibbles; then the biome array if the packet is ground-up.

use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;

use super::{
    BIOME_BYTES, Chunk, ChunkColumn, ChunkLocation, ChunkSection, ColumnHeader, LocalPos,
    NibbleArray, SECTION_NIBBLE_BYTES, SECTION_VOLUME, SECTION_WIDTH, mask_sections, take,
};
use crate::block::BlockLookup;
use crate::buffer::ByteReader;
use crate::error::{ProtocolError, Result};
use crate::packets::DecodeContext;
use crate::packets::chunk::{ChunkBulk, ChunkData};

const STATE_BYTES: usize = SECTION_VOLUME * 2;

/// Bytes one column occupies.
#[must_use]
pub fn column_len(section_mask: u16, sky_light: bool, biomes: bool) -> usize {
    let sections = section_mask.count_ones() as usize;
    let per_section =
        STATE_BYTES + SECTION_NIBBLE_BYTES + if sky_light { SECTION_NIBBLE_BYTES } else { 0 };

    sections * per_section + if biomes { BIOME_BYTES } else { 0 }
}

/// Decode one column; `data` must be exactly [`column_len`] bytes long.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPacket`] on a short or long payload.
pub fn decode_column(
    mut data: &[u8],
    section_mask: u16,
    sky_light: bool,
    biomes: bool,
    blocks: &dyn BlockLookup,
) -> Result<Chunk> {
    let sections = section_mask.count_ones() as usize;

    let states = take(&mut data, sections * STATE_BYTES, "block states")?;
    let block_light = take(&mut data, sections * SECTION_NIBBLE_BYTES, "block light")?;
    let sky = if sky_light {
        Some(take(&mut data, sections * SECTION_NIBBLE_BYTES, "sky light")?)
    } else {
        None
    };
    let biome_bytes = if biomes {
        Some(take(&mut data, BIOME_BYTES, "biomes")?)
    } else {
        None
    };
    if !data.is_empty() {
        return Err(ProtocolError::malformed(format!(
            "{} trailing bytes after column",
            data.len()
        )));
    }

    let mut chunk = Chunk::new();
    for (ordinal, section_y) in mask_sections(section_mask).enumerate() {
        let section_states = &states[ordinal * STATE_BYTES..(ordinal + 1) * STATE_BYTES];
        let light_range = ordinal * SECTION_NIBBLE_BYTES..(ordinal + 1) * SECTION_NIBBLE_BYTES;

        let mut section = ChunkSection::new();
        for y in 0..SECTION_WIDTH {
            for z in 0..SECTION_WIDTH {
                for x in 0..SECTION_WIDTH {
                    let index = (y << 8) | (z << 4) | x;
                    let state = LittleEndian::read_u16(&section_states[index * 2..index * 2 + 2]);
                    let block = blocks.by_state(u32::from(state));
                    if !block.is_air() {
                        section.set(LocalPos::from_index(index), block);
                    }
                }
            }
        }

        section.set_light(
            NibbleArray::from_slice(&block_light[light_range.clone()])?,
            sky.map(|sky| NibbleArray::from_slice(&sky[light_range]))
                .transpose()?,
        );
        chunk.insert_section(section_y, section);
    }

    if let Some(biome_bytes) = biome_bytes {
        chunk.set_biomes(biome_bytes);
    }

    Ok(chunk)
}

/// Read a 1.8 chunk data packet, inferring sky light from the payload size.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPacket`] if the payload fits neither
/// with nor without sky light.
pub fn read_chunk_data(reader: &mut ByteReader, ctx: &DecodeContext) -> Result<ChunkData> {
    let location = ChunkLocation::new(reader.read_i32()?, reader.read_i32()?);
    let full = reader.read_bool()?;
    let section_mask = reader.read_u16()?;
    let size = reader.read_length()?;
    let data = reader.read_bytes(size)?;

    let without_sky = column_len(section_mask, false, full);
    let with_sky = column_len(section_mask, true, full);
    let sky_light = match data.len() {
        n if n == without_sky => false,
        n if n == with_sky => true,
        n => {
            return Err(ProtocolError::malformed(format!(
                "column of {n} bytes, expected {without_sky} or {with_sky}"
            )));
        }
    };

    let chunk = decode_column(&data, section_mask, sky_light, full, ctx.blocks.as_ref())?;
    Ok(ChunkData {
        column: ChunkColumn { location, chunk },
        full,
        section_mask,
        block_entities: bytes::Bytes::new(),
    })
}

/// Read a 1.8 map chunk bulk packet.
///
/// Column spans are validated against the remaining payload before any
/// column is decoded; columns are then decoded in parallel.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPacket`] if the headers and the
/// payload disagree.
pub fn read_chunk_bulk(reader: &mut ByteReader, ctx: &DecodeContext) -> Result<ChunkBulk> {
    let sky_light = reader.read_bool()?;
    let count = reader.read_length()?;
    let headers = (0..count)
        .map(|_| {
            Ok(ColumnHeader {
                location: ChunkLocation::new(reader.read_i32()?, reader.read_i32()?),
                section_mask: reader.read_u16()?,
                add_mask: 0,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let total: usize = headers
        .iter()
        .map(|header| column_len(header.section_mask, sky_light, true))
        .sum();
    let data = reader.read_remaining();
    if data.len() != total {
        return Err(ProtocolError::malformed(format!(
            "{count} columns declare {total} bytes, payload has {}",
            data.len()
        )));
    }

    let mut rest = &data[..];
    let mut spans = Vec::with_capacity(headers.len());
    for header in &headers {
        let len = column_len(header.section_mask, sky_light, true);
        spans.push((header, take(&mut rest, len, "bulk column")?));
    }

    let blocks = ctx.blocks.as_ref();
    let columns = spans
        .par_iter()
        .map(|(header, bytes)| {
            decode_column(bytes, header.section_mask, sky_light, true, blocks).map(|chunk| {
                ChunkColumn {
                    location: header.location,
                    chunk,
                }
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ChunkBulk { columns, sky_light })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::block::LegacyBlocks;
    use crate::buffer::ByteWriter;
    use crate::compression::Zlib;
    use crate::version::ProtocolVersion;

    fn ctx() -> DecodeContext {
        DecodeContext {
            version: ProtocolVersion::V1_8,
            blocks: Arc::new(LegacyBlocks),
            compressor: Arc::new(Zlib::default()),
        }
    }

    fn column_bytes(section_mask: u16, sky: bool, state: u16) -> Vec<u8> {
        let sections = section_mask.count_ones() as usize;
        let mut data = Vec::new();
        for _ in 0..sections * SECTION_VOLUME {
            data.extend_from_slice(&state.to_le_bytes());
        }
        data.extend(std::iter::repeat_n(0x11, sections * SECTION_NIBBLE_BYTES));
        if sky {
            data.extend(std::iter::repeat_n(0xFF, sections * SECTION_NIBBLE_BYTES));
        }
        data
    }

    #[test]
    fn test_states_are_little_endian() {
        // Wool (35), orange (1).
        let state = (35 << 4) | 1;
        let data = column_bytes(0x0001, false, state);
        let chunk = decode_column(&data, 0x0001, false, false, &LegacyBlocks).unwrap();

        let block = chunk.block(15, 15, 15).unwrap();
        assert_eq!(block.name, "minecraft:wool");
        assert_eq!(block.meta, 1);
        assert!(chunk.biomes().is_none());
    }

    #[test]
    fn test_air_is_omitted() {
        let data = column_bytes(0x0003, true, 0);
        let chunk = decode_column(&data, 0x0003, true, false, &LegacyBlocks).unwrap();
        assert_eq!(chunk.section_count(), 2);
        assert!(chunk.sections().all(|(_, s)| s.block_count() == 0));
    }

    #[test]
    fn test_chunk_data_infers_sky_light() {
        for sky in [false, true] {
            let mut payload = column_bytes(0x0001, sky, 1 << 4);
            payload.extend(std::iter::repeat_n(4, BIOME_BYTES));

            let mut writer = ByteWriter::new();
            writer.write_i32(-1);
            writer.write_i32(2);
            writer.write_bool(true);
            writer.write_u16(0x0001);
            writer.write_varint(i32::try_from(payload.len()).unwrap());
            writer.write_bytes(&payload);

            let mut reader = ByteReader::new(writer.into_inner().freeze());
            let packet = read_chunk_data(&mut reader, &ctx()).unwrap();
            let section = packet.column.chunk.section(0).unwrap();
            assert_eq!(section.sky_light().is_some(), sky);
            assert_eq!(section.block_count(), SECTION_VOLUME);
            assert_eq!(packet.column.chunk.biomes().unwrap()[0], 4);
        }
    }

    #[test]
    fn test_bulk_mismatched_payload() {
        let mut writer = ByteWriter::new();
        writer.write_bool(true);
        writer.write_varint(1);
        writer.write_i32(0);
        writer.write_i32(0);
        writer.write_u16(0x0001);
        writer.write_bytes(&column_bytes(0x0001, true, 1 << 4));
        // Biomes missing.

        let mut reader = ByteReader::new(writer.into_inner().freeze());
        assert!(matches!(
            read_chunk_bulk(&mut reader, &ctx()),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_bulk_columns_in_order() {
        let masks = [0x0001u16, 0x0000, 0x0010];
        let mut writer = ByteWriter::new();
        writer.write_bool(false);
        writer.write_varint(3);
        for (i, mask) in masks.iter().enumerate() {
            writer.write_i32(i32::try_from(i).unwrap());
            writer.write_i32(0);
            writer.write_u16(*mask);
        }
        for mask in masks {
            writer.write_bytes(&column_bytes(mask, false, 1 << 4));
            writer.write_bytes(&[0; BIOME_BYTES]);
        }

        let mut reader = ByteReader::new(writer.into_inner().freeze());
        let bulk = read_chunk_bulk(&mut reader, &ctx()).unwrap();
        let found: Vec<_> = bulk
            .columns
            .iter()
            .map(|c| (c.location.x, c.chunk.section_mask()))
            .collect();
        assert_eq!(found, [(0, 0x0001), (1, 0x0000), (2, 0x0010)]);
    }
}
