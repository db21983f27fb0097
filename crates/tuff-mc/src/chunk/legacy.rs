//! 1.7 chunk layout.
//!
//! Column payloads are zlib blobs holding, for the sections in the bitmask
//! and in this order: byte block ids, metadata nibbles, block light
//! nibbles, optional sky light nibbles, extended id nibbles for the
//! sections in the add bitmask, and finally the biome array.

use bytes::Bytes;
use rayon::prelude::*;

use super::{
    BIOME_BYTES, Chunk, ChunkColumn, ChunkLocation, ChunkSection, ColumnHeader, LocalPos,
    NibbleArray, SECTION_NIBBLE_BYTES, SECTION_VOLUME, SECTION_WIDTH, mask_sections, nibble, take,
};
use crate::block::BlockLookup;
use crate::buffer::ByteReader;
use crate::error::{ProtocolError, Result};
use crate::packets::DecodeContext;
use crate::packets::chunk::{ChunkBulk, ChunkData};

/// Decompressed bytes one column occupies.
#[must_use]
pub fn column_len(header: &ColumnHeader, sky_light: bool, biomes: bool) -> usize {
    let sections = header.section_mask.count_ones() as usize;
    let extended = header.add_mask.count_ones() as usize;
    let per_section = SECTION_VOLUME
        + 2 * SECTION_NIBBLE_BYTES
        + if sky_light { SECTION_NIBBLE_BYTES } else { 0 };

    sections * per_section
        + extended * SECTION_NIBBLE_BYTES
        + if biomes { BIOME_BYTES } else { 0 }
}

/// Decode one column from its decompressed payload.
///
/// `data` must be exactly [`column_len`] bytes long.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPacket`] if the payload is short or
/// long, or if the add bitmask names a section that is not present.
pub fn decode_column(
    mut data: &[u8],
    header: &ColumnHeader,
    sky_light: bool,
    biomes: bool,
    blocks: &dyn BlockLookup,
) -> Result<Chunk> {
    if header.add_mask & !header.section_mask != 0 {
        return Err(ProtocolError::malformed(format!(
            "add bitmask {:#06x} names sections outside {:#06x}",
            header.add_mask, header.section_mask
        )));
    }

    let sections = header.section_mask.count_ones() as usize;
    let extended = header.add_mask.count_ones() as usize;

    let block_ids = take(&mut data, sections * SECTION_VOLUME, "block ids")?;
    let metadata = take(&mut data, sections * SECTION_NIBBLE_BYTES, "metadata")?;
    let block_light = take(&mut data, sections * SECTION_NIBBLE_BYTES, "block light")?;
    let sky = if sky_light {
        Some(take(&mut data, sections * SECTION_NIBBLE_BYTES, "sky light")?)
    } else {
        None
    };
    let add = take(&mut data, extended * SECTION_NIBBLE_BYTES, "extended ids")?;
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
    for (ordinal, section_y) in mask_sections(header.section_mask).enumerate() {
        let base = ordinal * SECTION_VOLUME;
        let light_range = ordinal * SECTION_NIBBLE_BYTES..(ordinal + 1) * SECTION_NIBBLE_BYTES;

        // The add array only holds the flagged sections, packed in order.
        let add_base = (header.add_mask & (1u16 << section_y) != 0).then(|| {
            let below = header.add_mask & ((1u16 << section_y) - 1);
            below.count_ones() as usize * SECTION_VOLUME
        });

        let mut section = ChunkSection::new();
        for y in 0..SECTION_WIDTH {
            for z in 0..SECTION_WIDTH {
                for x in 0..SECTION_WIDTH {
                    let index = (y << 8) | (z << 4) | x;
                    let linear = base + index;

                    let mut id = u16::from(block_ids[linear]);
                    if let Some(add_base) = add_base {
                        id = (id << 4) | u16::from(nibble(add, add_base + index));
                    }
                    let meta = nibble(metadata, linear);

                    let block = blocks.by_legacy(id, meta);
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

fn read_header(reader: &mut ByteReader, location: ChunkLocation) -> Result<ColumnHeader> {
    Ok(ColumnHeader {
        location,
        section_mask: reader.read_u16()?,
        add_mask: reader.read_u16()?,
    })
}

fn read_size(reader: &mut ByteReader, what: &str) -> Result<usize> {
    let size = reader.read_i32()?;
    usize::try_from(size)
        .map_err(|_| ProtocolError::malformed(format!("negative {what} size {size}")))
}

/// Read a 1.7 chunk data packet.
///
/// The payload does not say whether sky light is present, so it is inferred
/// from the inflated size.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPacket`] if the payload fits neither
/// with nor without sky light, or a read error if the packet is short.
pub fn read_chunk_data(reader: &mut ByteReader, ctx: &DecodeContext) -> Result<ChunkData> {
    let location = ChunkLocation::new(reader.read_i32()?, reader.read_i32()?);
    let full = reader.read_bool()?;
    let header = read_header(reader, location)?;
    let size = read_size(reader, "compressed")?;
    let compressed = reader.read_bytes(size)?;

    let without_sky = column_len(&header, false, full);
    let with_sky = column_len(&header, true, full);
    let data = ctx
        .compressor
        .decompress_bounded(&compressed, with_sky)
        .map_err(|e| ProtocolError::malformed(format!("chunk payload: {e}")))?;

    let sky_light = match data.len() {
        n if n == without_sky => false,
        n if n == with_sky => true,
        n => {
            return Err(ProtocolError::malformed(format!(
                "column inflates to {n} bytes, expected {without_sky} or {with_sky}"
            )));
        }
    };

    let chunk = decode_column(&data, &header, sky_light, full, ctx.blocks.as_ref())?;
    Ok(ChunkData {
        column: ChunkColumn { location, chunk },
        full,
        section_mask: header.section_mask,
        block_entities: Bytes::new(),
    })
}

/// Read a 1.7 map chunk bulk packet.
///
/// Every column's span is computed from the headers up front and the
/// inflated payload must match their sum exactly, so a bad header drops the
/// packet before any column is decoded. Columns are then decoded in
/// parallel and returned in wire order.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPacket`] if the payload and the
/// headers disagree, or a read error if the packet is short.
pub fn read_chunk_bulk(reader: &mut ByteReader, ctx: &DecodeContext) -> Result<ChunkBulk> {
    let count = reader.read_i16()?;
    let count = usize::try_from(count)
        .map_err(|_| ProtocolError::malformed(format!("negative column count {count}")))?;
    let size = read_size(reader, "compressed")?;
    let sky_light = reader.read_bool()?;
    let compressed = reader.read_bytes(size)?;

    let headers = (0..count)
        .map(|_| {
            let location = ChunkLocation::new(reader.read_i32()?, reader.read_i32()?);
            read_header(reader, location)
        })
        .collect::<Result<Vec<_>>>()?;

    let total: usize = headers
        .iter()
        .map(|header| column_len(header, sky_light, true))
        .sum();
    let data = ctx
        .compressor
        .decompress(&compressed, total)
        .map_err(|e| ProtocolError::malformed(format!("bulk payload for {count} columns: {e}")))?;

    let mut rest = data.as_slice();
    let mut spans = Vec::with_capacity(headers.len());
    for header in &headers {
        let len = column_len(header, sky_light, true);
        spans.push((header, take(&mut rest, len, "bulk column")?));
    }

    let blocks = ctx.blocks.as_ref();
    let columns = spans
        .par_iter()
        .map(|(header, bytes)| {
            decode_column(bytes, header, sky_light, true, blocks).map(|chunk| ChunkColumn {
                location: header.location,
                chunk,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ChunkBulk { columns, sky_light })
}
