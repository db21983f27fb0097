//! Block lookup by legacy numeric id.
//!
//! Pre-1.13 worlds identify blocks by an 8 to 12 bit id plus a 4-bit
//! metadata value. The chunk decoders hand both to a [`BlockLookup`].

/// A resolved voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    /// Numeric block id (up to 12 bits with the extended nibble).
    pub id: u16,
    /// Auxiliary state, 4 bits.
    pub meta: u8,
    /// Namespaced identifier, `minecraft:unknown` if the id is not known.
    pub name: &'static str,
}

impl Block {
    /// The air block.
    pub const AIR: Self = Self {
        id: 0,
        meta: 0,
        name: "minecraft:air",
    };

    /// Identifier used for ids the lookup does not know.
    pub const UNKNOWN_NAME: &'static str = "minecraft:unknown";

    /// Whether this is air.
    #[must_use]
    pub const fn is_air(&self) -> bool {
        self.id == 0
    }

    /// Whether the lookup knew this id.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.name != Self::UNKNOWN_NAME
    }

    /// Global block state as used by 1.8+ wire formats: `id << 4 | meta`.
    #[must_use]
    pub const fn state(&self) -> u16 {
        (self.id << 4) | (self.meta as u16 & 0xF)
    }
}

/// Resolves numeric ids to block definitions.
pub trait BlockLookup: Send + Sync {
    /// Resolve `id` with `meta`.
    ///
    /// Must never fail: unknown ids produce a block named
    /// [`Block::UNKNOWN_NAME`] that still carries the raw id and metadata.
    fn by_legacy(&self, id: u16, meta: u8) -> Block;

    /// Resolve a 1.8+ global block state (`id << 4 | meta`).
    fn by_state(&self, state: u32) -> Block {
        #[allow(clippy::cast_possible_truncation)]
        let id = (state >> 4) as u16;
        #[allow(clippy::cast_possible_truncation)]
        let meta = (state & 0xF) as u8;
        self.by_legacy(id, meta)
    }
}

/// Vanilla block ids from the 1.7 - 1.12 era.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyBlocks;

const LEGACY_NAMES: &[&str] = &[
    "minecraft:air",
    "minecraft:stone",
    "minecraft:grass",
    "minecraft:dirt",
    "minecraft:cobblestone",
    "minecraft:planks",
    "minecraft:sapling",
    "minecraft:bedrock",
    "minecraft:flowing_water",
    "minecraft:water",
    "minecraft:flowing_lava",
    "minecraft:lava",
    "minecraft:sand",
    "minecraft:gravel",
    "minecraft:gold_ore",
    "minecraft:iron_ore",
    "minecraft:coal_ore",
    "minecraft:log",
    "minecraft:leaves",
    "minecraft:sponge",
    "minecraft:glass",
    "minecraft:lapis_ore",
    "minecraft:lapis_block",
    "minecraft:dispenser",
    "minecraft:sandstone",
    "minecraft:noteblock",
    "minecraft:bed",
    "minecraft:golden_rail",
    "minecraft:detector_rail",
    "minecraft:sticky_piston",
    "minecraft:web",
    "minecraft:tallgrass",
    "minecraft:deadbush",
    "minecraft:piston",
    "minecraft:piston_head",
    "minecraft:wool",
    "minecraft:piston_extension",
    "minecraft:yellow_flower",
    "minecraft:red_flower",
    "minecraft:brown_mushroom",
    "minecraft:red_mushroom",
    "minecraft:gold_block",
    "minecraft:iron_block",
    "minecraft:double_stone_slab",
    "minecraft:stone_slab",
    "minecraft:brick_block",
    "minecraft:tnt",
    "minecraft:bookshelf",
    "minecraft:mossy_cobblestone",
    "minecraft:obsidian",
    "minecraft:torch",
    "minecraft:fire",
    "minecraft:mob_spawner",
    "minecraft:oak_stairs",
    "minecraft:chest",
    "minecraft:redstone_wire",
    "minecraft:diamond_ore",
    "minecraft:diamond_block",
    "minecraft:crafting_table",
    "minecraft:wheat",
    "minecraft:farmland",
    "minecraft:furnace",
    "minecraft:lit_furnace",
    "minecraft:standing_sign",
    "minecraft:wooden_door",
    "minecraft:ladder",
    "minecraft:rail",
    "minecraft:stone_stairs",
    "minecraft:wall_sign",
    "minecraft:lever",
    "minecraft:stone_pressure_plate",
    "minecraft:iron_door",
    "minecraft:wooden_pressure_plate",
    "minecraft:redstone_ore",
    "minecraft:lit_redstone_ore",
    "minecraft:unlit_redstone_torch",
    "minecraft:redstone_torch",
    "minecraft:stone_button",
    "minecraft:snow_layer",
    "minecraft:ice",
    "minecraft:snow",
    "minecraft:cactus",
    "minecraft:clay",
    "minecraft:reeds",
    "minecraft:jukebox",
    "minecraft:fence",
    "minecraft:pumpkin",
    "minecraft:netherrack",
    "minecraft:soul_sand",
    "minecraft:glowstone",
    "minecraft:portal",
    "minecraft:lit_pumpkin",
    "minecraft:cake",
];

impl BlockLookup for LegacyBlocks {
    fn by_legacy(&self, id: u16, meta: u8) -> Block {
        if id == 0 {
            return Block::AIR;
        }

        let name = LEGACY_NAMES
            .get(usize::from(id))
            .copied()
            .unwrap_or(Block::UNKNOWN_NAME);

        Block {
            id,
            meta: meta & 0xF,
            name,
        }
    }
}
