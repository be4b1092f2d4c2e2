//! The persisted (save) chunk model: names and packed words as they sit on
//! disk, before any registry resolution. Conversion to and from the live
//! [`Chunk`](crate::chunk::column::Chunk) lives in `chunk::column`.

use std::collections::BTreeMap;

use async_nbt::NbtCompound;

/// A block-state palette entry in the save form: a name plus structured
/// properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedBlockState {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedBlockStates {
    pub palette: Vec<SavedBlockState>,
    pub data: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedBiomes {
    pub palette: Vec<String>,
    pub data: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedSection {
    /// Absolute vertical sub-chunk index, offset by the chunk's `y_pos`.
    pub y: i8,
    pub block_states: SavedBlockStates,
    pub biomes: SavedBiomes,
    pub sky_light: Option<Vec<u8>>,
    pub block_light: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedHeightmaps {
    pub motion_blocking: Option<Vec<u64>>,
    pub motion_blocking_no_leaves: Option<Vec<u64>>,
    pub ocean_floor: Option<Vec<u64>>,
    pub world_surface: Option<Vec<u64>>,
}

/// A block entity as persisted: world coordinates, a type name, and its
/// opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedBlockEntity {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub data: NbtCompound,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedChunk {
    pub x_pos: i32,
    /// Index of the lowest section.
    pub y_pos: i32,
    pub z_pos: i32,
    pub status: String,
    pub sections: Vec<SavedSection>,
    pub heightmaps: SavedHeightmaps,
    pub block_entities: Vec<SavedBlockEntity>,
}
