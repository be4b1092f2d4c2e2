pub mod bit_storage;
pub mod column;
pub mod palette;
pub mod section;

use async_trait::async_trait;
use craftbot_derive::{ReadProt, SizedProt, WriteProt};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};

pub const SECTION_EDGE: usize = 16;
/// Block-state slots per section.
pub const SECTION_BLOCKS: usize = SECTION_EDGE * SECTION_EDGE * SECTION_EDGE;
/// Biome slots per section (4x4x4 cells).
pub const SECTION_BIOMES: usize = 4 * 4 * 4;
/// Half a byte of light per block.
pub const LIGHT_BYTES: usize = SECTION_BLOCKS / 2;

pub const MIN_PALETTE_BITS_BLOCKS: usize = 4;
pub const MAX_PALETTE_BITS_BLOCKS: usize = 8;
pub const GLOBAL_PALETTE_BITS_BLOCKS: usize = 15;

pub const MIN_PALETTE_BITS_BIOMES: usize = 1;
pub const MAX_PALETTE_BITS_BIOMES: usize = 3;
pub const GLOBAL_PALETTE_BITS_BIOMES: usize = 6;

/// A canonical block-state id, as assigned by the block registry.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct BlockState(pub u32);

/// A canonical biome id, as assigned by the biome registry.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Biome(pub u32);

pub const AIR: BlockState = BlockState(0);

/// Horizontal chunk coordinates, two big-endian ints on the wire.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, ReadProt, WriteProt, SizedProt)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Number of bits needed to represent `n` (the length of its binary form).
pub(crate) fn bit_len(n: usize) -> usize {
    (usize::BITS - n.leading_zeros()) as usize
}
