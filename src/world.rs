use std::collections::HashMap;

use log::debug;

use crate::chunk::column::Chunk;
use crate::chunk::{BlockState, ChunkPos, SECTION_BLOCKS, SECTION_EDGE};
use crate::err::ProtError;
use crate::registry::BlockRegistry;

/// A collection of loaded chunks sharing one vertical extent. `min_y` is the
/// block Y of the bottom of the lowest section; every chunk holds exactly
/// `secs` sections.
pub struct World {
    secs: usize,
    min_y: i32,
    chunks: HashMap<ChunkPos, Chunk>,
}

impl World {
    pub fn new(secs: usize, min_y: i32) -> Self {
        Self {
            secs,
            min_y,
            chunks: HashMap::new(),
        }
    }

    pub fn secs(&self) -> usize {
        self.secs
    }

    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    pub fn insert(&mut self, pos: ChunkPos, chunk: Chunk) -> Result<(), ProtError> {
        if chunk.sections.len() != self.secs {
            return Err(ProtError::SizeMismatch {
                expected: self.secs,
                actual: chunk.sections.len(),
            });
        }
        debug!("Loading chunk at {pos:?}");
        self.chunks.insert(pos, chunk);
        Ok(())
    }

    pub fn remove(&mut self, pos: &ChunkPos) -> Option<Chunk> {
        self.chunks.remove(pos)
    }

    pub fn chunk(&self, pos: &ChunkPos) -> Option<&Chunk> {
        self.chunks.get(pos)
    }

    pub fn chunk_mut(&mut self, pos: &ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(pos)
    }

    fn chunk_pos_for(x: i32, z: i32) -> ChunkPos {
        ChunkPos::new(x.div_euclid(SECTION_EDGE as i32), z.div_euclid(SECTION_EDGE as i32))
    }

    /// Flat in-chunk slot index for world coordinates, or `SectionBounds`
    /// when `y` falls outside the world's vertical extent.
    fn slot_for(&self, x: i32, y: i32, z: i32) -> Result<usize, ProtError> {
        let edge = SECTION_EDGE as i32;
        let y_rel = y - self.min_y;
        if y_rel < 0 || y_rel as usize >= self.secs * SECTION_EDGE {
            return Err(ProtError::SectionBounds {
                y: y_rel.div_euclid(edge),
                count: self.secs,
            });
        }
        let local =
            (y_rel.rem_euclid(edge) * edge * edge + z.rem_euclid(edge) * edge + x.rem_euclid(edge))
                as usize;
        Ok(y_rel as usize / SECTION_EDGE * SECTION_BLOCKS + local)
    }

    /// Block state at world coordinates. `None` when no chunk is loaded
    /// there.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<Option<BlockState>, ProtError> {
        let slot = self.slot_for(x, y, z)?;
        match self.chunk(&Self::chunk_pos_for(x, z)) {
            Some(chunk) => Ok(Some(chunk.get_block(slot)?)),
            None => Ok(None),
        }
    }

    /// Writes a block state at world coordinates. `false` when no chunk is
    /// loaded there.
    pub fn set_block(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        value: BlockState,
        registry: &BlockRegistry,
    ) -> Result<bool, ProtError> {
        let slot = self.slot_for(x, y, z)?;
        match self.chunk_mut(&Self::chunk_pos_for(x, z)) {
            Some(chunk) => {
                chunk.set_block(slot, value, registry)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chunk::AIR;
    use crate::registry::BlockStateKey;

    fn registry() -> BlockRegistry {
        let mut registry = BlockRegistry::new();
        registry.register(BlockStateKey::new("minecraft:air"), BlockState(0), true);
        registry.register(BlockStateKey::new("minecraft:stone"), BlockState(1), false);
        registry
    }

    #[test]
    fn world_coordinates_map_into_chunks() -> Result<(), ProtError> {
        let registry = registry();
        let mut world = World::new(24, -64);
        world.insert(ChunkPos::new(0, 0), Chunk::empty(24))?;
        world.insert(ChunkPos::new(-1, -1), Chunk::empty(24))?;

        // negative coordinates land in the chunk at (-1, -1)
        assert!(world.set_block(-1, -64, -16, BlockState(1), &registry)?);
        assert_eq!(world.get_block(-1, -64, -16)?, Some(BlockState(1)));
        assert_eq!(world.get_block(-1, -63, -16)?, Some(AIR));
        assert_eq!(
            world.chunk(&ChunkPos::new(-1, -1)).unwrap().sections[0].block_count,
            1
        );

        assert!(world.set_block(3, 200, 8, BlockState(1), &registry)?);
        assert_eq!(world.get_block(3, 200, 8)?, Some(BlockState(1)));

        // no chunk loaded there
        assert!(!world.set_block(100, 0, 100, BlockState(1), &registry)?);
        assert_eq!(world.get_block(100, 0, 100)?, None);
        Ok(())
    }

    #[test]
    fn vertical_bounds_are_enforced() {
        let world = World::new(24, -64);
        assert!(matches!(
            world.get_block(0, -65, 0),
            Err(ProtError::SectionBounds { .. })
        ));
        assert!(matches!(
            world.get_block(0, 320, 0),
            Err(ProtError::SectionBounds { .. })
        ));
    }

    #[test]
    fn insert_rejects_wrong_section_count() {
        let mut world = World::new(24, -64);
        assert_eq!(
            world.insert(ChunkPos::new(0, 0), Chunk::empty(16)).unwrap_err(),
            ProtError::SizeMismatch {
                expected: 24,
                actual: 16
            }
        );
    }
}
