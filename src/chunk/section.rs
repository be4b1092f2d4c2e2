use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::chunk::palette::PaletteContainer;
use crate::chunk::{Biome, BlockState, AIR, LIGHT_BYTES, SECTION_BIOMES, SECTION_BLOCKS};
use crate::err::ProtError;
use crate::protocol_types::traits::{ReadProt, WriteProt};
use crate::registry::BlockRegistry;

/// One 16x16x16 sub-chunk: block states, biomes, the non-air occupancy
/// counter and, when present, 2048-byte sky/block light arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub block_count: i16,
    pub states: PaletteContainer<BlockState>,
    pub biomes: PaletteContainer<Biome>,
    pub sky_light: Option<Vec<u8>>,
    pub block_light: Option<Vec<u8>>,
}

impl Section {
    pub fn new() -> Self {
        Self {
            block_count: 0,
            states: PaletteContainer::filled(SECTION_BLOCKS, AIR),
            biomes: PaletteContainer::filled(SECTION_BIOMES, Biome(0)),
            sky_light: None,
            block_light: None,
        }
    }

    pub fn get_block(&self, index: usize) -> Result<BlockState, ProtError> {
        self.states.get(index)
    }

    /// Writes a block state and keeps `block_count` equal to the exact
    /// number of non-air slots. Airness is the registry's call, not value
    /// equality.
    pub fn set_block(
        &mut self,
        index: usize,
        value: BlockState,
        registry: &BlockRegistry,
    ) -> Result<(), ProtError> {
        let old = self.states.get(index)?;
        self.states.set(index, value)?;
        if !registry.is_air(old) {
            self.block_count -= 1;
        }
        if !registry.is_air(value) {
            self.block_count += 1;
        }
        Ok(())
    }

    pub fn get_biome(&self, index: usize) -> Result<Biome, ProtError> {
        self.biomes.get(index)
    }

    pub fn set_biome(&mut self, index: usize, value: Biome) -> Result<(), ProtError> {
        self.biomes.set(index, value)
    }

    /// Recounts occupancy by scanning every slot. Used on import, where the
    /// persisted count is not trusted.
    pub fn recount_blocks(&mut self, registry: &BlockRegistry) -> Result<(), ProtError> {
        let mut count = 0i16;
        for i in 0..SECTION_BLOCKS {
            if !registry.is_air(self.states.get(i)?) {
                count += 1;
            }
        }
        self.block_count = count;
        Ok(())
    }

    /// Reads the wire form into this section, replacing its contents.
    pub async fn read_from(
        &mut self,
        stream: &mut (impl AsyncRead + Unpin + Send),
    ) -> Result<(), ProtError> {
        self.block_count = i16::read(stream).await?;
        self.states = PaletteContainer::read_from(stream, SECTION_BLOCKS).await?;
        self.biomes = PaletteContainer::read_from(stream, SECTION_BIOMES).await?;
        Ok(())
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WriteProt for Section {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        self.block_count.write(stream).await?;
        self.states.write(stream).await?;
        self.biomes.write(stream).await?;
        Ok(())
    }
}

/// Checks a light array carried by the save or wire form.
pub(crate) fn check_light(light: &[u8]) -> Result<(), ProtError> {
    if light.len() != LIGHT_BYTES {
        return Err(ProtError::SizeMismatch {
            expected: LIGHT_BYTES,
            actual: light.len(),
        });
    }
    Ok(())
}
