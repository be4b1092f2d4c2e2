use async_nbt::{NbtCompound, NbtTag};
use async_trait::async_trait;
use craftbot_derive::{ReadProt, SizedProt, WriteProt};
use log::warn;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::chunk::bit_storage::BitStorage;
use crate::chunk::palette::PaletteContainer;
use crate::chunk::section::{check_light, Section};
use crate::chunk::{bit_len, Biome, BlockState, SECTION_BIOMES, SECTION_BLOCKS, SECTION_EDGE};
use crate::err::ProtError;
use crate::protocol_types::primitives::{BitSet, ByteArray, SizedVec, VarInt};
use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};
use crate::registry::{BiomeRegistry, BlockRegistry, BlockStateKey};
use crate::save::{
    SavedBiomes, SavedBlockEntity, SavedBlockState, SavedBlockStates, SavedChunk,
    SavedHeightmaps, SavedSection,
};

/// World-generation progress tag carried through conversions. Purely
/// descriptive; the codec never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkStatus {
    #[default]
    Empty,
    StructureStarts,
    StructureReferences,
    Biomes,
    Noise,
    Surface,
    Carvers,
    LiquidCarvers,
    Features,
    Light,
    Spawn,
    Heightmaps,
    Full,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Empty => "empty",
            ChunkStatus::StructureStarts => "structure_starts",
            ChunkStatus::StructureReferences => "structure_references",
            ChunkStatus::Biomes => "biomes",
            ChunkStatus::Noise => "noise",
            ChunkStatus::Surface => "surface",
            ChunkStatus::Carvers => "carvers",
            ChunkStatus::LiquidCarvers => "liquid_carvers",
            ChunkStatus::Features => "features",
            ChunkStatus::Light => "light",
            ChunkStatus::Spawn => "spawn",
            ChunkStatus::Heightmaps => "heightmaps",
            ChunkStatus::Full => "full",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.strip_prefix("minecraft:").unwrap_or(s) {
            "empty" => ChunkStatus::Empty,
            "structure_starts" => ChunkStatus::StructureStarts,
            "structure_references" => ChunkStatus::StructureReferences,
            "biomes" => ChunkStatus::Biomes,
            "noise" => ChunkStatus::Noise,
            "surface" => ChunkStatus::Surface,
            "carvers" => ChunkStatus::Carvers,
            "liquid_carvers" => ChunkStatus::LiquidCarvers,
            "features" => ChunkStatus::Features,
            "light" => ChunkStatus::Light,
            "spawn" => ChunkStatus::Spawn,
            "heightmaps" => ChunkStatus::Heightmaps,
            "full" => ChunkStatus::Full,
            other => {
                warn!("Unknown chunk status {other:?}, treating as empty");
                ChunkStatus::Empty
            }
        }
    }
}

/// Per-column highest-relevant-block records, one 256-slot storage per kind.
/// Only `motion_blocking` is guaranteed on the wire; the rest depend on the
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeightMaps {
    pub motion_blocking: Option<BitStorage>,
    pub motion_blocking_no_leaves: Option<BitStorage>,
    pub ocean_floor: Option<BitStorage>,
    pub world_surface: Option<BitStorage>,
}

/// Extra structured data attached to a single block position within the
/// chunk. X and Z live in one packed nibble pair.
#[derive(Debug, Clone, PartialEq, ReadProt, WriteProt, SizedProt)]
pub struct BlockEntity {
    pub packed_xz: u8,
    pub y: i16,
    pub kind: VarInt,
    pub data: NbtCompound,
}

impl BlockEntity {
    pub fn new(x: i32, z: i32, y: i16, kind: i32, data: NbtCompound) -> Result<Self, ProtError> {
        Ok(Self {
            packed_xz: Self::pack_xz(x, z)?,
            y,
            kind: VarInt::from(kind),
            data,
        })
    }

    pub fn pack_xz(x: i32, z: i32) -> Result<u8, ProtError> {
        if !(0..SECTION_EDGE as i32).contains(&x) || !(0..SECTION_EDGE as i32).contains(&z) {
            return Err(ProtError::XZOutOfBounds { x, z });
        }
        Ok((x as u8) << 4 | z as u8)
    }

    pub fn unpack_xz(&self) -> (i32, i32) {
        ((self.packed_xz >> 4 & 0xf) as i32, (self.packed_xz & 0xf) as i32)
    }
}

/// The light payload of a chunk packet. The wire format requires the
/// bitwise complement of each mask to be written out even though it is
/// derivable; both are emitted verbatim and the complements are discarded
/// on read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightData {
    pub trust_edges: bool,
    pub sky_mask: BitSet,
    pub block_mask: BitSet,
    pub sky_light: SizedVec<ByteArray>,
    pub block_light: SizedVec<ByteArray>,
}

impl LightData {
    fn from_sections(sections: &[Section]) -> Self {
        let mut light = LightData {
            trust_edges: true,
            sky_mask: BitSet::with_bits(sections.len()),
            block_mask: BitSet::with_bits(sections.len()),
            sky_light: SizedVec::from(vec![]),
            block_light: SizedVec::from(vec![]),
        };
        for (i, section) in sections.iter().enumerate() {
            if let Some(sky) = &section.sky_light {
                light.sky_mask.set(i, true);
                light.sky_light.vec.push(ByteArray(sky.clone()));
            }
            if let Some(block) = &section.block_light {
                light.block_mask.set(i, true);
                light.block_light.vec.push(ByteArray(block.clone()));
            }
        }
        light
    }

    /// Moves the present light arrays into the sections the masks point at.
    /// Mask bits past the section count and surplus arrays are malformed
    /// input and rejected.
    fn apply(self, sections: &mut [Section]) -> Result<(), ProtError> {
        for mask in [&self.sky_mask, &self.block_mask] {
            for i in sections.len()..mask.0.len() * 64 {
                if mask.get(i) {
                    return Err(ProtError::Any(format!(
                        "Light mask bit {i} set beyond {} sections",
                        sections.len()
                    )));
                }
            }
        }
        let mut sky = self.sky_light.vec.into_iter();
        let mut block = self.block_light.vec.into_iter();
        for (i, section) in sections.iter_mut().enumerate() {
            section.sky_light = if self.sky_mask.get(i) {
                let arr = sky.next().ok_or(ProtError::Any(
                    "Sky light mask points past the supplied arrays".into(),
                ))?;
                check_light(&arr.0)?;
                Some(arr.0)
            } else {
                None
            };
            section.block_light = if self.block_mask.get(i) {
                let arr = block.next().ok_or(ProtError::Any(
                    "Block light mask points past the supplied arrays".into(),
                ))?;
                check_light(&arr.0)?;
                Some(arr.0)
            } else {
                None
            };
        }
        if sky.next().is_some() || block.next().is_some() {
            return Err(ProtError::Any(
                "More light arrays supplied than mask bits set".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl WriteProt for LightData {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        self.trust_edges.write(stream).await?;
        self.sky_mask.write(stream).await?;
        self.block_mask.write(stream).await?;
        self.sky_mask.complement().write(stream).await?;
        self.block_mask.complement().write(stream).await?;
        self.sky_light.write(stream).await?;
        self.block_light.write(stream).await?;
        Ok(())
    }
}

#[async_trait]
impl ReadProt for LightData {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        let trust_edges = bool::read(stream).await?;
        let sky_mask = BitSet::read(stream).await?;
        let block_mask = BitSet::read(stream).await?;
        // complements are a wire requirement only
        let _rev_sky_mask = BitSet::read(stream).await?;
        let _rev_block_mask = BitSet::read(stream).await?;
        let sky_light = SizedVec::read(stream).await?;
        let block_light = SizedVec::read(stream).await?;
        Ok(Self {
            trust_edges,
            sky_mask,
            block_mask,
            sky_light,
            block_light,
        })
    }
}

/// A vertical stack of sections plus heightmaps, block entities and the
/// generation status. The section count is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub sections: Vec<Section>,
    pub heightmaps: HeightMaps,
    pub block_entities: Vec<BlockEntity>,
    pub status: ChunkStatus,
}

impl Chunk {
    /// A default-filled chunk of `secs` sections with a zeroed
    /// motion-blocking heightmap.
    pub fn empty(secs: usize) -> Self {
        Self {
            sections: (0..secs).map(|_| Section::new()).collect(),
            heightmaps: HeightMaps {
                motion_blocking: Some(BitStorage::new(
                    bit_len(secs * SECTION_EDGE),
                    SECTION_EDGE * SECTION_EDGE,
                )),
                ..HeightMaps::default()
            },
            block_entities: vec![],
            status: ChunkStatus::Empty,
        }
    }

    /// Block state at the flat index `section * 4096 + slot`.
    pub fn get_block(&self, index: usize) -> Result<BlockState, ProtError> {
        let sec = index / SECTION_BLOCKS;
        if sec >= self.sections.len() {
            return Err(ProtError::SectionBounds {
                y: sec as i32,
                count: self.sections.len(),
            });
        }
        self.sections[sec].get_block(index % SECTION_BLOCKS)
    }

    pub fn set_block(
        &mut self,
        index: usize,
        value: BlockState,
        registry: &BlockRegistry,
    ) -> Result<(), ProtError> {
        let sec = index / SECTION_BLOCKS;
        if sec >= self.sections.len() {
            return Err(ProtError::SectionBounds {
                y: sec as i32,
                count: self.sections.len(),
            });
        }
        self.sections[sec].set_block(index % SECTION_BLOCKS, value, registry)
    }

    /// Every section's wire bytes concatenated without individual framing.
    async fn data(&self) -> Result<Vec<u8>, ProtError> {
        let mut buf: Vec<u8> = vec![];
        for section in &self.sections {
            section.write(&mut buf).await?;
        }
        Ok(buf)
    }

    /// Consumes the concatenated section blob in order. A short read aborts
    /// the whole operation.
    async fn put_data(&mut self, data: &[u8]) -> Result<(), ProtError> {
        let mut stream = data;
        for section in &mut self.sections {
            section.read_from(&mut stream).await?;
        }
        Ok(())
    }

    /// Reads the wire form into this pre-sized chunk. The heightmap blob is
    /// consumed but not retained; the section count never changes.
    pub async fn read_from(
        &mut self,
        stream: &mut (impl AsyncRead + Unpin + Send),
    ) -> Result<(), ProtError> {
        let _heightmaps = NbtCompound::read(stream).await?;
        let data = ByteArray::read(stream).await?;
        let block_entities: SizedVec<BlockEntity> = SizedVec::read(stream).await?;
        let light = LightData::read(stream).await?;
        self.put_data(&data.0).await?;
        light.apply(&mut self.sections)?;
        self.block_entities = block_entities.vec;
        Ok(())
    }

    /// Converts the persisted form, resolving every palette name through the
    /// supplied registries. Occupancy is recounted from the slots; the
    /// persisted count is not trusted.
    pub fn from_save(
        saved: &SavedChunk,
        blocks: &BlockRegistry,
        biomes: &BiomeRegistry,
    ) -> Result<Self, ProtError> {
        let secs = saved.sections.len();
        let mut sections: Vec<Section> = (0..secs).map(|_| Section::new()).collect();
        for saved_section in &saved.sections {
            let index = saved_section.y as i32 - saved.y_pos;
            if index < 0 || index >= secs as i32 {
                return Err(ProtError::SectionBounds {
                    y: saved_section.y as i32,
                    count: secs,
                });
            }
            let section = &mut sections[index as usize];
            section.states = read_states_palette(&saved_section.block_states, blocks)
                .map_err(|e| section_context(e, saved_section.y))?;
            section.biomes = read_biomes_palette(&saved_section.biomes, biomes)
                .map_err(|e| section_context(e, saved_section.y))?;
            section.recount_blocks(blocks)?;
            if let Some(light) = &saved_section.sky_light {
                check_light(light).map_err(|e| section_context(e, saved_section.y))?;
            }
            if let Some(light) = &saved_section.block_light {
                check_light(light).map_err(|e| section_context(e, saved_section.y))?;
            }
            section.sky_light = saved_section.sky_light.clone();
            section.block_light = saved_section.block_light.clone();
        }

        let mut block_entities = Vec::with_capacity(saved.block_entities.len());
        for entity in &saved.block_entities {
            let kind = blocks
                .entity_type(&entity.id)
                .ok_or_else(|| ProtError::UnknownBlockEntity(entity.id.clone()))?;
            block_entities.push(BlockEntity::new(
                entity.x - (saved.x_pos << 4),
                entity.z - (saved.z_pos << 4),
                entity.y as i16,
                kind as i32,
                entity.data.clone(),
            )?);
        }

        let height_bits = bit_len(secs * SECTION_EDGE);
        let import = |raw: &Option<Vec<u64>>| -> Result<Option<BitStorage>, ProtError> {
            raw.as_ref()
                .map(|words| {
                    BitStorage::with_words(height_bits, SECTION_EDGE * SECTION_EDGE, words.clone())
                })
                .transpose()
        };
        Ok(Self {
            sections,
            heightmaps: HeightMaps {
                motion_blocking: import(&saved.heightmaps.motion_blocking)?,
                motion_blocking_no_leaves: import(&saved.heightmaps.motion_blocking_no_leaves)?,
                ocean_floor: import(&saved.heightmaps.ocean_floor)?,
                world_surface: import(&saved.heightmaps.world_surface)?,
            },
            block_entities,
            status: ChunkStatus::from_str(&saved.status),
        })
    }

    /// Converts to the persisted form, reverse-resolving palette entries and
    /// reusing each container's packed words unchanged.
    pub fn to_save(
        &self,
        x_pos: i32,
        y_pos: i32,
        z_pos: i32,
        blocks: &BlockRegistry,
        biomes: &BiomeRegistry,
    ) -> Result<SavedChunk, ProtError> {
        let mut sections = Vec::with_capacity(self.sections.len());
        for (i, section) in self.sections.iter().enumerate() {
            sections.push(SavedSection {
                y: (i as i32 + y_pos) as i8,
                block_states: write_states_palette(&section.states, blocks)?,
                biomes: write_biomes_palette(&section.biomes, biomes)?,
                sky_light: section.sky_light.clone(),
                block_light: section.block_light.clone(),
            });
        }

        let mut block_entities = Vec::with_capacity(self.block_entities.len());
        for entity in &self.block_entities {
            let id = blocks
                .entity_type_name(entity.kind.value as u32)
                .ok_or_else(|| {
                    ProtError::UnknownBlockEntity(format!("type id {}", entity.kind))
                })?;
            let (x, z) = entity.unpack_xz();
            block_entities.push(SavedBlockEntity {
                id: id.to_string(),
                x: (x_pos << 4) + x,
                y: entity.y as i32,
                z: (z_pos << 4) + z,
                data: entity.data.clone(),
            });
        }

        let export = |storage: &Option<BitStorage>| storage.as_ref().map(|s| s.raw().to_vec());
        Ok(SavedChunk {
            x_pos,
            y_pos,
            z_pos,
            status: self.status.as_str().to_string(),
            sections,
            heightmaps: SavedHeightmaps {
                motion_blocking: export(&self.heightmaps.motion_blocking),
                motion_blocking_no_leaves: export(&self.heightmaps.motion_blocking_no_leaves),
                ocean_floor: export(&self.heightmaps.ocean_floor),
                world_surface: export(&self.heightmaps.world_surface),
            },
            block_entities,
        })
    }
}

fn section_context(err: ProtError, y: i8) -> ProtError {
    match err {
        ProtError::UnknownBlock(name) => {
            ProtError::UnknownBlock(format!("{name} (section y={y})"))
        }
        ProtError::UnknownBiome(name) => {
            ProtError::UnknownBiome(format!("{name} (section y={y})"))
        }
        other => ProtError::Any(format!("Section y={y}: {other}")),
    }
}

fn read_states_palette(
    saved: &SavedBlockStates,
    blocks: &BlockRegistry,
) -> Result<PaletteContainer<BlockState>, ProtError> {
    let mut palette = Vec::with_capacity(saved.palette.len());
    for entry in &saved.palette {
        let key = BlockStateKey::with_properties(entry.name.clone(), entry.properties.clone());
        let state = blocks
            .state_id(&key)
            .ok_or_else(|| ProtError::UnknownBlock(entry.name.clone()))?;
        palette.push(state);
    }
    PaletteContainer::from_data(SECTION_BLOCKS, &palette, saved.data.clone())
}

fn read_biomes_palette(
    saved: &SavedBiomes,
    biomes: &BiomeRegistry,
) -> Result<PaletteContainer<Biome>, ProtError> {
    let mut palette = Vec::with_capacity(saved.palette.len());
    for name in &saved.palette {
        let biome = biomes
            .biome_id(name)
            .ok_or_else(|| ProtError::UnknownBiome(name.clone()))?;
        palette.push(biome);
    }
    PaletteContainer::from_data(SECTION_BIOMES, &palette, saved.data.clone())
}

fn write_states_palette(
    container: &PaletteContainer<BlockState>,
    blocks: &BlockRegistry,
) -> Result<SavedBlockStates, ProtError> {
    let mut palette = Vec::new();
    for state in container.export() {
        let key = blocks
            .state_key(state)
            .ok_or_else(|| ProtError::UnknownBlock(format!("state id {}", state.0)))?;
        palette.push(SavedBlockState {
            name: key.name.clone(),
            properties: key.properties.clone(),
        });
    }
    Ok(SavedBlockStates {
        palette,
        data: container.raw().to_vec(),
    })
}

fn write_biomes_palette(
    container: &PaletteContainer<Biome>,
    biomes: &BiomeRegistry,
) -> Result<SavedBiomes, ProtError> {
    let mut palette = Vec::new();
    for biome in container.export() {
        let name = biomes
            .biome_name(biome)
            .ok_or_else(|| ProtError::UnknownBiome(format!("biome id {}", biome.0)))?;
        palette.push(name.to_string());
    }
    Ok(SavedBiomes {
        palette,
        data: container.raw().to_vec(),
    })
}

#[async_trait]
impl WriteProt for Chunk {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        let raw = |storage: &Option<BitStorage>| -> Vec<i64> {
            storage
                .as_ref()
                .map(|s| s.raw().iter().map(|w| *w as i64).collect())
                .unwrap_or_default()
        };
        let motion_blocking = raw(&self.heightmaps.motion_blocking);
        let world_surface = match &self.heightmaps.world_surface {
            Some(_) => raw(&self.heightmaps.world_surface),
            None => motion_blocking.clone(),
        };
        let mut heightmaps = NbtCompound::new();
        heightmaps.insert(
            "MOTION_BLOCKING".to_string(),
            NbtTag::LongArray(motion_blocking),
        );
        heightmaps.insert("WORLD_SURFACE".to_string(), NbtTag::LongArray(world_surface));
        heightmaps.write(stream).await?;

        ByteArray(self.data().await?).write(stream).await?;

        VarInt::from(self.block_entities.len()).write(stream).await?;
        for entity in &self.block_entities {
            entity.write(stream).await?;
        }

        LightData::from_sections(&self.sections).write(stream).await?;
        Ok(())
    }
}
