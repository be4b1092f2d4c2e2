use std::fmt::Debug;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::chunk::bit_storage::BitStorage;
use crate::chunk::{
    bit_len, Biome, BlockState, GLOBAL_PALETTE_BITS_BIOMES, GLOBAL_PALETTE_BITS_BLOCKS,
    MAX_PALETTE_BITS_BIOMES, MAX_PALETTE_BITS_BLOCKS, MIN_PALETTE_BITS_BIOMES,
    MIN_PALETTE_BITS_BLOCKS,
};
use crate::err::ProtError;
use crate::protocol_types::primitives::VarInt;
use crate::protocol_types::traits::{ReadProt, WriteProt};

/// An element type a `PaletteContainer` can hold, carrying the bit-width
/// policy of its domain. Block states use 4..=8 indirect bits, biomes 1..=3;
/// past the ceiling the container addresses global ids directly.
pub trait PaletteItem: Copy + Eq + Debug + Send + Sync + 'static {
    const MIN_INDIRECT_BITS: usize;
    const MAX_INDIRECT_BITS: usize;
    const DIRECT_BITS: usize;

    fn to_id(self) -> u32;
    fn from_id(id: u32) -> Self;
}

impl PaletteItem for BlockState {
    const MIN_INDIRECT_BITS: usize = MIN_PALETTE_BITS_BLOCKS;
    const MAX_INDIRECT_BITS: usize = MAX_PALETTE_BITS_BLOCKS;
    const DIRECT_BITS: usize = GLOBAL_PALETTE_BITS_BLOCKS;

    fn to_id(self) -> u32 {
        self.0
    }

    fn from_id(id: u32) -> Self {
        Self(id)
    }
}

impl PaletteItem for Biome {
    const MIN_INDIRECT_BITS: usize = MIN_PALETTE_BITS_BIOMES;
    const MAX_INDIRECT_BITS: usize = MAX_PALETTE_BITS_BIOMES;
    const DIRECT_BITS: usize = GLOBAL_PALETTE_BITS_BIOMES;

    fn to_id(self) -> u32 {
        self.0
    }

    fn from_id(id: u32) -> Self {
        Self(id)
    }
}

/// The value<->index mapping strategy of a container.
///
/// `Single` holds one value addressed by a zero-width storage, `Indirect` an
/// insertion-ordered list whose positions are the stored indices, and
/// `Direct` no list at all: the stored index is the value's global id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Palette<T: PaletteItem> {
    Single(T),
    Indirect { bits: usize, values: Vec<T> },
    Direct,
}

impl<T: PaletteItem> Palette<T> {
    /// The index for `value`, inserting it if there is room. `None` means
    /// the palette is saturated and the container must promote.
    fn id_for(&mut self, value: T) -> Option<u64> {
        match self {
            Palette::Single(v) => (*v == value).then_some(0),
            Palette::Indirect { bits, values } => {
                if let Some(id) = values.iter().position(|v| *v == value) {
                    Some(id as u64)
                } else if values.len() < 1 << *bits {
                    values.push(value);
                    Some(values.len() as u64 - 1)
                } else {
                    None
                }
            }
            Palette::Direct => Some(value.to_id() as u64),
        }
    }

    fn value_for(&self, id: u64) -> Result<T, ProtError> {
        match self {
            Palette::Single(v) => Ok(*v),
            Palette::Indirect { values, .. } => values
                .get(id as usize)
                .copied()
                .ok_or(ProtError::InvalidPaletteIndex(id as u32)),
            Palette::Direct => Ok(T::from_id(id as u32)),
        }
    }

    /// Every distinct addressable value, in index order. Empty for `Direct`,
    /// which has no small enumeration.
    fn export(&self) -> Vec<T> {
        match self {
            Palette::Single(v) => vec![*v],
            Palette::Indirect { values, .. } => values.clone(),
            Palette::Direct => vec![],
        }
    }
}

/// One palette plus one `BitStorage` of equal size describing the same
/// logical array of `T` values. Owns strategy promotion: when the palette
/// saturates, the whole storage is rebuilt at the next width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteContainer<T: PaletteItem> {
    palette: Palette<T>,
    storage: BitStorage,
}

impl<T: PaletteItem> PaletteContainer<T> {
    /// A container with every slot holding `value`.
    pub fn filled(size: usize, value: T) -> Self {
        Self {
            palette: Palette::Single(value),
            storage: BitStorage::new(0, size),
        }
    }

    /// Builds directly from a persisted (palette, packed words) pair without
    /// re-deriving ids. Exact inverse of `export()` + `raw()`.
    pub fn from_data(size: usize, values: &[T], words: Vec<u64>) -> Result<Self, ProtError> {
        if values.is_empty() {
            return Err(ProtError::Any("Empty palette in persisted section".into()));
        }
        let needed = bit_len(values.len() - 1);
        if needed == 0 {
            Ok(Self {
                palette: Palette::Single(values[0]),
                storage: BitStorage::with_words(0, size, words)?,
            })
        } else if needed <= T::MAX_INDIRECT_BITS {
            let bits = needed.max(T::MIN_INDIRECT_BITS);
            Ok(Self {
                palette: Palette::Indirect {
                    bits,
                    values: values.to_vec(),
                },
                storage: BitStorage::with_words(bits, size, words)?,
            })
        } else {
            Ok(Self {
                palette: Palette::Direct,
                storage: BitStorage::with_words(T::DIRECT_BITS, size, words)?,
            })
        }
    }

    pub fn get(&self, index: usize) -> Result<T, ProtError> {
        self.palette.value_for(self.storage.get(index)?)
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<(), ProtError> {
        // Fail on a bad index before the palette learns the value.
        if index >= self.storage.len() {
            return Err(ProtError::IndexOutOfRange {
                index,
                size: self.storage.len(),
            });
        }
        let id = match self.palette.id_for(value) {
            Some(id) => id,
            None => self.grow(value)?,
        };
        self.storage.set(index, id)
    }

    /// Promotes to the next strategy and remaps every slot into a freshly
    /// allocated storage. The new palette and storage are only installed
    /// once fully built, so a failed rebuild leaves the container untouched.
    fn grow(&mut self, value: T) -> Result<u64, ProtError> {
        let (new_bits, mut new_palette) = match &self.palette {
            Palette::Single(v) => (
                T::MIN_INDIRECT_BITS,
                Palette::Indirect {
                    bits: T::MIN_INDIRECT_BITS,
                    values: vec![*v],
                },
            ),
            Palette::Indirect { bits, values } => {
                if bits + 1 > T::MAX_INDIRECT_BITS {
                    (T::DIRECT_BITS, Palette::Direct)
                } else {
                    (
                        bits + 1,
                        Palette::Indirect {
                            bits: bits + 1,
                            values: values.clone(),
                        },
                    )
                }
            }
            Palette::Direct => {
                return Err(ProtError::Any("Direct palette cannot grow".into()));
            }
        };

        let mut new_storage = BitStorage::new(new_bits, self.storage.len());
        for i in 0..self.storage.len() {
            let old = self.palette.value_for(self.storage.get(i)?)?;
            let id = new_palette
                .id_for(old)
                .ok_or(ProtError::InvalidPaletteIndex(old.to_id()))?;
            new_storage.set(i, id)?;
        }
        let id = new_palette
            .id_for(value)
            .ok_or(ProtError::InvalidPaletteIndex(value.to_id()))?;

        self.palette = new_palette;
        self.storage = new_storage;
        Ok(id)
    }

    pub fn export(&self) -> Vec<T> {
        self.palette.export()
    }

    pub fn raw(&self) -> &[u64] {
        self.storage.raw()
    }

    pub fn bits(&self) -> usize {
        self.storage.bits()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.palette, Palette::Direct)
    }

    /// Reads the wire form: a bits-per-entry byte, then the palette and
    /// packed words as that width dictates.
    pub async fn read_from(
        stream: &mut (impl AsyncRead + Unpin + Send),
        size: usize,
    ) -> Result<Self, ProtError> {
        let bits = u8::read(stream).await? as usize;
        if bits > T::DIRECT_BITS {
            return Err(ProtError::Any(format!(
                "Bits per entry {bits} exceeds the direct width {}",
                T::DIRECT_BITS
            )));
        }
        if bits == 0 {
            let value = VarInt::read(stream).await?;
            return Ok(Self {
                palette: Palette::Single(T::from_id(value.value as u32)),
                storage: BitStorage::new(0, size),
            });
        }
        let palette = if bits <= T::MAX_INDIRECT_BITS {
            let len = VarInt::read(stream).await?.value;
            if len < 0 || len > 1 << bits {
                return Err(ProtError::Any(format!(
                    "Palette length {len} does not fit {bits} bits"
                )));
            }
            let mut values = Vec::with_capacity(len as usize);
            for _ in 0..len {
                values.push(T::from_id(VarInt::read(stream).await?.value as u32));
            }
            Palette::Indirect { bits, values }
        } else {
            Palette::Direct
        };
        let word_count = VarInt::read(stream).await?.value;
        if word_count < 0 {
            return Err(ProtError::Any(format!("Negative word count: {word_count}")));
        }
        let mut words = Vec::with_capacity(word_count as usize);
        for _ in 0..word_count {
            words.push(u64::read(stream).await?);
        }
        Ok(Self {
            palette,
            storage: BitStorage::with_words(bits, size, words)?,
        })
    }
}

#[async_trait]
impl<T: PaletteItem> WriteProt for PaletteContainer<T> {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        match &self.palette {
            Palette::Single(v) => {
                0u8.write(stream).await?;
                VarInt::from(v.to_id()).write(stream).await?;
                // no packed words follow a single-value palette
                return Ok(());
            }
            Palette::Indirect { bits, values } => {
                (*bits as u8).write(stream).await?;
                VarInt::from(values.len()).write(stream).await?;
                for v in values {
                    VarInt::from(v.to_id()).write(stream).await?;
                }
            }
            Palette::Direct => {
                (self.storage.bits() as u8).write(stream).await?;
            }
        }
        VarInt::from(self.storage.raw().len()).write(stream).await?;
        for word in self.storage.raw() {
            word.write(stream).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chunk::{SECTION_BIOMES, SECTION_BLOCKS};

    #[test]
    fn single_value_stays_zero_width() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(7));
        for i in 0..SECTION_BLOCKS {
            container.set(i, BlockState(7))?;
        }
        assert_eq!(container.bits(), 0);
        assert_eq!(container.export(), vec![BlockState(7)]);
        assert!(container.raw().is_empty());
        Ok(())
    }

    #[test]
    fn second_value_promotes_to_indirect() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(0));
        container.set(0, BlockState(9))?;
        assert_eq!(container.bits(), MIN_PALETTE_BITS_BLOCKS);
        assert_eq!(container.export(), vec![BlockState(0), BlockState(9)]);
        assert_eq!(container.get(0)?, BlockState(9));
        assert_eq!(container.get(1)?, BlockState(0));
        Ok(())
    }

    #[test]
    fn seventeen_distinct_values_force_promotion() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(0));
        for i in 0..17usize {
            container.set(i, BlockState(100 + i as u32))?;
        }
        // 18 distinct values (default + 17) no longer fit 4 bits
        assert_eq!(container.bits(), 5);
        for i in 0..17usize {
            assert_eq!(container.get(i)?, BlockState(100 + i as u32));
        }
        assert_eq!(container.get(17)?, BlockState(0));
        Ok(())
    }

    #[test]
    fn export_never_exceeds_capacity() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(0));
        for i in 0..200usize {
            container.set(i, BlockState(i as u32))?;
            let exported = container.export();
            if !container.is_direct() {
                assert!(exported.len() <= 1 << container.bits());
            }
        }
        Ok(())
    }

    #[test]
    fn values_survive_every_promotion() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(0));
        for i in 0..SECTION_BLOCKS {
            container.set(i, BlockState((i % 300) as u32))?;
        }
        // 300 distinct values exceed the 8-bit ceiling
        assert!(container.is_direct());
        assert_eq!(container.bits(), GLOBAL_PALETTE_BITS_BLOCKS);
        for i in 0..SECTION_BLOCKS {
            assert_eq!(container.get(i)?, BlockState((i % 300) as u32));
        }
        assert!(container.export().is_empty());
        Ok(())
    }

    #[test]
    fn get_returns_most_recent_set() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(0));
        container.set(42, BlockState(1))?;
        container.set(42, BlockState(2))?;
        for i in 0..20usize {
            container.set(100 + i, BlockState(10 + i as u32))?;
        }
        assert_eq!(container.get(42)?, BlockState(2));
        Ok(())
    }

    #[test]
    fn biome_promotion_reaches_direct_after_three_bits() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BIOMES, Biome(0));
        for i in 0..9usize {
            container.set(i, Biome(20 + i as u32))?;
        }
        // 10 distinct biomes exceed the 3-bit ceiling
        assert!(container.is_direct());
        assert_eq!(container.bits(), GLOBAL_PALETTE_BITS_BIOMES);
        for i in 0..9usize {
            assert_eq!(container.get(i)?, Biome(20 + i as u32));
        }
        Ok(())
    }

    #[test]
    fn from_data_inverts_export_and_raw() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(0));
        for i in 0..SECTION_BLOCKS {
            container.set(i, BlockState((i % 11) as u32))?;
        }
        let rebuilt = PaletteContainer::from_data(
            SECTION_BLOCKS,
            &container.export(),
            container.raw().to_vec(),
        )?;
        assert_eq!(rebuilt.bits(), container.bits());
        assert_eq!(rebuilt.export(), container.export());
        assert_eq!(rebuilt.raw(), container.raw());
        for i in 0..SECTION_BLOCKS {
            assert_eq!(rebuilt.get(i)?, container.get(i)?);
        }
        Ok(())
    }

    #[test]
    fn from_data_rejects_bad_word_count() {
        assert!(matches!(
            PaletteContainer::from_data(
                SECTION_BLOCKS,
                &[BlockState(0), BlockState(1)],
                vec![0; 10],
            ),
            Err(ProtError::SizeMismatch { expected: 256, actual: 10 })
        ));
        assert!(PaletteContainer::<BlockState>::from_data(SECTION_BLOCKS, &[], vec![]).is_err());
    }

    #[tokio::test]
    async fn single_wire_form_is_bits_byte_and_value() -> Result<(), ProtError> {
        let container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(5));
        let mut buf: Vec<u8> = vec![];
        container.write(&mut buf).await?;
        assert_eq!(buf, vec![0, 5]);
        Ok(())
    }

    #[tokio::test]
    async fn wire_roundtrip_indirect() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(0));
        for i in 0..SECTION_BLOCKS {
            container.set(i, BlockState((i % 23) as u32))?;
        }
        let mut buf: Vec<u8> = vec![];
        container.write(&mut buf).await?;
        let back = PaletteContainer::<BlockState>::read_from(&mut buf.as_slice(), SECTION_BLOCKS)
            .await?;
        assert_eq!(back, container);
        Ok(())
    }

    #[tokio::test]
    async fn wire_roundtrip_direct() -> Result<(), ProtError> {
        let mut container = PaletteContainer::filled(SECTION_BIOMES, Biome(0));
        for i in 0..SECTION_BIOMES {
            container.set(i, Biome(i as u32))?;
        }
        assert!(container.is_direct());
        let mut buf: Vec<u8> = vec![];
        container.write(&mut buf).await?;
        let back =
            PaletteContainer::<Biome>::read_from(&mut buf.as_slice(), SECTION_BIOMES).await?;
        assert_eq!(back, container);
        Ok(())
    }

    #[tokio::test]
    async fn wire_read_rejects_oversized_bit_width() {
        // widths past the direct ceiling never occur on the wire and must
        // fail cleanly rather than reach the packed storage
        for bits in [16u8, 64, 65, 255] {
            let buf = vec![bits, 0];
            assert!(
                PaletteContainer::<BlockState>::read_from(&mut buf.as_slice(), SECTION_BLOCKS)
                    .await
                    .is_err()
            );
        }
        for bits in [7u8, 64, 255] {
            let buf = vec![bits, 0];
            assert!(
                PaletteContainer::<Biome>::read_from(&mut buf.as_slice(), SECTION_BIOMES)
                    .await
                    .is_err()
            );
        }
    }

    #[tokio::test]
    async fn wire_read_rejects_short_stream() {
        let mut container = PaletteContainer::filled(SECTION_BLOCKS, BlockState(0));
        container.set(0, BlockState(3)).unwrap();
        let mut buf: Vec<u8> = vec![];
        container.write(&mut buf).await.unwrap();
        buf.truncate(buf.len() - 1);
        assert!(
            PaletteContainer::<BlockState>::read_from(&mut buf.as_slice(), SECTION_BLOCKS)
                .await
                .is_err()
        );
    }
}
