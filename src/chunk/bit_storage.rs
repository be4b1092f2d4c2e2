use crate::err::ProtError;

/// A fixed-width packed array of small unsigned integers backed by 64-bit
/// words. Entries never cross a word boundary; the high bits of each word
/// left over after `64 / bits` entries stay unused.
///
/// A width of 0 is the degenerate form used under single-value palettes:
/// every read yields 0 and writes of 0 are no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitStorage {
    bits: usize,
    size: usize,
    mask: u64,
    values_per_word: usize,
    words: Vec<u64>,
}

impl BitStorage {
    pub fn new(bits: usize, size: usize) -> Self {
        let words = vec![0; Self::required_words(bits, size)];
        Self::from_parts(bits, size, words)
    }

    /// Wraps existing backing words, e.g. from the save or wire form.
    /// The word count must match the declared width and size exactly.
    /// Widths of a full word or more cannot be packed and are rejected.
    pub fn with_words(bits: usize, size: usize, words: Vec<u64>) -> Result<Self, ProtError> {
        if bits >= 64 {
            return Err(ProtError::Any(format!("Unsupported bit width: {bits}")));
        }
        let expected = Self::required_words(bits, size);
        if words.len() != expected {
            return Err(ProtError::SizeMismatch {
                expected,
                actual: words.len(),
            });
        }
        Ok(Self::from_parts(bits, size, words))
    }

    fn from_parts(bits: usize, size: usize, words: Vec<u64>) -> Self {
        Self {
            bits,
            size,
            mask: if bits == 0 { 0 } else { (1 << bits) - 1 },
            values_per_word: if bits == 0 { 0 } else { 64 / bits },
            words,
        }
    }

    fn required_words(bits: usize, size: usize) -> usize {
        if bits == 0 {
            0
        } else {
            let values_per_word = 64 / bits;
            (size + values_per_word - 1) / values_per_word
        }
    }

    pub fn get(&self, index: usize) -> Result<u64, ProtError> {
        if index >= self.size {
            return Err(ProtError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }
        if self.bits == 0 {
            return Ok(0);
        }
        let word = self.words[index / self.values_per_word];
        let shift = (index % self.values_per_word) * self.bits;
        Ok(word >> shift & self.mask)
    }

    pub fn set(&mut self, index: usize, value: u64) -> Result<(), ProtError> {
        if index >= self.size {
            return Err(ProtError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }
        if value > self.mask {
            return Err(ProtError::ValueOutOfRange {
                value,
                max: self.mask,
            });
        }
        if self.bits == 0 {
            return Ok(());
        }
        let word = &mut self.words[index / self.values_per_word];
        let shift = (index % self.values_per_word) * self.bits;
        *word = *word & !(self.mask << shift) | value << shift;
        Ok(())
    }

    /// The backing words, byte-identical to what was supplied absent
    /// intervening writes. Used directly as the wire/save payload.
    pub fn raw(&self) -> &[u64] {
        &self.words
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_get_roundtrip() -> Result<(), ProtError> {
        let mut storage = BitStorage::new(5, 100);
        for i in 0..100 {
            storage.set(i, (i % 32) as u64)?;
        }
        for i in 0..100 {
            assert_eq!(storage.get(i)?, (i % 32) as u64);
        }
        Ok(())
    }

    #[test]
    fn entries_do_not_cross_words() -> Result<(), ProtError> {
        // 5 bits -> 12 values per word, 4 bits of each word unused
        let mut storage = BitStorage::new(5, 24);
        storage.set(11, 31)?;
        storage.set(12, 31)?;
        assert_eq!(storage.raw().len(), 2);
        assert_eq!(storage.raw()[0] >> 55 & 0x1f, 31);
        assert_eq!(storage.raw()[0] >> 60, 0);
        assert_eq!(storage.raw()[1] & 0x1f, 31);
        Ok(())
    }

    #[test]
    fn rewrites_clear_old_bits() -> Result<(), ProtError> {
        let mut storage = BitStorage::new(4, 16);
        storage.set(3, 0xf)?;
        storage.set(3, 0x1)?;
        assert_eq!(storage.get(3)?, 0x1);
        assert_eq!(storage.get(2)?, 0);
        assert_eq!(storage.get(4)?, 0);
        Ok(())
    }

    #[test]
    fn zero_width() -> Result<(), ProtError> {
        let mut storage = BitStorage::new(0, 4096);
        assert!(storage.raw().is_empty());
        assert_eq!(storage.get(123)?, 0);
        storage.set(123, 0)?;
        assert_eq!(
            storage.set(123, 1),
            Err(ProtError::ValueOutOfRange { value: 1, max: 0 })
        );
        Ok(())
    }

    #[test]
    fn rejects_mismatched_backing_words() {
        // 4 bits, 4096 entries -> exactly 256 words
        assert!(BitStorage::with_words(4, 4096, vec![0; 256]).is_ok());
        assert_eq!(
            BitStorage::with_words(4, 4096, vec![0; 255]),
            Err(ProtError::SizeMismatch {
                expected: 256,
                actual: 255
            })
        );
        assert!(BitStorage::with_words(0, 4096, vec![0; 1]).is_err());
    }

    #[test]
    fn rejects_word_sized_and_wider_widths() {
        // 64 would overflow the mask shift, 65+ the values-per-word division
        assert!(BitStorage::with_words(64, 4096, vec![0; 4096]).is_err());
        assert!(BitStorage::with_words(65, 4096, vec![]).is_err());
        assert!(BitStorage::with_words(255, 4096, vec![]).is_err());
        assert!(BitStorage::with_words(63, 4096, vec![0; 4096]).is_ok());
    }

    #[test]
    fn index_and_value_bounds() {
        let mut storage = BitStorage::new(4, 16);
        assert_eq!(
            storage.get(16),
            Err(ProtError::IndexOutOfRange { index: 16, size: 16 })
        );
        assert_eq!(
            storage.set(0, 16),
            Err(ProtError::ValueOutOfRange { value: 16, max: 15 })
        );
    }

    #[test]
    fn raw_preserves_supplied_words() -> Result<(), ProtError> {
        let words = vec![0x0123_4567_89ab_cdef, 0xfedc_ba98_7654_3210];
        let storage = BitStorage::with_words(8, 16, words.clone())?;
        assert_eq!(storage.raw(), words.as_slice());
        Ok(())
    }
}
