use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

#[derive(Debug, PartialEq, Eq)]
pub enum ProtError {
    /// Backing word count inconsistent with the declared size/width.
    SizeMismatch { expected: usize, actual: usize },
    /// Write exceeds the current bit width of a `BitStorage`.
    ValueOutOfRange { value: u64, max: u64 },
    /// Slot index outside a fixed-size container.
    IndexOutOfRange { index: usize, size: usize },
    /// Palette id with no entry behind it.
    InvalidPaletteIndex(u32),
    /// Section Y outside the chunk's section range on import.
    SectionBounds { y: i32, count: usize },
    UnknownBlock(String),
    UnknownBiome(String),
    UnknownBlockEntity(String),
    /// Block entity X/Z does not fit the packed nibble pair.
    XZOutOfBounds { x: i32, z: i32 },
    VarIntTooBig,
    Io(String),
    Nbt(String),
    Any(String),
}

impl Display for ProtError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtError::SizeMismatch { expected, actual } => {
                write!(f, "Backing data size mismatch: expected {expected} words, got {actual}")
            }
            ProtError::ValueOutOfRange { value, max } => {
                write!(f, "Value {value} out of range (max {max})")
            }
            ProtError::IndexOutOfRange { index, size } => {
                write!(f, "Index {index} out of range (size {size})")
            }
            ProtError::InvalidPaletteIndex(id) => write!(f, "Invalid palette index: {id}"),
            ProtError::SectionBounds { y, count } => {
                write!(f, "Section Y value {y} out of bounds ({count} sections)")
            }
            ProtError::UnknownBlock(name) => write!(f, "Unknown block: {name}"),
            ProtError::UnknownBiome(name) => write!(f, "Unknown biome: {name}"),
            ProtError::UnknownBlockEntity(name) => write!(f, "Unknown block entity: {name}"),
            ProtError::XZOutOfBounds { x, z } => {
                write!(f, "Packing a XZ({x}, {z}) out of bound")
            }
            ProtError::VarIntTooBig => write!(f, "VarInt is too big"),
            ProtError::Io(v) => write!(f, "IO error: {v}"),
            ProtError::Nbt(v) => write!(f, "NBT error: {v}"),
            ProtError::Any(v) => write!(f, "{v}"),
        }
    }
}

impl Error for ProtError {}

impl From<String> for ProtError {
    fn from(s: String) -> Self {
        ProtError::Any(s)
    }
}

impl From<std::io::Error> for ProtError {
    fn from(e: std::io::Error) -> Self {
        ProtError::Io(format!("{e:?}"))
    }
}
