pub mod compound;
pub mod primitives;
pub mod traits;
