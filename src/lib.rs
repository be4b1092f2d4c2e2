//! Chunk data for the Minecraft protocol: palettized block-state and biome
//! storage, the section and chunk wire formats, light data, and conversion
//! to and from the persisted (save) form.
//!
//! The wire types implement the async [`ReadProt`](protocol_types::traits::ReadProt)
//! and [`WriteProt`](protocol_types::traits::WriteProt) traits and work on any
//! `AsyncRead`/`AsyncWrite` stream. Name-to-id resolution goes through
//! explicit [`registry`] instances; nothing here is global.

pub mod chunk;
pub mod err;
pub mod protocol_types;
pub mod registry;
pub mod save;
pub mod world;
