use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::chunk::{Biome, BlockState};
use crate::err::ProtError;

/// A block-state identity in the save format: a namespaced name plus its
/// string-valued property map (orientation, waterlogged, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockStateKey {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl BlockStateKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_properties(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }
}

#[derive(Deserialize)]
struct StateEntry {
    id: u32,
    name: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    air: bool,
}

#[derive(Deserialize)]
struct EntityEntry {
    id: u32,
    name: String,
}

#[derive(Deserialize)]
struct BlockDump {
    states: Vec<StateEntry>,
    #[serde(default)]
    block_entities: Vec<EntityEntry>,
}

/// Maps (name, properties) to canonical block-state ids and back, knows
/// which states count as air, and resolves block-entity type names.
/// Always passed explicitly; the library keeps no global registry.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    to_id: HashMap<BlockStateKey, BlockState>,
    from_id: HashMap<BlockState, BlockStateKey>,
    air: HashMap<BlockState, ()>,
    entity_to_id: HashMap<String, u32>,
    entity_from_id: HashMap<u32, String>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON dump of the shape
    /// `{"states": [{"id", "name", "properties"?, "air"?}], "block_entities": [{"id", "name"}]}`.
    pub fn from_json(json: &str) -> Result<Self, ProtError> {
        let dump: BlockDump = serde_json::from_str(json)
            .map_err(|e| ProtError::Any(format!("Block registry JSON: {e}")))?;
        let mut registry = Self::new();
        for entry in dump.states {
            registry.register(
                BlockStateKey::with_properties(entry.name, entry.properties),
                BlockState(entry.id),
                entry.air,
            );
        }
        for entry in dump.block_entities {
            registry.register_entity_type(entry.name, entry.id);
        }
        Ok(registry)
    }

    pub fn register(&mut self, key: BlockStateKey, state: BlockState, is_air: bool) {
        self.to_id.insert(key.clone(), state);
        self.from_id.insert(state, key);
        if is_air {
            self.air.insert(state, ());
        }
    }

    pub fn register_entity_type(&mut self, name: impl Into<String>, id: u32) {
        let name = name.into();
        self.entity_to_id.insert(name.clone(), id);
        self.entity_from_id.insert(id, name);
    }

    pub fn state_id(&self, key: &BlockStateKey) -> Option<BlockState> {
        self.to_id.get(key).copied()
    }

    pub fn state_key(&self, state: BlockState) -> Option<&BlockStateKey> {
        self.from_id.get(&state)
    }

    /// Whether the state's semantic class is air. Unknown states are not air.
    pub fn is_air(&self, state: BlockState) -> bool {
        self.air.contains_key(&state)
    }

    pub fn entity_type(&self, name: &str) -> Option<u32> {
        self.entity_to_id.get(name).copied()
    }

    pub fn entity_type_name(&self, id: u32) -> Option<&str> {
        self.entity_from_id.get(&id).map(String::as_str)
    }
}

#[derive(Deserialize)]
struct BiomeEntry {
    id: u32,
    name: String,
}

#[derive(Deserialize)]
struct BiomeDump {
    biomes: Vec<BiomeEntry>,
}

/// Maps biome names to canonical ids and back. Names are stored without the
/// `minecraft:` prefix; lookups accept both forms, as save files carry the
/// prefixed spelling.
#[derive(Debug, Default)]
pub struct BiomeRegistry {
    to_id: HashMap<String, Biome>,
    from_id: HashMap<Biome, String>,
}

impl BiomeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON dump of the shape `{"biomes": [{"id", "name"}]}`.
    pub fn from_json(json: &str) -> Result<Self, ProtError> {
        let dump: BiomeDump = serde_json::from_str(json)
            .map_err(|e| ProtError::Any(format!("Biome registry JSON: {e}")))?;
        let mut registry = Self::new();
        for entry in dump.biomes {
            registry.register(entry.name, Biome(entry.id));
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, biome: Biome) {
        let name = name.into();
        let name = name.strip_prefix("minecraft:").map(str::to_string).unwrap_or(name);
        self.to_id.insert(name.clone(), biome);
        self.from_id.insert(biome, name);
    }

    pub fn biome_id(&self, name: &str) -> Option<Biome> {
        let name = name.strip_prefix("minecraft:").unwrap_or(name);
        self.to_id.get(name).copied()
    }

    pub fn biome_name(&self, biome: Biome) -> Option<&str> {
        self.from_id.get(&biome).map(String::as_str)
    }
}
