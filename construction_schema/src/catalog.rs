use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{Faction, UnitTypeDefinition, UnitTypeId};

pub const BUILTIN_UNIT_CATALOG: &str = include_str!("data/unit_catalog.json");

#[derive(Debug, Clone, Deserialize)]
struct UnitCatalogFile {
    units: Vec<UnitTypeDefinition>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse unit catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read unit catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid unit catalog: {0}")]
    Invalid(String),
}

/// Static facts about every unit type the construction layer may see.
#[derive(Debug, Clone)]
pub struct UnitCatalog {
    definitions: Vec<UnitTypeDefinition>,
    index: HashMap<UnitTypeId, usize>,
    workers: HashMap<Faction, UnitTypeId>,
}

impl UnitCatalog {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            UnitCatalog::from_json_str(BUILTIN_UNIT_CATALOG)
                .expect("builtin unit catalog should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: UnitCatalogFile = serde_json::from_str(json)?;
        UnitCatalog::from_definitions(file.units)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        UnitCatalog::from_json_str(&contents)
    }

    pub fn from_definitions(definitions: Vec<UnitTypeDefinition>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(definitions.len());
        let mut workers = HashMap::new();
        for (idx, def) in definitions.iter().enumerate() {
            if index.insert(def.id.clone(), idx).is_some() {
                return Err(CatalogError::Invalid(format!(
                    "duplicate unit type `{}`",
                    def.id
                )));
            }
            if def.is_worker() {
                workers.entry(def.faction).or_insert_with(|| def.id.clone());
            }
        }

        let factions: HashSet<Faction> = definitions.iter().map(|def| def.faction).collect();
        for faction in factions {
            if !workers.contains_key(&faction) {
                return Err(CatalogError::Invalid(format!(
                    "faction `{faction}` has no worker type"
                )));
            }
        }

        for def in &definitions {
            if let Some(source) = &def.morphs_from {
                if !index.contains_key(source) {
                    return Err(CatalogError::Invalid(format!(
                        "`{}` morphs from unknown type `{}`",
                        def.id, source
                    )));
                }
            }
        }

        Ok(Self {
            definitions,
            index,
            workers,
        })
    }

    pub fn get(&self, id: &UnitTypeId) -> Option<&UnitTypeDefinition> {
        self.index.get(id).map(|idx| &self.definitions[*idx])
    }

    pub fn is_structure(&self, id: &UnitTypeId) -> bool {
        self.get(id).map(UnitTypeDefinition::is_structure).unwrap_or(false)
    }

    /// Generic worker type of the faction.
    pub fn worker_for(&self, faction: Faction) -> Option<&UnitTypeId> {
        self.workers.get(&faction)
    }

    pub fn definitions(&self) -> &[UnitTypeDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
