use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use construction_schema::UnitTypeId;
use serde::Deserialize;
use thiserror::Error;

use crate::orders::SearchRadius;

pub const BUILTIN_CONSTRUCTION_CONFIG: &str = include_str!("data/construction_config.json");

pub const CONSTRUCTION_CONFIG_ENV: &str = "CONSTRUCTION_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    /// Placement search radius in tiles; `None` searches without bound.
    pub default_search_radius: Option<u32>,
    /// Supply level from which a request without any free worker is worth a warning.
    pub builder_warning_supply: u32,
    /// Passes a dedicated-builder order may wait for a replacement builder.
    pub max_builderless_ticks: u32,
    /// Types whose in-flight entities are added to pending counts even
    /// though no order tracks them.
    pub untracked_pending_types: Vec<UnitTypeId>,
    pub builder_pick_seed: u64,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            default_search_radius: None,
            builder_warning_supply: 7,
            max_builderless_ticks: 48,
            untracked_pending_types: vec![UnitTypeId::from("zerg_overlord")],
            builder_pick_seed: 1337,
        }
    }
}

impl ConstructionConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_CONSTRUCTION_CONFIG)
                .expect("builtin construction config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConstructionConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConstructionConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| ConstructionConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        ConstructionConfig::from_json_str(&contents)
    }

    pub fn search_radius(&self) -> SearchRadius {
        SearchRadius::from_config(self.default_search_radius)
    }

    pub fn tracks_untracked_pending(&self, unit_type: &UnitTypeId) -> bool {
        self.untracked_pending_types.contains(unit_type)
    }
}

#[derive(Debug, Error)]
pub enum ConstructionConfigError {
    #[error("failed to parse construction config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read construction config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads the file named by `CONSTRUCTION_CONFIG_PATH`, falling back to the builtin config.
pub fn load_construction_config_from_env() -> Arc<ConstructionConfig> {
    if let Ok(path) = env::var(CONSTRUCTION_CONFIG_ENV) {
        let path = PathBuf::from(path);
        match ConstructionConfig::from_file(&path) {
            Ok(config) => return Arc::new(config),
            Err(err) => {
                tracing::warn!(
                    target: "construction::config",
                    path = %path.display(),
                    error = %err,
                    "construction_config.load_failed"
                );
            }
        }
    }
    ConstructionConfig::builtin()
}
