//! Engine configuration and authored data loading.
//!
//! Everything is plain serde data with defaults, so partial JSON files are
//! fine. Malformed files are errors; authoring mistakes inside well-formed
//! files (duplicate ids, unknown prototypes) are logged and skipped.

use crate::components::{EnemyProfile, LevelDefinition};
use crate::systems::NanobotConfig;
use roguewave_logic::catalog::{LoadReport, RecipeCatalog};
use roguewave_logic::recipe::Recipe;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for deterministic runs; `None` seeds from entropy
    pub seed: Option<u64>,
    pub level: LevelDefinition,
    pub nanobots: NanobotConfig,
    pub enemies: Vec<EnemyProfile>,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&read(path.as_ref())?)
    }
}

/// Parse a JSON array of recipes into a catalog.
pub fn recipes_from_json(json: &str) -> Result<(RecipeCatalog, LoadReport), ConfigError> {
    let recipes: Vec<Recipe> = serde_json::from_str(json)?;
    Ok(RecipeCatalog::load(recipes))
}

pub fn load_recipes(path: impl AsRef<Path>) -> Result<(RecipeCatalog, LoadReport), ConfigError> {
    recipes_from_json(&read(path.as_ref())?)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Enemy prototypes by name.
#[derive(Debug, Clone, Default)]
pub struct EnemyRoster {
    profiles: HashMap<String, Arc<EnemyProfile>>,
    order: Vec<String>,
}

impl EnemyRoster {
    /// Build the roster, keeping the first of any duplicate names.
    pub fn new(profiles: impl IntoIterator<Item = EnemyProfile>) -> Self {
        let mut roster = Self::default();
        for profile in profiles {
            if roster.profiles.contains_key(&profile.name) {
                log::error!("duplicate enemy prototype '{}', skipping", profile.name);
                continue;
            }
            roster.order.push(profile.name.clone());
            roster.profiles.insert(profile.name.clone(), Arc::new(profile));
        }
        roster
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EnemyProfile>> {
        self.profiles.get(name)
    }

    /// Names in authored order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Log wave entries naming unknown prototypes. Returns how many there are.
    pub fn check_level(&self, level: &LevelDefinition) -> usize {
        let mut unknown = 0;
        for (index, wave) in level.waves.iter().enumerate() {
            if wave.enemies.is_empty() {
                log::error!("wave {index} has no enemy prototypes");
            }
            for name in &wave.enemies {
                if !self.profiles.contains_key(name) {
                    log::error!("wave {index} names unknown enemy prototype '{name}'");
                    unknown += 1;
                }
            }
        }
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::WaveDefinition;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "seed": 7, "level": { "max_alive": 4 } }"#)
            .expect("valid config");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.level.max_alive, 4);
        assert_eq!(config.level.lot_size, (25.0, 25.0));
        assert!(config.enemies.is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(EngineConfig::from_json("{ nope"), Err(ConfigError::Json(_))));
        assert!(matches!(
            EngineConfig::load("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_roster_skips_duplicates_and_checks_waves() {
        let roster = EnemyRoster::new([
            EnemyProfile { name: "drone".into(), ..EnemyProfile::default() },
            EnemyProfile { name: "drone".into(), display_name: "dup".into(), ..EnemyProfile::default() },
            EnemyProfile { name: "turret".into(), mobile: false, ..EnemyProfile::default() },
        ]);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get("drone").map(|p| p.display_name.as_str()), Some("TBD"));

        let level = LevelDefinition {
            waves: vec![WaveDefinition {
                enemies: vec!["drone".into(), "ghost".into()],
                ..WaveDefinition::default()
            }],
            ..LevelDefinition::default()
        };
        assert_eq!(roster.check_level(&level), 1);
    }

    #[test]
    fn test_recipes_from_json() {
        let (catalog, report) = recipes_from_json(
            r#"[{ "id": "medkit", "display_name": "Medkit", "kind": "health", "heal_amount": 25.0, "build_cost": 20 }]"#,
        )
        .expect("valid recipes");
        assert_eq!(catalog.len(), 1);
        assert!(report.is_clean());
    }
}
