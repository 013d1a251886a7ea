//! Spawner components: wave definitions, pacing state and shield generators.

use super::SquadId;
use hecs::Entity;
use rand::Rng;
use roguewave_logic::destination::MapBounds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnOrder {
    #[default]
    Sequential,
    Random,
}

/// One wave of enemies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveDefinition {
    /// Enemy prototype names
    pub enemies: Vec<String>,
    /// Seconds between spawn bursts
    pub spawn_rate: f32,
    /// Enemies per burst
    pub spawn_amount: u32,
    /// Seconds the wave keeps spawning
    pub wave_duration: f32,
    pub order: SpawnOrder,
}

impl Default for WaveDefinition {
    fn default() -> Self {
        Self {
            enemies: Vec::new(),
            spawn_rate: 5.0,
            spawn_amount: 1,
            wave_duration: 10.0,
            order: SpawnOrder::Sequential,
        }
    }
}

impl WaveDefinition {
    /// Next prototype to spawn. `cursor` walks sequential waves.
    pub fn next_enemy(&self, cursor: &mut usize, rng: &mut impl Rng) -> Option<&str> {
        if self.enemies.is_empty() {
            return None;
        }
        let index = match self.order {
            SpawnOrder::Sequential => {
                let i = *cursor % self.enemies.len();
                *cursor += 1;
                i
            }
            SpawnOrder::Random => rng.gen_range(0..self.enemies.len()),
        };
        Some(self.enemies[index].as_str())
    }
}

/// Level layout and wave plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelDefinition {
    pub lot_size: (f32, f32),
    pub map_size: (u32, u32),
    pub waves: Vec<WaveDefinition>,
    /// Cap on live enemies per spawner, 0 for no cap
    pub max_alive: u32,
    /// Keep generating harder waves after the last authored one
    pub generate_new_waves: bool,
}

impl Default for LevelDefinition {
    fn default() -> Self {
        Self {
            lot_size: (25.0, 25.0),
            map_size: (10, 10),
            waves: Vec::new(),
            max_alive: 0,
            generate_new_waves: true,
        }
    }
}

impl LevelDefinition {
    pub fn bounds(&self) -> MapBounds {
        MapBounds::from_level(self.lot_size, self.map_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    pub time_between_waves: f32,
    pub ignore_max_alive: bool,
    /// 0 means always active; otherwise spawning pauses while the target is
    /// farther away than this
    pub active_range: f32,
    pub spawn_radius: f32,
    pub destroy_spawns_on_death: bool,
    /// 0 for an unshielded spawner
    pub shield_generators: u32,
    pub generator_health: f32,
    pub health_max: f32,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            time_between_waves: 5.0,
            ignore_max_alive: false,
            active_range: 0.0,
            spawn_radius: 5.0,
            destroy_spawns_on_death: true,
            shield_generators: 3,
            generator_health: 50.0,
            health_max: 500.0,
        }
    }
}

/// Where a spawner is in its wave cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WavePhase {
    /// Between waves; the next wave starts at `until`
    Waiting { until: f32 },
    Spawning { wave_end: f32, next_burst: f32 },
    /// No waves left
    Finished,
}

/// Wave-driven enemy spawner
#[derive(Debug, Clone)]
pub struct Spawner {
    pub config: SpawnerConfig,
    pub level: LevelDefinition,
    pub wave: Option<WaveDefinition>,
    /// Index of the next authored wave
    pub next_wave_index: usize,
    pub phase: WavePhase,
    pub cursor: usize,
    /// Live enemies spawned here
    pub live: Vec<Entity>,
    pub generators: Vec<Entity>,
    pub living_generators: u32,
    /// Squad most recently formed by a leader spawned here
    pub squad: Option<SquadId>,
}

impl Spawner {
    pub fn new(config: SpawnerConfig, level: LevelDefinition) -> Self {
        Self {
            config,
            level,
            wave: None,
            next_wave_index: 0,
            phase: WavePhase::Waiting { until: 0.0 },
            cursor: 0,
            live: Vec::new(),
            generators: Vec::new(),
            living_generators: 0,
            squad: None,
        }
    }

    pub fn shield_up(&self) -> bool {
        self.living_generators > 0
    }

    /// Whether one more enemy fits under the level's cap, counting
    /// `queued` spawns not yet in the live list.
    pub fn has_room(&self, queued: usize) -> bool {
        self.config.ignore_max_alive
            || self.level.max_alive == 0
            || ((self.live.len() + queued) as u32) < self.level.max_alive
    }
}

/// Orbiting generator that keeps its spawner's shield up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShieldGenerator {
    pub spawner: Entity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sequential_wave_cycles() {
        let wave = WaveDefinition {
            enemies: vec!["a".into(), "b".into()],
            ..WaveDefinition::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut cursor = 0;
        let picks: Vec<_> = (0..4)
            .filter_map(|_| wave.next_enemy(&mut cursor, &mut rng).map(str::to_owned))
            .collect();
        assert_eq!(picks, vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_empty_wave_has_no_enemy() {
        let wave = WaveDefinition::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(wave.next_enemy(&mut 0, &mut rng).is_none());
    }

    #[test]
    fn test_capacity_rules() {
        let level = LevelDefinition { max_alive: 1, ..LevelDefinition::default() };
        let mut spawner = Spawner::new(SpawnerConfig::default(), level);
        assert!(spawner.has_room(0));
        assert!(!spawner.has_room(1));
        spawner.live.push(Entity::DANGLING);
        assert!(!spawner.has_room(0));
        spawner.config.ignore_max_alive = true;
        assert!(spawner.has_room(3));
    }
}
