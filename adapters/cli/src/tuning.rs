use std::{fs, path::Path};

use anyhow::{Context, Result};
use battle_city_system_goals::GoalPolicySpec;
use battle_city_system_movement::{CoordinatorTuning, MovePolicySpec};
use battle_city_system_spawning::SpawnerConfig;
use serde::{Deserialize, Serialize};

/// Every tunable of a headless session, loaded from TOML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SimulationTuning {
    /// Movement coordinator tuning shared by every enemy.
    pub(crate) coordinator: CoordinatorTuning,
    /// Movement policy tree built for every enemy.
    pub(crate) policy: MovePolicySpec,
    /// Population goal policy.
    pub(crate) goals: GoalPolicySpec,
    /// Wave scheduling and spawn placement.
    pub(crate) spawner: SpawnerConfig,
    /// Stand-ins for the game rules the core leaves to its host.
    pub(crate) arena: ArenaTuning,
}

impl SimulationTuning {
    /// Reads the tuning file, or returns the defaults when none is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read tuning file {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("failed to parse tuning file {}", path.display()))
    }

    fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }
}

/// Host-side rules of the headless arena.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ArenaTuning {
    /// Tank speed in tiles per second.
    pub(crate) tank_speed_tiles: f32,
    /// Seconds between two shots of the same tank.
    pub(crate) fire_cooldown_secs: f32,
    /// Cells a shot travels before it fizzles.
    pub(crate) shot_range_tiles: u32,
    /// Seconds between two shots of the player turret; zero disables it.
    pub(crate) player_fire_interval_secs: f32,
}

impl Default for ArenaTuning {
    fn default() -> Self {
        Self {
            tank_speed_tiles: 2.0,
            fire_cooldown_secs: 1.0,
            shot_range_tiles: 12,
            player_fire_interval_secs: 1.5,
        }
    }
}
