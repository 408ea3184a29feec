//! Parsed map documents handed to the grid at load time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Tile size applied when a map document omits one.
pub const DEFAULT_TILE_SIZE: f32 = 100.0;

/// Complete map document produced by the external importer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridConfig {
    /// Number of columns in the grid.
    pub width: i32,
    /// Number of rows in the grid.
    pub height: i32,
    /// World units covered by a single cell.
    pub tile_size: f32,
    /// Row strings; every character indexes the legend.
    pub rows: Vec<String>,
    /// Symbol legend keyed by single-character strings.
    pub legend: BTreeMap<String, LegendEntry>,
    /// Scheduled enemy waves.
    pub waves: Vec<WaveEntry>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            tile_size: DEFAULT_TILE_SIZE,
            rows: Vec::new(),
            legend: BTreeMap::new(),
            waves: Vec::new(),
        }
    }
}

impl GridConfig {
    /// Parses a map document from its JSON representation.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Looks up the legend entry for the provided symbol.
    #[must_use]
    pub fn legend_entry(&self, symbol: &str) -> Option<&LegendEntry> {
        self.legend.get(symbol)
    }
}

/// Meaning attached to a legend symbol.
///
/// Empty terrain and obstacle labels leave the cell defaults untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegendEntry {
    /// Terrain label such as `"Ice"` or `"Water"`.
    pub terrain: String,
    /// Obstacle label such as `"Brick"` or `"Steel"`.
    pub obstacle: String,
    /// Marks the player's starting cell.
    pub player_start: bool,
    /// Enemy spawn tag; non-empty marks the cell as a spawn point.
    pub enemy_spawn: String,
    /// Marks the base cell.
    pub base: bool,
    /// Starting hit points of the base.
    #[serde(rename = "baseHP")]
    pub base_hp: i32,
}

impl Default for LegendEntry {
    fn default() -> Self {
        Self {
            terrain: String::new(),
            obstacle: String::new(),
            player_start: false,
            enemy_spawn: String::new(),
            base: false,
            base_hp: 1,
        }
    }
}

/// Single scheduled wave of enemies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveEntry {
    /// Seconds after the start of the session at which the wave is due.
    pub time: f32,
    /// Enemy type forwarded to the agent factory.
    #[serde(rename = "type")]
    pub kind: String,
    /// Spawn symbol the wave belongs to.
    pub spawn: String,
    /// Number of enemies in the wave.
    pub count: i32,
}

impl Default for WaveEntry {
    fn default() -> Self {
        Self {
            time: 0.0,
            kind: String::new(),
            spawn: String::new(),
            count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_importer_defaults() {
        let config = GridConfig::from_json_str(
            r##"{
                "width": 2,
                "height": 1,
                "rows": ["B#"],
                "legend": { "B": { "base": true }, "#": { "obstacle": "Brick" } },
                "waves": [{ "time": 1.5, "type": "Basic", "spawn": "A" }]
            }"##,
        )
        .expect("valid map document");

        assert_eq!(config.tile_size, DEFAULT_TILE_SIZE);
        assert_eq!(config.legend_entry("B").map(|entry| entry.base_hp), Some(1));
        assert_eq!(config.waves[0].count, 1);
        assert_eq!(config.waves[0].kind, "Basic");
    }

    #[test]
    fn malformed_document_reports_parse_error() {
        let result = GridConfig::from_json_str("{ \"width\": \"wide\" }");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
