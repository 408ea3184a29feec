#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative grid state for the Battle City simulation.
//!
//! The [`MapGrid`] owns terrain, obstacles and obstacle hit points for every
//! cell. It is built once from a parsed [`GridConfig`] and is mutated only by
//! [`MapGrid::try_hit_obstacle`]. Every spatial query is total: queries that
//! land outside the grid receive safe defaults instead of errors.

mod config;
mod mapper;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use battle_city_core::{CellCoord, CostProfile, Direction, ObstacleKind, TerrainKind};
use glam::{Affine3A, Vec3};
use thiserror::Error;

pub use config::{GridConfig, LegendEntry, WaveEntry, DEFAULT_TILE_SIZE};
pub use mapper::{CoordinateMapper, DEFAULT_SUBDIVISIONS_PER_TILE};

/// Symbol that never designates a spawn point.
pub const EMPTY_SYMBOL: &str = ".";

/// Reasons a map cannot be turned into a grid.
#[derive(Debug, Error, PartialEq)]
pub enum GridBuildError {
    /// Width or height is not positive.
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions {
        /// Requested column count.
        width: i32,
        /// Requested row count.
        height: i32,
    },
    /// Tile size is not a positive finite number.
    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(f32),
    /// A second base marker was found while strict base validation is on.
    #[error("map declares more than one base: {first:?} and {second:?}")]
    DuplicateBase {
        /// Cell of the first base marker.
        first: CellCoord,
        /// Cell of the conflicting marker.
        second: CellCoord,
    },
}

/// Reasons a map document cannot be parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document is malformed or has mistyped fields.
    #[error("failed to parse map document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parameters of the grid initialization call that do not come from the map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridOptions {
    /// Replaces the map's tile size when present.
    pub tile_size_override: Option<f32>,
    /// Places the map in the world.
    pub transform: Affine3A,
    /// Resolution of the snap grid inside one tile.
    pub subdivisions_per_tile: u32,
    /// Rejects maps with more than one base marker.
    pub strict_single_base: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            tile_size_override: None,
            transform: Affine3A::IDENTITY,
            subdivisions_per_tile: DEFAULT_SUBDIVISIONS_PER_TILE,
            strict_single_base: false,
        }
    }
}

/// Location and strength of the structure enemies attack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseInfo {
    cell: CellCoord,
    world: Vec3,
    hp: u32,
}

impl BaseInfo {
    /// Cell occupied by the base.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// World position of the base, lifted by half a tile.
    #[must_use]
    pub const fn world(&self) -> Vec3 {
        self.world
    }

    /// Default hit points of the base; always at least one.
    #[must_use]
    pub const fn hp(&self) -> u32 {
        self.hp
    }
}

/// Result of a projectile striking the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HitOutcome {
    /// Whether the projectile was absorbed.
    pub consumed: bool,
    /// Whether the absorbing obstacle was brick.
    pub was_brick: bool,
}

/// Handle returned by [`MapGrid::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

impl ListenerId {
    /// Numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

type CellListener = Box<dyn FnMut(CellCoord)>;

#[derive(Default)]
struct CellChangeListeners {
    next_id: u32,
    entries: Vec<(ListenerId, CellListener)>,
}

impl CellChangeListeners {
    fn subscribe(&mut self, listener: CellListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    fn broadcast(&mut self, cell: CellCoord) {
        for (_, listener) in &mut self.entries {
            listener(cell);
        }
    }
}

/// Dense terrain and obstacle store for a fixed-size grid.
pub struct MapGrid {
    mapper: CoordinateMapper,
    columns: u32,
    rows: u32,
    terrain: Vec<TerrainKind>,
    obstacles: Vec<ObstacleKind>,
    obstacle_hp: Vec<u8>,
    base: Option<BaseInfo>,
    player_start: Option<Vec3>,
    spawn_cells: BTreeMap<String, Vec<CellCoord>>,
    waves: Vec<WaveEntry>,
    listeners: CellChangeListeners,
}

impl fmt::Debug for MapGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapGrid")
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .field("tile_size", &self.mapper.tile_size())
            .field("base", &self.base)
            .field("spawn_symbols", &self.spawn_cells.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.entries.len())
            .finish_non_exhaustive()
    }
}

impl MapGrid {
    /// Builds the grid from a parsed map.
    ///
    /// Fails without producing a partial grid when the dimensions or tile
    /// size are not positive. Characters missing from the legend are
    /// skipped; rows shorter than the width leave the remaining cells at
    /// their defaults.
    pub fn build(config: &GridConfig, options: GridOptions) -> Result<Self, GridBuildError> {
        if config.width <= 0 || config.height <= 0 {
            return Err(GridBuildError::InvalidDimensions {
                width: config.width,
                height: config.height,
            });
        }
        let columns = config.width.unsigned_abs();
        let rows = config.height.unsigned_abs();

        let tile_size = options.tile_size_override.unwrap_or(config.tile_size);
        if !tile_size.is_finite() || tile_size <= 0.0 {
            return Err(GridBuildError::InvalidTileSize(tile_size));
        }

        let mapper = CoordinateMapper::new(
            options.transform,
            tile_size,
            options.subdivisions_per_tile,
            columns,
            rows,
        );
        let capacity = usize::try_from(u64::from(columns) * u64::from(rows)).unwrap_or(0);
        let mut grid = Self {
            mapper,
            columns,
            rows,
            terrain: vec![TerrainKind::Ground; capacity],
            obstacles: vec![ObstacleKind::None; capacity],
            obstacle_hp: vec![0; capacity],
            base: None,
            player_start: None,
            spawn_cells: BTreeMap::new(),
            waves: config.waves.clone(),
            listeners: CellChangeListeners::default(),
        };

        let lift = tile_size * 0.5;
        let mut unknown_symbols = BTreeSet::new();
        for (row_index, row) in config.rows.iter().take(rows as usize).enumerate() {
            for (column_index, symbol) in row.chars().take(columns as usize).enumerate() {
                let key = symbol.to_string();
                let Some(entry) = config.legend_entry(&key) else {
                    let _ = unknown_symbols.insert(symbol);
                    continue;
                };
                let cell = CellCoord::new(column_index as i32, row_index as i32);
                let Some(index) = grid.index(cell) else {
                    continue;
                };

                if !entry.terrain.is_empty() {
                    grid.terrain[index] = TerrainKind::from_label(&entry.terrain);
                }
                if !entry.obstacle.is_empty() {
                    let obstacle = ObstacleKind::from_label(&entry.obstacle);
                    grid.obstacles[index] = obstacle;
                    grid.obstacle_hp[index] = obstacle.initial_hp();
                }
                if entry.player_start {
                    grid.player_start = Some(grid.mapper.grid_to_world(cell, lift));
                }
                if !entry.enemy_spawn.is_empty() && key != EMPTY_SYMBOL {
                    let cells = grid.spawn_cells.entry(key).or_default();
                    if !cells.contains(&cell) {
                        cells.push(cell);
                    }
                }
                if entry.base {
                    if let Some(previous) = grid.base {
                        if options.strict_single_base {
                            return Err(GridBuildError::DuplicateBase {
                                first: previous.cell,
                                second: cell,
                            });
                        }
                        log::warn!(
                            "map declares another base at {cell:?}; replacing {:?}",
                            previous.cell
                        );
                    }
                    grid.base = Some(BaseInfo {
                        cell,
                        world: grid.mapper.grid_to_world(cell, lift),
                        hp: u32::try_from(entry.base_hp.max(1)).unwrap_or(1),
                    });
                }
            }
        }

        for symbol in unknown_symbols {
            log::warn!("map symbol {symbol:?} has no legend entry; cells left empty");
        }
        log::info!(
            "built {columns}x{rows} grid (tile {tile_size}, {} spawn symbols, base: {})",
            grid.spawn_cells.len(),
            grid.base.is_some()
        );

        Ok(grid)
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// World units covered by a single cell.
    #[must_use]
    pub const fn tile_size(&self) -> f32 {
        self.mapper.tile_size()
    }

    /// Resolution of the snap grid inside one tile.
    #[must_use]
    pub const fn subdivisions_per_tile(&self) -> u32 {
        self.mapper.subdivisions_per_tile()
    }

    /// Spacing of the snap grid in map-local units.
    #[must_use]
    pub fn sub_step(&self) -> f32 {
        self.mapper.sub_step()
    }

    /// Coordinate mapper bound to the grid.
    #[must_use]
    pub const fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Reports whether the cell lies inside the grid bounds.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.mapper.contains(cell)
    }

    /// See [`CoordinateMapper::world_to_grid`].
    #[must_use]
    pub fn world_to_grid(&self, world: Vec3) -> Option<CellCoord> {
        self.mapper.world_to_grid(world)
    }

    /// See [`CoordinateMapper::grid_to_world`].
    #[must_use]
    pub fn grid_to_world(&self, cell: CellCoord, z_offset: f32) -> Vec3 {
        self.mapper.grid_to_world(cell, z_offset)
    }

    /// See [`CoordinateMapper::snap_to_subgrid`].
    #[must_use]
    pub fn snap_to_subgrid(&self, world: Vec3, keep_z: bool) -> Vec3 {
        self.mapper.snap_to_subgrid(world, keep_z)
    }

    /// Terrain of a cell; ground outside the grid.
    #[must_use]
    pub fn terrain_at(&self, cell: CellCoord) -> TerrainKind {
        self.index(cell)
            .and_then(|index| self.terrain.get(index).copied())
            .unwrap_or_default()
    }

    /// Obstacle of a cell; none outside the grid.
    #[must_use]
    pub fn obstacle_at(&self, cell: CellCoord) -> ObstacleKind {
        self.index(cell)
            .and_then(|index| self.obstacles.get(index).copied())
            .unwrap_or_default()
    }

    /// Remaining obstacle hit points of a cell; zero outside the grid.
    #[must_use]
    pub fn obstacle_hp(&self, cell: CellCoord) -> u8 {
        self.index(cell)
            .and_then(|index| self.obstacle_hp.get(index).copied())
            .unwrap_or(0)
    }

    /// Terrain under a world position; ground outside the grid.
    #[must_use]
    pub fn terrain_at_world(&self, world: Vec3) -> TerrainKind {
        self.world_to_grid(world)
            .map_or(TerrainKind::Ground, |cell| self.terrain_at(cell))
    }

    /// Obstacle under a world position; none outside the grid.
    #[must_use]
    pub fn obstacle_at_world(&self, world: Vec3) -> ObstacleKind {
        self.world_to_grid(world)
            .map_or(ObstacleKind::None, |cell| self.obstacle_at(cell))
    }

    /// Reports whether a tank body may occupy the cell.
    ///
    /// Water, brick and steel block; cells outside the grid do not.
    #[must_use]
    pub fn is_cell_passable_for_body(&self, cell: CellCoord) -> bool {
        if !self.contains(cell) {
            return true;
        }
        self.terrain_at(cell) != TerrainKind::Water && !self.obstacle_at(cell).blocks_body()
    }

    /// Reports whether a tank body may occupy the cell under a world position.
    #[must_use]
    pub fn is_passable_for_body(&self, world: Vec3) -> bool {
        self.world_to_grid(world)
            .map_or(true, |cell| self.is_cell_passable_for_body(cell))
    }

    /// Cost of entering a cell under the provided profile.
    #[must_use]
    pub fn tile_cost(&self, cell: CellCoord, profile: &CostProfile) -> f32 {
        if !self.contains(cell) {
            return profile.impassable_cost;
        }
        if self.terrain_at(cell) == TerrainKind::Water {
            return profile.impassable_cost;
        }
        match self.obstacle_at(cell) {
            ObstacleKind::Steel => profile.impassable_cost,
            ObstacleKind::Brick => profile.brick_cost,
            ObstacleKind::None => profile.free_cost,
        }
    }

    /// In-bounds cardinal neighbours of a cell, ordered north, east, south,
    /// west.
    pub fn neighbors4(&self, cell: CellCoord) -> impl Iterator<Item = CellCoord> + '_ {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
        .into_iter()
        .map(move |direction| cell.neighbor(direction))
        .filter(move |neighbor| self.contains(*neighbor))
    }

    /// Strikes the obstacle under a world position.
    ///
    /// Steel absorbs the hit without changing. Brick loses one hit point and
    /// is cleared when its last point is gone, which notifies every
    /// cell-change listener with that cell. Empty cells and positions outside
    /// the grid do not absorb the hit.
    pub fn try_hit_obstacle(&mut self, world: Vec3) -> HitOutcome {
        self.world_to_grid(world)
            .map_or_else(HitOutcome::default, |cell| self.hit_cell(cell))
    }

    fn hit_cell(&mut self, cell: CellCoord) -> HitOutcome {
        let Some(index) = self.index(cell) else {
            return HitOutcome::default();
        };

        match self.obstacles[index] {
            ObstacleKind::Steel => HitOutcome {
                consumed: true,
                was_brick: false,
            },
            ObstacleKind::Brick => {
                let hp = &mut self.obstacle_hp[index];
                if *hp > 1 {
                    *hp -= 1;
                } else {
                    *hp = 0;
                    self.obstacles[index] = ObstacleKind::None;
                    log::debug!("brick at {cell:?} destroyed");
                    self.listeners.broadcast(cell);
                }
                HitOutcome {
                    consumed: true,
                    was_brick: true,
                }
            }
            ObstacleKind::None => HitOutcome::default(),
        }
    }

    /// Registers a listener notified synchronously whenever an obstacle is
    /// cleared. Listeners are called in no guaranteed order.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(CellCoord) + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    /// Removes a listener. Returns `false` if the handle was unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Spawn cells recorded for a symbol, in row-major discovery order.
    #[must_use]
    pub fn spawn_cells_for_symbol(&self, symbol: &str) -> &[CellCoord] {
        self.spawn_cells
            .get(symbol)
            .map_or(&[][..], |cells| cells.as_slice())
    }

    /// World positions of the spawn cells recorded for a symbol.
    #[must_use]
    pub fn spawn_locations_for_symbol(&self, symbol: &str) -> Vec<Vec3> {
        let lift = self.tile_size() * 0.5;
        self.spawn_cells_for_symbol(symbol)
            .iter()
            .map(|cell| self.grid_to_world(*cell, lift))
            .collect()
    }

    /// Deduplicated union of the spawn cells of every symbol.
    #[must_use]
    pub fn all_enemy_spawn_cells(&self) -> Vec<CellCoord> {
        let mut seen = BTreeSet::new();
        self.spawn_cells
            .values()
            .flatten()
            .copied()
            .filter(|cell| self.contains(*cell) && seen.insert(*cell))
            .collect()
    }

    /// World positions of every spawn cell of every symbol.
    #[must_use]
    pub fn all_spawn_world_locations(&self) -> Vec<Vec3> {
        let lift = self.tile_size() * 0.5;
        self.spawn_cells
            .values()
            .flatten()
            .map(|cell| self.grid_to_world(*cell, lift))
            .collect()
    }

    /// Reports whether the map declares a base.
    #[must_use]
    pub const fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Base declared by the map, if any.
    #[must_use]
    pub const fn base(&self) -> Option<&BaseInfo> {
        self.base.as_ref()
    }

    /// World position of the player's starting cell, if the map marks one.
    #[must_use]
    pub const fn player_world_start(&self) -> Option<Vec3> {
        self.player_start
    }

    /// Waves copied from the map.
    #[must_use]
    pub fn waves(&self) -> &[WaveEntry] {
        &self.waves
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        Some(row * width + column)
    }
}

/// Read-only helpers built on top of the grid queries.
pub mod query {
    use battle_city_core::{CellCoord, ObstacleKind, TerrainKind};

    use super::MapGrid;

    /// Counts the cells currently holding the provided obstacle.
    #[must_use]
    pub fn obstacle_count(grid: &MapGrid, kind: ObstacleKind) -> usize {
        grid.obstacles.iter().filter(|obstacle| **obstacle == kind).count()
    }

    /// Renders the grid as text, one string per row.
    ///
    /// Steel is `S`, brick `#`, water `~`, ice `_`, forest `%`, the base `B`
    /// and every other cell `.`.
    #[must_use]
    pub fn ascii_rows(grid: &MapGrid) -> Vec<String> {
        let base = grid.base().map(|base| base.cell());
        (0..grid.rows() as i32)
            .map(|row| {
                (0..grid.columns() as i32)
                    .map(|column| {
                        let cell = CellCoord::new(column, row);
                        if base == Some(cell) {
                            return 'B';
                        }
                        match (grid.obstacle_at(cell), grid.terrain_at(cell)) {
                            (ObstacleKind::Steel, _) => 'S',
                            (ObstacleKind::Brick, _) => '#',
                            (ObstacleKind::None, TerrainKind::Water) => '~',
                            (ObstacleKind::None, TerrainKind::Ice) => '_',
                            (ObstacleKind::None, TerrainKind::Forest) => '%',
                            (ObstacleKind::None, TerrainKind::Ground) => '.',
                        }
                    })
                    .collect()
            })
            .collect()
    }
}
