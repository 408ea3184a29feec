#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Battle City simulation.
//!
//! This crate defines the vocabulary that connects the authoritative grid,
//! the pathfinder, and the AI systems. The grid answers spatial queries in
//! terms of [`CellCoord`], [`TerrainKind`] and [`ObstacleKind`]; the
//! pathfinder consumes [`PathRequest`] values and answers with
//! [`PathResult`]; movement policies emit [`MoveInput`] values that can only
//! ever describe a cardinal step; the spawner reports population changes as
//! [`Event`] values.

use std::time::Duration;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Coordinates are signed so that lookups may step past the grid edges; the
/// grid answers such lookups with safe defaults instead of failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: i32,
    row: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell, growing along world X.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Zero-based row index of the cell, growing along world Y.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column.abs_diff(other.column) + self.row.abs_diff(other.row)
    }

    /// Returns the cell reached after `steps` moves in the provided direction.
    #[must_use]
    pub fn stepped(self, direction: Direction, steps: i32) -> CellCoord {
        let (dx, dy) = direction.offset();
        CellCoord::new(
            self.column.saturating_add(dx.saturating_mul(steps)),
            self.row.saturating_add(dy.saturating_mul(steps)),
        )
    }

    /// Returns the cardinal neighbour in the provided direction.
    #[must_use]
    pub fn neighbor(self, direction: Direction) -> CellCoord {
        self.stepped(direction, 1)
    }
}

/// One of the two world axes a tank can travel along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// World X, shared with grid columns.
    X,
    /// World Y, shared with grid rows.
    Y,
}

/// Cardinal movement directions expressed in map-local axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices (-Y).
    North,
    /// Movement toward increasing column indices (+X).
    East,
    /// Movement toward increasing row indices (+Y).
    South,
    /// Movement toward decreasing column indices (-X).
    West,
}

impl Direction {
    /// Every cardinal direction, ordered +X, -X, +Y, -Y.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::West,
        Direction::South,
        Direction::North,
    ];

    /// Axis the direction travels along.
    #[must_use]
    pub const fn axis(self) -> Axis {
        match self {
            Self::East | Self::West => Axis::X,
            Self::North | Self::South => Axis::Y,
        }
    }

    /// Sign of travel along [`Direction::axis`], either `1` or `-1`.
    #[must_use]
    pub const fn sign(self) -> i32 {
        match self {
            Self::East | Self::South => 1,
            Self::West | Self::North => -1,
        }
    }

    /// Builds a direction from an axis and a sign. Non-negative signs map to
    /// the positive direction.
    #[must_use]
    pub const fn from_axis(axis: Axis, sign: i32) -> Self {
        match (axis, sign >= 0) {
            (Axis::X, true) => Self::East,
            (Axis::X, false) => Self::West,
            (Axis::Y, true) => Self::South,
            (Axis::Y, false) => Self::North,
        }
    }

    /// Column and row delta of a single step.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// Unit vector of the direction in map-local space.
    #[must_use]
    pub fn unit_vector(self) -> Vec2 {
        let (dx, dy) = self.offset();
        Vec2::new(dx as f32, dy as f32)
    }
}

/// Raw two-axis movement input produced by movement policies.
///
/// The representation makes diagonal input unrepresentable: the value is
/// either idle or a single cardinal direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MoveInput(Option<Direction>);

impl MoveInput {
    /// Input that requests no movement.
    pub const IDLE: MoveInput = MoveInput(None);

    /// Input that requests travel in the provided direction.
    #[must_use]
    pub const fn toward(direction: Direction) -> Self {
        Self(Some(direction))
    }

    /// Projects a vector onto its dominant axis. Ties favour X; a zero vector
    /// yields [`MoveInput::IDLE`].
    #[must_use]
    pub fn dominant(vector: Vec2) -> Self {
        let (axis, component) = if vector.x.abs() >= vector.y.abs() {
            (Axis::X, vector.x)
        } else {
            (Axis::Y, vector.y)
        };
        if component > 0.0 {
            Self::toward(Direction::from_axis(axis, 1))
        } else if component < 0.0 {
            Self::toward(Direction::from_axis(axis, -1))
        } else {
            Self::IDLE
        }
    }

    /// Direction requested by the input, if any.
    #[must_use]
    pub const fn direction(&self) -> Option<Direction> {
        self.0
    }

    /// Reports whether the input requests no movement.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    /// Input as a vector, one of `(0,0)`, `(±1,0)` or `(0,±1)`.
    #[must_use]
    pub fn to_vec2(self) -> Vec2 {
        self.0.map_or(Vec2::ZERO, Direction::unit_vector)
    }
}

/// Base terrain stored for every grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    /// Plain ground.
    #[default]
    Ground,
    /// Slippery ice; passable.
    Ice,
    /// Water; impassable to tanks.
    Water,
    /// Forest canopy; passable.
    Forest,
}

impl TerrainKind {
    /// Parses a legend label case-insensitively. Unknown labels map to ground.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("ice") {
            Self::Ice
        } else if label.eq_ignore_ascii_case("water") {
            Self::Water
        } else if label.eq_ignore_ascii_case("forest") {
            Self::Forest
        } else {
            Self::Ground
        }
    }
}

/// Obstacle stored on top of the terrain of a grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObstacleKind {
    /// No obstacle.
    #[default]
    None,
    /// Destructible brick wall.
    Brick,
    /// Indestructible steel wall.
    Steel,
}

impl ObstacleKind {
    /// Hit points assigned to a freshly built obstacle.
    ///
    /// Brick survives two hits. Steel carries the `u8::MAX` sentinel and is
    /// never decremented.
    #[must_use]
    pub const fn initial_hp(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Brick => 2,
            Self::Steel => u8::MAX,
        }
    }

    /// Reports whether the obstacle stops tank bodies.
    #[must_use]
    pub const fn blocks_body(self) -> bool {
        matches!(self, Self::Brick | Self::Steel)
    }

    /// Parses a legend label case-insensitively. Unknown labels map to none.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("brick") {
            Self::Brick
        } else if label.eq_ignore_ascii_case("steel") {
            Self::Steel
        } else {
            Self::None
        }
    }
}

/// Traversal costs used when pricing grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CostProfile {
    /// Cost of entering ground, ice or forest.
    pub free_cost: f32,
    /// Cost of entering a brick cell, which can be shot through.
    pub brick_cost: f32,
    /// Effective infinity; cells priced at or above it are never entered.
    pub impassable_cost: f32,
}

impl CostProfile {
    /// Creates a new cost profile.
    #[must_use]
    pub const fn new(free_cost: f32, brick_cost: f32, impassable_cost: f32) -> Self {
        Self {
            free_cost,
            brick_cost,
            impassable_cost,
        }
    }

    /// Reports whether the provided cost may be entered under this profile.
    #[must_use]
    pub fn is_passable(&self, cost: f32) -> bool {
        cost < self.impassable_cost
    }
}

impl Default for CostProfile {
    fn default() -> Self {
        Self::new(1.0, 10.0, 1e9)
    }
}

/// Query submitted to the pathfinder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathRequest {
    /// Cell the search starts from.
    pub start: CellCoord,
    /// Cell the search tries to reach.
    pub goal: CellCoord,
    /// Costs used to price cells.
    pub cost: CostProfile,
    /// Maximum number of node expansions; zero searches without limit.
    pub max_steps: u32,
    /// Whether the closest approach is acceptable when the goal is unreachable.
    pub allow_partial: bool,
}

impl PathRequest {
    /// Creates an unbounded request that accepts partial routes.
    #[must_use]
    pub fn new(start: CellCoord, goal: CellCoord, cost: CostProfile) -> Self {
        Self {
            start,
            goal,
            cost,
            max_steps: 0,
            allow_partial: true,
        }
    }

    /// Limits the search to the provided number of expansions.
    #[must_use]
    pub fn with_horizon(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Controls whether partial routes are accepted.
    #[must_use]
    pub fn with_partial(mut self, allow_partial: bool) -> Self {
        self.allow_partial = allow_partial;
        self
    }
}

/// Answer produced by the pathfinder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathResult {
    /// Cells from the start to the chosen endpoint, inclusive.
    pub cells: Vec<CellCoord>,
    /// Sum of the entry costs of every cell after the start.
    pub total_cost: f32,
    /// Whether the endpoint is the requested goal.
    pub reached_goal: bool,
    /// Whether the result may be followed at all.
    pub valid: bool,
}

impl PathResult {
    /// Result describing the absence of any usable route.
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Final cell of the route, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<CellCoord> {
        self.cells.last().copied()
    }
}

/// Unique identifier assigned to an enemy tank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// What an enemy tank is currently trying to destroy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyGoal {
    /// Chase the player tank.
    HuntPlayer,
    /// Attack the base structure.
    #[default]
    HuntBase,
}

/// Events broadcast by the spawner for the agent factory and observers.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that an enemy was placed on the grid.
    EnemySpawned {
        /// Identifier assigned to the enemy.
        enemy: EnemyId,
        /// Cell the enemy occupies after spawning.
        cell: CellCoord,
        /// World position of the cell center, lifted by half a tile.
        position: Vec3,
        /// Enemy type taken from the wave entry.
        kind: String,
        /// Spawn symbol taken from the wave entry.
        symbol: String,
        /// Goal assigned by the goal policy.
        goal: EnemyGoal,
    },
    /// Reports that a living enemy was retargeted.
    EnemyGoalChanged {
        /// Identifier of the retargeted enemy.
        enemy: EnemyId,
        /// Goal now assigned to the enemy.
        goal: EnemyGoal,
    },
    /// Confirms that an enemy left the living roster.
    EnemyDestroyed {
        /// Identifier of the destroyed enemy.
        enemy: EnemyId,
    },
}

/// Converts a configured number of seconds into a [`Duration`].
///
/// Negative values and NaN yield zero; values too large to represent
/// saturate at [`Duration::MAX`].
#[must_use]
pub fn secs_to_duration(secs: f32) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_seconds_never_panic() {
        assert_eq!(secs_to_duration(0.25), Duration::from_millis(250));
        assert_eq!(secs_to_duration(-3.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f32::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(1e30), Duration::MAX);
        assert_eq!(secs_to_duration(f32::INFINITY), Duration::MAX);
    }

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, -1);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn direction_round_trips_through_axis_and_sign() {
        for direction in Direction::ALL {
            assert_eq!(
                Direction::from_axis(direction.axis(), direction.sign()),
                direction
            );
        }
    }

    #[test]
    fn dominant_projection_is_never_diagonal() {
        assert_eq!(
            MoveInput::dominant(Vec2::new(3.0, -2.0)).to_vec2(),
            Vec2::new(1.0, 0.0)
        );
        assert_eq!(
            MoveInput::dominant(Vec2::new(0.5, -2.0)).to_vec2(),
            Vec2::new(0.0, -1.0)
        );
        assert_eq!(
            MoveInput::dominant(Vec2::new(2.0, 2.0)).direction(),
            Some(Direction::East)
        );
        assert!(MoveInput::dominant(Vec2::ZERO).is_zero());
    }

    #[test]
    fn legend_labels_parse_case_insensitively() {
        assert_eq!(TerrainKind::from_label("WATER"), TerrainKind::Water);
        assert_eq!(TerrainKind::from_label("lava"), TerrainKind::Ground);
        assert_eq!(ObstacleKind::from_label("Brick"), ObstacleKind::Brick);
        assert_eq!(ObstacleKind::from_label(""), ObstacleKind::None);
    }

    #[test]
    fn obstacle_hp_follows_kind() {
        assert_eq!(ObstacleKind::None.initial_hp(), 0);
        assert_eq!(ObstacleKind::Brick.initial_hp(), 2);
        assert_eq!(ObstacleKind::Steel.initial_hp(), u8::MAX);
    }

    #[test]
    fn cost_profile_deserializes_with_defaults() {
        let profile: CostProfile =
            serde_json::from_str(r#"{ "brickCost": 4.0 }"#).expect("deserialize");
        assert_eq!(profile, CostProfile::new(1.0, 4.0, 1e9));
    }
}
