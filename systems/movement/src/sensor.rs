//! Grid sensors that movement policies query through the move context.

use battle_city_core::{CellCoord, Direction, ObstacleKind, TerrainKind};
use battle_city_world::MapGrid;
use glam::Vec3;

/// Wall found straight ahead of the agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrontObstacle {
    /// Nothing blocks the checked cells.
    None,
    /// Brick wall, with the world position of its cell.
    Brick(Vec3),
    /// Steel wall, with the world position of its cell.
    Steel(Vec3),
}

/// Straight-line visibility between the agent and its target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineOfSight {
    /// The two positions do not share a row or a column.
    NotCardinal,
    /// No wall lies between the two positions.
    Clear,
    /// The first wall on the line is brick.
    Brick(Vec3),
    /// The first wall on the line is steel.
    Steel(Vec3),
}

impl LineOfSight {
    /// Reports whether a shot along the line could reach or open the way to
    /// the target.
    #[must_use]
    pub fn is_shootable(&self) -> bool {
        matches!(self, Self::Clear | Self::Brick(_))
    }
}

/// Queries a policy may run against the grid on behalf of its agent.
pub trait GridQueries {
    /// Reports whether a blocking cell lies within `distance` world units
    /// from the agent in the provided direction. At least one cell is checked.
    fn is_ahead_blocked(&self, direction: Direction, distance: f32) -> bool;

    /// First wall within `distance` world units along the agent's facing.
    fn front_obstacle(&self, distance: f32) -> FrontObstacle;

    /// Walks the row or column joining two positions and reports the first
    /// wall on it.
    fn cardinal_line_to_target(&self, from: Vec3, to: Vec3) -> LineOfSight;
}

/// [`GridQueries`] bound to a grid and one agent's pose.
///
/// Without a grid the sensor reports nothing ahead and a clear line.
#[derive(Clone, Copy, Debug)]
pub struct GridSensor<'a> {
    grid: Option<&'a MapGrid>,
    position: Vec3,
    facing: Direction,
    align_epsilon: f32,
}

impl<'a> GridSensor<'a> {
    /// Creates a sensor for an agent at `position` facing `facing`.
    #[must_use]
    pub fn new(
        grid: Option<&'a MapGrid>,
        position: Vec3,
        facing: Direction,
        align_epsilon: f32,
    ) -> Self {
        Self {
            grid,
            position,
            facing,
            align_epsilon,
        }
    }

    fn start_cell(&self, grid: &MapGrid) -> Option<CellCoord> {
        grid.world_to_grid(grid.snap_to_subgrid(self.position, true))
    }

    fn steps(grid: &MapGrid, distance: f32) -> i32 {
        ((distance / grid.tile_size()).floor() as i32).max(1)
    }
}

impl GridQueries for GridSensor<'_> {
    fn is_ahead_blocked(&self, direction: Direction, distance: f32) -> bool {
        let Some(grid) = self.grid else {
            return false;
        };
        let Some(start) = self.start_cell(grid) else {
            return false;
        };

        (1..=Self::steps(grid, distance)).any(|step| {
            let cell = start.stepped(direction, step);
            grid.obstacle_at(cell).blocks_body() || grid.terrain_at(cell) == TerrainKind::Water
        })
    }

    fn front_obstacle(&self, distance: f32) -> FrontObstacle {
        let Some(grid) = self.grid else {
            return FrontObstacle::None;
        };
        let Some(start) = self.start_cell(grid) else {
            return FrontObstacle::None;
        };

        let lift = grid.tile_size() * 0.5;
        for step in 1..=Self::steps(grid, distance) {
            let cell = start.stepped(self.facing, step);
            match grid.obstacle_at(cell) {
                ObstacleKind::Brick => return FrontObstacle::Brick(grid.grid_to_world(cell, lift)),
                ObstacleKind::Steel => return FrontObstacle::Steel(grid.grid_to_world(cell, lift)),
                ObstacleKind::None => {}
            }
        }
        FrontObstacle::None
    }

    fn cardinal_line_to_target(&self, from: Vec3, to: Vec3) -> LineOfSight {
        let Some(grid) = self.grid else {
            return LineOfSight::Clear;
        };

        let along_row = (from.y - to.y).abs() <= self.align_epsilon;
        let along_column = (from.x - to.x).abs() <= self.align_epsilon;
        if !along_row && !along_column {
            return LineOfSight::NotCardinal;
        }
        let (Some(start), Some(end)) = (grid.world_to_grid(from), grid.world_to_grid(to)) else {
            return LineOfSight::NotCardinal;
        };

        let (direction, distance) = if along_row {
            let direction = if end.column() >= start.column() {
                Direction::East
            } else {
                Direction::West
            };
            (direction, start.column().abs_diff(end.column()))
        } else {
            let direction = if end.row() >= start.row() {
                Direction::South
            } else {
                Direction::North
            };
            (direction, start.row().abs_diff(end.row()))
        };

        let lift = grid.tile_size() * 0.5;
        for step in 1..=distance as i32 {
            let cell = start.stepped(direction, step);
            match grid.obstacle_at(cell) {
                ObstacleKind::Brick => return LineOfSight::Brick(grid.grid_to_world(cell, lift)),
                ObstacleKind::Steel => return LineOfSight::Steel(grid.grid_to_world(cell, lift)),
                ObstacleKind::None => {}
            }
        }
        LineOfSight::Clear
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use battle_city_world::{GridConfig, GridOptions, LegendEntry};

    use super::*;

    fn grid(rows: &[&str]) -> MapGrid {
        let mut legend = BTreeMap::new();
        let _ = legend.insert(
            "#".to_owned(),
            LegendEntry {
                obstacle: "Brick".to_owned(),
                ..LegendEntry::default()
            },
        );
        let _ = legend.insert(
            "S".to_owned(),
            LegendEntry {
                obstacle: "Steel".to_owned(),
                ..LegendEntry::default()
            },
        );
        let _ = legend.insert(
            "~".to_owned(),
            LegendEntry {
                terrain: "Water".to_owned(),
                ..LegendEntry::default()
            },
        );
        let config = GridConfig {
            width: rows[0].len() as i32,
            height: rows.len() as i32,
            tile_size: 100.0,
            rows: rows.iter().map(|row| (*row).to_owned()).collect(),
            legend,
            waves: Vec::new(),
        };
        MapGrid::build(&config, GridOptions::default()).expect("valid grid")
    }

    #[test]
    fn ahead_sensor_covers_look_ahead_cells() {
        let grid = grid(&["..#.", "~..."]);
        let sensor = GridSensor::new(Some(&grid), Vec3::ZERO, Direction::East, 25.0);

        assert!(!sensor.is_ahead_blocked(Direction::East, 100.0));
        assert!(sensor.is_ahead_blocked(Direction::East, 200.0));
        assert!(sensor.is_ahead_blocked(Direction::South, 100.0), "water blocks");
        assert!(!sensor.is_ahead_blocked(Direction::North, 100.0), "off grid is open");
    }

    #[test]
    fn front_sensor_reports_first_wall_along_facing() {
        let grid = grid(&[".S#."]);
        let sensor = GridSensor::new(Some(&grid), Vec3::new(4.0, -3.0, 0.0), Direction::East, 25.0);

        assert_eq!(
            sensor.front_obstacle(300.0),
            FrontObstacle::Steel(Vec3::new(100.0, 0.0, 50.0))
        );
        let facing_west = GridSensor::new(Some(&grid), Vec3::new(300.0, 0.0, 0.0), Direction::West, 25.0);
        assert_eq!(
            facing_west.front_obstacle(51.0),
            FrontObstacle::Brick(Vec3::new(200.0, 0.0, 50.0))
        );
    }

    #[test]
    fn line_of_sight_classifies_first_wall() {
        let grid = grid(&[".#.S.", "....."]);
        let sensor = GridSensor::new(Some(&grid), Vec3::ZERO, Direction::East, 25.0);

        assert_eq!(
            sensor.cardinal_line_to_target(Vec3::ZERO, Vec3::new(400.0, 10.0, 0.0)),
            LineOfSight::Brick(Vec3::new(100.0, 0.0, 50.0))
        );
        assert_eq!(
            sensor.cardinal_line_to_target(Vec3::new(200.0, 0.0, 0.0), Vec3::new(400.0, 0.0, 0.0)),
            LineOfSight::Steel(Vec3::new(300.0, 0.0, 50.0))
        );
        assert_eq!(
            sensor.cardinal_line_to_target(Vec3::new(0.0, 100.0, 0.0), Vec3::new(400.0, 100.0, 0.0)),
            LineOfSight::Clear
        );
        assert_eq!(
            sensor.cardinal_line_to_target(Vec3::ZERO, Vec3::new(300.0, 100.0, 0.0)),
            LineOfSight::NotCardinal
        );
    }

    #[test]
    fn missing_grid_reports_nothing() {
        let sensor = GridSensor::new(None, Vec3::ZERO, Direction::East, 25.0);
        assert!(!sensor.is_ahead_blocked(Direction::East, 100.0));
        assert_eq!(sensor.front_obstacle(100.0), FrontObstacle::None);
        assert!(sensor
            .cardinal_line_to_target(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0))
            .is_shootable());
    }
}
