use battle_city_core::{CellCoord, MoveInput, PathResult};
use battle_city_world::CoordinateMapper;
use glam::{Vec2, Vec3};

/// Per-agent cursor over a computed route.
///
/// The cursor skips the first cell of a fresh route because the agent is
/// presumed to stand on it already.
#[derive(Clone, Debug, Default)]
pub struct PathFollower {
    path: PathResult,
    index: usize,
}

impl PathFollower {
    /// Creates a follower without a route.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the route and rewinds the cursor.
    pub fn set_path(&mut self, path: PathResult) {
        self.index = usize::from(path.cells.len() > 1);
        self.path = path;
    }

    /// Drops the current route.
    pub fn clear(&mut self) {
        self.path = PathResult::invalid();
        self.index = 0;
    }

    /// Reports whether a followable route is loaded.
    #[must_use]
    pub fn has_path(&self) -> bool {
        self.path.valid && self.path.cells.len() > 1
    }

    /// Route currently loaded.
    #[must_use]
    pub fn path(&self) -> &PathResult {
        &self.path
    }

    /// Waypoint the agent is heading for.
    #[must_use]
    pub fn current_target_cell(&self) -> Option<CellCoord> {
        if !self.has_path() {
            return None;
        }
        self.path.cells.get(self.index).copied()
    }

    /// Reports whether the route passes through the cell.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.has_path() && self.path.cells.contains(&cell)
    }

    /// Moves to the next waypoint once the agent is within `tolerance` world
    /// units of the current one, measured in the map plane.
    ///
    /// Returns `true` when the cursor advanced. The cursor never moves past
    /// the last cell.
    pub fn advance_if_reached(
        &mut self,
        position: Vec3,
        mapper: &CoordinateMapper,
        tolerance: f32,
    ) -> bool {
        let Some(target) = self.current_target_cell() else {
            return false;
        };
        let offset = local_offset(mapper, position, target);
        if offset.length() > tolerance {
            return false;
        }
        if self.index + 1 < self.path.cells.len() {
            self.index += 1;
            return true;
        }
        false
    }

    /// Cardinal direction toward the current waypoint, projected onto the
    /// dominant axis. Idle when no route is loaded.
    #[must_use]
    pub fn desired_direction(&self, position: Vec3, mapper: &CoordinateMapper) -> MoveInput {
        let Some(target) = self.current_target_cell() else {
            return MoveInput::IDLE;
        };
        MoveInput::dominant(local_offset(mapper, position, target))
    }

    /// Reports whether the cursor sits on the final cell of the route.
    #[must_use]
    pub fn is_at_last_cell(&self) -> bool {
        self.has_path() && self.index + 1 >= self.path.cells.len()
    }
}

/// Offset from `position` to the centre of `target` in map-local X/Y, so
/// rotated or tilted maps still resolve to grid directions.
fn local_offset(mapper: &CoordinateMapper, position: Vec3, target: CellCoord) -> Vec2 {
    let local = mapper.world_to_local(position).truncate();
    let tile = mapper.tile_size();
    Vec2::new(target.column() as f32 * tile, target.row() as f32 * tile) - local
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use battle_city_core::Direction;
    use glam::Affine3A;

    use super::*;

    fn mapper() -> CoordinateMapper {
        CoordinateMapper::new(Affine3A::IDENTITY, 100.0, 20, 8, 8)
    }

    fn route(cells: &[(i32, i32)]) -> PathResult {
        PathResult {
            cells: cells
                .iter()
                .map(|(column, row)| CellCoord::new(*column, *row))
                .collect(),
            total_cost: cells.len().saturating_sub(1) as f32,
            reached_goal: true,
            valid: true,
        }
    }

    #[test]
    fn fresh_route_targets_second_cell() {
        let mut follower = PathFollower::new();
        follower.set_path(route(&[(0, 0), (1, 0), (1, 1)]));

        assert!(follower.has_path());
        assert_eq!(follower.current_target_cell(), Some(CellCoord::new(1, 0)));
        assert!(!follower.is_at_last_cell());
    }

    #[test]
    fn single_cell_route_is_not_followable() {
        let mut follower = PathFollower::new();
        follower.set_path(route(&[(3, 3)]));

        assert!(!follower.has_path());
        assert_eq!(follower.current_target_cell(), None);
        assert_eq!(
            follower.desired_direction(Vec3::ZERO, &mapper()),
            MoveInput::IDLE
        );
    }

    #[test]
    fn advances_within_tolerance_and_stops_at_end() {
        let mapper = mapper();
        let mut follower = PathFollower::new();
        follower.set_path(route(&[(0, 0), (1, 0), (1, 1)]));

        assert!(!follower.advance_if_reached(Vec3::new(60.0, 0.0, 0.0), &mapper, 25.0));
        assert!(follower.advance_if_reached(Vec3::new(90.0, 5.0, 40.0), &mapper, 25.0));
        assert_eq!(follower.current_target_cell(), Some(CellCoord::new(1, 1)));
        assert!(follower.is_at_last_cell());
        assert!(!follower.advance_if_reached(Vec3::new(100.0, 100.0, 0.0), &mapper, 25.0));
        assert_eq!(follower.current_target_cell(), Some(CellCoord::new(1, 1)));
    }

    #[test]
    fn desired_direction_is_cardinal() {
        let mapper = mapper();
        let mut follower = PathFollower::new();
        follower.set_path(route(&[(0, 0), (1, 0), (1, 1)]));

        let input = follower.desired_direction(Vec3::new(20.0, 40.0, 0.0), &mapper);
        assert_eq!(input.direction(), Some(Direction::East));
        let north = follower.desired_direction(Vec3::new(100.0, 130.0, 0.0), &mapper);
        assert_eq!(north.direction(), Some(Direction::North));
    }

    #[test]
    fn rotated_map_steers_in_grid_axes() {
        let mapper =
            CoordinateMapper::new(Affine3A::from_rotation_z(FRAC_PI_2), 100.0, 20, 8, 8);
        let mut follower = PathFollower::new();
        follower.set_path(route(&[(0, 0), (1, 0), (1, 1)]));

        let input = follower.desired_direction(Vec3::ZERO, &mapper);
        assert_eq!(input.direction(), Some(Direction::East));
        let arrived = mapper.grid_to_world(CellCoord::new(1, 0), 0.0);
        assert!(follower.advance_if_reached(arrived, &mapper, 25.0));
        let south = follower.desired_direction(arrived, &mapper);
        assert_eq!(south.direction(), Some(Direction::South));
    }
}
