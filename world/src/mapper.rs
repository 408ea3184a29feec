//! Conversions between world space, grid cells and the sub-tile snap grid.

use battle_city_core::CellCoord;
use glam::{Affine3A, Vec3};

/// Subdivisions per tile used when the caller does not pick one.
pub const DEFAULT_SUBDIVISIONS_PER_TILE: u32 = 20;

/// Bidirectional mapping between world positions and grid cells.
///
/// Cell `(x, y)` is centred on the map-local point `(x * tile, y * tile)`;
/// the affine transform places the whole map in the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    transform: Affine3A,
    inverse: Affine3A,
    tile_size: f32,
    subdivisions_per_tile: u32,
    columns: u32,
    rows: u32,
}

impl CoordinateMapper {
    /// Creates a mapper for a grid of the provided dimensions.
    ///
    /// `subdivisions_per_tile` is clamped to at least one.
    #[must_use]
    pub fn new(
        transform: Affine3A,
        tile_size: f32,
        subdivisions_per_tile: u32,
        columns: u32,
        rows: u32,
    ) -> Self {
        Self {
            transform,
            inverse: transform.inverse(),
            tile_size,
            subdivisions_per_tile: subdivisions_per_tile.max(1),
            columns,
            rows,
        }
    }

    /// World units covered by a single cell.
    #[must_use]
    pub const fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Resolution of the snap grid inside one tile.
    #[must_use]
    pub const fn subdivisions_per_tile(&self) -> u32 {
        self.subdivisions_per_tile
    }

    /// Spacing of the snap grid in map-local units.
    #[must_use]
    pub fn sub_step(&self) -> f32 {
        self.tile_size / self.subdivisions_per_tile as f32
    }

    /// Affine transform placing the map in the world.
    #[must_use]
    pub const fn transform(&self) -> &Affine3A {
        &self.transform
    }

    /// Reports whether the cell lies inside the grid bounds.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        u32::try_from(cell.column()).map_or(false, |column| column < self.columns)
            && u32::try_from(cell.row()).map_or(false, |row| row < self.rows)
    }

    /// Resolves the cell nearest to a world position, or `None` when that
    /// cell lies outside the grid.
    #[must_use]
    pub fn world_to_grid(&self, world: Vec3) -> Option<CellCoord> {
        if self.tile_size <= f32::EPSILON {
            return None;
        }

        let local = self.inverse.transform_point3(world);
        let column = (local.x / self.tile_size).round();
        let row = (local.y / self.tile_size).round();
        if !column.is_finite() || !row.is_finite() {
            return None;
        }

        let cell = CellCoord::new(column as i32, row as i32);
        self.contains(cell).then_some(cell)
    }

    /// Expresses a world position in map-local axes, where cell (x, y) is
    /// centred at (x * tile, y * tile).
    #[must_use]
    pub fn world_to_local(&self, world: Vec3) -> Vec3 {
        self.inverse.transform_point3(world)
    }

    /// World position of a cell centre lifted by `z_offset` in map-local Z.
    #[must_use]
    pub fn grid_to_world(&self, cell: CellCoord, z_offset: f32) -> Vec3 {
        let local = Vec3::new(
            cell.column() as f32 * self.tile_size,
            cell.row() as f32 * self.tile_size,
            z_offset,
        );
        self.transform.transform_point3(local)
    }

    /// Rounds a world position onto the sub-tile grid.
    ///
    /// X and Y are always snapped; Z is snapped unless `keep_z` is set.
    #[must_use]
    pub fn snap_to_subgrid(&self, world: Vec3, keep_z: bool) -> Vec3 {
        let step = self.sub_step();
        if step <= f32::EPSILON {
            return world;
        }

        let mut local = self.inverse.transform_point3(world);
        local.x = (local.x / step).round() * step;
        local.y = (local.y / step).round() * step;
        if !keep_z {
            local.z = (local.z / step).round() * step;
        }
        self.transform.transform_point3(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(transform: Affine3A) -> CoordinateMapper {
        CoordinateMapper::new(transform, 100.0, DEFAULT_SUBDIVISIONS_PER_TILE, 8, 6)
    }

    #[test]
    fn grid_round_trip_recovers_cell() {
        let shifted = mapper(Affine3A::from_translation(Vec3::new(256.0, -512.0, 32.0)));
        for row in 0..6 {
            for column in 0..8 {
                let cell = CellCoord::new(column, row);
                let world = shifted.grid_to_world(cell, 37.0);
                assert_eq!(shifted.world_to_grid(world), Some(cell));
            }
        }
    }

    #[test]
    fn world_to_grid_rounds_to_nearest_centre() {
        let identity = mapper(Affine3A::IDENTITY);
        assert_eq!(
            identity.world_to_grid(Vec3::new(149.0, 51.0, 0.0)),
            Some(CellCoord::new(1, 1))
        );
        assert_eq!(identity.world_to_grid(Vec3::new(-60.0, 0.0, 0.0)), None);
        assert_eq!(identity.world_to_grid(Vec3::new(0.0, 560.0, 0.0)), None);
    }

    #[test]
    fn snapping_is_idempotent() {
        let identity = mapper(Affine3A::IDENTITY);
        let samples = [
            Vec3::new(12.3, 47.9, 50.0),
            Vec3::new(-3.1, 999.99, 12.4),
            Vec3::new(250.0, 2.49, -7.7),
        ];
        for sample in samples {
            let once = identity.snap_to_subgrid(sample, false);
            assert_eq!(identity.snap_to_subgrid(once, false), once);
        }
    }

    #[test]
    fn snapping_can_preserve_height() {
        let identity = mapper(Affine3A::IDENTITY);
        let snapped = identity.snap_to_subgrid(Vec3::new(12.0, 7.0, 50.3), true);
        assert_eq!(snapped, Vec3::new(10.0, 5.0, 50.3));
    }

    #[test]
    fn zero_subdivisions_clamp_to_one() {
        let coarse = CoordinateMapper::new(Affine3A::IDENTITY, 100.0, 0, 4, 4);
        assert_eq!(coarse.subdivisions_per_tile(), 1);
        assert_eq!(coarse.sub_step(), 100.0);
    }
}
