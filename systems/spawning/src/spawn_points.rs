//! Ordering of spawn cell candidates.

use battle_city_core::CellCoord;
use battle_city_world::MapGrid;
use glam::{Vec3, Vec3Swizzles};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const DEFAULT_MIN_DISTANCE: f32 = 600.0;

fn default_min_distance() -> f32 {
    DEFAULT_MIN_DISTANCE
}

/// Strategy deciding which spawn cells are tried first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpawnPointPolicy {
    /// Uniformly shuffled candidates.
    #[default]
    RandomAny,
    /// Farthest from the player first, skipping cells closer than
    /// `min_distance` world units unless no cell is that far.
    FarFromPlayer {
        /// Planar distance a preferred cell keeps from the player.
        #[serde(default = "default_min_distance")]
        min_distance: f32,
    },
}

impl SpawnPointPolicy {
    /// Indices into `cells` in the order they should be tried.
    pub(crate) fn order(
        &self,
        cells: &[CellCoord],
        grid: &MapGrid,
        player: Option<Vec3>,
        rng: &mut ChaCha8Rng,
    ) -> Vec<usize> {
        let mut shuffled: Vec<usize> = (0..cells.len()).collect();
        shuffled.shuffle(rng);

        let (Self::FarFromPlayer { min_distance }, Some(player)) = (*self, player) else {
            return shuffled;
        };

        let mut by_distance: Vec<(f32, usize)> = shuffled
            .into_iter()
            .map(|index| {
                let world = grid.grid_to_world(cells[index], 0.0);
                (world.xy().distance(player.xy()), index)
            })
            .collect();
        by_distance.sort_by(|a, b| b.0.total_cmp(&a.0));

        let far: Vec<usize> = by_distance
            .iter()
            .filter(|(distance, _)| *distance >= min_distance)
            .map(|(_, index)| *index)
            .collect();
        if far.is_empty() {
            by_distance.into_iter().map(|(_, index)| index).collect()
        } else {
            far
        }
    }
}

#[cfg(test)]
mod tests {
    use battle_city_world::{GridConfig, GridOptions};
    use rand::SeedableRng;

    use super::*;

    fn grid() -> MapGrid {
        let config = GridConfig {
            width: 10,
            height: 1,
            ..GridConfig::default()
        };
        MapGrid::build(&config, GridOptions::default()).expect("valid grid")
    }

    #[test]
    fn far_from_player_sorts_far_to_near_and_filters() {
        let grid = grid();
        let cells = [
            CellCoord::new(2, 0),
            CellCoord::new(9, 0),
            CellCoord::new(5, 0),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let player = Some(Vec3::new(0.0, 0.0, 50.0));

        let policy = SpawnPointPolicy::FarFromPlayer { min_distance: 400.0 };
        assert_eq!(policy.order(&cells, &grid, player, &mut rng), vec![1, 2]);

        let strict = SpawnPointPolicy::FarFromPlayer {
            min_distance: 5000.0,
        };
        assert_eq!(
            strict.order(&cells, &grid, player, &mut rng),
            vec![1, 2, 0],
            "falls back to every cell, far to near"
        );
    }

    #[test]
    fn random_any_is_a_permutation() {
        let grid = grid();
        let cells: Vec<_> = (0..10).map(|column| CellCoord::new(column, 0)).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut order = SpawnPointPolicy::RandomAny.order(&cells, &grid, None, &mut rng);
        order.sort_unstable();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }
}
