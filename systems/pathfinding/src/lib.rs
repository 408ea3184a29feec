#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Grid pathfinding for enemy tanks.
//!
//! [`Pathfinder`] answers [`PathRequest`] values with an A* search over the
//! four-connected grid. Searches can be cut short by a node-expansion
//! horizon and can fall back to the closest approach when the goal cannot be
//! reached. [`PathFollower`] walks an agent along a computed route.

mod follower;

use std::{cmp::Reverse, collections::BinaryHeap};

use battle_city_core::{CellCoord, PathRequest, PathResult};
use battle_city_world::MapGrid;
use ordered_float::OrderedFloat;

pub use follower::PathFollower;

/// Stateless A* search service over a [`MapGrid`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Pathfinder;

impl Pathfinder {
    /// Creates a new pathfinder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a route for the request.
    ///
    /// The edge weight of every step is the entry cost of the destination
    /// cell; cells priced at or above the impassable cost are never entered.
    /// When the goal is not reached, either because the open set ran dry or
    /// because the expansion horizon was hit, the closed cell with the lowest
    /// f-score becomes the endpoint, provided partial routes are allowed.
    #[must_use]
    pub fn compute_path(&self, grid: &MapGrid, request: &PathRequest) -> PathResult {
        if request.start == request.goal {
            return PathResult {
                cells: vec![request.start],
                total_cost: 0.0,
                reached_goal: true,
                valid: true,
            };
        }

        let Some(mut search) = Search::new(grid, request) else {
            log::trace!("path start {:?} lies outside the grid", request.start);
            return PathResult::invalid();
        };

        let endpoint = match search.run() {
            SearchEnd::Reached(index) => index,
            SearchEnd::Horizon | SearchEnd::Exhausted if !request.allow_partial => {
                return PathResult::invalid();
            }
            end => {
                let fallback = search.closest_closed();
                log::trace!(
                    "path {:?} -> {:?} stopped ({end:?}); falling back to {:?}",
                    request.start,
                    request.goal,
                    search.cell_of(fallback)
                );
                fallback
            }
        };

        search.reconstruct(endpoint)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SearchEnd {
    Reached(usize),
    Horizon,
    Exhausted,
}

type OpenEntry = Reverse<(OrderedFloat<f32>, u64, usize)>;

struct Search<'a> {
    grid: &'a MapGrid,
    request: &'a PathRequest,
    width: usize,
    start: usize,
    g_score: Vec<f32>,
    f_score: Vec<f32>,
    came_from: Vec<Option<usize>>,
    closed: Vec<bool>,
    closed_order: Vec<usize>,
    open: BinaryHeap<OpenEntry>,
    sequence: u64,
}

impl<'a> Search<'a> {
    fn new(grid: &'a MapGrid, request: &'a PathRequest) -> Option<Self> {
        let width = usize::try_from(grid.columns()).ok()?;
        let height = usize::try_from(grid.rows()).ok()?;
        let capacity = width.checked_mul(height)?;
        let start = index_of(grid, width, request.start)?;

        Some(Self {
            grid,
            request,
            width,
            start,
            g_score: vec![f32::INFINITY; capacity],
            f_score: vec![f32::INFINITY; capacity],
            came_from: vec![None; capacity],
            closed: vec![false; capacity],
            closed_order: Vec::new(),
            open: BinaryHeap::new(),
            sequence: 0,
        })
    }

    fn run(&mut self) -> SearchEnd {
        let goal_blocked = !self
            .request
            .cost
            .is_passable(self.grid.tile_cost(self.request.goal, &self.request.cost));

        self.g_score[self.start] = 0.0;
        self.push(self.start, self.heuristic(self.request.start));

        let mut expansions = 0_u32;
        while let Some(Reverse((_, _, current))) = self.open.pop() {
            if self.closed[current] {
                continue;
            }

            let cell = self.cell_of(current);
            if cell == self.request.goal && !goal_blocked {
                return SearchEnd::Reached(current);
            }

            self.closed[current] = true;
            self.closed_order.push(current);
            self.expand(current, cell);

            if self.request.max_steps > 0 {
                expansions += 1;
                if expansions >= self.request.max_steps {
                    return SearchEnd::Horizon;
                }
            }
        }

        SearchEnd::Exhausted
    }

    fn expand(&mut self, current: usize, cell: CellCoord) {
        let grid = self.grid;
        let base = self.g_score[current];
        for neighbor in grid.neighbors4(cell) {
            let Some(index) = index_of(grid, self.width, neighbor) else {
                continue;
            };
            if self.closed[index] {
                continue;
            }

            let step = grid.tile_cost(neighbor, &self.request.cost);
            if !self.request.cost.is_passable(step) {
                continue;
            }

            let tentative = base + step;
            if tentative < self.g_score[index] {
                self.came_from[index] = Some(current);
                self.g_score[index] = tentative;
                self.push(index, tentative + self.heuristic(neighbor));
            }
        }
    }

    fn push(&mut self, index: usize, f: f32) {
        self.f_score[index] = f;
        self.open.push(Reverse((OrderedFloat(f), self.sequence, index)));
        self.sequence += 1;
    }

    /// Closed cell with the lowest f-score. Ties go to the cell nearest the
    /// goal, then to the earliest closed.
    fn closest_closed(&self) -> usize {
        self.closed_order
            .iter()
            .copied()
            .filter(|index| *index == self.start || self.came_from[*index].is_some())
            .min_by_key(|index| {
                (
                    OrderedFloat(self.f_score[*index]),
                    OrderedFloat(self.heuristic(self.cell_of(*index))),
                )
            })
            .unwrap_or(self.start)
    }

    fn reconstruct(&self, endpoint: usize) -> PathResult {
        let mut cells = vec![self.cell_of(endpoint)];
        let mut total_cost = 0.0;
        let mut current = endpoint;
        while current != self.start {
            let Some(previous) = self.came_from[current] else {
                break;
            };
            total_cost += self.grid.tile_cost(self.cell_of(current), &self.request.cost);
            current = previous;
            cells.push(self.cell_of(current));
        }
        cells.reverse();

        if cells.len() <= 1 && endpoint != self.start {
            return PathResult::invalid();
        }

        PathResult {
            reached_goal: self.cell_of(endpoint) == self.request.goal,
            cells,
            total_cost,
            valid: true,
        }
    }

    fn heuristic(&self, cell: CellCoord) -> f32 {
        cell.manhattan_distance(self.request.goal) as f32
    }

    fn cell_of(&self, index: usize) -> CellCoord {
        CellCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }
}

fn index_of(grid: &MapGrid, width: usize, cell: CellCoord) -> Option<usize> {
    if !grid.contains(cell) {
        return None;
    }
    let column = usize::try_from(cell.column()).ok()?;
    let row = usize::try_from(cell.row()).ok()?;
    Some(row * width + column)
}

#[cfg(test)]
mod tests {
    use battle_city_core::CostProfile;
    use battle_city_world::{GridConfig, GridOptions};

    use super::*;

    fn open_grid(width: i32, height: i32) -> MapGrid {
        let config = GridConfig {
            width,
            height,
            ..GridConfig::default()
        };
        MapGrid::build(&config, GridOptions::default()).expect("valid grid")
    }

    #[test]
    fn straight_route_costs_one_per_step() {
        let grid = open_grid(6, 1);
        let request = PathRequest::new(
            CellCoord::new(0, 0),
            CellCoord::new(5, 0),
            CostProfile::default(),
        );
        let result = Pathfinder::new().compute_path(&grid, &request);

        assert!(result.valid);
        assert!(result.reached_goal);
        assert_eq!(result.cells.len(), 6);
        assert_eq!(result.total_cost, 5.0);
    }

    #[test]
    fn start_outside_grid_is_invalid() {
        let grid = open_grid(3, 3);
        let request = PathRequest::new(
            CellCoord::new(-1, 0),
            CellCoord::new(2, 2),
            CostProfile::default(),
        );
        assert!(!Pathfinder::new().compute_path(&grid, &request).valid);
    }

    #[test]
    fn off_grid_goal_yields_closest_approach() {
        let grid = open_grid(4, 1);
        let request = PathRequest::new(
            CellCoord::new(0, 0),
            CellCoord::new(9, 0),
            CostProfile::default(),
        );
        let result = Pathfinder::new().compute_path(&grid, &request);

        assert!(result.valid);
        assert!(!result.reached_goal);
        assert_eq!(result.endpoint(), Some(CellCoord::new(3, 0)));
    }
}
