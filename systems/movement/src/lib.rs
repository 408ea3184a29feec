#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-tick movement decisions for enemy tanks.
//!
//! A [`MovementCoordinator`] owns one [`MovePolicy`] per agent. Every tick it
//! assembles a [`MoveContext`], asks the policy for a [`MoveDecision`],
//! applies axis-lock persistence and forwards the result to the agent's
//! [`AgentBody`].

mod coordinator;
mod policy;
mod sensor;

use std::time::Duration;

use battle_city_core::{Axis, Direction, EnemyGoal, MoveInput};
use battle_city_system_pathfinding::Pathfinder;
use battle_city_world::MapGrid;
use glam::Vec3;

pub use coordinator::{CoordinatorTuning, MovementCoordinator};
pub use policy::{
    AxisLockPolicy, MovePolicy, MovePolicySpec, PathDefaults, PathFollowPolicy,
    PathFollowTuning, ShootWhenBlockingPolicy, WanderFarPolicy, WanderTuning,
};
pub use sensor::{FrontObstacle, GridSensor, GridQueries, LineOfSight};

/// Agent side of the movement pipeline.
///
/// Implemented by whatever owns the tank's transform and weapon.
pub trait AgentBody {
    /// Current world position.
    fn position(&self) -> Vec3;

    /// World position the agent is trying to reach.
    fn ai_target(&self) -> Vec3;

    /// Goal currently assigned to the agent.
    fn goal(&self) -> EnemyGoal;

    /// Reports whether the weapon can fire right now.
    fn is_fire_ready(&self) -> bool;

    /// Applies the raw movement input for this tick.
    fn apply_move_input(&mut self, input: MoveInput);

    /// Fires a shot along the current facing.
    fn fire(&mut self);
}

/// Read-only snapshot handed to a policy each tick.
#[derive(Clone, Copy)]
pub struct MoveContext<'a> {
    /// World position of the agent.
    pub position: Vec3,
    /// Last cardinal direction the agent moved in.
    pub facing: Direction,
    /// World position the agent is trying to reach.
    pub target: Vec3,
    /// World units covered by a single cell.
    pub tile_size: f32,
    /// Per-axis distance under which the agent counts as aligned.
    pub align_epsilon: f32,
    /// Difference between axis distances treated as a tie.
    pub tie_deadband: f32,
    /// Number of cells checked ahead of the agent.
    pub look_ahead_tiles: u32,
    /// Whether the weapon can fire this tick.
    pub fire_ready: bool,
    /// Whether a brick right in front should stop the agent for a shot.
    pub prefer_shoot_front_brick: bool,
    /// Lock duration attached to axis-lock moves.
    pub min_lock_time: Duration,
    /// Simulation clock.
    pub now: Duration,
    /// Goal assigned to the agent.
    pub goal: EnemyGoal,
    /// Grid sensors bound to the agent.
    pub queries: &'a dyn GridQueries,
    /// Grid for policies that plan routes.
    pub grid: Option<&'a MapGrid>,
    /// Pathfinder for policies that plan routes.
    pub pathfinder: Option<&'a Pathfinder>,
}

/// Output of a policy for a single tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MoveDecision {
    /// Cardinal movement input.
    pub input: MoveInput,
    /// Axis to keep moving along across ticks.
    pub lock_axis: Option<Axis>,
    /// How long the lock should hold.
    pub lock_time: Duration,
    /// Asks the body to fire along its facing.
    pub request_fire: bool,
    /// Forces the agent to stand still this tick.
    pub suppress_move: bool,
    /// Human-readable trace of the choice.
    pub debug: String,
}

impl MoveDecision {
    fn annotated(debug: &str) -> Self {
        Self {
            debug: debug.to_owned(),
            ..Self::default()
        }
    }

    /// Folds a later policy's decision into this one.
    ///
    /// Non-idle input and locks of the later decision win, fire requests are
    /// combined and debug text is chained. Once a suppressing decision has
    /// been merged the input stays idle, whatever comes after it.
    pub fn merge(&mut self, later: MoveDecision) {
        if !later.input.is_zero() && !self.suppress_move {
            self.input = later.input;
        }
        if later.lock_axis.is_some() {
            self.lock_axis = later.lock_axis;
            self.lock_time = later.lock_time;
        }
        if later.suppress_move {
            self.input = MoveInput::IDLE;
            self.suppress_move = true;
        }
        self.request_fire |= later.request_fire;
        if !later.debug.is_empty() {
            if !self.debug.is_empty() {
                self.debug.push_str(" -> ");
            }
            self.debug.push_str(&later.debug);
        }
    }
}
