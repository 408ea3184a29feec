//! Movement policies and their serializable descriptions.

use std::time::Duration;

use battle_city_core::{
    secs_to_duration, Axis, CellCoord, CostProfile, Direction, EnemyGoal, MoveInput, PathRequest,
};
use battle_city_system_pathfinding::PathFollower;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{FrontObstacle, MoveContext, MoveDecision};

const UNUSABLE_SCORE: i32 = -1_000_000;

/// Strategy that turns a [`MoveContext`] into a [`MoveDecision`].
#[derive(Clone, Debug)]
pub enum MovePolicy {
    /// Chases the target along the less aligned axis.
    AxisLock(AxisLockPolicy),
    /// Follows a planned grid route.
    PathFollow(PathFollowPolicy),
    /// Stops and shoots at brick right in front.
    ShootWhenBlocking(ShootWhenBlockingPolicy),
    /// Roams toward a distant player in randomized strides.
    WanderFar(WanderFarPolicy),
    /// Runs sub-policies in order and merges their decisions.
    Composite(Vec<MovePolicy>),
}

impl MovePolicy {
    /// Computes the decision for this tick.
    pub fn compute_move(&mut self, ctx: &MoveContext<'_>) -> MoveDecision {
        match self {
            Self::AxisLock(policy) => policy.compute_move(ctx),
            Self::PathFollow(policy) => policy.compute_move(ctx),
            Self::ShootWhenBlocking(policy) => policy.compute_move(ctx),
            Self::WanderFar(policy) => policy.compute_move(ctx),
            Self::Composite(policies) => {
                let mut merged = MoveDecision::default();
                for policy in policies {
                    merged.merge(policy.compute_move(ctx));
                }
                merged
            }
        }
    }

    /// Informs route-following policies that a grid cell changed.
    pub fn on_cell_changed(&mut self, cell: CellCoord) {
        match self {
            Self::PathFollow(policy) => policy.on_cell_changed(cell),
            Self::Composite(policies) => {
                for policy in policies {
                    policy.on_cell_changed(cell);
                }
            }
            Self::AxisLock(_) | Self::ShootWhenBlocking(_) | Self::WanderFar(_) => {}
        }
    }

    /// Pushes route defaults into every path-following policy, including
    /// nested ones.
    pub fn apply_path_defaults(&mut self, defaults: &PathDefaults) {
        match self {
            Self::PathFollow(policy) => policy.apply_defaults(defaults),
            Self::Composite(policies) => {
                for policy in policies {
                    policy.apply_path_defaults(defaults);
                }
            }
            Self::AxisLock(_) | Self::ShootWhenBlocking(_) | Self::WanderFar(_) => {}
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AxisLock(_) => "AxisLock",
            Self::PathFollow(_) => "PathFollow",
            Self::ShootWhenBlocking(_) => "ShootWhenBlocking",
            Self::WanderFar(_) => "WanderFar",
            Self::Composite(_) => "Composite",
        }
    }
}

impl Default for MovePolicy {
    fn default() -> Self {
        Self::AxisLock(AxisLockPolicy)
    }
}

/// Serializable description of a policy tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovePolicySpec {
    /// See [`AxisLockPolicy`].
    #[default]
    AxisLock,
    /// See [`PathFollowPolicy`].
    PathFollow(PathFollowTuning),
    /// See [`ShootWhenBlockingPolicy`].
    ShootWhenBlocking,
    /// See [`WanderFarPolicy`].
    WanderFar(WanderTuning),
    /// See [`MovePolicy::Composite`].
    Composite {
        /// Sub-policies in evaluation order.
        policies: Vec<MovePolicySpec>,
    },
}

impl MovePolicySpec {
    /// Builds a live policy. Randomized policies derive their streams from
    /// `seed`, so equal seeds yield equal behaviour.
    #[must_use]
    pub fn build(&self, seed: u64) -> MovePolicy {
        match self {
            Self::AxisLock => MovePolicy::AxisLock(AxisLockPolicy),
            Self::PathFollow(tuning) => MovePolicy::PathFollow(PathFollowPolicy::new(*tuning)),
            Self::ShootWhenBlocking => {
                MovePolicy::ShootWhenBlocking(ShootWhenBlockingPolicy::default())
            }
            Self::WanderFar(tuning) => MovePolicy::WanderFar(WanderFarPolicy::new(*tuning, seed)),
            Self::Composite { policies } => MovePolicy::Composite(
                policies
                    .iter()
                    .enumerate()
                    .map(|(index, spec)| {
                        spec.build(seed.wrapping_add((index as u64).wrapping_mul(0x9e37_79b9)))
                    })
                    .collect(),
            ),
        }
    }
}

/// Greedy chase toward the target with stop-and-shoot for front bricks.
#[derive(Clone, Copy, Debug, Default)]
pub struct AxisLockPolicy;

impl AxisLockPolicy {
    fn compute_move(&self, ctx: &MoveContext<'_>) -> MoveDecision {
        let tile = ctx.tile_size;
        let reach = tile * ctx.look_ahead_tiles.max(1) as f32;

        if ctx.prefer_shoot_front_brick {
            if let FrontObstacle::Brick(_) = ctx.queries.front_obstacle(reach) {
                return MoveDecision {
                    input: MoveInput::IDLE,
                    lock_axis: Some(ctx.facing.axis()),
                    lock_time: ctx.min_lock_time,
                    request_fire: ctx.fire_ready,
                    suppress_move: false,
                    debug: "Stop&Shoot Front Brick".to_owned(),
                };
            }
        }

        let to = ctx.target - ctx.position;
        let aligned_x = to.x.abs() <= ctx.align_epsilon;
        let aligned_y = to.y.abs() <= ctx.align_epsilon;
        let try_axis = |axis: Axis, sign: i32, debug: &str| -> Option<MoveDecision> {
            if sign == 0 {
                return None;
            }
            let direction = Direction::from_axis(axis, sign);
            if ctx.queries.is_ahead_blocked(direction, reach) {
                return None;
            }
            Some(MoveDecision {
                input: MoveInput::toward(direction),
                lock_axis: Some(axis),
                lock_time: ctx.min_lock_time,
                debug: debug.to_owned(),
                ..MoveDecision::default()
            })
        };

        let chosen = if !aligned_x {
            try_axis(Axis::X, sign_of(to.x), "Go X").or_else(|| {
                if aligned_y {
                    None
                } else {
                    try_axis(Axis::Y, sign_of(to.y), "Fallback Y")
                }
            })
        } else if !aligned_y {
            try_axis(Axis::Y, sign_of(to.y), "Go Y")
                .or_else(|| try_axis(Axis::X, sign_of(to.x), "Fallback X"))
        } else if (to.x.abs() - to.y.abs()).abs() <= ctx.tie_deadband {
            match ctx.facing.axis() {
                Axis::X => try_axis(Axis::X, ctx.facing.sign(), "Keep X"),
                Axis::Y => try_axis(Axis::Y, ctx.facing.sign(), "Keep Y"),
            }
        } else if to.x.abs() > to.y.abs() {
            try_axis(Axis::X, sign_of(to.x), "Major X")
        } else {
            try_axis(Axis::Y, sign_of(to.y), "Major Y")
        };

        chosen.unwrap_or_else(|| MoveDecision {
            request_fire: ctx.fire_ready
                && ctx
                    .queries
                    .cardinal_line_to_target(ctx.position, ctx.target)
                    .is_shootable(),
            debug: "Blocked/Wait".to_owned(),
            ..MoveDecision::default()
        })
    }
}

fn sign_of(value: f32) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Route defaults the spawner pushes into every new agent's path follower.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathDefaults {
    /// Costs used when planning.
    pub cost: CostProfile,
    /// Seconds between forced replans.
    pub replan_interval_secs: f32,
    /// Expansion horizon used when chasing the player.
    pub horizon_steps: u32,
}

impl Default for PathDefaults {
    fn default() -> Self {
        let tuning = PathFollowTuning::default();
        Self {
            cost: tuning.cost,
            replan_interval_secs: tuning.replan_interval_secs,
            horizon_steps: tuning.horizon_steps,
        }
    }
}

/// Tuning of [`PathFollowPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathFollowTuning {
    /// Seconds between forced replans.
    pub replan_interval_secs: f32,
    /// Expansion horizon used when chasing the player; the base is always
    /// planned without a horizon.
    pub horizon_steps: u32,
    /// Goal displacement, in cells, that triggers a replan.
    pub replan_distance_cells: u32,
    /// Costs used when planning.
    pub cost: CostProfile,
}

impl Default for PathFollowTuning {
    fn default() -> Self {
        Self {
            replan_interval_secs: 0.35,
            horizon_steps: 6,
            replan_distance_cells: 2,
            cost: CostProfile::default(),
        }
    }
}

/// Follows routes planned by the pathfinder.
///
/// Routes are replanned when none is loaded, when the goal cell moved far
/// enough, when the replan interval elapsed, or when a cell on the route
/// changed. Never requests fire.
#[derive(Clone, Debug)]
pub struct PathFollowPolicy {
    tuning: PathFollowTuning,
    follower: PathFollower,
    last_goal: Option<CellCoord>,
    last_replan: Option<Duration>,
}

impl PathFollowPolicy {
    /// Creates a path-following policy with the provided tuning.
    #[must_use]
    pub fn new(tuning: PathFollowTuning) -> Self {
        Self {
            tuning,
            follower: PathFollower::new(),
            last_goal: None,
            last_replan: None,
        }
    }

    /// Current tuning.
    #[must_use]
    pub const fn tuning(&self) -> &PathFollowTuning {
        &self.tuning
    }

    /// Route cursor driven by the policy.
    #[must_use]
    pub const fn follower(&self) -> &PathFollower {
        &self.follower
    }

    fn apply_defaults(&mut self, defaults: &PathDefaults) {
        self.tuning.cost = defaults.cost;
        self.tuning.replan_interval_secs = defaults.replan_interval_secs;
        self.tuning.horizon_steps = defaults.horizon_steps;
    }

    fn on_cell_changed(&mut self, cell: CellCoord) {
        if self.follower.contains(cell) {
            log::trace!("route invalidated by change at {cell:?}");
            self.follower.clear();
        }
    }

    fn compute_move(&mut self, ctx: &MoveContext<'_>) -> MoveDecision {
        let mut decision = MoveDecision::annotated("PathFollow");
        let (Some(grid), Some(pathfinder)) = (ctx.grid, ctx.pathfinder) else {
            return decision;
        };
        let (Some(start), Some(goal)) = (grid.world_to_grid(ctx.position), grid.world_to_grid(ctx.target))
        else {
            return decision;
        };

        let goal_moved = self.last_goal.map_or(true, |last| {
            last.manhattan_distance(goal) >= self.tuning.replan_distance_cells
        });
        let interval = secs_to_duration(self.tuning.replan_interval_secs);
        let interval_elapsed = self
            .last_replan
            .map_or(true, |last| ctx.now.saturating_sub(last) >= interval);

        if !self.follower.has_path() || goal_moved || interval_elapsed {
            let horizon = match ctx.goal {
                EnemyGoal::HuntPlayer => self.tuning.horizon_steps,
                EnemyGoal::HuntBase => 0,
            };
            let request = PathRequest::new(start, goal, self.tuning.cost)
                .with_horizon(horizon)
                .with_partial(true);
            let result = pathfinder.compute_path(grid, &request);
            if result.valid {
                self.follower.set_path(result);
                self.last_goal = Some(goal);
                self.last_replan = Some(ctx.now);
            }
        }

        let _ = self
            .follower
            .advance_if_reached(ctx.position, grid.mapper(), ctx.align_epsilon);
        decision.input = self.follower.desired_direction(ctx.position, grid.mapper());
        decision
    }
}

/// Shoots brick right in front of the agent and holds still while doing so.
#[derive(Clone, Copy, Debug)]
pub struct ShootWhenBlockingPolicy {
    front_check_tiles: f32,
}

impl Default for ShootWhenBlockingPolicy {
    fn default() -> Self {
        Self {
            front_check_tiles: 0.51,
        }
    }
}

impl ShootWhenBlockingPolicy {
    fn compute_move(&self, ctx: &MoveContext<'_>) -> MoveDecision {
        let mut decision = MoveDecision::annotated("+ShootCheck");
        if !ctx.fire_ready {
            return decision;
        }
        if let FrontObstacle::Brick(_) = ctx
            .queries
            .front_obstacle(ctx.tile_size * self.front_check_tiles)
        {
            decision.request_fire = true;
            decision.suppress_move = true;
        }
        decision
    }
}

/// Tuning of [`WanderFarPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WanderTuning {
    /// Manhattan distance to the target, in cells, beyond which the policy
    /// engages.
    pub activate_beyond_cells: u32,
    /// Shortest stride, in ticks.
    pub min_stride: u32,
    /// Longest stride, in ticks.
    pub max_stride: u32,
    /// Whether directions that close in on the target score higher.
    pub bias_toward_target: bool,
    /// Weight of the closing-in bonus, in `[0, 1]`.
    pub bias_weight: f32,
    /// Costs deciding which neighbouring cells can be entered.
    pub cost: CostProfile,
    /// Seconds before the direction is reconsidered.
    pub rechoose_cooldown_secs: f32,
    /// Seconds each wander step locks its axis for.
    pub lock_time_secs: f32,
}

impl Default for WanderTuning {
    fn default() -> Self {
        Self {
            activate_beyond_cells: 10,
            min_stride: 2,
            max_stride: 5,
            bias_toward_target: true,
            bias_weight: 0.6,
            cost: CostProfile::new(1.0, 1e5, 1e9),
            rechoose_cooldown_secs: 0.5,
            lock_time_secs: 0.25,
        }
    }
}

/// Roams toward a far-away player in randomized strides.
///
/// Engages only while the agent hunts the player and the target is more
/// than the activation distance away; closer in it leaves the decision to
/// other policies.
#[derive(Clone, Debug)]
pub struct WanderFarPolicy {
    tuning: WanderTuning,
    rng: ChaCha8Rng,
    heading: Option<Direction>,
    steps_left: u32,
    next_rechoose: Duration,
}

impl WanderFarPolicy {
    /// Creates a wandering policy with its own random stream.
    #[must_use]
    pub fn new(tuning: WanderTuning, seed: u64) -> Self {
        Self {
            tuning,
            rng: ChaCha8Rng::seed_from_u64(seed),
            heading: None,
            steps_left: 0,
            next_rechoose: Duration::ZERO,
        }
    }

    /// Direction of the current stride.
    #[must_use]
    pub const fn heading(&self) -> Option<Direction> {
        self.heading
    }

    fn compute_move(&mut self, ctx: &MoveContext<'_>) -> MoveDecision {
        let mut decision = MoveDecision::default();
        if ctx.goal != EnemyGoal::HuntPlayer {
            return decision;
        }
        let Some(grid) = ctx.grid else {
            return decision;
        };
        let (Some(from), Some(goal)) = (grid.world_to_grid(ctx.position), grid.world_to_grid(ctx.target))
        else {
            return decision;
        };
        if from.manhattan_distance(goal) <= self.tuning.activate_beyond_cells {
            return decision;
        }

        let cost = self.tuning.cost;
        let passable = move |cell: CellCoord| cost.is_passable(grid.tile_cost(cell, &cost));
        let ahead_open = self
            .heading
            .map_or(false, |heading| passable(from.neighbor(heading)));
        if self.steps_left == 0 || ctx.now >= self.next_rechoose || !ahead_open {
            self.rechoose(ctx.now, from, goal, passable);
        }

        if let Some(heading) = self.heading.filter(|_| self.steps_left > 0) {
            decision.input = MoveInput::toward(heading);
            decision.lock_axis = Some(heading.axis());
            decision.lock_time = secs_to_duration(self.tuning.lock_time_secs);
            decision.debug = "+WanderFar".to_owned();
            self.steps_left -= 1;
        }
        decision
    }

    fn rechoose<F>(&mut self, now: Duration, from: CellCoord, goal: CellCoord, passable: F)
    where
        F: Fn(CellCoord) -> bool,
    {
        let mut best_score = UNUSABLE_SCORE;
        let mut best = None;
        for direction in Direction::ALL {
            let next = from.neighbor(direction);
            let score = if passable(next) {
                let mut score: i32 = self.rng.gen_range(0..=10);
                if self.tuning.bias_toward_target {
                    let closer = from.manhattan_distance(goal) as f32
                        - next.manhattan_distance(goal) as f32;
                    score += (closer * 100.0 * self.tuning.bias_weight) as i32;
                }
                score
            } else {
                UNUSABLE_SCORE
            };
            if score > best_score {
                best_score = score;
                best = Some(direction);
            }
        }

        self.heading = best;
        self.steps_left = if best.is_some() {
            let low = self.tuning.min_stride.min(self.tuning.max_stride);
            let high = self.tuning.min_stride.max(self.tuning.max_stride);
            self.rng.gen_range(low..=high)
        } else {
            0
        };
        self.next_rechoose =
            now.saturating_add(secs_to_duration(self.tuning.rechoose_cooldown_secs));
    }
}
