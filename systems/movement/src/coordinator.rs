use std::{cell::RefCell, rc::Rc, time::Duration};

use battle_city_core::{secs_to_duration, Axis, CellCoord, Direction, MoveInput};
use battle_city_system_pathfinding::Pathfinder;
use battle_city_world::{ListenerId, MapGrid};
use serde::{Deserialize, Serialize};

use crate::{AgentBody, GridSensor, GridQueries, MoveContext, MoveDecision, MovePolicy};

/// Tile size assumed while no grid is available.
const FALLBACK_TILE_SIZE: f32 = 200.0;

/// Per-agent tuning of the movement coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorTuning {
    /// Seconds an axis lock proposed by a policy holds at least.
    pub min_lock_time_secs: f32,
    /// Alignment epsilon as a fraction of the tile size.
    pub align_epsilon_factor: f32,
    /// Tie deadband as a fraction of the tile size.
    pub tie_deadband_factor: f32,
    /// Cells checked ahead of the agent, clamped to `1..=3`.
    pub look_ahead_tiles: u32,
    /// Stops for a shot when brick sits right in front.
    pub prefer_shoot_when_front_brick: bool,
    /// Logs every decision's debug trace.
    pub debug: bool,
}

impl Default for CoordinatorTuning {
    fn default() -> Self {
        Self {
            min_lock_time_secs: 0.30,
            align_epsilon_factor: 0.25,
            tie_deadband_factor: 0.10,
            look_ahead_tiles: 1,
            prefer_shoot_when_front_brick: true,
            debug: false,
        }
    }
}

impl CoordinatorTuning {
    fn look_ahead(&self) -> u32 {
        self.look_ahead_tiles.clamp(1, 3)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ActiveLock {
    axis: Axis,
    until: Duration,
}

/// Drives one agent's movement policy and keeps its axis lock.
#[derive(Debug)]
pub struct MovementCoordinator {
    policy: MovePolicy,
    tuning: CoordinatorTuning,
    last_facing: Direction,
    lock: Option<ActiveLock>,
    changed_cells: Rc<RefCell<Vec<CellCoord>>>,
    listener: Option<ListenerId>,
}

impl MovementCoordinator {
    /// Creates a coordinator facing east.
    #[must_use]
    pub fn new(policy: MovePolicy, tuning: CoordinatorTuning) -> Self {
        Self {
            policy,
            tuning,
            last_facing: Direction::East,
            lock: None,
            changed_cells: Rc::new(RefCell::new(Vec::new())),
            listener: None,
        }
    }

    /// Overrides the initial facing, typically with the body's spawn facing.
    #[must_use]
    pub fn with_facing(mut self, facing: Direction) -> Self {
        self.last_facing = facing;
        self
    }

    /// Policy driven by the coordinator.
    #[must_use]
    pub const fn policy(&self) -> &MovePolicy {
        &self.policy
    }

    /// Mutable access to the policy, used to push spawn-time defaults.
    pub fn policy_mut(&mut self) -> &mut MovePolicy {
        &mut self.policy
    }

    /// Last direction the coordinator moved the agent in.
    #[must_use]
    pub const fn last_facing(&self) -> Direction {
        self.last_facing
    }

    /// Axis currently locked, if the lock has not yet expired at `now`.
    #[must_use]
    pub fn locked_axis(&self, now: Duration) -> Option<Axis> {
        self.lock
            .filter(|lock| now < lock.until)
            .map(|lock| lock.axis)
    }

    /// Subscribes to the grid's cell-change notifications so the policy can
    /// drop stale routes.
    pub fn attach(&mut self, grid: &mut MapGrid) {
        if self.listener.is_some() {
            return;
        }
        let inbox = Rc::clone(&self.changed_cells);
        self.listener = Some(grid.subscribe(move |cell| inbox.borrow_mut().push(cell)));
    }

    /// Cancels the subscription made by [`MovementCoordinator::attach`].
    pub fn detach(&mut self, grid: &mut MapGrid) {
        if let Some(listener) = self.listener.take() {
            let _ = grid.unsubscribe(listener);
        }
    }

    /// Runs the policy for one tick and applies the result to the body.
    ///
    /// An unexpired lock keeps the agent moving along the locked axis as long
    /// as that direction is open; a blocked lock is dropped and the policy's
    /// decision stands.
    pub fn tick<B>(
        &mut self,
        body: &mut B,
        grid: Option<&MapGrid>,
        pathfinder: Option<&Pathfinder>,
        now: Duration,
    ) -> MoveDecision
    where
        B: AgentBody + ?Sized,
    {
        let changed: Vec<CellCoord> = self.changed_cells.borrow_mut().drain(..).collect();
        for cell in changed {
            self.policy.on_cell_changed(cell);
        }

        let tile = grid.map_or(FALLBACK_TILE_SIZE, MapGrid::tile_size);
        let align_epsilon = self.tuning.align_epsilon_factor * tile;
        let look_ahead = self.tuning.look_ahead();
        let position = body.position();
        let sensor = GridSensor::new(grid, position, self.last_facing, align_epsilon);
        let ctx = MoveContext {
            position,
            facing: self.last_facing,
            target: body.ai_target(),
            tile_size: tile,
            align_epsilon,
            tie_deadband: self.tuning.tie_deadband_factor * tile,
            look_ahead_tiles: look_ahead,
            fire_ready: body.is_fire_ready(),
            prefer_shoot_front_brick: self.tuning.prefer_shoot_when_front_brick,
            min_lock_time: secs_to_duration(self.tuning.min_lock_time_secs),
            now,
            goal: body.goal(),
            queries: &sensor,
            grid,
            pathfinder,
        };

        let mut decision = self.policy.compute_move(&ctx);

        if let Some(lock) = self.lock.filter(|lock| now < lock.until) {
            let sign = if self.last_facing.axis() == lock.axis {
                self.last_facing.sign()
            } else {
                1
            };
            let direction = Direction::from_axis(lock.axis, sign);
            if sensor.is_ahead_blocked(direction, tile * look_ahead as f32) {
                log::trace!("axis lock {:?} dropped: {direction:?} is blocked", lock.axis);
                self.lock = None;
            } else if !decision.suppress_move {
                decision.input = MoveInput::toward(direction);
                decision.lock_axis = Some(lock.axis);
                decision.lock_time = lock.until - now;
            }
        }

        self.apply(body, &decision, now);
        if self.tuning.debug && !decision.debug.is_empty() {
            log::debug!("[{}] {}", self.policy.name(), decision.debug);
        }
        decision
    }

    fn apply<B>(&mut self, body: &mut B, decision: &MoveDecision, now: Duration)
    where
        B: AgentBody + ?Sized,
    {
        if let Some(axis) = decision.lock_axis {
            if !decision.lock_time.is_zero() {
                self.lock = Some(ActiveLock {
                    axis,
                    until: now.saturating_add(decision.lock_time),
                });
            }
        }

        if let Some(direction) = decision.input.direction() {
            self.last_facing = direction;
        }

        body.apply_move_input(decision.input);

        if decision.request_fire && body.is_fire_ready() {
            body.fire();
        }
    }
}
