//! Headless arena driving the core systems tick by tick.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    time::Duration,
};

use battle_city_core::{
    secs_to_duration, Axis, CellCoord, Direction, EnemyGoal, EnemyId, Event, MoveInput, ObstacleKind,
};
use battle_city_system_movement::{AgentBody, GridSensor, GridQueries, LineOfSight, MovementCoordinator};
use battle_city_system_pathfinding::Pathfinder;
use battle_city_system_spawning::{SpawnFrame, Spawner};
use battle_city_world::{BaseInfo, MapGrid};
use glam::Vec3;

use crate::tuning::{ArenaTuning, SimulationTuning};

/// Share of a tile between a tank's center and its leading edge.
const HALF_BODY: f32 = 0.45;
const SEED_STRIDE: u64 = 0x9e37_79b9_7f4a_7c15;

/// Totals reported at the end of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SimulationStats {
    pub(crate) ticks: u64,
    pub(crate) spawned: u32,
    pub(crate) destroyed: u32,
    pub(crate) alive: u32,
    pub(crate) shots: u32,
    pub(crate) bricks_cleared: u32,
    pub(crate) base_hits: u32,
    pub(crate) player_hits: u32,
}

impl fmt::Display for SimulationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} spawned={} destroyed={} alive={} shots={} bricks_cleared={} base_hits={} player_hits={}",
            self.ticks,
            self.spawned,
            self.destroyed,
            self.alive,
            self.shots,
            self.bricks_cleared,
            self.base_hits,
            self.player_hits
        )
    }
}

#[derive(Debug)]
struct TankBody {
    position: Vec3,
    target: Vec3,
    goal: EnemyGoal,
    now: Duration,
    ready_at: Duration,
    cooldown: Duration,
    input: MoveInput,
    fired: bool,
}

impl AgentBody for TankBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn ai_target(&self) -> Vec3 {
        self.target
    }

    fn goal(&self) -> EnemyGoal {
        self.goal
    }

    fn is_fire_ready(&self) -> bool {
        self.now >= self.ready_at
    }

    fn apply_move_input(&mut self, input: MoveInput) {
        self.input = input;
    }

    fn fire(&mut self) {
        self.fired = true;
        self.ready_at = self.now.saturating_add(self.cooldown);
    }
}

#[derive(Debug)]
struct Tank {
    body: TankBody,
    coordinator: MovementCoordinator,
}

/// Owns the grid and every enemy, and advances them in a fixed order.
#[derive(Debug)]
pub(crate) struct Simulation {
    grid: MapGrid,
    pathfinder: Pathfinder,
    spawner: Spawner,
    tuning: SimulationTuning,
    seed: u64,
    tanks: BTreeMap<EnemyId, Tank>,
    player: Option<Vec3>,
    now: Duration,
    next_player_shot: Duration,
    stats: SimulationStats,
}

impl Simulation {
    pub(crate) fn new(grid: MapGrid, tuning: SimulationTuning, seed: u64) -> Self {
        let goals = tuning.goals.build(seed);
        let spawner = Spawner::new(&grid, tuning.spawner, goals, seed.wrapping_add(1));
        let player = grid.player_world_start();
        let first_player_shot = secs_to_duration(tuning.arena.player_fire_interval_secs);
        Self {
            grid,
            pathfinder: Pathfinder::new(),
            spawner,
            tuning,
            seed,
            tanks: BTreeMap::new(),
            player,
            now: Duration::ZERO,
            next_player_shot: first_player_shot,
            stats: SimulationStats::default(),
        }
    }

    /// Runs `ticks` fixed steps of `dt` and returns the totals.
    pub(crate) fn run(&mut self, ticks: u64, dt: Duration) -> SimulationStats {
        for _ in 0..ticks {
            self.tick(dt);
        }
        log::info!("{}", self.spawner.population_summary());
        self.stats
    }

    fn tick(&mut self, dt: Duration) {
        self.now += dt;
        self.stats.ticks += 1;

        let mut events = Vec::new();
        {
            let occupied = self.occupied_cells();
            let is_cell_free = |cell: CellCoord| !occupied.contains(&cell);
            let frame = SpawnFrame {
                now: self.now,
                dt,
                grid: &self.grid,
                player: self.player,
                is_cell_free: &is_cell_free,
            };
            self.spawner.tick(&frame, &mut events);
        }
        self.apply_events(events);

        self.drive_tanks(dt);
        self.player_turret();
        self.stats.alive = self.spawner.alive_count();
    }

    fn occupied_cells(&self) -> BTreeSet<CellCoord> {
        self.tanks
            .values()
            .map(|tank| tank.body.position)
            .chain(self.player)
            .filter_map(|position| self.grid.world_to_grid(position))
            .collect()
    }

    fn apply_events(&mut self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::EnemySpawned {
                    enemy,
                    cell,
                    position,
                    kind,
                    goal,
                    ..
                } => {
                    log::debug!("{kind} tank {} spawned at {cell:?} hunting {goal:?}", enemy.get());
                    self.add_tank(enemy, position, goal);
                    self.stats.spawned += 1;
                }
                Event::EnemyGoalChanged { enemy, goal } => {
                    if let Some(tank) = self.tanks.get_mut(&enemy) {
                        tank.body.goal = goal;
                    }
                }
                Event::EnemyDestroyed { enemy } => {
                    if let Some(mut tank) = self.tanks.remove(&enemy) {
                        tank.coordinator.detach(&mut self.grid);
                        self.stats.destroyed += 1;
                    }
                }
            }
        }
    }

    fn add_tank(&mut self, enemy: EnemyId, position: Vec3, goal: EnemyGoal) {
        let seed = self.seed ^ u64::from(enemy.get()).wrapping_mul(SEED_STRIDE);
        let mut policy = self.tuning.policy.build(seed);
        self.spawner.configure_agent_policy(&mut policy);

        let mut coordinator = MovementCoordinator::new(policy, self.tuning.coordinator);
        coordinator.attach(&mut self.grid);
        let body = TankBody {
            position,
            target: position,
            goal,
            now: self.now,
            ready_at: self.now,
            cooldown: secs_to_duration(self.tuning.arena.fire_cooldown_secs),
            input: MoveInput::IDLE,
            fired: false,
        };
        let _ = self.tanks.insert(enemy, Tank { body, coordinator });
    }

    fn drive_tanks(&mut self, dt: Duration) {
        let base = self.grid.base().map(BaseInfo::world);
        let arena = self.tuning.arena;
        let mut shots = Vec::new();

        for tank in self.tanks.values_mut() {
            tank.body.now = self.now;
            tank.body.target = target_for(tank.body.goal, self.player, base)
                .unwrap_or(tank.body.position);

            let _ = tank.coordinator.tick(
                &mut tank.body,
                Some(&self.grid),
                Some(&self.pathfinder),
                self.now,
            );
            move_body(&self.grid, &mut tank.body, &arena, dt);

            if std::mem::take(&mut tank.body.fired) {
                shots.push((tank.body.position, tank.coordinator.last_facing()));
            }
        }

        for (origin, facing) in shots {
            self.resolve_shot(origin, facing);
        }
    }

    fn resolve_shot(&mut self, origin: Vec3, facing: Direction) {
        self.stats.shots += 1;
        let Some(start) = self.grid.world_to_grid(origin) else {
            return;
        };
        let base = self.grid.base().map(BaseInfo::cell);
        let player = self.player.and_then(|player| self.grid.world_to_grid(player));

        for step in 1..=self.tuning.arena.shot_range_tiles as i32 {
            let cell = start.stepped(facing, step);
            if !self.grid.contains(cell) {
                return;
            }
            if base == Some(cell) {
                self.stats.base_hits += 1;
                return;
            }
            if player == Some(cell) {
                self.stats.player_hits += 1;
                return;
            }
            if self.grid.obstacle_at(cell) != ObstacleKind::None {
                let outcome = self.grid.try_hit_obstacle(self.grid.grid_to_world(cell, 0.0));
                if outcome.was_brick && self.grid.obstacle_at(cell) == ObstacleKind::None {
                    self.stats.bricks_cleared += 1;
                }
                return;
            }
        }
    }

    /// The player is a fixed turret that destroys the nearest enemy in clear
    /// cardinal sight.
    fn player_turret(&mut self) {
        let interval = secs_to_duration(self.tuning.arena.player_fire_interval_secs);
        let Some(player) = self.player else {
            return;
        };
        if interval.is_zero() || self.now < self.next_player_shot {
            return;
        }

        let align = self.grid.tile_size() * self.tuning.coordinator.align_epsilon_factor;
        let sensor = GridSensor::new(Some(&self.grid), player, Direction::East, align);
        let victim = self
            .tanks
            .iter()
            .filter(|(_, tank)| {
                sensor.cardinal_line_to_target(player, tank.body.position) == LineOfSight::Clear
            })
            .min_by(|(_, a), (_, b)| {
                a.body
                    .position
                    .distance_squared(player)
                    .total_cmp(&b.body.position.distance_squared(player))
            })
            .map(|(enemy, _)| *enemy);
        let Some(victim) = victim else {
            return;
        };

        self.next_player_shot = self.now.saturating_add(interval);
        let mut events = Vec::new();
        if self.spawner.notify_enemy_destroyed(victim, &mut events) {
            log::debug!("player destroyed tank {}", victim.get());
        }
        self.apply_events(events);
    }
}

fn target_for(goal: EnemyGoal, player: Option<Vec3>, base: Option<Vec3>) -> Option<Vec3> {
    match goal {
        EnemyGoal::HuntPlayer => player.or(base),
        EnemyGoal::HuntBase => base.or(player),
    }
}

/// Moves the body along its input, keeping it aligned to the subgrid on the
/// cross axis. The move is dropped when the leading edge would enter a cell
/// the body cannot occupy.
fn move_body(grid: &MapGrid, body: &mut TankBody, arena: &ArenaTuning, dt: Duration) {
    let Some(direction) = body.input.direction() else {
        return;
    };

    let tile = grid.tile_size();
    let heading = grid
        .mapper()
        .transform()
        .transform_vector3(direction.unit_vector().extend(0.0))
        .normalize_or_zero();
    let step = heading * arena.tank_speed_tiles * tile * dt.as_secs_f32();
    let aligned = grid.snap_to_subgrid(body.position, true);
    let mut next = body.position + step;
    match direction.axis() {
        Axis::X => next.y = aligned.y,
        Axis::Y => next.x = aligned.x,
    }

    let leading_edge = next + heading * tile * HALF_BODY;
    if grid.is_passable_for_body(next) && grid.is_passable_for_body(leading_edge) {
        body.position = next;
    }
}
