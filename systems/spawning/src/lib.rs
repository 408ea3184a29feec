#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wave-driven enemy spawning.
//!
//! The [`Spawner`] turns the map's wave list into [`Event::EnemySpawned`]
//! events while respecting the alive cap, keeps the living roster and routes
//! goal decisions through a [`GoalPolicy`].

mod spawn_points;

use std::{collections::BTreeMap, collections::BTreeSet, fmt, time::Duration};

use battle_city_core::{secs_to_duration, CellCoord, EnemyGoal, EnemyId, Event};
use battle_city_system_goals::{EnemySpawnContext, GoalPolicy, GoalThresholds, GoalUpdate};
use battle_city_system_movement::{MovePolicy, PathDefaults};
use battle_city_world::MapGrid;
use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub use spawn_points::SpawnPointPolicy;

const SUMMARY_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration of the spawner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    /// Cap on simultaneously alive enemies, at least one.
    pub max_alive: u32,
    /// Alive count at or above which the enemies hold the advantage.
    pub advantage_high_threshold: u32,
    /// Alive count at or below which the player holds the advantage.
    pub advantage_low_threshold: u32,
    /// Seconds before a wave that found no free slot is retried.
    pub wave_retry_delay_secs: f32,
    /// Seconds before a spawn that found no free cell is retried.
    pub blocked_retry_delay_secs: f32,
    /// Order in which spawn cells are tried.
    pub spawn_points: SpawnPointPolicy,
    /// Route defaults pushed into every new agent's path followers.
    pub path_defaults: PathDefaults,
    /// Logs a population summary twice per simulated second.
    pub debug: bool,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            max_alive: 4,
            advantage_high_threshold: 4,
            advantage_low_threshold: 2,
            wave_retry_delay_secs: 0.5,
            blocked_retry_delay_secs: 0.25,
            spawn_points: SpawnPointPolicy::RandomAny,
            path_defaults: PathDefaults::default(),
            debug: false,
        }
    }
}

impl SpawnerConfig {
    fn max_alive(&self) -> u32 {
        self.max_alive.max(1)
    }

    fn thresholds(&self) -> GoalThresholds {
        GoalThresholds {
            high: self.advantage_high_threshold,
            low: self.advantage_low_threshold,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum SpawnJob {
    Wave { kind: String, symbol: String, count: u32 },
    Single { kind: String, symbol: String },
}

#[derive(Clone, Debug)]
struct ScheduledJob {
    due: Duration,
    sequence: u64,
    job: SpawnJob,
}

/// Counts describing the enemy population at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PopulationSummary {
    /// Enemies currently alive.
    pub alive: u32,
    /// Enemies spawned so far.
    pub spawned: u32,
    /// Enemies planned by the map's waves.
    pub planned: u32,
    /// Living enemies hunting the base.
    pub hunt_base: u32,
    /// Living enemies hunting the player.
    pub hunt_player: u32,
    /// Name of the goal policy.
    pub policy: &'static str,
}

impl fmt::Display for PopulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[AI] Alive={}  Spawned={}/{}  HB={}  HP={}  Policy={}",
            self.alive, self.spawned, self.planned, self.hunt_base, self.hunt_player, self.policy
        )
    }
}

/// Per-tick inputs the spawner reads from the rest of the simulation.
#[derive(Clone, Copy)]
pub struct SpawnFrame<'a> {
    /// Simulation clock.
    pub now: Duration,
    /// Time elapsed since the previous tick.
    pub dt: Duration,
    /// Grid the spawn cells live on.
    pub grid: &'a MapGrid,
    /// World position of the player, if one is alive.
    pub player: Option<Vec3>,
    /// Reports whether no tank currently occupies a cell.
    pub is_cell_free: &'a dyn Fn(CellCoord) -> bool,
}

/// Schedules waves, places enemies and keeps the living roster.
#[derive(Debug)]
pub struct Spawner {
    config: SpawnerConfig,
    goals: GoalPolicy,
    rng: ChaCha8Rng,
    spawn_cells: Vec<CellCoord>,
    jobs: Vec<ScheduledJob>,
    next_sequence: u64,
    claimed: BTreeSet<CellCoord>,
    living: BTreeMap<EnemyId, EnemyGoal>,
    next_enemy: u32,
    planned: u32,
    spawned: u32,
    summary_elapsed: Duration,
}

impl Spawner {
    /// Creates a spawner for the waves declared by `grid`.
    ///
    /// Every wave is scheduled at its declared time with a count of at
    /// least one. The goal policy is initialized with the configured
    /// advantage thresholds.
    #[must_use]
    pub fn new(grid: &MapGrid, config: SpawnerConfig, mut goals: GoalPolicy, seed: u64) -> Self {
        goals.initialize(config.thresholds());

        let mut spawner = Self {
            config,
            goals,
            rng: ChaCha8Rng::seed_from_u64(seed),
            spawn_cells: grid.all_enemy_spawn_cells(),
            jobs: Vec::new(),
            next_sequence: 0,
            claimed: BTreeSet::new(),
            living: BTreeMap::new(),
            next_enemy: 0,
            planned: 0,
            spawned: 0,
            summary_elapsed: Duration::ZERO,
        };

        if grid.waves().is_empty() {
            log::warn!("map declares no waves");
        }
        for wave in grid.waves() {
            let count = wave.count.max(1).unsigned_abs();
            spawner.planned += count;
            spawner.schedule(
                secs_to_duration(wave.time),
                SpawnJob::Wave {
                    kind: wave.kind.clone(),
                    symbol: wave.spawn.clone(),
                    count,
                },
            );
        }
        log::info!(
            "scheduled {} waves ({} enemies) over {} spawn cells",
            grid.waves().len(),
            spawner.planned,
            spawner.spawn_cells.len()
        );
        spawner
    }

    /// Enemies currently alive.
    #[must_use]
    pub fn alive_count(&self) -> u32 {
        self.living.len() as u32
    }

    /// Enemies spawned so far.
    #[must_use]
    pub const fn spawned_count(&self) -> u32 {
        self.spawned
    }

    /// Enemies planned by the map's waves.
    #[must_use]
    pub const fn planned_count(&self) -> u32 {
        self.planned
    }

    /// Reports whether no spawn remains scheduled.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Goal currently assigned to a living enemy.
    #[must_use]
    pub fn goal_of(&self, enemy: EnemyId) -> Option<EnemyGoal> {
        self.living.get(&enemy).copied()
    }

    /// Living enemies with their goals, ordered by identifier.
    pub fn living(&self) -> impl Iterator<Item = (EnemyId, EnemyGoal)> + '_ {
        self.living.iter().map(|(enemy, goal)| (*enemy, *goal))
    }

    /// Goal policy driven by the spawner.
    #[must_use]
    pub const fn goal_policy(&self) -> &GoalPolicy {
        &self.goals
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    /// Pushes the configured route defaults into a new agent's policy tree.
    pub fn configure_agent_policy(&self, policy: &mut MovePolicy) {
        policy.apply_path_defaults(&self.config.path_defaults);
    }

    /// Counts of the current population.
    #[must_use]
    pub fn population_summary(&self) -> PopulationSummary {
        let hunt_base = self
            .living
            .values()
            .filter(|goal| **goal == EnemyGoal::HuntBase)
            .count() as u32;
        PopulationSummary {
            alive: self.alive_count(),
            spawned: self.spawned,
            planned: self.planned,
            hunt_base,
            hunt_player: self.alive_count() - hunt_base,
            policy: self.goals.name(),
        }
    }

    /// Advances the spawner by one tick.
    ///
    /// Clears the cells claimed during the previous tick, runs every job
    /// that fell due, lets the goal policy re-evaluate and appends the
    /// resulting events to `out`.
    pub fn tick(&mut self, frame: &SpawnFrame<'_>, out: &mut Vec<Event>) {
        self.claimed.clear();

        // Retries scheduled during this tick wait for the next one.
        let horizon = self.next_sequence;
        while let Some(job) = self.take_due(frame.now, horizon) {
            match job {
                SpawnJob::Wave {
                    kind,
                    symbol,
                    count,
                } => self.run_wave(frame, kind, symbol, count, out),
                SpawnJob::Single { kind, symbol } => self.spawn_one(frame, kind, symbol, out),
            }
        }

        let living: Vec<EnemyId> = self.living.keys().copied().collect();
        if let Some(update) = self.goals.tick_goal(frame.dt, self.alive_count(), &living) {
            self.apply_goal_update(update, out);
        }

        if self.config.debug {
            self.summary_elapsed += frame.dt;
            if self.summary_elapsed >= SUMMARY_INTERVAL {
                self.summary_elapsed = Duration::ZERO;
                log::debug!("{}", self.population_summary());
            }
        }
    }

    /// Removes a destroyed enemy from the roster.
    ///
    /// Returns `false` for identifiers that are not alive.
    pub fn notify_enemy_destroyed(&mut self, enemy: EnemyId, out: &mut Vec<Event>) -> bool {
        if self.living.remove(&enemy).is_none() {
            return false;
        }
        out.push(Event::EnemyDestroyed { enemy });
        if let Some(update) = self.goals.on_alive_count_changed(self.alive_count()) {
            self.apply_goal_update(update, out);
        }
        true
    }

    fn schedule(&mut self, due: Duration, job: SpawnJob) {
        self.jobs.push(ScheduledJob {
            due,
            sequence: self.next_sequence,
            job,
        });
        self.next_sequence += 1;
    }

    fn take_due(&mut self, now: Duration, horizon: u64) -> Option<SpawnJob> {
        let (index, _) = self
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.due <= now && job.sequence < horizon)
            .min_by_key(|(_, job)| (job.due, job.sequence))?;
        Some(self.jobs.swap_remove(index).job)
    }

    fn run_wave(
        &mut self,
        frame: &SpawnFrame<'_>,
        kind: String,
        symbol: String,
        count: u32,
        out: &mut Vec<Event>,
    ) {
        let retry_at =
            frame.now.saturating_add(secs_to_duration(self.config.wave_retry_delay_secs));
        let free = self.config.max_alive().saturating_sub(self.alive_count());
        if free == 0 {
            log::debug!("wave '{kind}' at '{symbol}' deferred: no free slot");
            self.schedule(retry_at, SpawnJob::Wave { kind, symbol, count });
            return;
        }

        let now_count = count.min(free);
        for _ in 0..now_count {
            self.spawn_one(frame, kind.clone(), symbol.clone(), out);
        }

        let remaining = count - now_count;
        log::debug!(
            "wave '{kind}' at '{symbol}': spawned {now_count}, remaining {remaining} (alive {}/{})",
            self.alive_count(),
            self.config.max_alive()
        );
        if remaining > 0 {
            self.schedule(
                retry_at,
                SpawnJob::Wave {
                    kind,
                    symbol,
                    count: remaining,
                },
            );
        }
    }

    fn spawn_one(
        &mut self,
        frame: &SpawnFrame<'_>,
        kind: String,
        symbol: String,
        out: &mut Vec<Event>,
    ) {
        if self.spawn_cells.is_empty() {
            log::warn!("dropping '{kind}' spawn: map has no enemy spawn cells");
            return;
        }

        let order = self
            .config
            .spawn_points
            .order(&self.spawn_cells, frame.grid, frame.player, &mut self.rng);
        let chosen = order
            .into_iter()
            .map(|index| self.spawn_cells[index])
            .find(|cell| !self.claimed.contains(cell) && (frame.is_cell_free)(*cell));
        let Some(cell) = chosen else {
            log::debug!("no free spawn cell for '{kind}', retrying");
            let retry_at =
                frame.now.saturating_add(secs_to_duration(self.config.blocked_retry_delay_secs));
            self.schedule(retry_at, SpawnJob::Single { kind, symbol });
            return;
        };
        let _ = self.claimed.insert(cell);

        let ctx = EnemySpawnContext {
            kind: kind.clone(),
            symbol: symbol.clone(),
            alive_count: self.alive_count(),
            enemies_spawned: self.spawned,
            max_alive: self.config.max_alive(),
            has_base: frame.grid.has_base(),
            has_player: frame.player.is_some(),
        };
        let goal = self.goals.decide_goal_on_spawn(&ctx);

        let enemy = EnemyId::new(self.next_enemy);
        self.next_enemy += 1;
        let _ = self.living.insert(enemy, goal);
        self.spawned += 1;

        out.push(Event::EnemySpawned {
            enemy,
            cell,
            position: frame.grid.grid_to_world(cell, frame.grid.tile_size() * 0.5),
            kind,
            symbol,
            goal,
        });

        if let Some(update) = self.goals.on_alive_count_changed(self.alive_count()) {
            self.apply_goal_update(update, out);
        }
    }

    fn apply_goal_update(&mut self, update: GoalUpdate, out: &mut Vec<Event>) {
        let assignments: Vec<(EnemyId, EnemyGoal)> = match update {
            GoalUpdate::ApplyToAll(goal) => {
                self.living.keys().map(|enemy| (*enemy, goal)).collect()
            }
            GoalUpdate::PerEnemy(goals) => goals,
        };

        for (enemy, goal) in assignments {
            if let Some(current) = self.living.get_mut(&enemy) {
                if *current != goal {
                    *current = goal;
                    out.push(Event::EnemyGoalChanged { enemy, goal });
                }
            }
        }
    }
}
