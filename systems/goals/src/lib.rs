#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Population-level goal assignment for enemy tanks.
//!
//! A [`GoalPolicy`] decides whether a freshly spawned enemy hunts the player
//! or the base, and may later retarget the living population. Retargeting is
//! reported as a [`GoalUpdate`] that the owner applies to its roster.

use std::time::Duration;

use battle_city_core::{secs_to_duration, EnemyGoal, EnemyId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Shortest re-evaluation period accepted by [`WeightedDynamicPolicy`].
pub const MIN_REEVALUATION_PERIOD_SECS: f32 = 0.2;

/// Alive-count thresholds the owning spawner works with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GoalThresholds {
    /// Alive count at or above which the enemies hold the advantage.
    pub high: u32,
    /// Alive count at or below which the player holds the advantage.
    pub low: u32,
}

impl Default for GoalThresholds {
    fn default() -> Self {
        Self { high: 4, low: 2 }
    }
}

/// Snapshot of the spawner handed to a policy when an enemy spawns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnemySpawnContext {
    /// Enemy type from the wave entry.
    pub kind: String,
    /// Spawn symbol from the wave entry.
    pub symbol: String,
    /// Enemies alive before this spawn.
    pub alive_count: u32,
    /// Enemies spawned so far.
    pub enemies_spawned: u32,
    /// Cap on simultaneously alive enemies.
    pub max_alive: u32,
    /// Whether the map has a base.
    pub has_base: bool,
    /// Whether a player is present.
    pub has_player: bool,
}

/// Retargeting requested by a policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GoalUpdate {
    /// Every living enemy takes the same goal.
    ApplyToAll(EnemyGoal),
    /// Individual goals for the listed enemies.
    PerEnemy(Vec<(EnemyId, EnemyGoal)>),
}

/// Goal strategy shared by the whole enemy population.
#[derive(Clone, Debug)]
pub enum GoalPolicy {
    /// Independent coin flip per spawn.
    RandomFixed(RandomFixedPolicy),
    /// Switches the whole population on alive-count threshold crossings.
    AdvantageBias(AdvantageBiasPolicy),
    /// Periodic weighted re-rolls biased by the alive count.
    WeightedDynamic(WeightedDynamicPolicy),
}

impl GoalPolicy {
    /// Binds the policy to its owner's thresholds and resets its state.
    pub fn initialize(&mut self, thresholds: GoalThresholds) {
        match self {
            Self::RandomFixed(_) => {}
            Self::AdvantageBias(policy) => policy.initialize(),
            Self::WeightedDynamic(policy) => policy.initialize(thresholds),
        }
    }

    /// Picks the goal of an enemy about to spawn.
    pub fn decide_goal_on_spawn(&mut self, ctx: &EnemySpawnContext) -> EnemyGoal {
        match self {
            Self::RandomFixed(policy) => policy.decide(),
            Self::AdvantageBias(policy) => policy.current_goal(),
            Self::WeightedDynamic(policy) => policy.decide(ctx.alive_count),
        }
    }

    /// Reacts to a change of the alive count.
    pub fn on_alive_count_changed(&mut self, alive: u32) -> Option<GoalUpdate> {
        match self {
            Self::AdvantageBias(policy) => policy.on_alive_count_changed(alive),
            Self::RandomFixed(_) | Self::WeightedDynamic(_) => None,
        }
    }

    /// Advances periodic re-evaluation by `dt`.
    pub fn tick_goal(&mut self, dt: Duration, alive: u32, living: &[EnemyId]) -> Option<GoalUpdate> {
        match self {
            Self::WeightedDynamic(policy) => policy.tick(dt, alive, living),
            Self::RandomFixed(_) | Self::AdvantageBias(_) => None,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RandomFixed(_) => "RandomFixed",
            Self::AdvantageBias(_) => "AdvantageBias",
            Self::WeightedDynamic(_) => "WeightedDynamic",
        }
    }
}

/// Serializable goal policy choice.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoalPolicySpec {
    /// See [`RandomFixedPolicy`].
    RandomFixed(RandomFixedTuning),
    /// See [`AdvantageBiasPolicy`].
    AdvantageBias(AdvantageBiasTuning),
    /// See [`WeightedDynamicPolicy`].
    WeightedDynamic(WeightedDynamicTuning),
}

impl Default for GoalPolicySpec {
    fn default() -> Self {
        Self::AdvantageBias(AdvantageBiasTuning::default())
    }
}

impl GoalPolicySpec {
    /// Builds a live policy drawing randomness from `seed`.
    #[must_use]
    pub fn build(&self, seed: u64) -> GoalPolicy {
        match *self {
            Self::RandomFixed(tuning) => GoalPolicy::RandomFixed(RandomFixedPolicy::new(tuning, seed)),
            Self::AdvantageBias(tuning) => GoalPolicy::AdvantageBias(AdvantageBiasPolicy::new(tuning)),
            Self::WeightedDynamic(tuning) => {
                GoalPolicy::WeightedDynamic(WeightedDynamicPolicy::new(tuning, seed))
            }
        }
    }
}

fn roll(rng: &mut ChaCha8Rng, hunt_player_chance: f32) -> EnemyGoal {
    if rng.gen::<f32>() < hunt_player_chance {
        EnemyGoal::HuntPlayer
    } else {
        EnemyGoal::HuntBase
    }
}

/// Tuning of [`RandomFixedPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomFixedTuning {
    /// Probability that a spawn hunts the player.
    pub hunt_player_chance: f32,
}

impl Default for RandomFixedTuning {
    fn default() -> Self {
        Self {
            hunt_player_chance: 0.5,
        }
    }
}

/// Rolls every spawn independently with a fixed chance.
#[derive(Clone, Debug)]
pub struct RandomFixedPolicy {
    tuning: RandomFixedTuning,
    rng: ChaCha8Rng,
}

impl RandomFixedPolicy {
    /// Creates the policy with its own random stream.
    #[must_use]
    pub fn new(tuning: RandomFixedTuning, seed: u64) -> Self {
        Self {
            tuning,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn decide(&mut self) -> EnemyGoal {
        roll(&mut self.rng, self.tuning.hunt_player_chance)
    }
}

/// Tuning of [`AdvantageBiasPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvantageBiasTuning {
    /// Alive count whose upward crossing sends everyone at the base.
    pub high_threshold: u32,
    /// Alive count whose downward crossing sends everyone at the player.
    pub low_threshold: u32,
    /// Goal held until the first crossing.
    pub default_goal: EnemyGoal,
}

impl Default for AdvantageBiasTuning {
    fn default() -> Self {
        Self {
            high_threshold: 4,
            low_threshold: 2,
            default_goal: EnemyGoal::HuntBase,
        }
    }
}

/// Holds one global goal and flips it when the alive count crosses a
/// threshold.
///
/// Rising to the high threshold sends everyone at the base; falling to the
/// low threshold sends everyone at the player. Repeated counts on the same
/// side of a threshold change nothing.
#[derive(Clone, Debug)]
pub struct AdvantageBiasPolicy {
    tuning: AdvantageBiasTuning,
    current: EnemyGoal,
    previous_alive: u32,
}

impl AdvantageBiasPolicy {
    /// Creates the policy holding its default goal.
    #[must_use]
    pub fn new(tuning: AdvantageBiasTuning) -> Self {
        Self {
            tuning,
            current: tuning.default_goal,
            previous_alive: 0,
        }
    }

    /// Goal currently held and handed to new spawns.
    #[must_use]
    pub const fn current_goal(&self) -> EnemyGoal {
        self.current
    }

    fn initialize(&mut self) {
        self.current = self.tuning.default_goal;
        self.previous_alive = 0;
    }

    fn on_alive_count_changed(&mut self, alive: u32) -> Option<GoalUpdate> {
        let previous = std::mem::replace(&mut self.previous_alive, alive);
        let high = self.tuning.high_threshold;
        let low = self.tuning.low_threshold;

        let goal = if previous < high && high <= alive {
            EnemyGoal::HuntBase
        } else if previous > low && low >= alive {
            EnemyGoal::HuntPlayer
        } else {
            return None;
        };

        log::debug!("alive count {previous} -> {alive}: all enemies switch to {goal:?}");
        self.current = goal;
        Some(GoalUpdate::ApplyToAll(goal))
    }
}

/// Tuning of [`WeightedDynamicPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedDynamicTuning {
    /// Base probability of hunting the player.
    pub hunt_player_chance: f32,
    /// Probability shift applied when either side holds the advantage.
    pub bias_by_advantage: f32,
    /// Half-width of the symmetric jitter added to each roll.
    pub random_jitter: f32,
    /// Seconds between re-evaluations of the living enemies.
    pub reevaluation_period_secs: f32,
    /// Rolls each living enemy separately instead of once for everyone.
    pub per_enemy: bool,
}

impl Default for WeightedDynamicTuning {
    fn default() -> Self {
        Self {
            hunt_player_chance: 0.5,
            bias_by_advantage: 0.25,
            random_jitter: 0.10,
            reevaluation_period_secs: 4.0,
            per_enemy: true,
        }
    }
}

/// Weighted coin flips biased by the alive count, re-rolled periodically.
///
/// With the enemies ahead the chance of hunting the player drops by the
/// bias, with the player ahead it rises. Before [`GoalPolicy::initialize`]
/// no thresholds are known, so rolls are unbiased and periodic
/// re-evaluation is off.
#[derive(Clone, Debug)]
pub struct WeightedDynamicPolicy {
    tuning: WeightedDynamicTuning,
    rng: ChaCha8Rng,
    thresholds: Option<GoalThresholds>,
    elapsed: Duration,
}

impl WeightedDynamicPolicy {
    /// Creates the policy with its own random stream.
    #[must_use]
    pub fn new(tuning: WeightedDynamicTuning, seed: u64) -> Self {
        Self {
            tuning,
            rng: ChaCha8Rng::seed_from_u64(seed),
            thresholds: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Hunt-player probability before jitter for the provided alive count.
    #[must_use]
    pub fn base_chance(&self, alive: u32) -> f32 {
        let mut chance = self.tuning.hunt_player_chance;
        if let Some(thresholds) = self.thresholds {
            if alive >= thresholds.high {
                chance -= self.tuning.bias_by_advantage;
            } else if alive <= thresholds.low {
                chance += self.tuning.bias_by_advantage;
            }
        }
        chance.clamp(0.0, 1.0)
    }

    fn initialize(&mut self, thresholds: GoalThresholds) {
        self.thresholds = Some(thresholds);
        self.elapsed = Duration::ZERO;
    }

    fn jittered_roll(&mut self, base: f32) -> EnemyGoal {
        let jitter = self.tuning.random_jitter.abs().min(1.0);
        let chance = (base + self.rng.gen_range(-jitter..=jitter)).clamp(0.0, 1.0);
        roll(&mut self.rng, chance)
    }

    fn decide(&mut self, alive: u32) -> EnemyGoal {
        let base = self.base_chance(alive);
        self.jittered_roll(base)
    }

    fn tick(&mut self, dt: Duration, alive: u32, living: &[EnemyId]) -> Option<GoalUpdate> {
        if self.thresholds.is_none() {
            return None;
        }
        self.elapsed += dt;
        let period = secs_to_duration(
            self.tuning
                .reevaluation_period_secs
                .max(MIN_REEVALUATION_PERIOD_SECS),
        );
        if self.elapsed < period {
            return None;
        }
        self.elapsed = Duration::ZERO;

        let base = self.base_chance(alive);
        if self.tuning.per_enemy {
            let goals = living
                .iter()
                .map(|enemy| (*enemy, self.jittered_roll(base)))
                .collect();
            Some(GoalUpdate::PerEnemy(goals))
        } else {
            Some(GoalUpdate::ApplyToAll(self.jittered_roll(base)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_chance_shifts_with_advantage() {
        let mut policy = WeightedDynamicPolicy::new(WeightedDynamicTuning::default(), 1);
        assert_eq!(policy.base_chance(9), 0.5, "unbiased before initialization");

        policy.initialize(GoalThresholds::default());
        assert_eq!(policy.base_chance(4), 0.25);
        assert_eq!(policy.base_chance(3), 0.5);
        assert_eq!(policy.base_chance(2), 0.75);
    }

    #[test]
    fn base_chance_is_clamped() {
        let tuning = WeightedDynamicTuning {
            hunt_player_chance: 0.9,
            bias_by_advantage: 0.5,
            ..WeightedDynamicTuning::default()
        };
        let mut policy = WeightedDynamicPolicy::new(tuning, 1);
        policy.initialize(GoalThresholds::default());

        assert_eq!(policy.base_chance(0), 1.0);
    }

    #[test]
    fn certain_chances_ignore_the_dice() {
        let mut always = RandomFixedPolicy::new(
            RandomFixedTuning {
                hunt_player_chance: 1.0,
            },
            3,
        );
        let mut never = RandomFixedPolicy::new(
            RandomFixedTuning {
                hunt_player_chance: 0.0,
            },
            3,
        );

        for _ in 0..32 {
            assert_eq!(always.decide(), EnemyGoal::HuntPlayer);
            assert_eq!(never.decide(), EnemyGoal::HuntBase);
        }
    }
}
