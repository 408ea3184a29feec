use std::{collections::BTreeMap, time::Duration};

use battle_city_core::{Axis, Direction, EnemyGoal, MoveInput};
use battle_city_system_movement::{
    FrontObstacle, GridSensor, GridQueries, LineOfSight, MoveContext, MoveDecision, MovePolicy,
    MovePolicySpec, PathDefaults, WanderTuning,
};
use battle_city_system_pathfinding::Pathfinder;
use battle_city_world::{GridConfig, GridOptions, LegendEntry, MapGrid};
use glam::{Vec2, Vec3};

#[derive(Default)]
struct FakeQueries {
    blocked: Vec<Direction>,
    front: Option<FrontObstacle>,
    line: Option<LineOfSight>,
}

impl GridQueries for FakeQueries {
    fn is_ahead_blocked(&self, direction: Direction, _distance: f32) -> bool {
        self.blocked.contains(&direction)
    }

    fn front_obstacle(&self, _distance: f32) -> FrontObstacle {
        self.front.unwrap_or(FrontObstacle::None)
    }

    fn cardinal_line_to_target(&self, _from: Vec3, _to: Vec3) -> LineOfSight {
        self.line.unwrap_or(LineOfSight::NotCardinal)
    }
}

fn context<'a>(queries: &'a dyn GridQueries, position: Vec3, target: Vec3) -> MoveContext<'a> {
    MoveContext {
        position,
        facing: Direction::East,
        target,
        tile_size: 100.0,
        align_epsilon: 25.0,
        tie_deadband: 10.0,
        look_ahead_tiles: 1,
        fire_ready: true,
        prefer_shoot_front_brick: true,
        min_lock_time: Duration::from_millis(300),
        now: Duration::ZERO,
        goal: EnemyGoal::HuntBase,
        queries,
        grid: None,
        pathfinder: None,
    }
}

fn open_grid(width: i32, height: i32) -> MapGrid {
    let config = GridConfig {
        width,
        height,
        ..GridConfig::default()
    };
    MapGrid::build(&config, GridOptions::default()).expect("valid grid")
}

#[test]
fn axis_lock_heads_east_for_target_due_east() {
    let queries = FakeQueries::default();
    let mut policy = MovePolicy::default();

    for offset in [-20.0, -5.0, 0.0, 5.0, 20.0] {
        let ctx = context(&queries, Vec3::ZERO, Vec3::new(600.0, offset, 0.0));
        let decision = policy.compute_move(&ctx);
        assert_eq!(decision.input.to_vec2(), Vec2::new(1.0, 0.0));
        assert_eq!(decision.lock_axis, Some(Axis::X));
        assert_eq!(decision.lock_time, Duration::from_millis(300));
        assert_eq!(decision.debug, "Go X");
    }
}

#[test]
fn axis_lock_never_emits_diagonal_input() {
    let queries = FakeQueries {
        blocked: vec![Direction::West],
        ..FakeQueries::default()
    };
    let mut policy = MovePolicy::default();

    for x in (-3..=3).map(|step| step as f32 * 70.0) {
        for y in (-3..=3).map(|step| step as f32 * 70.0) {
            let ctx = context(&queries, Vec3::ZERO, Vec3::new(x, y, 0.0));
            let input = policy.compute_move(&ctx).input.to_vec2();
            assert!(
                input == Vec2::ZERO || (input.x.abs() + input.y.abs() - 1.0).abs() < f32::EPSILON,
                "diagonal input {input:?} for target ({x}, {y})"
            );
        }
    }
}

#[test]
fn axis_lock_falls_back_to_other_axis_when_blocked() {
    let queries = FakeQueries {
        blocked: vec![Direction::East],
        ..FakeQueries::default()
    };
    let ctx = context(&queries, Vec3::ZERO, Vec3::new(500.0, 300.0, 0.0));
    let decision = MovePolicy::default().compute_move(&ctx);

    assert_eq!(decision.input.direction(), Some(Direction::South));
    assert_eq!(decision.lock_axis, Some(Axis::Y));
    assert_eq!(decision.debug, "Fallback Y");
}

#[test]
fn axis_lock_keeps_facing_inside_tie_deadband() {
    let queries = FakeQueries::default();
    let mut ctx = context(&queries, Vec3::ZERO, Vec3::new(12.0, -8.0, 0.0));
    ctx.facing = Direction::North;
    let decision = MovePolicy::default().compute_move(&ctx);

    assert_eq!(decision.input.direction(), Some(Direction::North));
    assert_eq!(decision.debug, "Keep Y");
}

#[test]
fn blocked_agent_only_suggests_shots_that_can_land() {
    let mut queries = FakeQueries {
        blocked: vec![Direction::East, Direction::South],
        line: Some(LineOfSight::Brick(Vec3::ZERO)),
        ..FakeQueries::default()
    };
    let target = Vec3::new(500.0, 300.0, 0.0);

    let decision = MovePolicy::default().compute_move(&context(&queries, Vec3::ZERO, target));
    assert!(decision.input.is_zero());
    assert_eq!(decision.lock_axis, None);
    assert!(decision.request_fire, "brick on the line is worth a shot");
    assert_eq!(decision.debug, "Blocked/Wait");

    queries.line = Some(LineOfSight::Steel(Vec3::ZERO));
    let decision = MovePolicy::default().compute_move(&context(&queries, Vec3::ZERO, target));
    assert!(!decision.request_fire, "never shoot into steel");
}

#[test]
fn front_brick_stops_agent_for_a_shot() {
    let queries = FakeQueries {
        front: Some(FrontObstacle::Brick(Vec3::new(100.0, 0.0, 50.0))),
        ..FakeQueries::default()
    };
    let ctx = context(&queries, Vec3::ZERO, Vec3::new(900.0, 0.0, 0.0));
    let decision = MovePolicy::default().compute_move(&ctx);

    assert!(decision.input.is_zero());
    assert_eq!(decision.lock_axis, Some(Axis::X));
    assert!(decision.request_fire);

    let mut cautious = ctx;
    cautious.prefer_shoot_front_brick = false;
    let decision = MovePolicy::default().compute_move(&cautious);
    assert_eq!(decision.input.direction(), Some(Direction::East));
}

#[test]
fn composite_layers_shooting_over_locomotion() {
    let queries = FakeQueries {
        front: Some(FrontObstacle::Brick(Vec3::ZERO)),
        ..FakeQueries::default()
    };
    let mut ctx = context(&queries, Vec3::ZERO, Vec3::new(900.0, 0.0, 0.0));
    ctx.prefer_shoot_front_brick = false;
    let mut policy = MovePolicySpec::Composite {
        policies: vec![MovePolicySpec::AxisLock, MovePolicySpec::ShootWhenBlocking],
    }
    .build(7);

    let decision = policy.compute_move(&ctx);
    assert!(decision.input.is_zero(), "shooting holds the tank still");
    assert!(decision.suppress_move);
    assert!(decision.request_fire);
    assert_eq!(decision.lock_axis, Some(Axis::X));
    assert_eq!(decision.debug, "Go X -> +ShootCheck");

    ctx.fire_ready = false;
    let decision = policy.compute_move(&ctx);
    assert_eq!(decision.input.direction(), Some(Direction::East));
    assert!(!decision.request_fire);
}

#[test]
fn merge_prefers_later_non_trivial_fields() {
    let mut merged = MoveDecision {
        input: MoveInput::toward(Direction::East),
        lock_axis: Some(Axis::X),
        lock_time: Duration::from_millis(300),
        request_fire: true,
        debug: "first".to_owned(),
        ..MoveDecision::default()
    };

    merged.merge(MoveDecision::default());
    assert_eq!(merged.input.direction(), Some(Direction::East));
    assert_eq!(merged.lock_axis, Some(Axis::X));
    assert_eq!(merged.debug, "first");

    merged.merge(MoveDecision {
        input: MoveInput::toward(Direction::North),
        lock_axis: Some(Axis::Y),
        lock_time: Duration::from_millis(250),
        debug: "second".to_owned(),
        ..MoveDecision::default()
    });
    assert_eq!(merged.input.direction(), Some(Direction::North));
    assert_eq!(merged.lock_axis, Some(Axis::Y));
    assert_eq!(merged.lock_time, Duration::from_millis(250));
    assert!(merged.request_fire, "fire requests are sticky");
    assert_eq!(merged.debug, "first -> second");
}

#[test]
fn suppression_holds_against_later_movement() {
    let mut merged = MoveDecision {
        request_fire: true,
        suppress_move: true,
        debug: "shoot".to_owned(),
        ..MoveDecision::default()
    };

    merged.merge(MoveDecision {
        input: MoveInput::toward(Direction::East),
        debug: "wander".to_owned(),
        ..MoveDecision::default()
    });
    assert_eq!(merged.input, MoveInput::IDLE);
    assert!(merged.suppress_move);
    assert!(merged.request_fire);
    assert_eq!(merged.debug, "shoot -> wander");
}

#[test]
fn path_follow_steers_around_walls() {
    let mut legend = BTreeMap::new();
    let _ = legend.insert(
        "S".to_owned(),
        LegendEntry {
            obstacle: "Steel".to_owned(),
            ..LegendEntry::default()
        },
    );
    let config = GridConfig {
        width: 5,
        height: 5,
        tile_size: 100.0,
        rows: vec![
            ".S...".to_owned(),
            ".S...".to_owned(),
            ".S...".to_owned(),
            ".S...".to_owned(),
            ".....".to_owned(),
        ],
        legend,
        waves: Vec::new(),
    };
    let grid = MapGrid::build(&config, GridOptions::default()).expect("valid grid");
    let pathfinder = Pathfinder::new();
    let queries = FakeQueries::default();
    let mut ctx = context(&queries, Vec3::ZERO, Vec3::new(400.0, 0.0, 0.0));
    ctx.grid = Some(&grid);
    ctx.pathfinder = Some(&pathfinder);

    let mut policy = MovePolicySpec::PathFollow(Default::default()).build(1);
    let decision = policy.compute_move(&ctx);

    assert_eq!(decision.input.direction(), Some(Direction::South));
    assert_eq!(decision.lock_axis, None);
    assert!(!decision.request_fire);
    assert_eq!(decision.debug, "PathFollow");
}

#[test]
fn path_follow_without_dependencies_stays_idle() {
    let queries = FakeQueries::default();
    let ctx = context(&queries, Vec3::ZERO, Vec3::new(400.0, 0.0, 0.0));
    let mut policy = MovePolicySpec::PathFollow(Default::default()).build(1);

    assert!(policy.compute_move(&ctx).input.is_zero());
}

#[test]
fn wander_far_engages_only_for_distant_player() {
    let grid = open_grid(20, 3);
    let sensor = GridSensor::new(Some(&grid), Vec3::new(0.0, 100.0, 0.0), Direction::East, 25.0);
    let mut ctx = context(&sensor, Vec3::new(0.0, 100.0, 0.0), Vec3::new(1900.0, 100.0, 0.0));
    ctx.grid = Some(&grid);
    let mut policy = MovePolicySpec::WanderFar(WanderTuning::default()).build(99);

    let hunting_base = policy.compute_move(&ctx);
    assert_eq!(hunting_base, MoveDecision::default());

    ctx.goal = EnemyGoal::HuntPlayer;
    let decision = policy.compute_move(&ctx);
    assert_eq!(decision.input.direction(), Some(Direction::East));
    assert_eq!(decision.lock_axis, Some(Axis::X));
    assert_eq!(decision.lock_time, Duration::from_millis(250));
    assert_eq!(decision.debug, "+WanderFar");

    ctx.target = Vec3::new(900.0, 100.0, 0.0);
    let near = policy.compute_move(&ctx);
    assert!(near.input.is_zero(), "close targets are left to other policies");
}

#[test]
fn wander_far_is_reproducible_for_equal_seeds() {
    let grid = open_grid(30, 30);
    let sensor = GridSensor::new(Some(&grid), Vec3::new(1500.0, 1500.0, 0.0), Direction::East, 25.0);
    let mut ctx = context(&sensor, Vec3::new(1500.0, 1500.0, 0.0), Vec3::ZERO);
    ctx.grid = Some(&grid);
    ctx.goal = EnemyGoal::HuntPlayer;

    let run = |seed: u64| {
        let mut policy = MovePolicySpec::WanderFar(WanderTuning::default()).build(seed);
        let mut ctx = ctx;
        (0..40)
            .map(|tick| {
                ctx.now = Duration::from_millis(tick * 100);
                policy.compute_move(&ctx).input
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(5), run(5));
}

#[test]
fn policy_specs_deserialize_and_take_path_defaults() {
    let spec: MovePolicySpec = serde_json::from_str(
        r#"{
            "kind": "composite",
            "policies": [
                { "kind": "path_follow", "horizon_steps": 9 },
                { "kind": "wander_far" },
                { "kind": "shoot_when_blocking" }
            ]
        }"#,
    )
    .expect("valid policy spec");
    let mut policy = spec.build(3);
    assert_eq!(policy.name(), "Composite");

    let defaults = PathDefaults {
        horizon_steps: 12,
        replan_interval_secs: 1.0,
        ..PathDefaults::default()
    };
    policy.apply_path_defaults(&defaults);

    let MovePolicy::Composite(children) = &policy else {
        panic!("expected composite policy");
    };
    let MovePolicy::PathFollow(path_follow) = &children[0] else {
        panic!("expected path follow first");
    };
    assert_eq!(path_follow.tuning().horizon_steps, 12);
    assert_eq!(path_follow.tuning().replan_interval_secs, 1.0);
    assert_eq!(path_follow.tuning().replan_distance_cells, 2);
}
