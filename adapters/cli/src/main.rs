#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line driver that loads a map and runs the enemy AI
//! against a stationary player turret.

mod logging;
mod simulation;
mod tuning;

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use battle_city_world::{query, GridConfig, GridOptions, MapGrid};
use clap::Parser;

use crate::{simulation::Simulation, tuning::SimulationTuning};

/// Runs a Battle City arena without a renderer.
#[derive(Debug, Parser)]
#[command(name = "battle-city", author, version, about, long_about = None)]
struct Args {
    /// Map document in JSON.
    map: PathBuf,
    /// Number of fixed steps to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Length of one step in milliseconds.
    #[arg(long, default_value_t = 20)]
    dt_ms: u64,
    /// Seed for every random choice of the session.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// TOML file with coordinator, policy, goal and spawner tuning.
    #[arg(long)]
    tuning: Option<PathBuf>,
    /// Replaces the tile size declared by the map.
    #[arg(long)]
    tile_size: Option<f32>,
    /// Snap positions per tile edge.
    #[arg(long, default_value_t = 20)]
    subdivisions: u32,
    /// Rejects maps with more than one base.
    #[arg(long)]
    strict_base: bool,
    /// Prints the parsed grid before running.
    #[arg(long)]
    print_map: bool,
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let tuning = SimulationTuning::load(args.tuning.as_deref())?;
    let grid = load_grid(&args)?;
    if args.print_map {
        for row in query::ascii_rows(&grid) {
            println!("{row}");
        }
    }

    log::info!(
        "running {} ticks of {} ms with seed {}",
        args.ticks,
        args.dt_ms,
        args.seed
    );
    let mut simulation = Simulation::new(grid, tuning, args.seed);
    let stats = simulation.run(args.ticks, Duration::from_millis(args.dt_ms));
    println!("{stats}");
    Ok(())
}

fn load_grid(args: &Args) -> Result<MapGrid> {
    let source = fs::read_to_string(&args.map)
        .with_context(|| format!("failed to read map {}", args.map.display()))?;
    let config = GridConfig::from_json_str(&source)
        .with_context(|| format!("failed to parse map {}", args.map.display()))?;
    let options = GridOptions {
        tile_size_override: args.tile_size,
        subdivisions_per_tile: args.subdivisions,
        strict_single_base: args.strict_base,
        ..GridOptions::default()
    };
    MapGrid::build(&config, options)
        .with_context(|| format!("map {} is not a valid grid", args.map.display()))
}
