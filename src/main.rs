use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use highway_sim::recorder::{self, CsvRecorder, FrameLog};
use highway_sim::simulation::{
    self, BehaviorConfig, RoadConfig, RoadObserver, SimRoad, Spawner, TrafficProfile,
    UpdatePolicy,
};

#[derive(Parser)]
#[command(name = "highway_sim")]
#[command(about = "Single-lane highway traffic simulation")]
struct Cli {
    /// Number of frames to simulate (one frame is one simulated second)
    #[arg(long, default_value = "12000")]
    frames: u64,

    /// Physics sub-steps per frame
    #[arg(long, default_value = "100")]
    precision: u32,

    /// Length of the highway in meters
    #[arg(long, default_value = "14000")]
    length: f64,

    /// Speed limit in km/h, the center of the desired velocity distribution
    #[arg(long, default_value = "100")]
    max_v: f64,

    /// Ticks a crashed car stays on the road before it is towed
    #[arg(long, default_value = "5000")]
    tow_delay: u64,

    /// Seed for the random number generators
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Gap in meters drivers keep to the car ahead at standstill
    #[arg(long, default_value = "5")]
    standstill_gap: f64,

    /// Let every car see its neighbors as of the start of the tick
    #[arg(long)]
    snapshot_updates: bool,

    /// Print a progress summary every this many frames
    #[arg(long, default_value = "100")]
    report_every: u64,

    /// Write crash events to this CSV file
    #[arg(long, requires = "exit_log")]
    crash_log: Option<PathBuf>,

    /// Write exit events to this CSV file
    #[arg(long, requires = "crash_log")]
    exit_log: Option<PathBuf>,

    /// Write one row of road aggregates per frame to this CSV file
    #[arg(long)]
    frame_log: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let policy = if cli.snapshot_updates {
        UpdatePolicy::Snapshot
    } else {
        UpdatePolicy::Sequential
    };
    let behavior = BehaviorConfig {
        standstill_gap: cli.standstill_gap,
        ..BehaviorConfig::default()
    };
    let config = RoadConfig::new(cli.length, cli.precision, cli.tow_delay)
        .with_update_policy(policy)
        .with_behavior(behavior);

    match (&cli.crash_log, &cli.exit_log) {
        (Some(crash_path), Some(exit_path)) => {
            let mut recorder = CsvRecorder::create(crash_path, exit_path, cli.precision)?;
            run_headless(&cli, config, &mut recorder)?;
            if let Some(e) = recorder.take_error() {
                return Err(e).context("Failed to write event logs");
            }
            recorder.flush()
        }
        _ => run_headless(&cli, config, &mut ()),
    }
}

/// Run the simulation without any rendering
fn run_headless(cli: &Cli, config: RoadConfig, observer: &mut dyn RoadObserver) -> Result<()> {
    info!("Running highway simulation in headless mode...");
    info!(
        "Frames: {}, precision: {}, length: {} m, speed limit: {} km/h, seed: {}",
        cli.frames, cli.precision, cli.length, cli.max_v, cli.seed
    );

    let precision = config.precision as u64;
    let mut road = SimRoad::with_seed(config, cli.seed).context("Invalid road configuration")?;
    let profile = TrafficProfile::new(cli.max_v)?;
    let mut spawner = Spawner::new(profile, cli.seed.wrapping_add(1))?;
    let mut frame_log = cli.frame_log.as_deref().map(FrameLog::create).transpose()?;

    spawner.try_spawn(&mut road)?;

    for frame in 0..cli.frames {
        for sub_step in 0..precision {
            road.advance_observed(frame * precision + sub_step, observer)?;
        }

        spawner.try_spawn(&mut road)?;

        let snapshot = road.frame_snapshot(frame);
        if let Some(log) = frame_log.as_mut() {
            log.write(&snapshot)?;
        }
        if cli.report_every > 0 && frame % cli.report_every == 0 {
            info!("{}", recorder::summary_line(&snapshot));
        }
    }

    if let Some(log) = frame_log.as_mut() {
        log.flush()?;
    }

    let stats = road.stats();
    info!("=== SIMULATION COMPLETE ===");
    info!("Simulated time: {}s", cli.frames);
    info!("Total cars spawned: {}", road.historic_car_count());
    info!("Total cars exited: {}", stats.total_exits);
    info!("Active cars: {}", road.len());
    info!("Total crashes: {}", road.historic_crash_count());
    info!("Cars towed: {}", stats.total_tows);
    info!(
        "Average velocity: {:.2} km/h",
        simulation::ms_to_kmh(road.avg_velocity())
    );
    info!("Average trip duration: {:.2}s", road.avg_trip_duration());

    Ok(())
}
