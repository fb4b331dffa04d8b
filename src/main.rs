use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ecosphere::{
    engine::{EngineBuilder, EngineSettings},
    narrative::{Chronicle, Severity},
    scenario::ScenarioLoader,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Ecosystem simulation runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/temperate_valley.yaml")]
    scenario: PathBuf,

    /// Override step count (uses scenario default when omitted)
    #[arg(long)]
    steps: Option<u64>,

    /// Override game seconds per step
    #[arg(long)]
    step_seconds: Option<f64>,

    /// Override snapshot interval in steps
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Override the scenario seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print the last N story beats at the end
    #[arg(long, default_value_t = 10)]
    story: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ecosphere=info")))
        .init();

    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;
    if let Some(seed) = cli.seed {
        scenario.seed = seed;
    }
    let mut world = scenario.build_world()?;
    let steps = scenario.steps(cli.steps);
    let step_seconds = cli.step_seconds.unwrap_or(scenario.step_seconds);
    let snapshot_interval = cli.snapshot_interval.unwrap_or(scenario.snapshot_interval_steps);
    let snapshot_dir = cli.snapshot_dir.unwrap_or_else(|| PathBuf::from("snapshots"));

    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_steps: snapshot_interval,
        snapshot_dir,
    };

    let chronicle = Chronicle::new(256).with_min_severity(Severity::Notable);
    let mut engine = EngineBuilder::new(settings)
        .with_default_systems(&scenario.config)
        .with_observer(chronicle.clone())
        .build();

    engine.run(&mut world, steps, step_seconds)?;

    for beat in chronicle.latest(cli.story) {
        println!("[{:>9.0}s] {}", beat.time, beat.headline);
    }
    let health = world.health().latest();
    println!(
        "Scenario '{}' completed {} steps ({:.0} game seconds). Living species: {}, population: {:.0}, health: {}",
        scenario.name,
        engine.steps(),
        world.time(),
        world.species().alive_count(),
        world.total_population(),
        health.map_or_else(|| "n/a".to_string(), |h| format!("{:.2}", h.overall_score)),
    );
    Ok(())
}
