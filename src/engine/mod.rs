//! Discrete-event scheduler driving the six engines over a shared world.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
    commands::{Command, CommandError},
    config::SimulationConfig,
    events::{EngineKind, EventBus, EventObserver, EventRecord},
    rng::{RngManager, SystemRng},
    snapshot::SnapshotWriter,
    systems::{BiomeSystem, CatastropheSystem, ClimateSystem, HealthSystem, ResourceSystem, SpeciesSystem},
    world::World,
};

/// Two wake times closer than this run together.
const WAKE_EPSILON: f64 = 1e-9;

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    /// Write a snapshot every N steps of [`Engine::run`]; 0 disables.
    pub snapshot_interval_steps: u64,
    pub snapshot_dir: PathBuf,
}

pub struct SystemContext<'a> {
    /// Simulation time of this tick in game seconds.
    pub time: f64,
    /// Time elapsed since this engine last ran.
    pub dt: f32,
    pub scenario_name: &'a str,
}

pub trait System {
    fn kind(&self) -> EngineKind;

    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Game seconds between ticks.
    fn interval(&self) -> f64;

    fn run(&mut self, ctx: &SystemContext, world: &mut World, rng: &mut SystemRng<'_>) -> Result<()>;
}

/// Cloneable flag that halts the scheduler between engine ticks.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Passed to the hook of [`Engine::run_with_hook`] after every step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: u64,
    pub time: f64,
    pub engine_ticks: usize,
    pub events: usize,
}

struct Scheduled {
    system: Box<dyn System>,
    interval: f64,
    next_wake: f64,
    last_run: f64,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
    bus: EventBus,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
            bus: EventBus::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Adds all six engines configured from `config`.
    pub fn with_default_systems(self, config: &SimulationConfig) -> Self {
        let schedule = &config.schedule;
        self.with_system(ClimateSystem::new(config.climate.clone(), schedule.climate_interval))
            .with_system(BiomeSystem::new(config.biome.clone(), schedule.biome_interval))
            .with_system(ResourceSystem::new(config.resource.clone(), schedule.resource_interval))
            .with_system(SpeciesSystem::new(config.species.clone(), schedule.species_interval))
            .with_system(CatastropheSystem::new(
                config.catastrophe.clone(),
                schedule.catastrophe_interval,
            ))
            .with_system(HealthSystem::new(config.health.clone(), schedule.health_interval))
    }

    pub fn with_observer(mut self, observer: impl EventObserver + 'static) -> Self {
        self.bus.register(observer);
        self
    }

    pub fn build(self) -> Engine {
        let mut systems: Vec<Scheduled> = self
            .systems
            .into_iter()
            .map(|system| {
                let mut interval = system.interval();
                if !(interval.is_finite() && interval > 0.0) {
                    warn!(system = system.name(), interval, "invalid tick interval, using 1s");
                    interval = 1.0;
                }
                Scheduled {
                    system,
                    interval,
                    next_wake: interval,
                    last_run: 0.0,
                }
            })
            .collect();
        // Stable sort keeps registration order among engines of one kind.
        systems.sort_by_key(|s| s.system.kind());
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems,
            bus: self.bus,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_steps,
            ),
            settings: self.settings,
            stop: StopHandle::default(),
            steps: 0,
            started: false,
        }
    }
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Scheduled>,
    bus: EventBus,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
    stop: StopHandle,
    steps: u64,
    started: bool,
}

impl Engine {
    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn register_observer(&mut self, observer: impl EventObserver + 'static) {
        self.bus.register(observer);
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Names of the scheduled engines in the order they run at a shared
    /// instant.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.system.name()).collect()
    }

    /// Validates a command and queues it for its owning engine.
    pub fn submit(&self, world: &mut World, command: Command) -> Result<(), CommandError> {
        world.submit(command)
    }

    /// Moves the simulation forward by `dt` game seconds, running every
    /// engine whose wake time falls inside the window. Returns the number
    /// of engine ticks executed.
    pub fn advance(&mut self, world: &mut World, dt: f64) -> Result<usize> {
        if !(dt.is_finite() && dt >= 0.0) {
            warn!(dt, "ignoring invalid advance");
            return Ok(0);
        }
        if !self.started {
            // A restored world resumes its schedule from its own clock.
            let origin = world.time();
            for scheduled in &mut self.systems {
                scheduled.last_run = origin;
                scheduled.next_wake = origin + scheduled.interval;
            }
            self.started = true;
        }
        let target = world.time() + dt;
        let mut ticks = 0;
        loop {
            let Some(now) = self
                .systems
                .iter()
                .map(|s| s.next_wake)
                .min_by(|a, b| a.total_cmp(b))
            else {
                break;
            };
            if now > target + WAKE_EPSILON {
                break;
            }
            for index in 0..self.systems.len() {
                if self.systems[index].next_wake > now + WAKE_EPSILON {
                    continue;
                }
                if self.stop.is_stopped() {
                    debug!(time = now, "scheduler stopped");
                    return Ok(ticks);
                }
                world.set_time(now);
                self.tick_system(index, world, now)?;
                ticks += 1;
            }
        }
        if !self.stop.is_stopped() {
            world.set_time(target);
        }
        Ok(ticks)
    }

    fn tick_system(&mut self, index: usize, world: &mut World, now: f64) -> Result<()> {
        let scheduled = &mut self.systems[index];
        let kind = scheduled.system.kind();
        let ctx = SystemContext {
            time: now,
            dt: (now - scheduled.last_run).max(0.0) as f32,
            scenario_name: &self.settings.scenario_name,
        };
        let mut stream = self.rng.stream(scheduled.system.name());
        scheduled
            .system
            .run(&ctx, world, &mut stream)
            .with_context(|| format!("{} engine failed at t={now:.1}", kind))?;
        scheduled.last_run = now;
        scheduled.next_wake = now + scheduled.interval;

        let records: Vec<EventRecord> = world
            .events
            .drain()
            .map(|event| EventRecord {
                time: now,
                source: kind,
                event,
            })
            .collect();
        for record in &records {
            self.bus.publish(record);
        }
        Ok(())
    }

    /// Runs `steps` steps of `step_seconds` each, writing snapshots at the
    /// configured interval.
    pub fn run(&mut self, world: &mut World, steps: u64, step_seconds: f64) -> Result<()> {
        self.run_with_hook(world, steps, step_seconds, |_| {})
    }

    pub fn run_with_hook<F>(&mut self, world: &mut World, steps: u64, step_seconds: f64, mut hook: F) -> Result<()>
    where
        F: FnMut(&StepReport),
    {
        info!(
            scenario = %self.settings.scenario_name,
            steps,
            step_seconds,
            "simulation started"
        );
        for _ in 0..steps {
            if self.stop.is_stopped() {
                info!(step = self.steps, "simulation stopped");
                break;
            }
            let before = self.bus.published();
            let engine_ticks = self.advance(world, step_seconds)?;
            self.steps += 1;
            self.snapshot_writer
                .maybe_write(world, &self.settings.scenario_name, self.steps)?;
            hook(&StepReport {
                step: self.steps,
                time: world.time(),
                engine_ticks,
                events: (self.bus.published() - before) as usize,
            });
        }
        Ok(())
    }
}
