pub mod commands;
pub mod components;
pub mod config;
pub mod engine;
pub mod events;
pub mod narrative;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod spatial;
pub mod systems;
pub mod world;

pub use commands::{Command, CommandError};
pub use config::SimulationConfig;
pub use engine::{Engine, EngineBuilder, EngineSettings, StepReport, StopHandle};
pub use events::{EngineKind, EventObserver, EventRecord, SimEvent};
pub use scenario::{Scenario, ScenarioLoader};
pub use world::{SimulationSnapshot, World};
