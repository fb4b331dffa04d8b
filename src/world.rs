use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::commands::{unit_range, validate_definition, Command, CommandError, CommandQueue};
use crate::components::biome::{BiomePhase, BiomeStates, BiomeTransition, BiomeType};
use crate::components::catastrophe::{CatastropheKind, CatastropheLog, CatastropheOverrides, CatastropheState};
use crate::components::climate::{ClimateState, LocalConditions, SeasonType, WeatherPattern};
use crate::components::health::{HealthIndicator, HealthSnapshot, HealthState};
use crate::components::resource::{ResourceLedgers, ResourceType};
use crate::components::species::{SpeciesDefinition, SpeciesId, SpeciesPopulation, SpeciesRegistry, TrophicLevel};
use crate::config::SimulationConfig;
use crate::events::{EngineKind, EventQueue};
use crate::spatial::{ClimateZone, RegionId, RegionalGrid};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateSummary {
    pub global_temperature: f32,
    pub sea_level: f32,
    pub atmospheric_co2: f32,
    pub humidity: f32,
    pub precipitation: f32,
    pub stability: f32,
    pub season: SeasonType,
    pub season_progress: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub biome: BiomeType,
    pub climate_zone: ClimateZone,
    pub phase: BiomePhase,
    pub fitness: f32,
    /// Availability over capacity, by resource ordinal.
    pub resources: [f32; ResourceType::COUNT],
    pub catastrophe_severity: f32,
    pub health: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub name: String,
    pub trophic_level: TrophicLevel,
    pub current: f32,
    pub max: f32,
    pub extinct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatastropheSummary {
    pub id: u64,
    pub kind: CatastropheKind,
    pub epicenter: u32,
    pub state: CatastropheState,
    pub intensity: f32,
    pub remaining: f32,
    pub recovery_progress: f32,
    pub affected_regions: usize,
}

/// Read-only view handed to external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub scenario: String,
    pub time: f64,
    pub climate: ClimateSummary,
    pub weather: Vec<WeatherPattern>,
    pub biome_distribution: BTreeMap<String, usize>,
    pub active_transitions: Vec<BiomeTransition>,
    pub regions: Vec<RegionSnapshot>,
    /// Global availability ratio per resource name.
    pub global_resources: BTreeMap<String, f32>,
    pub populations: BTreeMap<String, PopulationSnapshot>,
    pub active_catastrophes: Vec<CatastropheSummary>,
    pub health: Option<HealthSnapshot>,
    pub resilience: f32,
}

/// All simulation state. Each field has exactly one writing engine; the
/// rest read it during their own ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    time: f64,
    pub(crate) grid: RegionalGrid,
    pub(crate) climate: ClimateState,
    pub(crate) biomes: BiomeStates,
    pub(crate) resources: ResourceLedgers,
    pub(crate) species: SpeciesRegistry,
    pub(crate) catastrophes: CatastropheLog,
    pub(crate) overrides: CatastropheOverrides,
    pub(crate) health: HealthState,
    pub(crate) commands: CommandQueue,
    pub(crate) events: EventQueue,
}

impl World {
    pub fn new(grid: RegionalGrid, config: &SimulationConfig) -> Self {
        let regions = grid.len();
        let resources = ResourceLedgers::new(
            grid.regions().iter().map(|r| r.biome),
            config.resource.capacity_scale,
            config.resource.initial_quality,
        );
        Self {
            time: 0.0,
            biomes: BiomeStates::new(regions),
            resources,
            species: SpeciesRegistry::new(regions),
            catastrophes: CatastropheLog::default(),
            overrides: CatastropheOverrides::new(regions),
            health: HealthState::new(config.health.history_length),
            commands: CommandQueue::default(),
            events: EventQueue::default(),
            climate: ClimateState::default(),
            grid,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub(crate) fn set_time(&mut self, time: f64) {
        self.time = self.time.max(time);
    }

    pub fn grid(&self) -> &RegionalGrid {
        &self.grid
    }

    pub fn climate(&self) -> &ClimateState {
        &self.climate
    }

    #[cfg(test)]
    pub(crate) fn climate_mut(&mut self) -> &mut ClimateState {
        &mut self.climate
    }

    pub fn current_season(&self) -> SeasonType {
        self.climate.season
    }

    pub fn season_progress(&self) -> f32 {
        self.climate.season_progress
    }

    pub fn active_weather(&self) -> &[WeatherPattern] {
        &self.climate.active_weather
    }

    pub fn local_conditions(&self, region: RegionId) -> Option<LocalConditions> {
        self.grid
            .region(region)
            .map(|r| self.climate.local_conditions(r))
    }

    pub fn biomes(&self) -> &BiomeStates {
        &self.biomes
    }

    pub fn resources(&self) -> &ResourceLedgers {
        &self.resources
    }

    #[cfg(test)]
    pub(crate) fn ledger_mut(&mut self, region: RegionId, kind: ResourceType) -> Option<&mut crate::components::resource::ResourceLedger> {
        self.resources.get_mut(region, kind)
    }

    /// Takes up to `amount` from a ledger, returning what was consumed.
    #[cfg(test)]
    pub(crate) fn consume(&mut self, region: RegionId, kind: ResourceType, amount: f32) -> f32 {
        self.resources.consume(region, kind, amount)
    }

    pub fn species(&self) -> &SpeciesRegistry {
        &self.species
    }

    pub fn catastrophes(&self) -> &CatastropheLog {
        &self.catastrophes
    }

    pub fn overrides(&self) -> &CatastropheOverrides {
        &self.overrides
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    pub fn pending_events(&self) -> &EventQueue {
        &self.events
    }

    /// Registers a species immediately, outside the command queue.
    pub fn register_species(&mut self, definition: &SpeciesDefinition) -> Result<SpeciesId, CommandError> {
        validate_definition(definition)?;
        if self.species.contains_key(&definition.id) {
            return Err(CommandError::DuplicateSpecies(definition.id.clone()));
        }
        let id = self
            .species
            .register(SpeciesPopulation::from_definition(definition));
        self.refresh_presence();
        Ok(id)
    }

    /// Recounts, per region, the living species that prefer its biome.
    pub(crate) fn refresh_presence(&mut self) {
        let presence = self
            .grid
            .regions()
            .iter()
            .map(|region| {
                self.species
                    .iter()
                    .filter(|(_, p)| p.is_alive() && p.prefers(region.biome))
                    .count()
                    .min(u16::MAX as usize) as u16
            })
            .collect();
        self.species.set_presence(presence);
    }

    /// Validates a command and queues it for its owning engine.
    pub fn submit(&mut self, command: Command) -> Result<(), CommandError> {
        match &command {
            Command::TriggerCatastropheAt { region, intensity, .. } => {
                self.require_region(*region)?;
                unit_range("intensity", *intensity)?;
                let queued = self
                    .commands
                    .pending(EngineKind::Catastrophe)
                    .iter()
                    .any(|c| matches!(c, Command::TriggerCatastropheAt { region: r, .. } if r == region));
                if queued || self.catastrophes.is_region_affected(*region) {
                    return Err(CommandError::RegionAffected(*region));
                }
            }
            Command::ForceTransition { region, .. } => {
                self.require_region(*region)?;
            }
            Command::SetCatastropheProbability { probability, .. } => {
                unit_range("probability", *probability)?;
            }
            Command::RegisterSpecies(definition) => {
                validate_definition(definition)?;
                let queued = self
                    .commands
                    .pending(EngineKind::Species)
                    .iter()
                    .any(|c| matches!(c, Command::RegisterSpecies(d) if d.id == definition.id));
                if queued || self.species.contains_key(&definition.id) {
                    return Err(CommandError::DuplicateSpecies(definition.id.clone()));
                }
            }
            Command::AddResourceSource {
                region,
                amount,
                quality,
                ..
            } => {
                self.require_region(*region)?;
                if !(amount.is_finite() && *amount >= 0.0) {
                    return Err(CommandError::OutOfRange {
                        field: "amount",
                        value: *amount,
                    });
                }
                unit_range("quality", *quality)?;
            }
            Command::SetHealthIndicator { name, value } => {
                if HealthIndicator::from_name(name).is_none() {
                    return Err(CommandError::UnknownIndicator(name.clone()));
                }
                unit_range("value", *value)?;
            }
        }
        self.commands.push(command);
        Ok(())
    }

    fn require_region(&self, region: RegionId) -> Result<(), CommandError> {
        if self.grid.contains(region) {
            Ok(())
        } else {
            Err(CommandError::UnknownRegion(region))
        }
    }

    pub fn total_population(&self) -> f32 {
        self.species.iter().map(|(_, p)| p.current).sum()
    }

    pub fn snapshot(&self, scenario: &str) -> SimulationSnapshot {
        let climate = &self.climate;
        let biome_distribution = self
            .grid
            .biome_distribution()
            .iter()
            .zip(BiomeType::ALL)
            .filter(|(count, _)| **count > 0)
            .map(|(count, biome)| (biome.name().to_string(), *count))
            .collect();
        let regions = self
            .grid
            .ids()
            .filter_map(|id| {
                let region = self.grid.region(id)?;
                let state = self.biomes.get(id);
                let ledgers = self.resources.region(id);
                Some(RegionSnapshot {
                    id: id.0,
                    x: region.coordinates.x,
                    y: region.coordinates.y,
                    biome: region.biome,
                    climate_zone: region.climate_zone,
                    phase: state.map(|s| s.phase).unwrap_or(BiomePhase::Stable),
                    fitness: state.map(|s| s.fitness).unwrap_or(1.0),
                    resources: ledgers
                        .map(|l| std::array::from_fn(|i| l[i].ratio()))
                        .unwrap_or([0.0; ResourceType::COUNT]),
                    catastrophe_severity: self.overrides.region(id).severity,
                    health: self.health.regional().get(id.index()).copied().unwrap_or(1.0),
                })
            })
            .collect();
        let global_resources = ResourceType::ALL
            .iter()
            .map(|kind| (kind.to_string(), self.resources.global_ratio(*kind)))
            .collect();
        let populations = self
            .species
            .iter()
            .map(|(_, p)| {
                (
                    p.id.clone(),
                    PopulationSnapshot {
                        name: p.name.clone(),
                        trophic_level: p.trophic_level,
                        current: p.current,
                        max: p.max,
                        extinct: p.extinct,
                    },
                )
            })
            .collect();
        let active_catastrophes = self
            .catastrophes
            .active()
            .iter()
            .map(|e| CatastropheSummary {
                id: e.id,
                kind: e.kind,
                epicenter: e.epicenter.0,
                state: e.state,
                intensity: e.intensity,
                remaining: e.remaining,
                recovery_progress: if e.state == CatastropheState::Recovering {
                    e.recovery_progress()
                } else {
                    0.0
                },
                affected_regions: e.affected.len(),
            })
            .collect();
        SimulationSnapshot {
            scenario: scenario.to_string(),
            time: self.time,
            climate: ClimateSummary {
                global_temperature: climate.global_temperature,
                sea_level: climate.sea_level,
                atmospheric_co2: climate.atmospheric_co2,
                humidity: climate.humidity,
                precipitation: climate.precipitation,
                stability: climate.stability,
                season: climate.season,
                season_progress: climate.season_progress,
            },
            weather: climate.active_weather.clone(),
            biome_distribution,
            active_transitions: self.biomes.active_transitions(),
            regions,
            global_resources,
            populations,
            active_catastrophes,
            health: self.health.latest().cloned(),
            resilience: self.health.resilience(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(RegionalGrid::new(4, 4, BiomeType::Grassland), &SimulationConfig::default())
    }

    fn deer() -> SpeciesDefinition {
        SpeciesDefinition {
            id: "deer".into(),
            name: Some("Red deer".into()),
            trophic_level: TrophicLevel::PrimaryConsumer,
            preferred_biomes: vec![BiomeType::Grassland],
            primary_resources: vec![ResourceType::Vegetation],
            territoriality: 0.2,
            aggression: 0.1,
            initial_population: 50.0,
            max_population: 200.0,
            growth_rate: 0.01,
        }
    }

    #[test]
    fn registration_updates_presence() {
        let mut world = world();
        world.register_species(&deer()).unwrap();
        assert_eq!(world.species().presence_at(0), 1);
        assert_eq!(
            world.register_species(&deer()),
            Err(CommandError::DuplicateSpecies("deer".into()))
        );
    }

    #[test]
    fn submit_validates_commands() {
        let mut world = world();
        assert_eq!(
            world.submit(Command::ForceTransition {
                region: RegionId(99),
                biome: BiomeType::Desert,
            }),
            Err(CommandError::UnknownRegion(RegionId(99)))
        );
        assert_eq!(
            world.submit(Command::SetHealthIndicator {
                name: "vibes".into(),
                value: 0.5,
            }),
            Err(CommandError::UnknownIndicator("vibes".into()))
        );
        world
            .submit(Command::TriggerCatastropheAt {
                kind: CatastropheKind::Flood,
                region: RegionId(3),
                intensity: 0.5,
            })
            .unwrap();
        assert_eq!(
            world.submit(Command::TriggerCatastropheAt {
                kind: CatastropheKind::Wildfire,
                region: RegionId(3),
                intensity: 0.5,
            }),
            Err(CommandError::RegionAffected(RegionId(3)))
        );
        world.submit(Command::RegisterSpecies(deer())).unwrap();
        assert!(world.submit(Command::RegisterSpecies(deer())).is_err());
        assert_eq!(world.commands().len(), 2);
    }

    #[test]
    fn snapshot_reports_distribution_and_resources() {
        let mut world = world();
        world.register_species(&deer()).unwrap();
        let snapshot = world.snapshot("test");
        assert_eq!(snapshot.biome_distribution.get("grassland"), Some(&16));
        assert_eq!(snapshot.regions.len(), 16);
        assert_eq!(snapshot.populations["deer"].current, 50.0);
        assert_eq!(snapshot.global_resources["Water"], 1.0);
        assert!(snapshot.health.is_none());
    }

    #[test]
    fn world_round_trips_through_json() {
        let mut world = world();
        world.register_species(&deer()).unwrap();
        let json = serde_json::to_string(&world).unwrap();
        let restored: World = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.species().len(), 1);
        assert_eq!(restored.grid().len(), 16);
    }
}
