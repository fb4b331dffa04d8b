use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    commands::Command,
    components::biome::BiomePhase,
    components::health::{shannon_evenness, trophic_balance, AlertLevel, HealthIndicator, HealthSnapshot},
    components::resource::ResourceType,
    components::species::TrophicLevel,
    config::HealthConfig,
    engine::{System, SystemContext},
    events::{EngineKind, SimEvent},
    rng::SystemRng,
    world::World,
};

/// Living species count at which richness saturates.
const RICHNESS_SATURATION: f32 = 10.0;
const OVERALL_WEIGHTS: [f32; 5] = [0.25, 0.20, 0.20, 0.20, 0.15];

/// Read-only assessment of the whole world, feeding back into catastrophe
/// trigger odds through the published history.
pub struct HealthSystem {
    config: HealthConfig,
    interval: f64,
}

impl HealthSystem {
    pub fn new(config: HealthConfig, interval: f64) -> Self {
        Self { config, interval }
    }

    fn apply_commands(world: &mut World) {
        for command in world.commands.take(EngineKind::Health) {
            match command {
                Command::SetHealthIndicator { name, value } => match HealthIndicator::from_name(&name) {
                    Some(indicator) => {
                        world.health.pinned[indicator.index()] = Some(value.clamp(0.0, 1.0));
                        info!(indicator = %indicator, value, "health indicator pinned");
                    }
                    None => warn!(name = %name, "unknown health indicator"),
                },
                other => debug!(command = ?other, "command not handled by health engine"),
            }
        }
    }

    fn genetic_diversity(&self, world: &World) -> f32 {
        world
            .health
            .pinned(HealthIndicator::GeneticDiversity)
            .unwrap_or(self.config.genetic_diversity_placeholder)
    }

    fn biodiversity(&self, world: &World) -> f32 {
        let living: Vec<f32> = world
            .species
            .iter()
            .filter(|(_, p)| p.is_alive())
            .map(|(_, p)| p.current)
            .collect();
        let richness = (living.len() as f32 / RICHNESS_SATURATION).min(1.0);
        0.4 * richness + 0.4 * shannon_evenness(&living) + 0.2 * self.genetic_diversity(world)
    }

    fn trophic(world: &World) -> f32 {
        let mut totals = [0.0f32; TrophicLevel::COUNT];
        for (_, population) in world.species.iter().filter(|(_, p)| p.is_alive()) {
            totals[population.trophic_level.index()] += population.current;
        }
        trophic_balance(&totals)
    }

    /// Utilisation closeness to target, survival rate and mean availability.
    fn resource_sustainability(&self, world: &World) -> f32 {
        let (mut consumption, mut regen) = (0.0f32, 0.0f32);
        for (_, ledgers) in world.resources.iter() {
            for ledger in ledgers.iter().filter(|l| l.renewable) {
                consumption += ledger.consumption_rate;
                regen += ledger.regen_rate * ledger.seasonal_modifier;
            }
        }
        let utilisation = if regen > 0.0 {
            (consumption / regen).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let target = self.config.target_utilisation;
        let closeness = 1.0 - (utilisation - target).abs() / target.max(1.0 - target).max(f32::EPSILON);

        let total = world.species.len();
        let extinction_rate = if total == 0 {
            0.0
        } else {
            world.species.extinct_count() as f32 / total as f32
        };
        let availability = ResourceType::ALL
            .iter()
            .map(|kind| world.resources.global_ratio(*kind))
            .sum::<f32>()
            / ResourceType::COUNT as f32;
        (0.3 * closeness.clamp(0.0, 1.0) + 0.3 * (1.0 - extinction_rate) + 0.4 * availability).clamp(0.0, 1.0)
    }

    fn population_stability(&self, world: &World) -> f32 {
        let occupancies: Vec<f32> = world
            .species
            .iter()
            .filter(|(_, p)| p.is_alive())
            .map(|(_, p)| p.pressure())
            .collect();
        if occupancies.is_empty() {
            return 0.5;
        }
        let target = self.config.target_occupancy;
        let spread = target.max(1.0 - target).max(f32::EPSILON);
        let deviation = occupancies.iter().map(|o| (o - target).abs()).sum::<f32>() / occupancies.len() as f32;
        (1.0 - deviation / spread).clamp(0.0, 1.0)
    }

    fn habitat_quality(world: &World) -> f32 {
        let regions = world.biomes.len();
        let pressure = if regions == 0 {
            0.0
        } else {
            (world.biomes.count_in(BiomePhase::Stressed) + world.biomes.count_in(BiomePhase::Transitioning)) as f32
                / regions as f32
        };
        let stability = world.climate.stability.clamp(0.0, 1.0);
        (0.4 * (1.0 - pressure) + 0.3 * stability + 0.3 * world.grid.contiguity()).clamp(0.0, 1.0)
    }

    fn regional(world: &World) -> Vec<f32> {
        world
            .grid
            .ids()
            .map(|id| {
                let resources = world.resources.region_ratio(id);
                let fitness = world.biomes.get(id).map_or(1.0, |s| s.fitness);
                let calm = 1.0 - world.overrides.region(id).severity;
                ((resources + fitness + calm) / 3.0).clamp(0.0, 1.0)
            })
            .collect()
    }

    fn describe(&self, world: &World, snapshot: &mut HealthSnapshot) {
        for (indicator, score) in snapshot.sub_scores() {
            if score < self.config.warning_threshold {
                snapshot.threats.push(format!("low {}", indicator.name().replace('_', " ")));
            } else if score >= 0.8 {
                snapshot
                    .opportunities
                    .push(format!("strong {}", indicator.name().replace('_', " ")));
            }
        }
        for event in world.catastrophes.active() {
            snapshot
                .threats
                .push(format!("{} around region {}", event.kind, event.epicenter.0));
        }
        for kind in ResourceType::ALL {
            let ratio = world.resources.global_ratio(kind);
            if ratio < 0.25 {
                snapshot.threats.push(format!("scarce {}", kind.to_string().to_lowercase()));
            } else if ratio > 0.9 && kind.renewable() {
                snapshot
                    .opportunities
                    .push(format!("abundant {}", kind.to_string().to_lowercase()));
            }
        }
        if world.catastrophes.active().is_empty() && world.climate.stability > 0.8 {
            snapshot.opportunities.push("calm climate".to_string());
        }
    }

    pub fn assess(&self, world: &World) -> HealthSnapshot {
        let mut scores = [
            self.biodiversity(world),
            Self::trophic(world),
            self.resource_sustainability(world),
            self.population_stability(world),
            Self::habitat_quality(world),
        ];
        for (score, indicator) in scores.iter_mut().zip(HealthIndicator::ALL) {
            if let Some(pinned) = world.health.pinned(indicator) {
                *score = pinned;
            }
            *score = score.clamp(0.0, 1.0);
        }
        let overall = scores
            .iter()
            .zip(OVERALL_WEIGHTS)
            .map(|(score, weight)| score * weight)
            .sum::<f32>()
            .clamp(0.0, 1.0);
        let mut snapshot = HealthSnapshot {
            biodiversity_index: scores[0],
            trophic_balance: scores[1],
            resource_sustainability: scores[2],
            population_stability: scores[3],
            habitat_quality: scores[4],
            overall_score: overall,
            threats: Vec::new(),
            opportunities: Vec::new(),
            timestamp: world.time(),
        };
        self.describe(world, &mut snapshot);
        snapshot
    }

    fn level(&self, score: f32) -> AlertLevel {
        if score < self.config.critical_threshold {
            AlertLevel::Critical
        } else if score < self.config.warning_threshold {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }

    /// Emits a warning or critical event whenever an indicator enters that
    /// band.
    fn raise_alerts(&self, world: &mut World, snapshot: &HealthSnapshot) {
        let mut scored: Vec<(Option<HealthIndicator>, f32)> = vec![(None, snapshot.overall_score)];
        scored.extend(snapshot.sub_scores().iter().map(|(i, s)| (Some(*i), *s)));
        for (slot, (indicator, score)) in scored.into_iter().enumerate() {
            let level = self.level(score);
            if level == world.health.alerts[slot] {
                continue;
            }
            world.health.alerts[slot] = level;
            let event = match level {
                AlertLevel::Critical => SimEvent::HealthCritical { indicator, score },
                AlertLevel::Warning => SimEvent::HealthWarning { indicator, score },
                AlertLevel::Normal => continue,
            };
            debug!(indicator = ?indicator, score, "health alert");
            world.events.push(event);
        }
    }
}

impl System for HealthSystem {
    fn kind(&self) -> EngineKind {
        EngineKind::Health
    }

    fn interval(&self) -> f64 {
        self.interval
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World, _rng: &mut SystemRng<'_>) -> Result<()> {
        Self::apply_commands(world);
        let snapshot = self.assess(world);
        world.health.set_regional(Self::regional(world));
        world.health.push(snapshot.clone());
        let resilience = world.health.resilience();
        world.events.push(SimEvent::HealthAssessed {
            overall: snapshot.overall_score,
            resilience,
        });
        self.raise_alerts(world, &snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::biome::BiomeType;
    use crate::components::species::SpeciesDefinition;
    use crate::config::SimulationConfig;
    use crate::rng::RngManager;
    use crate::spatial::RegionalGrid;

    fn world() -> World {
        World::new(RegionalGrid::new(4, 4, BiomeType::Grassland), &SimulationConfig::default())
    }

    fn add(world: &mut World, id: &str, level: TrophicLevel, current: f32) {
        world
            .register_species(&SpeciesDefinition {
                id: id.into(),
                name: None,
                trophic_level: level,
                preferred_biomes: vec![BiomeType::Grassland],
                primary_resources: vec![ResourceType::Vegetation],
                territoriality: 0.1,
                aggression: 0.3,
                initial_population: current,
                max_population: 100.0,
                growth_rate: 0.01,
            })
            .unwrap();
    }

    fn tick(system: &mut HealthSystem, world: &mut World) {
        let mut rng = RngManager::new(0);
        let ctx = SystemContext {
            time: world.time(),
            dt: 30.0,
            scenario_name: "test",
        };
        system.run(&ctx, world, &mut rng.stream("health")).unwrap();
    }

    fn balanced_world() -> World {
        let mut world = world();
        add(&mut world, "grass", TrophicLevel::Producer, 50.0);
        add(&mut world, "rabbit", TrophicLevel::PrimaryConsumer, 30.0);
        add(&mut world, "fox", TrophicLevel::SecondaryConsumer, 15.0);
        add(&mut world, "eagle", TrophicLevel::TertiaryConsumer, 5.0);
        world
    }

    #[test]
    fn scores_stay_in_unit_range() {
        let system = HealthSystem::new(HealthConfig::default(), 30.0);
        for world in [world(), balanced_world()] {
            let snapshot = system.assess(&world);
            for (_, score) in snapshot.sub_scores() {
                assert!((0.0..=1.0).contains(&score));
            }
            assert!((0.0..=1.0).contains(&snapshot.overall_score));
        }
    }

    #[test]
    fn ideal_pyramid_balances_trophic_levels() {
        let system = HealthSystem::new(HealthConfig::default(), 30.0);
        let snapshot = system.assess(&balanced_world());
        assert!((snapshot.trophic_balance - 1.0).abs() < 1e-5);
        assert!(snapshot.biodiversity_index > system.assess(&world()).biodiversity_index);
    }

    #[test]
    fn assessment_is_recorded_and_announced() {
        let mut system = HealthSystem::new(HealthConfig::default(), 30.0);
        let mut world = balanced_world();
        tick(&mut system, &mut world);
        tick(&mut system, &mut world);
        assert_eq!(world.health().len(), 2);
        assert_eq!(world.health().regional().len(), 16);
        let names: Vec<&str> = world.events.drain().map(|e| e.name()).collect();
        assert_eq!(names.iter().filter(|n| **n == "HealthAssessed").count(), 2);
    }

    #[test]
    fn pinned_indicator_triggers_critical_once() {
        let mut system = HealthSystem::new(HealthConfig::default(), 30.0);
        let mut world = balanced_world();
        world
            .submit(Command::SetHealthIndicator {
                name: "habitat quality".into(),
                value: 0.05,
            })
            .unwrap();
        tick(&mut system, &mut world);
        assert_eq!(world.health().latest().unwrap().habitat_quality, 0.05);
        let critical = |world: &mut World| {
            world
                .events
                .drain()
                .filter(|e| {
                    matches!(
                        e,
                        SimEvent::HealthCritical {
                            indicator: Some(HealthIndicator::HabitatQuality),
                            ..
                        }
                    )
                })
                .count()
        };
        assert_eq!(critical(&mut world), 1);
        tick(&mut system, &mut world);
        assert_eq!(critical(&mut world), 0);
    }

    #[test]
    fn pins_and_alert_bands_survive_a_restore() {
        let mut world = balanced_world();
        world
            .submit(Command::SetHealthIndicator {
                name: "population_stability".into(),
                value: 0.02,
            })
            .unwrap();
        tick(&mut HealthSystem::new(HealthConfig::default(), 30.0), &mut world);
        world.events.drain();

        let json = serde_json::to_string(&world).unwrap();
        let mut restored: World = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.health().pinned(HealthIndicator::PopulationStability), Some(0.02));

        tick(&mut HealthSystem::new(HealthConfig::default(), 30.0), &mut restored);
        assert_eq!(restored.health().latest().unwrap().population_stability, 0.02);
        let repeated = restored
            .events
            .drain()
            .filter(|e| {
                matches!(
                    e,
                    SimEvent::HealthCritical {
                        indicator: Some(HealthIndicator::PopulationStability),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(repeated, 0);
    }

    #[test]
    fn catastrophes_are_listed_as_threats() {
        let system = HealthSystem::new(HealthConfig::default(), 30.0);
        let mut world = balanced_world();
        world.catastrophes.active.push(crate::components::catastrophe::CatastropheEvent::new(
            1,
            crate::components::catastrophe::CatastropheKind::Flood,
            crate::spatial::RegionId(2),
            crate::spatial::Coord::new(2, 0),
            2.0,
            0.5,
            60.0,
            &Default::default(),
            0.0,
        ));
        let snapshot = system.assess(&world);
        assert!(snapshot.threats.iter().any(|t| t == "flood around region 2"));
        assert!(!snapshot.opportunities.iter().any(|o| o == "calm climate"));
    }
}
