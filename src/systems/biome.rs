use anyhow::Result;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    commands::Command,
    components::biome::{BiomePhase, BiomeTransition, BiomeType, EnvironmentalFitness, TransitionTable},
    components::climate::LocalConditions,
    config::BiomeConfig,
    engine::{System, SystemContext},
    events::{EngineKind, SimEvent},
    rng::{RngExt, SystemRng},
    spatial::RegionId,
    world::World,
};

/// Per-region Stable / Stressed / Transitioning state machine.
pub struct BiomeSystem {
    config: BiomeConfig,
    table: TransitionTable,
    interval: f64,
}

impl BiomeSystem {
    pub fn new(config: BiomeConfig, interval: f64) -> Self {
        Self {
            table: config.transition_table(),
            config,
            interval,
        }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Fitness of `biome` under `conditions` in `region`, with biodiversity,
    /// soil and catastrophe stress applied.
    pub fn fitness(&self, world: &World, region: RegionId, biome: BiomeType, conditions: &LocalConditions) -> f32 {
        let environmental = EnvironmentalFitness::evaluate(biome, conditions, &self.config.tolerance).mean();
        let biodiversity =
            (world.species.presence_at(region.index()) as f32 / self.config.biodiversity_saturation).min(1.0);
        let soil = world.resources.region_quality(region);
        let boost = 1.0 + self.config.biodiversity_weight * biodiversity + self.config.soil_weight * (soil - 0.5);
        let stress = world.overrides.region(region).biome_stress;
        (environmental * boost * (1.0 - stress)).clamp(0.0, 1.0)
    }

    fn apply_commands(&self, world: &mut World) {
        for command in world.commands.take(EngineKind::Biome) {
            let (region, biome) = match command {
                Command::ForceTransition { region, biome } => (region, biome),
                other => {
                    debug!(command = ?other, "command not handled by biome engine");
                    continue;
                }
            };
            let Some(from) = world.grid.biome(region) else {
                continue;
            };
            let Some(state) = world.biomes.get_mut(region) else {
                continue;
            };
            if from == biome {
                state.transition = None;
                state.phase = BiomePhase::Stable;
                continue;
            }
            state.transition = Some(BiomeTransition {
                region,
                from,
                to: biome,
                progress: 0.0,
                required_duration: 0.0,
                forced: true,
            });
            state.phase = BiomePhase::Transitioning;
            info!(region = region.0, from = %from, to = %biome, "forced biome transition");
            world.events.push(SimEvent::BiomeTransitionStarted {
                region,
                from,
                to: biome,
                duration: 0.0,
                forced: true,
            });
        }
    }

    /// Rolls every candidate in ordinal order and keeps the passing roll with
    /// the highest adjusted probability. Ties keep the lower ordinal.
    fn select_candidate<R: Rng + ?Sized>(
        &self,
        world: &World,
        region: RegionId,
        from: BiomeType,
        conditions: &LocalConditions,
        rng: &mut R,
    ) -> Option<BiomeType> {
        let mut best: Option<(BiomeType, f32)> = None;
        for (candidate, weight) in self.table.candidates(from) {
            let candidate_fitness = self.fitness(world, region, candidate, conditions);
            let adjusted = (weight * candidate_fitness * self.config.environmental_sensitivity).clamp(0.0, 1.0);
            let roll: f32 = rng.gen();
            if roll < adjusted && best.map_or(true, |(_, p)| adjusted > p) {
                best = Some((candidate, adjusted));
            }
        }
        best.map(|(biome, _)| biome)
    }

    fn commit(world: &mut World, transition: &BiomeTransition) {
        world.grid.set_biome(transition.region, transition.to);
        if let Some(state) = world.biomes.get_mut(transition.region) {
            state.transition = None;
            state.phase = BiomePhase::Stable;
        }
        info!(
            region = transition.region.0,
            from = %transition.from,
            to = %transition.to,
            "biome transition completed"
        );
        world.events.push(SimEvent::BiomeTransitionCompleted {
            region: transition.region,
            from: transition.from,
            to: transition.to,
        });
    }
}

impl System for BiomeSystem {
    fn kind(&self) -> EngineKind {
        EngineKind::Biome
    }

    fn interval(&self) -> f64 {
        self.interval
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World, rng: &mut SystemRng<'_>) -> Result<()> {
        self.apply_commands(world);
        let ids: Vec<RegionId> = world.grid.ids().collect();
        for id in ids {
            let open = world
                .biomes
                .get_mut(id)
                .and_then(|state| state.transition.as_mut())
                .map(|transition| (transition.advance(ctx.dt), transition.clone()));
            if let Some((complete, transition)) = open {
                if complete {
                    Self::commit(world, &transition);
                }
                continue;
            }

            let (Some(biome), Some(conditions)) = (world.grid.biome(id), world.local_conditions(id)) else {
                continue;
            };
            let fitness = self.fitness(world, id, biome, &conditions);
            let stressed = fitness < self.config.stability_threshold;
            let selected = if stressed {
                self.select_candidate(world, id, biome, &conditions, rng)
            } else {
                None
            };
            let duration = selected.map(|_| {
                rng.uniform(self.config.min_transition_duration, self.config.max_transition_duration)
            });

            let Some(state) = world.biomes.get_mut(id) else {
                continue;
            };
            state.fitness = fitness;
            match (selected, duration) {
                (Some(to), Some(duration)) => {
                    state.phase = BiomePhase::Transitioning;
                    state.transition = Some(BiomeTransition {
                        region: id,
                        from: biome,
                        to,
                        progress: 0.0,
                        required_duration: duration,
                        forced: false,
                    });
                    debug!(region = id.0, from = %biome, to = %to, duration, "biome transition started");
                    world.events.push(SimEvent::BiomeTransitionStarted {
                        region: id,
                        from: biome,
                        to,
                        duration,
                        forced: false,
                    });
                }
                _ if stressed => state.phase = BiomePhase::Stressed,
                _ => state.phase = BiomePhase::Stable,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::rng::RngManager;
    use crate::spatial::RegionalGrid;

    fn tick(system: &mut BiomeSystem, world: &mut World, rng: &mut RngManager, dt: f32) {
        let ctx = SystemContext {
            time: world.time(),
            dt,
            scenario_name: "test",
        };
        system.run(&ctx, world, &mut rng.stream("biome")).unwrap();
    }

    fn desert_world() -> World {
        let mut world = World::new(RegionalGrid::new(1, 1, BiomeType::Desert), &SimulationConfig::default());
        let climate = world.climate_mut();
        climate.global_temperature = 28.0;
        climate.seasonal_temperature_offset = 0.0;
        climate.humidity = 0.1;
        climate.precipitation = 0.1;
        world
    }

    #[test]
    fn fit_desert_does_not_transition() {
        let mut system = BiomeSystem::new(BiomeConfig::default(), 10.0);
        let mut world = desert_world();
        let mut rng = RngManager::new(11);
        for _ in 0..20 {
            tick(&mut system, &mut world, &mut rng, 10.0);
        }
        let state = world.biomes().get(RegionId(0)).unwrap();
        assert!(state.fitness >= 0.9);
        assert_eq!(state.phase, BiomePhase::Stable);
        assert!(state.transition.is_none());
        assert_eq!(world.grid().biome(RegionId(0)), Some(BiomeType::Desert));
    }

    #[test]
    fn unfit_biome_eventually_transitions() {
        let config = BiomeConfig {
            min_transition_duration: 20.0,
            max_transition_duration: 20.0,
            ..BiomeConfig::default()
        };
        let mut system = BiomeSystem::new(config, 10.0);
        let mut world = desert_world();
        let climate = world.climate_mut();
        climate.global_temperature = 24.0;
        climate.humidity = 0.6;
        climate.precipitation = 0.6;
        let mut rng = RngManager::new(5);
        let mut last_progress = 0.0;
        let mut started = false;
        for _ in 0..200 {
            tick(&mut system, &mut world, &mut rng, 10.0);
            if let Some(t) = &world.biomes().get(RegionId(0)).unwrap().transition {
                started = true;
                assert!(t.progress >= last_progress);
                last_progress = t.progress;
            }
            if world.grid().biome(RegionId(0)) != Some(BiomeType::Desert) {
                break;
            }
        }
        assert!(started);
        assert_ne!(world.grid().biome(RegionId(0)), Some(BiomeType::Desert));
        assert!(world.biomes().get(RegionId(0)).unwrap().transition.is_none());
    }

    #[test]
    fn forced_transition_commits_next_tick() {
        let mut system = BiomeSystem::new(BiomeConfig::default(), 10.0);
        let mut world = desert_world();
        world
            .submit(Command::ForceTransition {
                region: RegionId(0),
                biome: BiomeType::Wetland,
            })
            .unwrap();
        let mut rng = RngManager::new(1);
        tick(&mut system, &mut world, &mut rng, 10.0);
        assert_eq!(world.grid().biome(RegionId(0)), Some(BiomeType::Wetland));
        let names: Vec<&str> = world.events.drain().map(|e| e.name()).collect();
        assert_eq!(names, vec!["BiomeTransitionStarted", "BiomeTransitionCompleted"]);
    }

    #[test]
    fn empty_table_row_never_transitions() {
        let config = BiomeConfig {
            transitions: vec![crate::config::TransitionWeight {
                from: "desert".into(),
                to: "nowhere".into(),
                weight: 1.0,
            }],
            ..BiomeConfig::default()
        };
        let mut system = BiomeSystem::new(config, 10.0);
        let mut world = desert_world();
        let climate = world.climate_mut();
        climate.global_temperature = -20.0;
        climate.humidity = 0.9;
        climate.precipitation = 0.9;
        let mut rng = RngManager::new(2);
        for _ in 0..50 {
            tick(&mut system, &mut world, &mut rng, 10.0);
        }
        let state = world.biomes().get(RegionId(0)).unwrap();
        assert_eq!(state.phase, BiomePhase::Stressed);
        assert!(state.transition.is_none());
    }
}
