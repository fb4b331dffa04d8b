use anyhow::Result;
use rand::distributions::{Distribution, WeightedIndex};
use tracing::{debug, info, warn};

use crate::{
    commands::Command,
    components::catastrophe::{
        falloff, CatastropheEvent, CatastropheKind, CatastropheState, PermanentAdjustment,
    },
    config::CatastropheConfig,
    engine::{System, SystemContext},
    events::{EngineKind, SimEvent},
    rng::{RngExt, SystemRng},
    spatial::RegionId,
    world::World,
};

/// Catastrophe triggering and the Dormant → Resolved lifecycle. Publishes
/// the override table every other engine reads.
pub struct CatastropheSystem {
    config: CatastropheConfig,
    interval: f64,
}

impl CatastropheSystem {
    pub fn new(config: CatastropheConfig, interval: f64) -> Self {
        Self { config, interval }
    }

    pub fn config(&self) -> &CatastropheConfig {
        &self.config
    }

    /// Probability that `kind` triggers at the next check.
    pub fn trigger_probability(&self, world: &World, kind: CatastropheKind) -> f32 {
        let Some(settings) = self.config.type_config(kind) else {
            return 0.0;
        };
        let base = world
            .catastrophes
            .probability_override(kind)
            .unwrap_or(settings.base_probability);
        let seasonal = settings.seasonal_modifier(world.climate.season);
        let stability = world.climate.stability.clamp(0.0, 1.0);
        let instability = 1.0 + (1.0 - stability) * self.config.instability_weight;
        let health = world
            .health
            .mean_overall()
            .map_or(1.0, |mean| 1.0 + (1.0 - mean.clamp(0.0, 1.0)) * self.config.health_deficit_weight);
        let dampening = 1.0 / (1.0 + world.catastrophes.memory(kind));
        (base * seasonal * instability * health * dampening)
            .clamp(0.0, self.config.max_trigger_probability)
    }

    fn next_id(world: &World) -> u64 {
        (world.catastrophes.active.len() + world.catastrophes.archive.len()) as u64 + 1
    }

    fn is_available(world: &World, region: RegionId) -> bool {
        !world.catastrophes.is_region_affected(region)
    }

    /// Opens an event centred on `epicenter`. Intensity is sampled when not
    /// given.
    fn spawn(
        &self,
        world: &mut World,
        kind: CatastropheKind,
        epicenter: RegionId,
        intensity: Option<f32>,
        rng: &mut SystemRng<'_>,
    ) {
        let Some(settings) = self.config.type_config(kind) else {
            warn!(kind = %kind, "no configuration for catastrophe kind");
            return;
        };
        let Some(coord) = world.grid.region(epicenter).map(|r| r.coordinates) else {
            return;
        };
        let intensity = intensity
            .unwrap_or_else(|| rng.uniform(settings.min_intensity, settings.max_intensity))
            .clamp(0.0, 1.0);
        let duration = rng.uniform(settings.min_duration, settings.max_duration);
        let radius = rng.uniform(settings.min_radius, settings.max_radius);
        let id = Self::next_id(world);
        let mut event = CatastropheEvent::new(
            id,
            kind,
            epicenter,
            coord,
            radius,
            intensity,
            duration,
            &settings.effects,
            world.time(),
        );
        event.state = CatastropheState::Triggered;
        event.affected = affected_regions(world, &event);
        world.catastrophes.memory[kind.index()] += 1.0;

        info!(id, kind = %kind, region = epicenter.0, intensity, radius, duration, "catastrophe triggered");
        world.events.push(SimEvent::CatastropheTriggered {
            id,
            kind,
            epicenter,
            intensity: event.intensity,
            radius: event.radius,
            duration: event.duration,
        });
        world.catastrophes.active.push(event);
    }

    fn apply_commands(&self, world: &mut World, rng: &mut SystemRng<'_>) {
        for command in world.commands.take(EngineKind::Catastrophe) {
            match command {
                Command::TriggerCatastropheAt {
                    kind,
                    region,
                    intensity,
                } => {
                    if Self::is_available(world, region) {
                        self.spawn(world, kind, region, Some(intensity), rng);
                    } else {
                        warn!(kind = %kind, region = region.0, "trigger suppressed, region already affected");
                    }
                }
                Command::SetCatastropheProbability { kind, probability } => {
                    let probability = probability.clamp(0.0, 1.0);
                    world.catastrophes.probability_overrides.insert(kind, probability);
                    info!(kind = %kind, probability, "catastrophe probability set");
                }
                other => debug!(command = ?other, "command not handled by catastrophe engine"),
            }
        }
    }

    /// Weighted epicenter draw over suitable regions that are not already
    /// under an event.
    fn pick_epicenter(&self, world: &World, kind: CatastropheKind, rng: &mut SystemRng<'_>) -> Option<RegionId> {
        let suitability = self.config.type_config(kind)?.suitability_table();
        let candidates: Vec<(RegionId, f32)> = world
            .grid
            .regions()
            .iter()
            .enumerate()
            .map(|(i, region)| (RegionId(i as u32), suitability[region.biome.index()]))
            .filter(|(id, weight)| *weight >= self.config.suitability_cutoff && *weight > 0.0 && Self::is_available(world, *id))
            .collect();
        let index = WeightedIndex::new(candidates.iter().map(|(_, w)| *w)).ok()?;
        Some(candidates[index.sample(rng)].0)
    }

    fn check_triggers(&self, world: &mut World, rng: &mut SystemRng<'_>) {
        for kind in CatastropheKind::ALL {
            let probability = self.trigger_probability(world, kind);
            if !rng.chance(probability) {
                continue;
            }
            match self.pick_epicenter(world, kind, rng) {
                Some(epicenter) => self.spawn(world, kind, epicenter, None, rng),
                None => debug!(kind = %kind, "no suitable epicenter"),
            }
        }
    }

    fn advance_events(world: &mut World, dt: f32) {
        let mut active = std::mem::take(&mut world.catastrophes.active);
        for event in &mut active {
            match event.state {
                CatastropheState::Dormant => event.state = CatastropheState::Triggered,
                CatastropheState::Triggered => {
                    event.state = CatastropheState::Active;
                    event.remaining -= dt;
                }
                CatastropheState::Active => event.remaining -= dt,
                CatastropheState::Ending | CatastropheState::Recovering => {
                    event.recovery_elapsed += dt;
                }
                CatastropheState::Resolved => {}
            }

            if event.state == CatastropheState::Active && event.remaining <= 0.0 {
                event.remaining = 0.0;
                event.state = CatastropheState::Ending;
                info!(id = event.id, kind = %event.kind, "catastrophe ended");
                world.events.push(SimEvent::CatastropheEnded {
                    id: event.id,
                    kind: event.kind,
                });
                event.state = CatastropheState::Recovering;
                event.recovery_total = 2.0 * event.duration;
                event.recovery_elapsed = 0.0;
            }

            if event.state == CatastropheState::Recovering {
                let progress = event.recovery_progress();
                let quarters = ((progress * 4.0).floor() as u8).min(4);
                while event.reported_quarters < quarters {
                    event.reported_quarters += 1;
                    world.events.push(SimEvent::RecoveryProgress {
                        id: event.id,
                        kind: event.kind,
                        progress: f32::from(event.reported_quarters) * 0.25,
                    });
                }
                if progress >= 1.0 {
                    event.state = CatastropheState::Resolved;
                    info!(id = event.id, kind = %event.kind, "catastrophe resolved");
                    world.events.push(SimEvent::CatastropheResolved {
                        id: event.id,
                        kind: event.kind,
                    });
                    if event.effects.soil_bonus > 0.0 {
                        for (region, weight) in &event.affected {
                            world.overrides.push_permanent(PermanentAdjustment {
                                region: *region,
                                quality_delta: event.effects.soil_bonus * weight,
                            });
                        }
                    }
                }
            }
        }

        let (resolved, live): (Vec<_>, Vec<_>) = active.into_iter().partition(CatastropheEvent::is_resolved);
        world.catastrophes.active = live;
        world.catastrophes.archive.extend(resolved);
    }
}

/// Regions within the event radius with their falloff weight. The
/// epicenter is always included at full weight.
fn affected_regions(world: &World, event: &CatastropheEvent) -> Vec<(RegionId, f32)> {
    let mut affected: Vec<(RegionId, f32)> = world
        .grid
        .within_radius(event.epicenter_coord, event.radius)
        .into_iter()
        .map(|(id, distance)| (id, falloff(distance, event.radius)))
        .filter(|(_, weight)| *weight > 0.0)
        .collect();
    if !affected.iter().any(|(id, _)| *id == event.epicenter) {
        affected.push((event.epicenter, 1.0));
    }
    affected
}

impl System for CatastropheSystem {
    fn kind(&self) -> EngineKind {
        EngineKind::Catastrophe
    }

    fn interval(&self) -> f64 {
        self.interval
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World, rng: &mut SystemRng<'_>) -> Result<()> {
        let decay = 0.5f32.powf(ctx.dt.max(0.0) / self.config.dampening_half_life);
        for memory in &mut world.catastrophes.memory {
            *memory *= decay;
        }

        Self::advance_events(world, ctx.dt);
        self.apply_commands(world, rng);

        world.catastrophes.since_check += ctx.dt;
        if world.catastrophes.since_check >= self.config.check_interval {
            world.catastrophes.since_check -= self.config.check_interval;
            self.check_triggers(world, rng);
        }

        let affected: Vec<Vec<(RegionId, f32)>> = world
            .catastrophes
            .active
            .iter()
            .map(|event| affected_regions(world, event))
            .collect();
        for (event, regions) in world.catastrophes.active.iter_mut().zip(affected) {
            event.affected = regions;
        }
        world.overrides.rebuild(world.catastrophes.active.iter());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::biome::BiomeType;
    use crate::components::health::HealthSnapshot;
    use crate::config::SimulationConfig;
    use crate::rng::RngManager;
    use crate::spatial::RegionalGrid;

    fn world() -> World {
        World::new(RegionalGrid::new(6, 6, BiomeType::Grassland), &SimulationConfig::default())
    }

    fn quiet_config() -> CatastropheConfig {
        let mut config = CatastropheConfig::default();
        for settings in &mut config.types {
            settings.base_probability = 0.0;
        }
        config
    }

    fn tick(system: &mut CatastropheSystem, world: &mut World, rng: &mut RngManager, dt: f32) {
        let time = world.time() + f64::from(dt);
        world.set_time(time);
        let ctx = SystemContext {
            time,
            dt,
            scenario_name: "test",
        };
        system.run(&ctx, world, &mut rng.stream("catastrophe")).unwrap();
    }

    fn names(world: &mut World) -> Vec<&'static str> {
        world.events.drain().map(|e| e.name()).collect()
    }

    #[test]
    fn manual_trigger_runs_full_lifecycle() {
        let mut config = quiet_config();
        let flood = config.type_config_mut(CatastropheKind::Flood).unwrap();
        flood.min_duration = 10.0;
        flood.max_duration = 10.0;
        flood.min_radius = 2.0;
        flood.max_radius = 2.0;
        let mut system = CatastropheSystem::new(config, 1.0);
        let mut world = world();
        let mut rng = RngManager::new(4);
        world
            .submit(Command::TriggerCatastropheAt {
                kind: CatastropheKind::Flood,
                region: RegionId(14),
                intensity: 0.8,
            })
            .unwrap();

        tick(&mut system, &mut world, &mut rng, 1.0);
        assert_eq!(names(&mut world), vec!["CatastropheTriggered"]);
        assert!(world.catastrophes().is_region_affected(RegionId(14)));
        assert!(world.overrides().region(RegionId(14)).severity > 0.0);
        assert!(world.overrides().region(RegionId(0)).is_neutral());

        let mut seen = Vec::new();
        for _ in 0..40 {
            tick(&mut system, &mut world, &mut rng, 1.0);
            seen.extend(names(&mut world));
        }
        let progress = seen.iter().filter(|n| **n == "RecoveryProgress").count();
        assert_eq!(progress, 4);
        assert_eq!(seen.iter().filter(|n| **n == "CatastropheEnded").count(), 1);
        assert_eq!(seen.last(), Some(&"CatastropheResolved"));
        assert!(world.catastrophes().active().is_empty());
        assert_eq!(world.catastrophes().archive().len(), 1);
        assert_eq!(world.overrides().affected_regions(), 0);
    }

    #[test]
    fn effects_fade_during_recovery() {
        let mut config = quiet_config();
        let drought = config.type_config_mut(CatastropheKind::Drought).unwrap();
        drought.min_duration = 5.0;
        drought.max_duration = 5.0;
        let mut system = CatastropheSystem::new(config, 1.0);
        let mut world = world();
        let mut rng = RngManager::new(4);
        world
            .submit(Command::TriggerCatastropheAt {
                kind: CatastropheKind::Drought,
                region: RegionId(0),
                intensity: 1.0,
            })
            .unwrap();
        tick(&mut system, &mut world, &mut rng, 1.0);
        let peak = world.overrides().region(RegionId(0)).severity;
        for _ in 0..8 {
            tick(&mut system, &mut world, &mut rng, 1.0);
        }
        let fading = world.overrides().region(RegionId(0)).severity;
        assert!(fading < peak);
        assert!(fading > 0.0);
    }

    #[test]
    fn triggers_are_suppressed_on_affected_regions() {
        let mut system = CatastropheSystem::new(quiet_config(), 1.0);
        let mut world = world();
        let mut rng = RngManager::new(4);
        world
            .submit(Command::TriggerCatastropheAt {
                kind: CatastropheKind::Plague,
                region: RegionId(3),
                intensity: 0.5,
            })
            .unwrap();
        tick(&mut system, &mut world, &mut rng, 1.0);
        assert!(world
            .submit(Command::TriggerCatastropheAt {
                kind: CatastropheKind::Wildfire,
                region: RegionId(3),
                intensity: 0.5,
            })
            .is_err());
        assert_eq!(world.catastrophes().active().len(), 1);
    }

    #[test]
    fn probability_is_bounded_and_dampened() {
        let mut config = CatastropheConfig::default();
        config.type_config_mut(CatastropheKind::Wildfire).unwrap().base_probability = 1.0;
        let mut system = CatastropheSystem::new(config, 1.0);
        let mut world = world();
        world.climate_mut().stability = 0.0;
        let p = system.trigger_probability(&world, CatastropheKind::Wildfire);
        assert_eq!(p, system.config().max_trigger_probability);

        system.config.max_trigger_probability = 1.0;
        system.config.type_config_mut(CatastropheKind::Wildfire).unwrap().base_probability = 0.01;
        let fresh = system.trigger_probability(&world, CatastropheKind::Wildfire);
        world.catastrophes.memory[CatastropheKind::Wildfire.index()] = 3.0;
        let dampened = system.trigger_probability(&world, CatastropheKind::Wildfire);
        assert!((dampened - fresh / 4.0).abs() < 1e-6);
    }

    #[test]
    fn poor_health_raises_probability() {
        let mut config = quiet_config();
        config.type_config_mut(CatastropheKind::Plague).unwrap().base_probability = 0.01;
        let system = CatastropheSystem::new(config, 1.0);
        let mut world = world();
        let neutral = system.trigger_probability(&world, CatastropheKind::Plague);
        world.health.push(HealthSnapshot {
            overall_score: 0.2,
            ..HealthSnapshot::default()
        });
        let stressed = system.trigger_probability(&world, CatastropheKind::Plague);
        assert!(stressed > neutral);
    }

    #[test]
    fn set_probability_command_is_kept_on_the_world() {
        let mut system = CatastropheSystem::new(quiet_config(), 1.0);
        let mut world = world();
        let mut rng = RngManager::new(4);
        world
            .submit(Command::SetCatastropheProbability {
                kind: CatastropheKind::Flood,
                probability: 0.3,
            })
            .unwrap();
        tick(&mut system, &mut world, &mut rng, 1.0);
        assert_eq!(world.catastrophes().probability_override(CatastropheKind::Flood), Some(0.3));
        assert_eq!(
            system.config().type_config(CatastropheKind::Flood).unwrap().base_probability,
            0.0
        );

        let json = serde_json::to_string(&world).unwrap();
        let restored: World = serde_json::from_str(&json).unwrap();
        let fresh = CatastropheSystem::new(quiet_config(), 1.0);
        assert!(fresh.trigger_probability(&restored, CatastropheKind::Flood) > 0.0);
        assert_eq!(fresh.trigger_probability(&restored, CatastropheKind::Plague), 0.0);
    }

    #[test]
    fn misrouted_commands_are_consumed_without_effect() {
        let mut system = CatastropheSystem::new(quiet_config(), 1.0);
        let mut world = world();
        let mut rng = RngManager::new(4);
        let region = RegionId(5);
        let before = world
            .resources()
            .get(region, crate::components::resource::ResourceType::Minerals)
            .unwrap()
            .capacity;
        world.commands.push_to(
            EngineKind::Catastrophe,
            Command::AddResourceSource {
                region,
                kind: crate::components::resource::ResourceType::Minerals,
                amount: 100.0,
                quality: 0.5,
            },
        );
        tick(&mut system, &mut world, &mut rng, 1.0);
        assert!(world.commands().is_empty());
        assert!(world.catastrophes().active().is_empty());
        let after = world
            .resources()
            .get(region, crate::components::resource::ResourceType::Minerals)
            .unwrap()
            .capacity;
        assert_eq!(after, before);
    }

    #[test]
    fn memory_decays_by_half_life() {
        let mut system = CatastropheSystem::new(quiet_config(), 1.0);
        let mut world = world();
        let mut rng = RngManager::new(4);
        world.catastrophes.memory[CatastropheKind::Flood.index()] = 1.0;
        let half_life = system.config().dampening_half_life;
        tick(&mut system, &mut world, &mut rng, half_life);
        assert!((world.catastrophes().memory(CatastropheKind::Flood) - 0.5).abs() < 1e-4);
    }
}
