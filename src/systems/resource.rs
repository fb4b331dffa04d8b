use anyhow::Result;
use tracing::{debug, info};

use crate::{
    commands::Command,
    components::resource::{ResourceType, ThresholdCrossing},
    config::ResourceConfig,
    engine::{System, SystemContext},
    events::{EngineKind, SimEvent},
    rng::SystemRng,
    spatial::RegionId,
    world::World,
};

/// Regeneration, catastrophe drain, thresholds and global levels.
pub struct ResourceSystem {
    config: ResourceConfig,
    interval: f64,
}

impl ResourceSystem {
    pub fn new(config: ResourceConfig, interval: f64) -> Self {
        Self { config, interval }
    }

    fn apply_commands(&self, world: &mut World) {
        for command in world.commands.take(EngineKind::Resource) {
            match command {
                Command::AddResourceSource {
                    region,
                    kind,
                    amount,
                    quality,
                } => {
                    if world.resources.add_source(region, kind, amount, quality) {
                        info!(region = region.0, kind = %kind, amount, "resource source added");
                    }
                }
                other => debug!(command = ?other, "command not handled by resource engine"),
            }
        }
    }

    fn apply_permanent_adjustments(world: &mut World) {
        for adjustment in world.overrides.take_permanent() {
            if let Some(ledgers) = world.resources.region_mut(adjustment.region) {
                for ledger in ledgers.iter_mut() {
                    ledger.quality = (ledger.quality + adjustment.quality_delta).clamp(0.0, 1.0);
                }
                debug!(region = adjustment.region.0, delta = adjustment.quality_delta, "soil quality adjusted");
            }
        }
    }

    /// Rescales ledgers of regions whose biome changed since they were sized.
    fn follow_biome_changes(&self, world: &mut World) {
        let ids: Vec<RegionId> = world.grid.ids().collect();
        for id in ids {
            let (Some(biome), Some(scaled)) = (world.grid.biome(id), world.resources.scaled_for(id)) else {
                continue;
            };
            if biome != scaled {
                world
                    .resources
                    .rescale_for_biome(id, biome, self.config.capacity_scale);
            }
        }
    }

    fn update_ledgers(&self, world: &mut World, dt: f32) {
        let season = world.climate.season;
        let progress = world.climate.season_progress;
        let modifiers = ResourceType::ALL.map(|kind| kind.seasonal_modifier(season, progress));
        let ids: Vec<RegionId> = world.grid.ids().collect();
        for id in ids {
            let region_override = world.overrides.region(id);
            let Some(ledgers) = world.resources.region_mut(id) else {
                continue;
            };
            for kind in ResourceType::ALL {
                let ledger = &mut ledgers[kind.index()];
                ledger.seasonal_modifier = modifiers[kind.index()];
                ledger.drain_fraction(region_override.resource_loss[kind.index()] * dt);
                ledger.regenerate(
                    self.config.global_regen_multiplier * region_override.regen_multiplier,
                    dt,
                );
                ledger.settle_consumption(dt);
                let event = match ledger.evaluate_threshold(self.config.depletion_threshold) {
                    Some(ThresholdCrossing::Critical) => SimEvent::ResourceCritical {
                        region: id,
                        kind,
                        availability: ledger.availability,
                        capacity: ledger.capacity,
                    },
                    Some(ThresholdCrossing::Depleted) => SimEvent::ResourceDepleted { region: id, kind },
                    Some(ThresholdCrossing::Restored) => SimEvent::ResourceRestored {
                        region: id,
                        kind,
                        availability: ledger.availability,
                    },
                    None => continue,
                };
                world.events.push(event);
            }
        }
    }

    fn report_levels(&self, world: &mut World) {
        world.resources.recompute_global();
        for kind in ResourceType::ALL {
            let ratio = world.resources.global_ratio(kind);
            let slot = &mut world.resources.reported[kind.index()];
            match *slot {
                None => *slot = Some(ratio),
                Some(previous) if (ratio - previous).abs() >= self.config.level_report_delta => {
                    *slot = Some(ratio);
                    world.events.push(SimEvent::ResourceLevelChanged {
                        kind,
                        previous,
                        ratio,
                    });
                }
                Some(_) => {}
            }
        }
    }
}

impl System for ResourceSystem {
    fn kind(&self) -> EngineKind {
        EngineKind::Resource
    }

    fn interval(&self) -> f64 {
        self.interval
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World, _rng: &mut SystemRng<'_>) -> Result<()> {
        self.apply_commands(world);
        Self::apply_permanent_adjustments(world);
        self.follow_biome_changes(world);
        self.update_ledgers(world, ctx.dt);
        self.report_levels(world);
        Ok(())
    }
}
