use anyhow::Result;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    commands::Command,
    components::biome::BiomeType,
    components::species::{
        classify, interaction_effects, interaction_strength, InteractionKind, InteractionRecord, SpeciesId,
        SpeciesPopulation,
    },
    config::SpeciesConfig,
    engine::{System, SystemContext},
    events::{EngineKind, SimEvent},
    rng::{RngExt, SystemRng},
    spatial::RegionId,
    world::World,
};

/// Pairwise interactions, logistic growth, consumption, extinction and
/// migration pressure.
pub struct SpeciesSystem {
    config: SpeciesConfig,
    interval: f64,
}

impl SpeciesSystem {
    pub fn new(config: SpeciesConfig, interval: f64) -> Self {
        Self { config, interval }
    }

    fn apply_commands(&self, world: &mut World) {
        for command in world.commands.take(EngineKind::Species) {
            match command {
                Command::RegisterSpecies(definition) => match world.register_species(&definition) {
                    Ok(id) => info!(species = %definition.id, id = id.0, "species registered"),
                    Err(err) => warn!(species = %definition.id, error = %err, "species registration rejected"),
                },
                other => debug!(command = ?other, "command not handled by species engine"),
            }
        }
    }

    fn habitat(world: &World, population: &SpeciesPopulation) -> Vec<RegionId> {
        world
            .grid
            .regions()
            .iter()
            .enumerate()
            .filter(|(_, region)| population.prefers(region.biome))
            .map(|(i, _)| RegionId(i as u32))
            .collect()
    }

    /// Runs every co-located pair once and returns the summed fractional
    /// effect per species.
    fn interact(&self, world: &mut World, rng: &mut SystemRng<'_>) -> Vec<f32> {
        let mut net = vec![0.0f32; world.species.len()];
        let distribution = world.grid.biome_distribution();
        let on_grid = |p: &SpeciesPopulation, q: &SpeciesPopulation| {
            BiomeType::ALL
                .iter()
                .any(|b| distribution[b.index()] > 0 && p.prefers(*b) && q.prefers(*b))
        };
        let alive: Vec<SpeciesId> = world
            .species
            .iter()
            .filter(|(_, p)| p.is_alive())
            .map(|(id, _)| id)
            .collect();

        for (i, &a_id) in alive.iter().enumerate() {
            for &b_id in &alive[i + 1..] {
                let (Some(a), Some(b)) = (world.species.get(a_id), world.species.get(b_id)) else {
                    continue;
                };
                if !on_grid(a, b) {
                    continue;
                }
                let roll: f32 = rng.gen();
                let kind = classify(
                    a,
                    b,
                    roll,
                    self.config.mutualism_probability,
                    self.config.commensalism_probability,
                );
                if kind == InteractionKind::Neutralism {
                    continue;
                }
                let strength = interaction_strength(kind, a, b, self.config.symbiosis_strength);
                if !rng.chance(self.config.base_interaction_probability * strength) {
                    continue;
                }
                let (effect_a, effect_b) = interaction_effects(kind, a, b, strength);
                net[a_id.index()] += effect_a;
                net[b_id.index()] += effect_b;
                let record = InteractionRecord {
                    species_a: a_id,
                    species_b: b_id,
                    kind,
                    strength,
                    effect_a,
                    effect_b,
                };
                world.species.record_interaction(&record);
                world.events.push(SimEvent::SpeciesInteraction(record));
            }
        }
        net
    }

    /// Scales growth by the mean global availability of the species'
    /// primary resources; negative below a quarter of capacity.
    fn resource_modifier(&self, world: &World, population: &SpeciesPopulation, habitat: &[RegionId]) -> f32 {
        if habitat.is_empty() {
            return self.config.habitat_loss_modifier;
        }
        if population.primary_resources.is_empty() {
            return 1.0;
        }
        let ratio = population
            .primary_resources
            .iter()
            .map(|kind| world.resources.global_ratio(*kind))
            .sum::<f32>()
            / population.primary_resources.len() as f32;
        ((ratio - 0.25) / 0.75).clamp(-1.0, 1.0)
    }

    fn consume(&self, world: &mut World, population: &SpeciesPopulation, habitat: &[RegionId], dt: f32) {
        if habitat.is_empty() || population.primary_resources.is_empty() {
            return;
        }
        let demand = population.current * self.config.consumption_per_individual * dt;
        let per_region = demand / (habitat.len() * population.primary_resources.len()) as f32;
        for region in habitat {
            for kind in &population.primary_resources {
                world.resources.consume(*region, *kind, per_region);
            }
        }
    }

    fn mortality(world: &World, habitat: &[RegionId]) -> f32 {
        if habitat.is_empty() {
            return 0.0;
        }
        habitat
            .iter()
            .map(|id| world.overrides.region(*id).mortality)
            .sum::<f32>()
            / habitat.len() as f32
    }

    /// Habitat region with the richest primary resources that no
    /// catastrophe currently touches.
    fn migration_destination(world: &World, population: &SpeciesPopulation, habitat: &[RegionId]) -> Option<RegionId> {
        let score = |id: RegionId| -> f32 {
            if population.primary_resources.is_empty() {
                return world.resources.region_ratio(id);
            }
            population
                .primary_resources
                .iter()
                .filter_map(|kind| world.resources.get(id, *kind))
                .map(|ledger| ledger.ratio())
                .sum::<f32>()
                / population.primary_resources.len() as f32
        };
        let mut best: Option<(RegionId, f32)> = None;
        for &id in habitat {
            if !world.overrides.region(id).is_neutral() {
                continue;
            }
            let value = score(id);
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((id, value));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Marks the species extinct when it fell to the threshold. Returns true
    /// on the tick it happens.
    fn check_extinction(&self, world: &mut World, id: SpeciesId) -> bool {
        let threshold = self.config.extinction_threshold;
        let Some(population) = world.species.get_mut(id) else {
            return false;
        };
        if population.extinct || population.current > threshold * population.max {
            return false;
        }
        population.extinct = true;
        population.current = 0.0;
        let key = population.id.clone();
        info!(species = %key, "species extinct");
        world.events.push(SimEvent::SpeciesExtinction { species: id, key });
        true
    }

    fn update_population(&self, world: &mut World, id: SpeciesId, interaction: f32, ctx: &SystemContext) {
        let Some(snapshot) = world.species.get(id).cloned() else {
            return;
        };
        if snapshot.extinct {
            return;
        }
        let dt = ctx.dt;
        let habitat = Self::habitat(world, &snapshot);
        self.consume(world, &snapshot, &habitat, dt);

        let modifier = self.resource_modifier(world, &snapshot, &habitat);
        let interaction_modifier = (1.0 + interaction).max(0.0);
        let damping = if modifier >= 0.0 {
            1.0 - snapshot.current / snapshot.max
        } else {
            1.0
        };
        let growth = snapshot.current * snapshot.growth_rate * modifier * interaction_modifier * damping * dt;
        let direct = snapshot.current * interaction;
        let survival = (1.0 - Self::mortality(world, &habitat) * dt).clamp(0.0, 1.0);
        let current = ((snapshot.current + growth + direct) * survival).clamp(0.0, snapshot.max);

        if let Some(population) = world.species.get_mut(id) {
            population.current = current;
        }
        if self.check_extinction(world, id) {
            return;
        }

        let pressure = if snapshot.max > 0.0 {
            current / snapshot.max
        } else {
            0.0
        };
        let ready = snapshot.migration_ready_at.map_or(true, |at| ctx.time >= at);
        if pressure > self.config.migration_pressure_threshold && ready {
            if let Some(population) = world.species.get_mut(id) {
                population.migration_ready_at = Some(ctx.time + f64::from(self.config.migration_cooldown));
            }
            let destination = Self::migration_destination(world, &snapshot, &habitat);
            debug!(species = %snapshot.id, pressure, destination = ?destination, "migration triggered");
            world.events.push(SimEvent::MigrationTriggered {
                species: id,
                key: snapshot.id.clone(),
                destination,
            });
        }

        match snapshot.last_reported {
            None => {
                if let Some(population) = world.species.get_mut(id) {
                    population.last_reported = Some(current);
                }
            }
            Some(previous) => {
                let moved = if previous > 0.0 {
                    (current - previous).abs() / previous
                } else {
                    current
                };
                if moved >= self.config.population_report_delta {
                    if let Some(population) = world.species.get_mut(id) {
                        population.last_reported = Some(current);
                    }
                    world.events.push(SimEvent::PopulationChanged {
                        species: id,
                        key: snapshot.id,
                        previous,
                        current,
                    });
                }
            }
        }
    }
}

impl System for SpeciesSystem {
    fn kind(&self) -> EngineKind {
        EngineKind::Species
    }

    fn interval(&self) -> f64 {
        self.interval
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World, rng: &mut SystemRng<'_>) -> Result<()> {
        self.apply_commands(world);

        let ids: Vec<SpeciesId> = world.species.ids().collect();
        let mut changed = false;
        for &id in &ids {
            changed |= self.check_extinction(world, id);
        }
        world.refresh_presence();

        let net = self.interact(world, rng);
        for &id in &ids {
            let was_alive = world.species.get(id).map_or(false, SpeciesPopulation::is_alive);
            self.update_population(world, id, net[id.index()], ctx);
            changed |= was_alive && world.species.get(id).map_or(false, |p| p.extinct);
        }
        if changed {
            world.refresh_presence();
        }
        Ok(())
    }
}
