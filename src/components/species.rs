use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::biome::BiomeType;
use crate::components::resource::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

impl SpeciesId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrophicLevel {
    Producer,
    PrimaryConsumer,
    SecondaryConsumer,
    TertiaryConsumer,
}

impl TrophicLevel {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_consumer(self) -> bool {
        self != TrophicLevel::Producer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    Predation,
    Competition,
    Territorial,
    Mutualism,
    Commensalism,
    Neutralism,
}

impl InteractionKind {
    pub const COUNT: usize = 6;

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Input to species registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub trophic_level: TrophicLevel,
    pub preferred_biomes: Vec<BiomeType>,
    pub primary_resources: Vec<ResourceType>,
    #[serde(default)]
    pub territoriality: f32,
    #[serde(default)]
    pub aggression: f32,
    pub initial_population: f32,
    pub max_population: f32,
    pub growth_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesPopulation {
    pub id: String,
    pub name: String,
    pub trophic_level: TrophicLevel,
    pub preferred_biomes: Vec<BiomeType>,
    pub primary_resources: Vec<ResourceType>,
    pub territoriality: f32,
    pub aggression: f32,
    pub current: f32,
    pub max: f32,
    pub growth_rate: f32,
    pub extinct: bool,
    /// Population at the last `PopulationChanged` report.
    #[serde(default)]
    pub(crate) last_reported: Option<f32>,
    /// Earliest time the next migration may trigger.
    #[serde(default)]
    pub(crate) migration_ready_at: Option<f64>,
}

impl SpeciesPopulation {
    pub fn from_definition(def: &SpeciesDefinition) -> Self {
        let max = def.max_population.max(1.0);
        Self {
            id: def.id.clone(),
            name: def.name.clone().unwrap_or_else(|| def.id.clone()),
            trophic_level: def.trophic_level,
            preferred_biomes: def.preferred_biomes.clone(),
            primary_resources: def.primary_resources.clone(),
            territoriality: def.territoriality.clamp(0.0, 1.0),
            aggression: def.aggression.clamp(0.0, 1.0),
            current: def.initial_population.clamp(0.0, max),
            max,
            growth_rate: def.growth_rate,
            extinct: false,
            last_reported: None,
            migration_ready_at: None,
        }
    }

    /// Occupancy against carrying capacity, in `[0, 1]`.
    pub fn pressure(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.extinct
    }

    pub fn prefers(&self, biome: BiomeType) -> bool {
        self.preferred_biomes.contains(&biome)
    }

    pub fn shares_biome_with(&self, other: &SpeciesPopulation) -> bool {
        self.preferred_biomes.iter().any(|b| other.prefers(*b))
    }

    /// Jaccard overlap of primary resources.
    pub fn resource_overlap(&self, other: &SpeciesPopulation) -> f32 {
        let shared = self
            .primary_resources
            .iter()
            .filter(|r| other.primary_resources.contains(r))
            .count();
        let union = self.primary_resources.len() + other.primary_resources.len() - shared;
        if union == 0 {
            0.0
        } else {
            shared as f32 / union as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub species_a: SpeciesId,
    pub species_b: SpeciesId,
    pub kind: InteractionKind,
    pub strength: f32,
    pub effect_a: f32,
    pub effect_b: f32,
}

/// Persistent counters for one unordered species pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairHistory {
    pub species_a: SpeciesId,
    pub species_b: SpeciesId,
    pub counts: [u32; InteractionKind::COUNT],
    pub last_kind: Option<InteractionKind>,
}

impl PairHistory {
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

/// Classifies a co-located pair. `mutualism_roll` is only consulted when no
/// deterministic rule applies.
pub fn classify(
    a: &SpeciesPopulation,
    b: &SpeciesPopulation,
    mutualism_roll: f32,
    mutualism_probability: f32,
    commensalism_probability: f32,
) -> InteractionKind {
    let (la, lb) = (a.trophic_level.index(), b.trophic_level.index());
    let higher = if la > lb { a } else { b };
    if la.abs_diff(lb) == 1 && higher.trophic_level.is_consumer() {
        return InteractionKind::Predation;
    }
    if la == lb && a.resource_overlap(b) > 0.0 {
        return InteractionKind::Competition;
    }
    if a.territoriality > 0.5 || b.territoriality > 0.5 {
        return InteractionKind::Territorial;
    }
    if mutualism_roll < mutualism_probability {
        InteractionKind::Mutualism
    } else if mutualism_roll < mutualism_probability + commensalism_probability {
        InteractionKind::Commensalism
    } else {
        InteractionKind::Neutralism
    }
}

/// Raw strength before the population-pressure multiplier.
pub fn base_strength(
    kind: InteractionKind,
    a: &SpeciesPopulation,
    b: &SpeciesPopulation,
    symbiosis_strength: f32,
) -> f32 {
    match kind {
        InteractionKind::Predation => (a.aggression + b.aggression) / 2.0,
        InteractionKind::Competition => a.resource_overlap(b),
        InteractionKind::Territorial => a.territoriality.max(b.territoriality),
        InteractionKind::Mutualism => symbiosis_strength,
        InteractionKind::Commensalism => symbiosis_strength * 0.7,
        InteractionKind::Neutralism => 0.0,
    }
}

/// Strength scaled by `1 + mean(pressure)` and clamped to `[0, 1]`.
pub fn interaction_strength(kind: InteractionKind, a: &SpeciesPopulation, b: &SpeciesPopulation, symbiosis_strength: f32) -> f32 {
    let pressure = 1.0 + (a.pressure() + b.pressure()) / 2.0;
    (base_strength(kind, a, b, symbiosis_strength) * pressure).clamp(0.0, 1.0)
}

/// Fractional population deltas `(effect_a, effect_b)` for a successful
/// interaction of the given strength.
pub fn interaction_effects(
    kind: InteractionKind,
    a: &SpeciesPopulation,
    b: &SpeciesPopulation,
    strength: f32,
) -> (f32, f32) {
    match kind {
        InteractionKind::Predation => {
            let (gain, loss) = (0.03 * strength, -0.05 * strength);
            if a.trophic_level > b.trophic_level {
                (gain, loss)
            } else {
                (loss, gain)
            }
        }
        InteractionKind::Competition => (-0.02 * strength, -0.02 * strength),
        InteractionKind::Mutualism => (0.02 * strength, 0.02 * strength),
        InteractionKind::Commensalism => {
            if a.pressure() <= b.pressure() {
                (0.02 * strength, 0.0)
            } else {
                (0.0, 0.02 * strength)
            }
        }
        InteractionKind::Territorial => {
            let a_wins = a.aggression > b.aggression
                || (a.aggression == b.aggression && a.current >= b.current);
            let (win, lose) = (0.01 * strength, -0.04 * strength);
            if a_wins {
                (win, lose)
            } else {
                (lose, win)
            }
        }
        InteractionKind::Neutralism => (0.0, 0.0),
    }
}

/// Arena of populations plus pair history. Species are never removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeciesRegistry {
    populations: Vec<SpeciesPopulation>,
    by_key: BTreeMap<String, SpeciesId>,
    history: Vec<PairHistory>,
    presence: Vec<u16>,
}

impl SpeciesRegistry {
    pub fn new(regions: usize) -> Self {
        Self {
            presence: vec![0; regions],
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.populations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn id_of(&self, key: &str) -> Option<SpeciesId> {
        self.by_key.get(key).copied()
    }

    pub(crate) fn register(&mut self, population: SpeciesPopulation) -> SpeciesId {
        if let Some(existing) = self.by_key.get(&population.id) {
            return *existing;
        }
        let id = SpeciesId(self.populations.len() as u32);
        self.by_key.insert(population.id.clone(), id);
        self.populations.push(population);
        id
    }

    pub fn get(&self, id: SpeciesId) -> Option<&SpeciesPopulation> {
        self.populations.get(id.index())
    }

    pub fn by_key(&self, key: &str) -> Option<&SpeciesPopulation> {
        self.id_of(key).and_then(|id| self.get(id))
    }

    pub(crate) fn get_mut(&mut self, id: SpeciesId) -> Option<&mut SpeciesPopulation> {
        self.populations.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &SpeciesPopulation)> {
        self.populations
            .iter()
            .enumerate()
            .map(|(i, p)| (SpeciesId(i as u32), p))
    }

    pub fn ids(&self) -> impl Iterator<Item = SpeciesId> {
        (0..self.populations.len() as u32).map(SpeciesId)
    }

    pub fn alive_count(&self) -> usize {
        self.populations.iter().filter(|p| p.is_alive()).count()
    }

    pub fn extinct_count(&self) -> usize {
        self.populations.iter().filter(|p| p.extinct).count()
    }

    pub(crate) fn record_interaction(&mut self, record: &InteractionRecord) {
        let (a, b) = ordered(record.species_a, record.species_b);
        let position = self
            .history
            .binary_search_by(|h| (h.species_a, h.species_b).cmp(&(a, b)));
        let entry = match position {
            Ok(i) => &mut self.history[i],
            Err(i) => {
                self.history.insert(
                    i,
                    PairHistory {
                        species_a: a,
                        species_b: b,
                        counts: [0; InteractionKind::COUNT],
                        last_kind: None,
                    },
                );
                &mut self.history[i]
            }
        };
        entry.counts[record.kind.index()] += 1;
        entry.last_kind = Some(record.kind);
    }

    pub fn pair_history(&self, a: SpeciesId, b: SpeciesId) -> Option<&PairHistory> {
        let key = ordered(a, b);
        self.history
            .binary_search_by(|h| (h.species_a, h.species_b).cmp(&key))
            .ok()
            .map(|i| &self.history[i])
    }

    pub fn presence(&self) -> &[u16] {
        &self.presence
    }

    /// Number of living species that prefer the region's biome.
    pub fn presence_at(&self, region: usize) -> u16 {
        self.presence.get(region).copied().unwrap_or(0)
    }

    pub(crate) fn set_presence(&mut self, presence: Vec<u16>) {
        self.presence = presence;
    }
}

fn ordered(a: SpeciesId, b: SpeciesId) -> (SpeciesId, SpeciesId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn species(id: &str, level: TrophicLevel, resources: &[ResourceType]) -> SpeciesPopulation {
        SpeciesPopulation::from_definition(&SpeciesDefinition {
            id: id.to_string(),
            name: None,
            trophic_level: level,
            preferred_biomes: vec![BiomeType::Grassland],
            primary_resources: resources.to_vec(),
            territoriality: 0.2,
            aggression: 0.4,
            initial_population: 50.0,
            max_population: 100.0,
            growth_rate: 0.01,
        })
    }

    #[test]
    fn adjacent_trophic_levels_are_predation() {
        let grazer = species("grazer", TrophicLevel::PrimaryConsumer, &[ResourceType::Vegetation]);
        let wolf = species("wolf", TrophicLevel::SecondaryConsumer, &[ResourceType::Prey]);
        assert_eq!(classify(&grazer, &wolf, 0.99, 0.2, 0.3), InteractionKind::Predation);
        let (e_grazer, e_wolf) = interaction_effects(InteractionKind::Predation, &grazer, &wolf, 1.0);
        assert!(e_grazer < 0.0 && e_wolf > 0.0);
    }

    #[test]
    fn same_level_shared_resources_compete() {
        let a = species("a", TrophicLevel::PrimaryConsumer, &[ResourceType::Vegetation, ResourceType::Water]);
        let b = species("b", TrophicLevel::PrimaryConsumer, &[ResourceType::Vegetation]);
        assert_eq!(classify(&a, &b, 0.99, 0.2, 0.3), InteractionKind::Competition);
        assert!((a.resource_overlap(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn territorial_winner_is_more_aggressive() {
        let mut a = species("a", TrophicLevel::Producer, &[ResourceType::Water]);
        let mut b = species("b", TrophicLevel::TertiaryConsumer, &[ResourceType::Prey]);
        a.territoriality = 0.8;
        a.aggression = 0.9;
        b.aggression = 0.1;
        assert_eq!(classify(&a, &b, 0.99, 0.2, 0.3), InteractionKind::Territorial);
        let (ea, eb) = interaction_effects(InteractionKind::Territorial, &a, &b, 1.0);
        assert!(ea > 0.0 && eb < 0.0);
    }

    #[test]
    fn fallback_roll_selects_symbiosis() {
        let a = species("a", TrophicLevel::Producer, &[ResourceType::Water]);
        let b = species("b", TrophicLevel::SecondaryConsumer, &[ResourceType::Prey]);
        assert_eq!(classify(&a, &b, 0.1, 0.2, 0.3), InteractionKind::Mutualism);
        assert_eq!(classify(&a, &b, 0.4, 0.2, 0.3), InteractionKind::Commensalism);
        assert_eq!(classify(&a, &b, 0.9, 0.2, 0.3), InteractionKind::Neutralism);
    }

    #[test]
    fn strength_is_scaled_by_pressure_and_clamped() {
        let mut a = species("a", TrophicLevel::PrimaryConsumer, &[ResourceType::Vegetation]);
        let mut b = species("b", TrophicLevel::SecondaryConsumer, &[ResourceType::Prey]);
        a.aggression = 1.0;
        b.aggression = 1.0;
        a.current = 100.0;
        b.current = 100.0;
        assert_eq!(interaction_strength(InteractionKind::Predation, &a, &b, 0.3), 1.0);
        a.aggression = 0.2;
        b.aggression = 0.2;
        a.current = 0.0;
        b.current = 0.0;
        assert!((interaction_strength(InteractionKind::Predation, &a, &b, 0.3) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn registry_keeps_pair_history() {
        let mut registry = SpeciesRegistry::new(4);
        let a = registry.register(species("a", TrophicLevel::Producer, &[ResourceType::Water]));
        let b = registry.register(species("b", TrophicLevel::PrimaryConsumer, &[ResourceType::Vegetation]));
        assert_eq!(registry.register(species("a", TrophicLevel::Producer, &[])), a);
        let record = InteractionRecord {
            species_a: b,
            species_b: a,
            kind: InteractionKind::Predation,
            strength: 0.5,
            effect_a: 0.01,
            effect_b: -0.02,
        };
        registry.record_interaction(&record);
        registry.record_interaction(&record);
        let history = registry.pair_history(a, b).unwrap();
        assert_eq!(history.total(), 2);
        assert_eq!(history.last_kind, Some(InteractionKind::Predation));
    }
}
