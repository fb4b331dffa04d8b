use serde::{Deserialize, Serialize};

use crate::components::climate::LocalConditions;
use crate::spatial::RegionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BiomeType {
    Tundra,
    Taiga,
    TemperateForest,
    Grassland,
    Desert,
    Savanna,
    Rainforest,
    Wetland,
    Mountain,
    Coastal,
}

impl BiomeType {
    pub const COUNT: usize = 10;
    pub const ALL: [BiomeType; Self::COUNT] = [
        BiomeType::Tundra,
        BiomeType::Taiga,
        BiomeType::TemperateForest,
        BiomeType::Grassland,
        BiomeType::Desert,
        BiomeType::Savanna,
        BiomeType::Rainforest,
        BiomeType::Wetland,
        BiomeType::Mountain,
        BiomeType::Coastal,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            BiomeType::Tundra => "tundra",
            BiomeType::Taiga => "taiga",
            BiomeType::TemperateForest => "temperate_forest",
            BiomeType::Grassland => "grassland",
            BiomeType::Desert => "desert",
            BiomeType::Savanna => "savanna",
            BiomeType::Rainforest => "rainforest",
            BiomeType::Wetland => "wetland",
            BiomeType::Mountain => "mountain",
            BiomeType::Coastal => "coastal",
        }
    }

    /// Case-insensitive lookup accepting both `TemperateForest` and
    /// `temperate_forest`.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .iter()
            .copied()
            .find(|biome| biome.name().replace('_', "") == wanted)
    }

    /// Optimal ranges for temperature (degrees), humidity and precipitation
    /// (both normalised).
    pub fn profile(self) -> BiomeProfile {
        let (t, h, p) = match self {
            BiomeType::Tundra => ((-25.0, -2.0), (0.2, 0.6), (0.05, 0.5)),
            BiomeType::Taiga => ((-12.0, 8.0), (0.3, 0.7), (0.25, 0.7)),
            BiomeType::TemperateForest => ((4.0, 22.0), (0.45, 0.85), (0.45, 0.9)),
            BiomeType::Grassland => ((4.0, 26.0), (0.25, 0.65), (0.25, 0.65)),
            BiomeType::Desert => ((16.0, 42.0), (0.0, 0.3), (0.0, 0.25)),
            BiomeType::Savanna => ((20.0, 34.0), (0.25, 0.6), (0.2, 0.6)),
            BiomeType::Rainforest => ((22.0, 34.0), (0.7, 1.0), (0.7, 1.0)),
            BiomeType::Wetland => ((4.0, 30.0), (0.6, 1.0), (0.6, 1.0)),
            BiomeType::Mountain => ((-15.0, 15.0), (0.2, 0.8), (0.2, 0.8)),
            BiomeType::Coastal => ((0.0, 30.0), (0.4, 0.9), (0.3, 0.9)),
        };
        BiomeProfile {
            temperature: t,
            humidity: h,
            precipitation: p,
        }
    }
}

impl std::fmt::Display for BiomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BiomeProfile {
    pub temperature: (f32, f32),
    pub humidity: (f32, f32),
    pub precipitation: (f32, f32),
}

/// How far outside the optimal range a value may drift before its
/// sub-score reaches zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitnessTolerance {
    pub temperature: f32,
    pub humidity: f32,
    pub precipitation: f32,
}

impl Default for FitnessTolerance {
    fn default() -> Self {
        Self {
            temperature: 10.0,
            humidity: 0.3,
            precipitation: 0.3,
        }
    }
}

pub fn range_fitness(value: f32, (lo, hi): (f32, f32), tolerance: f32) -> f32 {
    let distance = if value < lo {
        lo - value
    } else if value > hi {
        value - hi
    } else {
        return 1.0;
    };
    if tolerance <= 0.0 {
        return 0.0;
    }
    (1.0 - distance / tolerance).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalFitness {
    pub temperature: f32,
    pub humidity: f32,
    pub precipitation: f32,
}

impl EnvironmentalFitness {
    pub fn evaluate(biome: BiomeType, conditions: &LocalConditions, tol: &FitnessTolerance) -> Self {
        let profile = biome.profile();
        Self {
            temperature: range_fitness(conditions.temperature, profile.temperature, tol.temperature),
            humidity: range_fitness(conditions.humidity, profile.humidity, tol.humidity),
            precipitation: range_fitness(
                conditions.precipitation,
                profile.precipitation,
                tol.precipitation,
            ),
        }
    }

    pub fn mean(&self) -> f32 {
        (self.temperature + self.humidity + self.precipitation) / 3.0
    }
}

/// Base transition weights `from -> to`, indexed by biome ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionTable {
    weights: [[f32; BiomeType::COUNT]; BiomeType::COUNT],
}

impl TransitionTable {
    pub fn empty() -> Self {
        Self {
            weights: [[0.0; BiomeType::COUNT]; BiomeType::COUNT],
        }
    }

    pub fn set(&mut self, from: BiomeType, to: BiomeType, weight: f32) {
        if from != to {
            self.weights[from.index()][to.index()] = weight.clamp(0.0, 1.0);
        }
    }

    pub fn weight(&self, from: BiomeType, to: BiomeType) -> f32 {
        self.weights[from.index()][to.index()]
    }

    /// Candidates with a non-zero weight, in ordinal order.
    pub fn candidates(&self, from: BiomeType) -> impl Iterator<Item = (BiomeType, f32)> + '_ {
        BiomeType::ALL
            .iter()
            .map(move |to| (*to, self.weights[from.index()][to.index()]))
            .filter(|(_, w)| *w > 0.0)
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        use BiomeType::*;
        let mut table = Self::empty();
        let rows: [(BiomeType, &[(BiomeType, f32)]); BiomeType::COUNT] = [
            (Tundra, &[(Taiga, 0.4), (Grassland, 0.1)]),
            (Taiga, &[(Tundra, 0.3), (TemperateForest, 0.4), (Mountain, 0.05)]),
            (
                TemperateForest,
                &[(Grassland, 0.3), (Taiga, 0.2), (Wetland, 0.15), (Rainforest, 0.1)],
            ),
            (Grassland, &[(Desert, 0.25), (Savanna, 0.3), (TemperateForest, 0.3)]),
            (Desert, &[(Grassland, 0.2), (Savanna, 0.35)]),
            (Savanna, &[(Grassland, 0.3), (Desert, 0.3), (Rainforest, 0.2)]),
            (Rainforest, &[(Savanna, 0.3), (TemperateForest, 0.2), (Wetland, 0.2)]),
            (Wetland, &[(Grassland, 0.3), (TemperateForest, 0.25), (Rainforest, 0.1)]),
            (Mountain, &[(Tundra, 0.2), (Taiga, 0.2)]),
            (Coastal, &[(Wetland, 0.3), (Grassland, 0.2)]),
        ];
        for (from, targets) in rows {
            for (to, weight) in targets {
                table.set(from, *to, *weight);
            }
        }
        table
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiomePhase {
    Stable,
    Stressed,
    Transitioning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeTransition {
    pub region: RegionId,
    pub from: BiomeType,
    pub to: BiomeType,
    pub progress: f32,
    pub required_duration: f32,
    pub forced: bool,
}

impl BiomeTransition {
    /// Advances progress by `dt / required_duration`; returns true once the
    /// transition is complete. Progress never decreases.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.required_duration <= 0.0 {
            self.progress = 1.0;
        } else {
            let rate = 1.0 / self.required_duration;
            self.progress = (self.progress + rate * dt.max(0.0)).min(1.0);
        }
        self.progress >= 1.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionBiomeState {
    pub phase: BiomePhase,
    pub fitness: f32,
    pub transition: Option<BiomeTransition>,
}

impl Default for RegionBiomeState {
    fn default() -> Self {
        Self {
            phase: BiomePhase::Stable,
            fitness: 1.0,
            transition: None,
        }
    }
}

/// Per-region biome state machines, indexed like the grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BiomeStates {
    states: Vec<RegionBiomeState>,
}

impl BiomeStates {
    pub fn new(regions: usize) -> Self {
        Self {
            states: vec![RegionBiomeState::default(); regions],
        }
    }

    pub fn get(&self, id: RegionId) -> Option<&RegionBiomeState> {
        self.states.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: RegionId) -> Option<&mut RegionBiomeState> {
        self.states.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &RegionBiomeState)> {
        self.states
            .iter()
            .enumerate()
            .map(|(i, s)| (RegionId(i as u32), s))
    }

    pub fn active_transitions(&self) -> Vec<BiomeTransition> {
        self.states
            .iter()
            .filter_map(|s| s.transition.clone())
            .collect()
    }

    pub fn count_in(&self, phase: BiomePhase) -> usize {
        self.states.iter().filter(|s| s.phase == phase).count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_fitness_falls_off_linearly() {
        assert_eq!(range_fitness(10.0, (5.0, 15.0), 10.0), 1.0);
        assert!((range_fitness(20.0, (5.0, 15.0), 10.0) - 0.5).abs() < 1e-6);
        assert_eq!(range_fitness(40.0, (5.0, 15.0), 10.0), 0.0);
        assert_eq!(range_fitness(0.0, (5.0, 15.0), 0.0), 0.0);
    }

    #[test]
    fn names_round_trip_through_lookup() {
        for biome in BiomeType::ALL {
            assert_eq!(BiomeType::from_name(biome.name()), Some(biome));
        }
        assert_eq!(
            BiomeType::from_name("TemperateForest"),
            Some(BiomeType::TemperateForest)
        );
        assert_eq!(BiomeType::from_name("lava_plains"), None);
    }

    #[test]
    fn default_table_has_no_self_transitions() {
        let table = TransitionTable::default();
        for biome in BiomeType::ALL {
            assert_eq!(table.weight(biome, biome), 0.0);
            assert!(table.candidates(biome).count() > 0);
        }
    }

    #[test]
    fn transition_progress_is_monotone_and_completes() {
        let mut transition = BiomeTransition {
            region: RegionId(0),
            from: BiomeType::Grassland,
            to: BiomeType::Desert,
            progress: 0.0,
            required_duration: 100.0,
            forced: false,
        };
        let mut last = 0.0;
        let mut done = false;
        for _ in 0..12 {
            done = transition.advance(10.0);
            assert!(transition.progress >= last);
            assert!(transition.progress <= 1.0);
            last = transition.progress;
        }
        assert!(done);
        assert_eq!(transition.progress, 1.0);
    }
}
