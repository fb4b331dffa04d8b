use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::components::species::TrophicLevel;

/// Ideal share of total population per trophic level.
pub const IDEAL_PYRAMID: [f32; TrophicLevel::COUNT] = [0.5, 0.3, 0.15, 0.05];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthIndicator {
    Biodiversity,
    TrophicBalance,
    ResourceSustainability,
    PopulationStability,
    HabitatQuality,
    GeneticDiversity,
}

impl HealthIndicator {
    pub const COUNT: usize = 6;
    pub const ALL: [HealthIndicator; Self::COUNT] = [
        HealthIndicator::Biodiversity,
        HealthIndicator::TrophicBalance,
        HealthIndicator::ResourceSustainability,
        HealthIndicator::PopulationStability,
        HealthIndicator::HabitatQuality,
        HealthIndicator::GeneticDiversity,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            HealthIndicator::Biodiversity => "biodiversity",
            HealthIndicator::TrophicBalance => "trophic_balance",
            HealthIndicator::ResourceSustainability => "resource_sustainability",
            HealthIndicator::PopulationStability => "population_stability",
            HealthIndicator::HabitatQuality => "habitat_quality",
            HealthIndicator::GeneticDiversity => "genetic_diversity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.iter().copied().find(|i| i.name() == wanted)
    }
}

impl std::fmt::Display for HealthIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub biodiversity_index: f32,
    pub trophic_balance: f32,
    pub resource_sustainability: f32,
    pub population_stability: f32,
    pub habitat_quality: f32,
    pub overall_score: f32,
    pub threats: Vec<String>,
    pub opportunities: Vec<String>,
    pub timestamp: f64,
}

impl HealthSnapshot {
    /// Scored sub-indicators in a fixed order, for threshold checks.
    pub fn sub_scores(&self) -> [(HealthIndicator, f32); 5] {
        [
            (HealthIndicator::Biodiversity, self.biodiversity_index),
            (HealthIndicator::TrophicBalance, self.trophic_balance),
            (HealthIndicator::ResourceSustainability, self.resource_sustainability),
            (HealthIndicator::PopulationStability, self.population_stability),
            (HealthIndicator::HabitatQuality, self.habitat_quality),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// Alert slots: overall first, then the five sub-scores.
pub const ALERT_SLOTS: usize = 6;

/// Published health: latest snapshot, bounded history, per-region scores,
/// plus pinned indicators and the alert band each score last sat in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthState {
    history: VecDeque<HealthSnapshot>,
    capacity: usize,
    regional: Vec<f32>,
    #[serde(default)]
    pub(crate) pinned: [Option<f32>; HealthIndicator::COUNT],
    #[serde(default)]
    pub(crate) alerts: [AlertLevel; ALERT_SLOTS],
}

impl HealthState {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            regional: Vec::new(),
            pinned: [None; HealthIndicator::COUNT],
            alerts: [AlertLevel::Normal; ALERT_SLOTS],
        }
    }

    /// Value an indicator is held at by command, if any.
    pub fn pinned(&self, indicator: HealthIndicator) -> Option<f32> {
        self.pinned[indicator.index()]
    }

    pub(crate) fn push(&mut self, snapshot: HealthSnapshot) {
        if self.history.len() >= self.capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(snapshot);
    }

    pub(crate) fn set_regional(&mut self, regional: Vec<f32>) {
        self.regional = regional;
    }

    pub fn latest(&self) -> Option<&HealthSnapshot> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &HealthSnapshot> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn regional(&self) -> &[f32] {
        &self.regional
    }

    /// Mean overall score of the retained history, if any.
    pub fn mean_overall(&self) -> Option<f32> {
        if self.history.is_empty() {
            return None;
        }
        Some(self.history.iter().map(|s| s.overall_score).sum::<f32>() / self.history.len() as f32)
    }

    pub fn resilience(&self) -> f32 {
        let snapshots: Vec<HealthSnapshot> = self.history.iter().cloned().collect();
        resilience(&snapshots)
    }
}

/// Pielou evenness of the given populations; 0 when fewer than two are
/// present.
pub fn shannon_evenness(populations: &[f32]) -> f32 {
    let living: Vec<f32> = populations.iter().copied().filter(|p| *p > 0.0).collect();
    if living.len() < 2 {
        return 0.0;
    }
    let total: f32 = living.iter().sum();
    let entropy: f32 = living
        .iter()
        .map(|p| {
            let share = p / total;
            -share * share.ln()
        })
        .sum();
    (entropy / (living.len() as f32).ln()).clamp(0.0, 1.0)
}

/// `1 - ½ Σ |actual - ideal|` over trophic levels.
pub fn trophic_balance(level_totals: &[f32; TrophicLevel::COUNT]) -> f32 {
    let total: f32 = level_totals.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let distance: f32 = level_totals
        .iter()
        .zip(IDEAL_PYRAMID)
        .map(|(actual, ideal)| (actual / total - ideal).abs())
        .sum();
    (1.0 - 0.5 * distance).clamp(0.0, 1.0)
}

pub fn variance(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32
}

const VARIANCE_SCALE: f32 = 25.0;

/// How quickly the overall score climbs back after dips: 1 when every dip is
/// recovered by the next snapshot, 0 when none are, 1 when there were none.
pub fn recovery_speed(scores: &[f32]) -> f32 {
    let mut speeds = Vec::new();
    for i in 1..scores.len() {
        if scores[i] >= scores[i - 1] {
            continue;
        }
        let baseline = scores[i - 1];
        let recovered = scores[i + 1..].iter().position(|s| *s >= baseline);
        speeds.push(match recovered {
            Some(steps) => 1.0 / (steps as f32 + 1.0),
            None => 0.0,
        });
    }
    if speeds.is_empty() {
        1.0
    } else {
        speeds.iter().sum::<f32>() / speeds.len() as f32
    }
}

/// Resilience estimate from recent snapshots: low variance of population
/// stability plus quick recovery after dips.
pub fn resilience(history: &[HealthSnapshot]) -> f32 {
    if history.len() < 2 {
        return 0.5;
    }
    let stabilities: Vec<f32> = history.iter().map(|s| s.population_stability).collect();
    let overall: Vec<f32> = history.iter().map(|s| s.overall_score).collect();
    let steadiness = 1.0 - (variance(&stabilities) * VARIANCE_SCALE).min(1.0);
    (0.6 * steadiness + 0.4 * recovery_speed(&overall)).clamp(0.0, 1.0)
}
