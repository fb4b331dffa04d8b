//! Tunable parameters for every engine.
//!
//! Every field carries a serde default so a scenario may override only the
//! values it cares about. `sanitize` repairs out-of-range values instead of
//! rejecting the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::components::biome::{BiomeType, FitnessTolerance, TransitionTable};
use crate::components::catastrophe::{CatastropheEffects, CatastropheKind};
use crate::components::climate::SeasonType;
use crate::components::resource::ResourceType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub schedule: ScheduleConfig,
    pub climate: ClimateConfig,
    pub biome: BiomeConfig,
    pub resource: ResourceConfig,
    pub species: SpeciesConfig,
    pub catastrophe: CatastropheConfig,
    pub health: HealthConfig,
}

impl SimulationConfig {
    pub fn from_yaml_str(data: &str) -> Result<Self, ConfigError> {
        let mut config: SimulationConfig = serde_yaml::from_str(data)?;
        config.sanitize();
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&data)
    }

    /// Loads a config file, falling back to the built-in defaults when it is
    /// missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_path(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, "using built-in simulation defaults");
                Self::default()
            }
        }
    }

    /// Repairs invalid values in place and returns one diagnostic per repair.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        self.schedule.sanitize(&mut notes);
        self.climate.sanitize(&mut notes);
        self.biome.sanitize(&mut notes);
        self.resource.sanitize(&mut notes);
        self.species.sanitize(&mut notes);
        self.catastrophe.sanitize(&mut notes);
        self.health.sanitize(&mut notes);
        for note in &notes {
            warn!(target: "ecosphere::config", "{note}");
        }
        notes
    }
}

fn clamp_unit(value: &mut f32, field: &str, notes: &mut Vec<String>) {
    let current = *value;
    if !(0.0..=1.0).contains(&current) {
        let repaired = if current.is_nan() { 0.0 } else { current.clamp(0.0, 1.0) };
        notes.push(format!("{field}={current} outside [0,1], using {repaired}"));
        *value = repaired;
    }
}

fn ensure_positive(value: &mut f32, fallback: f32, field: &str, notes: &mut Vec<String>) {
    if *value <= 0.0 || value.is_nan() {
        notes.push(format!("{field}={value} must be positive, using {fallback}"));
        *value = fallback;
    }
}

fn ensure_positive_f64(value: &mut f64, fallback: f64, field: &str, notes: &mut Vec<String>) {
    if *value <= 0.0 || value.is_nan() {
        notes.push(format!("{field}={value} must be positive, using {fallback}"));
        *value = fallback;
    }
}

fn order_bounds(min: &mut f32, max: &mut f32, field: &str, notes: &mut Vec<String>) {
    if *min > *max {
        notes.push(format!("{field} bounds swapped ({min} > {max})"));
        std::mem::swap(min, max);
    }
}

/// Wake intervals in game seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub climate_interval: f64,
    pub biome_interval: f64,
    pub resource_interval: f64,
    pub species_interval: f64,
    pub catastrophe_interval: f64,
    pub health_interval: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            climate_interval: 1.0,
            biome_interval: 10.0,
            resource_interval: 5.0,
            species_interval: 3.0,
            catastrophe_interval: 1.0,
            health_interval: 30.0,
        }
    }
}

impl ScheduleConfig {
    fn sanitize(&mut self, notes: &mut Vec<String>) {
        let d = Self::default();
        ensure_positive_f64(&mut self.climate_interval, d.climate_interval, "schedule.climate_interval", notes);
        ensure_positive_f64(&mut self.biome_interval, d.biome_interval, "schedule.biome_interval", notes);
        ensure_positive_f64(&mut self.resource_interval, d.resource_interval, "schedule.resource_interval", notes);
        ensure_positive_f64(&mut self.species_interval, d.species_interval, "schedule.species_interval", notes);
        ensure_positive_f64(
            &mut self.catastrophe_interval,
            d.catastrophe_interval,
            "schedule.catastrophe_interval",
            notes,
        );
        ensure_positive_f64(&mut self.health_interval, d.health_interval, "schedule.health_interval", notes);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    /// Game seconds per season.
    pub season_length: f32,
    /// Fraction of the gap to the seasonal target closed per second.
    pub seasonal_approach_rate: f32,
    pub climate_change_enabled: bool,
    pub temperature_drift: f32,
    pub co2_drift: f32,
    pub sea_level_drift: f32,
    /// Relative uniform jitter applied to each drift step.
    pub drift_jitter: f32,
    pub stability_sensitivity: f32,
    /// Number of recent drift samples kept for the stability estimate.
    pub drift_window: usize,
    pub reporting_temperature_delta: f32,
    pub reporting_stability_delta: f32,
    pub max_weather_patterns: usize,
    /// Expected formations per game second while under capacity.
    pub weather_formation_rate: f32,
    pub weather_min_duration: f32,
    pub weather_max_duration: f32,
    pub weather_min_radius: f32,
    pub weather_max_radius: f32,
    pub weather_speed: f32,
    pub weather_intensity_floor: f32,
    pub weather_intensity_jitter: f32,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            season_length: 600.0,
            seasonal_approach_rate: 0.05,
            climate_change_enabled: false,
            temperature_drift: 0.0005,
            co2_drift: 0.01,
            sea_level_drift: 0.00002,
            drift_jitter: 0.5,
            stability_sensitivity: 200.0,
            drift_window: 30,
            reporting_temperature_delta: 0.5,
            reporting_stability_delta: 0.1,
            max_weather_patterns: 8,
            weather_formation_rate: 0.02,
            weather_min_duration: 30.0,
            weather_max_duration: 180.0,
            weather_min_radius: 1.5,
            weather_max_radius: 5.0,
            weather_speed: 0.05,
            weather_intensity_floor: 0.05,
            weather_intensity_jitter: 0.01,
        }
    }
}

impl ClimateConfig {
    fn sanitize(&mut self, notes: &mut Vec<String>) {
        let d = Self::default();
        ensure_positive(&mut self.season_length, d.season_length, "climate.season_length", notes);
        clamp_unit(&mut self.seasonal_approach_rate, "climate.seasonal_approach_rate", notes);
        clamp_unit(&mut self.drift_jitter, "climate.drift_jitter", notes);
        clamp_unit(&mut self.weather_formation_rate, "climate.weather_formation_rate", notes);
        clamp_unit(&mut self.weather_intensity_floor, "climate.weather_intensity_floor", notes);
        if self.stability_sensitivity < 0.0 {
            notes.push("climate.stability_sensitivity negative, using 0".to_string());
            self.stability_sensitivity = 0.0;
        }
        if self.drift_window == 0 {
            notes.push("climate.drift_window must be at least 1".to_string());
            self.drift_window = 1;
        }
        order_bounds(
            &mut self.weather_min_duration,
            &mut self.weather_max_duration,
            "climate.weather_duration",
            notes,
        );
        order_bounds(
            &mut self.weather_min_radius,
            &mut self.weather_max_radius,
            "climate.weather_radius",
            notes,
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionWeight {
    pub from: String,
    pub to: String,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeConfig {
    pub stability_threshold: f32,
    pub environmental_sensitivity: f32,
    pub biodiversity_weight: f32,
    pub soil_weight: f32,
    /// Species count at which local biodiversity saturates.
    pub biodiversity_saturation: f32,
    pub min_transition_duration: f32,
    pub max_transition_duration: f32,
    pub tolerance: FitnessTolerance,
    /// Rows listed here replace the matching built-in rows.
    pub transitions: Vec<TransitionWeight>,
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            stability_threshold: 0.45,
            environmental_sensitivity: 1.0,
            biodiversity_weight: 0.1,
            soil_weight: 0.2,
            biodiversity_saturation: 5.0,
            min_transition_duration: 120.0,
            max_transition_duration: 600.0,
            tolerance: FitnessTolerance::default(),
            transitions: Vec::new(),
        }
    }
}

impl BiomeConfig {
    fn sanitize(&mut self, notes: &mut Vec<String>) {
        clamp_unit(&mut self.stability_threshold, "biome.stability_threshold", notes);
        if self.environmental_sensitivity < 0.0 {
            notes.push("biome.environmental_sensitivity negative, using 0".to_string());
            self.environmental_sensitivity = 0.0;
        }
        ensure_positive(
            &mut self.biodiversity_saturation,
            5.0,
            "biome.biodiversity_saturation",
            notes,
        );
        order_bounds(
            &mut self.min_transition_duration,
            &mut self.max_transition_duration,
            "biome.transition_duration",
            notes,
        );
        if self.min_transition_duration < 0.0 {
            notes.push("biome.min_transition_duration negative, using 0".to_string());
            self.min_transition_duration = 0.0;
        }
    }

    /// Built-in table with configured rows replacing the defaults. Entries
    /// naming an unknown biome contribute nothing.
    pub fn transition_table(&self) -> TransitionTable {
        let mut table = TransitionTable::default();
        let mut cleared = [false; BiomeType::COUNT];
        for entry in &self.transitions {
            let Some(from) = BiomeType::from_name(&entry.from) else {
                warn!(from = %entry.from, "unknown biome in transition table, row ignored");
                continue;
            };
            if !cleared[from.index()] {
                for to in BiomeType::ALL {
                    table.set(from, to, 0.0);
                }
                cleared[from.index()] = true;
            }
            match BiomeType::from_name(&entry.to) {
                Some(to) => table.set(from, to, entry.weight),
                None => warn!(to = %entry.to, "unknown biome in transition table, weight 0"),
            }
        }
        table
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub capacity_scale: f32,
    pub initial_quality: f32,
    pub global_regen_multiplier: f32,
    pub depletion_threshold: f32,
    /// Change in a global ratio that triggers a level report.
    pub level_report_delta: f32,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            capacity_scale: 1.0,
            initial_quality: 0.5,
            global_regen_multiplier: 1.0,
            depletion_threshold: 0.1,
            level_report_delta: 0.05,
        }
    }
}

impl ResourceConfig {
    fn sanitize(&mut self, notes: &mut Vec<String>) {
        ensure_positive(&mut self.capacity_scale, 1.0, "resource.capacity_scale", notes);
        clamp_unit(&mut self.initial_quality, "resource.initial_quality", notes);
        if self.global_regen_multiplier < 0.0 {
            notes.push("resource.global_regen_multiplier negative, using 0".to_string());
            self.global_regen_multiplier = 0.0;
        }
        clamp_unit(&mut self.depletion_threshold, "resource.depletion_threshold", notes);
        clamp_unit(&mut self.level_report_delta, "resource.level_report_delta", notes);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    pub base_interaction_probability: f32,
    pub mutualism_probability: f32,
    pub commensalism_probability: f32,
    pub symbiosis_strength: f32,
    pub extinction_threshold: f32,
    pub migration_pressure_threshold: f32,
    /// Game seconds between migrations of the same species.
    pub migration_cooldown: f32,
    /// Units of each primary resource one individual eats per second.
    pub consumption_per_individual: f32,
    pub population_report_delta: f32,
    /// Resource modifier applied when no preferred biome exists on the grid.
    pub habitat_loss_modifier: f32,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            base_interaction_probability: 0.3,
            mutualism_probability: 0.15,
            commensalism_probability: 0.15,
            symbiosis_strength: 0.4,
            extinction_threshold: 0.05,
            migration_pressure_threshold: 0.9,
            migration_cooldown: 120.0,
            consumption_per_individual: 0.002,
            population_report_delta: 0.05,
            habitat_loss_modifier: -0.5,
        }
    }
}

impl SpeciesConfig {
    fn sanitize(&mut self, notes: &mut Vec<String>) {
        clamp_unit(
            &mut self.base_interaction_probability,
            "species.base_interaction_probability",
            notes,
        );
        clamp_unit(&mut self.mutualism_probability, "species.mutualism_probability", notes);
        clamp_unit(&mut self.commensalism_probability, "species.commensalism_probability", notes);
        if self.mutualism_probability + self.commensalism_probability > 1.0 {
            notes.push("species symbiosis probabilities exceed 1, commensalism reduced".to_string());
            self.commensalism_probability = 1.0 - self.mutualism_probability;
        }
        clamp_unit(&mut self.symbiosis_strength, "species.symbiosis_strength", notes);
        clamp_unit(&mut self.extinction_threshold, "species.extinction_threshold", notes);
        clamp_unit(
            &mut self.migration_pressure_threshold,
            "species.migration_pressure_threshold",
            notes,
        );
        clamp_unit(&mut self.population_report_delta, "species.population_report_delta", notes);
        if self.consumption_per_individual < 0.0 {
            notes.push("species.consumption_per_individual negative, using 0".to_string());
            self.consumption_per_individual = 0.0;
        }
        if self.migration_cooldown < 0.0 {
            notes.push("species.migration_cooldown negative, using 0".to_string());
            self.migration_cooldown = 0.0;
        }
        self.habitat_loss_modifier = self.habitat_loss_modifier.clamp(-1.0, 0.0);
    }
}

/// One configured catastrophe type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatastropheTypeConfig {
    pub kind: CatastropheKind,
    pub base_probability: f32,
    /// Multipliers indexed by season ordinal.
    #[serde(default = "neutral_seasons")]
    pub seasonal: [f32; SeasonType::COUNT],
    pub min_intensity: f32,
    pub max_intensity: f32,
    pub min_duration: f32,
    pub max_duration: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    #[serde(default)]
    pub effects: CatastropheEffects,
    /// Biome name to suitability weight; unlisted biomes weigh 0.
    #[serde(default)]
    pub suitability: BTreeMap<String, f32>,
}

fn neutral_seasons() -> [f32; SeasonType::COUNT] {
    [1.0; SeasonType::COUNT]
}

impl CatastropheTypeConfig {
    pub fn seasonal_modifier(&self, season: SeasonType) -> f32 {
        self.seasonal[season.index()].max(0.0)
    }

    pub fn suitability_table(&self) -> [f32; BiomeType::COUNT] {
        let mut table = [0.0; BiomeType::COUNT];
        for (name, weight) in &self.suitability {
            if let Some(biome) = BiomeType::from_name(name) {
                table[biome.index()] = weight.clamp(0.0, 1.0);
            }
        }
        table
    }

    fn sanitize(&mut self, notes: &mut Vec<String>) {
        let prefix = format!("catastrophe.{}", self.kind);
        clamp_unit(&mut self.base_probability, &format!("{prefix}.base_probability"), notes);
        order_bounds(&mut self.min_intensity, &mut self.max_intensity, &format!("{prefix}.intensity"), notes);
        order_bounds(&mut self.min_duration, &mut self.max_duration, &format!("{prefix}.duration"), notes);
        order_bounds(&mut self.min_radius, &mut self.max_radius, &format!("{prefix}.radius"), notes);
        clamp_unit(&mut self.min_intensity, &format!("{prefix}.min_intensity"), notes);
        clamp_unit(&mut self.max_intensity, &format!("{prefix}.max_intensity"), notes);
        if self.min_duration < 0.0 {
            notes.push(format!("{prefix}.min_duration negative, using 0"));
            self.min_duration = 0.0;
            self.max_duration = self.max_duration.max(0.0);
        }
        if self.min_radius < 0.0 {
            notes.push(format!("{prefix}.min_radius negative, using 0"));
            self.min_radius = 0.0;
            self.max_radius = self.max_radius.max(0.0);
        }
        for name in self.suitability.keys() {
            if BiomeType::from_name(name).is_none() {
                notes.push(format!("{prefix}.suitability names unknown biome '{name}'"));
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatastropheConfig {
    /// Game seconds between trigger checks.
    pub check_interval: f32,
    pub dampening_half_life: f32,
    pub instability_weight: f32,
    pub health_deficit_weight: f32,
    pub max_trigger_probability: f32,
    pub suitability_cutoff: f32,
    pub types: Vec<CatastropheTypeConfig>,
}

impl Default for CatastropheConfig {
    fn default() -> Self {
        Self {
            check_interval: 60.0,
            dampening_half_life: 1800.0,
            instability_weight: 1.0,
            health_deficit_weight: 1.0,
            max_trigger_probability: 0.5,
            suitability_cutoff: 0.2,
            types: default_catastrophe_types(),
        }
    }
}

impl CatastropheConfig {
    fn sanitize(&mut self, notes: &mut Vec<String>) {
        ensure_positive(&mut self.check_interval, 60.0, "catastrophe.check_interval", notes);
        ensure_positive(
            &mut self.dampening_half_life,
            1800.0,
            "catastrophe.dampening_half_life",
            notes,
        );
        clamp_unit(&mut self.max_trigger_probability, "catastrophe.max_trigger_probability", notes);
        clamp_unit(&mut self.suitability_cutoff, "catastrophe.suitability_cutoff", notes);
        if self.instability_weight < 0.0 {
            notes.push("catastrophe.instability_weight negative, using 0".to_string());
            self.instability_weight = 0.0;
        }
        if self.health_deficit_weight < 0.0 {
            notes.push("catastrophe.health_deficit_weight negative, using 0".to_string());
            self.health_deficit_weight = 0.0;
        }
        if self.types.is_empty() {
            notes.push("no catastrophe types configured, using built-in set".to_string());
            self.types = default_catastrophe_types();
        }
        for kind in &mut self.types {
            kind.sanitize(notes);
        }
    }

    pub fn type_config(&self, kind: CatastropheKind) -> Option<&CatastropheTypeConfig> {
        self.types.iter().find(|t| t.kind == kind)
    }

    pub fn type_config_mut(&mut self, kind: CatastropheKind) -> Option<&mut CatastropheTypeConfig> {
        self.types.iter_mut().find(|t| t.kind == kind)
    }
}

fn suitability(entries: &[(BiomeType, f32)]) -> BTreeMap<String, f32> {
    entries
        .iter()
        .map(|(biome, weight)| (biome.name().to_string(), *weight))
        .collect()
}

fn loss(water: f32, vegetation: f32, fruit: f32, prey: f32) -> [f32; ResourceType::COUNT] {
    [water, vegetation, fruit, prey, 0.0]
}

pub fn default_catastrophe_types() -> Vec<CatastropheTypeConfig> {
    use BiomeType::*;
    vec![
        CatastropheTypeConfig {
            kind: CatastropheKind::Wildfire,
            base_probability: 0.02,
            seasonal: [0.6, 1.8, 1.0, 0.2],
            min_intensity: 0.3,
            max_intensity: 1.0,
            min_duration: 60.0,
            max_duration: 240.0,
            min_radius: 2.0,
            max_radius: 5.0,
            effects: CatastropheEffects {
                resource_loss: loss(0.0, 0.006, 0.006, 0.003),
                regen_penalty: 0.5,
                mortality: 0.002,
                biome_stress: 0.4,
                temperature_delta: 0.5,
                stability_penalty: 0.1,
                co2_emission: 0.05,
                soil_bonus: 0.0,
            },
            suitability: suitability(&[
                (Grassland, 1.0),
                (Savanna, 1.0),
                (TemperateForest, 0.8),
                (Taiga, 0.7),
                (Desert, 0.3),
                (Rainforest, 0.2),
                (Mountain, 0.2),
                (Tundra, 0.1),
                (Coastal, 0.1),
            ]),
        },
        CatastropheTypeConfig {
            kind: CatastropheKind::Flood,
            base_probability: 0.015,
            seasonal: [1.6, 0.8, 1.2, 0.5],
            min_intensity: 0.2,
            max_intensity: 0.9,
            min_duration: 60.0,
            max_duration: 180.0,
            min_radius: 2.0,
            max_radius: 4.0,
            effects: CatastropheEffects {
                resource_loss: loss(0.0, 0.003, 0.005, 0.002),
                regen_penalty: 0.3,
                mortality: 0.001,
                biome_stress: 0.3,
                ..CatastropheEffects::default()
            },
            suitability: suitability(&[
                (Wetland, 1.0),
                (Coastal, 1.0),
                (Rainforest, 0.7),
                (TemperateForest, 0.5),
                (Grassland, 0.4),
                (Savanna, 0.3),
                (Taiga, 0.3),
                (Tundra, 0.2),
                (Desert, 0.1),
            ]),
        },
        CatastropheTypeConfig {
            kind: CatastropheKind::Drought,
            base_probability: 0.015,
            seasonal: [0.5, 1.8, 0.8, 0.3],
            min_intensity: 0.4,
            max_intensity: 1.0,
            min_duration: 180.0,
            max_duration: 600.0,
            min_radius: 3.0,
            max_radius: 6.0,
            effects: CatastropheEffects {
                resource_loss: loss(0.005, 0.003, 0.003, 0.001),
                regen_penalty: 0.6,
                mortality: 0.0008,
                biome_stress: 0.5,
                temperature_delta: 1.0,
                stability_penalty: 0.15,
                ..CatastropheEffects::default()
            },
            suitability: suitability(&[
                (Desert, 1.0),
                (Savanna, 0.9),
                (Grassland, 0.8),
                (TemperateForest, 0.4),
                (Mountain, 0.3),
                (Taiga, 0.2),
                (Coastal, 0.2),
            ]),
        },
        CatastropheTypeConfig {
            kind: CatastropheKind::VolcanicEruption,
            base_probability: 0.004,
            seasonal: [1.0; SeasonType::COUNT],
            min_intensity: 0.5,
            max_intensity: 1.0,
            min_duration: 60.0,
            max_duration: 300.0,
            min_radius: 2.0,
            max_radius: 6.0,
            effects: CatastropheEffects {
                resource_loss: loss(0.003, 0.01, 0.01, 0.006),
                regen_penalty: 0.8,
                mortality: 0.004,
                biome_stress: 0.7,
                temperature_delta: -1.5,
                stability_penalty: 0.3,
                co2_emission: 0.5,
                soil_bonus: 0.2,
            },
            suitability: suitability(&[
                (Mountain, 1.0),
                (Coastal, 0.3),
                (Tundra, 0.2),
                (Taiga, 0.2),
            ]),
        },
        CatastropheTypeConfig {
            kind: CatastropheKind::Plague,
            base_probability: 0.01,
            seasonal: [1.0, 1.2, 0.9, 0.7],
            min_intensity: 0.3,
            max_intensity: 0.8,
            min_duration: 120.0,
            max_duration: 360.0,
            min_radius: 3.0,
            max_radius: 8.0,
            effects: CatastropheEffects {
                resource_loss: loss(0.0, 0.0, 0.0, 0.004),
                mortality: 0.003,
                biome_stress: 0.05,
                ..CatastropheEffects::default()
            },
            suitability: suitability(&[
                (Rainforest, 1.0),
                (Wetland, 0.9),
                (TemperateForest, 0.6),
                (Savanna, 0.6),
                (Grassland, 0.5),
                (Coastal, 0.5),
                (Taiga, 0.3),
                (Desert, 0.2),
                (Mountain, 0.2),
            ]),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub history_length: usize,
    pub warning_threshold: f32,
    pub critical_threshold: f32,
    pub target_occupancy: f32,
    pub target_utilisation: f32,
    pub genetic_diversity_placeholder: f32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            history_length: 20,
            warning_threshold: 0.4,
            critical_threshold: 0.2,
            target_occupancy: 0.6,
            target_utilisation: 0.7,
            genetic_diversity_placeholder: 0.5,
        }
    }
}

impl HealthConfig {
    fn sanitize(&mut self, notes: &mut Vec<String>) {
        if self.history_length == 0 {
            notes.push("health.history_length must be at least 1".to_string());
            self.history_length = 1;
        }
        clamp_unit(&mut self.warning_threshold, "health.warning_threshold", notes);
        clamp_unit(&mut self.critical_threshold, "health.critical_threshold", notes);
        if self.critical_threshold > self.warning_threshold {
            notes.push("health.critical_threshold above warning threshold, swapped".to_string());
            std::mem::swap(&mut self.critical_threshold, &mut self.warning_threshold);
        }
        clamp_unit(&mut self.target_occupancy, "health.target_occupancy", notes);
        clamp_unit(&mut self.target_utilisation, "health.target_utilisation", notes);
        clamp_unit(
            &mut self.genetic_diversity_placeholder,
            "health.genetic_diversity_placeholder",
            notes,
        );
    }
}
