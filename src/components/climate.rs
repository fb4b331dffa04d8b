use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::spatial::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeasonType {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl SeasonType {
    pub const COUNT: usize = 4;
    pub const ALL: [SeasonType; Self::COUNT] = [
        SeasonType::Spring,
        SeasonType::Summer,
        SeasonType::Autumn,
        SeasonType::Winter,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> SeasonType {
        match self {
            SeasonType::Spring => SeasonType::Summer,
            SeasonType::Summer => SeasonType::Autumn,
            SeasonType::Autumn => SeasonType::Winter,
            SeasonType::Winter => SeasonType::Spring,
        }
    }

    pub fn temperature_offset(self) -> f32 {
        match self {
            SeasonType::Spring => 0.0,
            SeasonType::Summer => 8.0,
            SeasonType::Autumn => -1.0,
            SeasonType::Winter => -8.0,
        }
    }

    pub fn humidity(self) -> f32 {
        match self {
            SeasonType::Spring => 0.55,
            SeasonType::Summer => 0.5,
            SeasonType::Autumn => 0.6,
            SeasonType::Winter => 0.5,
        }
    }

    pub fn precipitation(self) -> f32 {
        match self {
            SeasonType::Spring => 0.55,
            SeasonType::Summer => 0.45,
            SeasonType::Autumn => 0.55,
            SeasonType::Winter => 0.45,
        }
    }
}

impl std::fmt::Display for SeasonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SeasonType::Spring => "spring",
            SeasonType::Summer => "summer",
            SeasonType::Autumn => "autumn",
            SeasonType::Winter => "winter",
        };
        f.write_str(name)
    }
}

pub fn smooth_step(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Blend a per-season value from `season` towards the next season.
pub fn seasonal_blend(season: SeasonType, progress: f32, value: impl Fn(SeasonType) -> f32) -> f32 {
    let t = smooth_step(progress);
    let from = value(season);
    let to = value(season.next());
    from + (to - from) * t
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherKind {
    Clear,
    Rain,
    Storm,
    Heatwave,
    ColdSnap,
    Fog,
    Snow,
}

impl WeatherKind {
    pub const COUNT: usize = 7;
    pub const ALL: [WeatherKind; Self::COUNT] = [
        WeatherKind::Clear,
        WeatherKind::Rain,
        WeatherKind::Storm,
        WeatherKind::Heatwave,
        WeatherKind::ColdSnap,
        WeatherKind::Fog,
        WeatherKind::Snow,
    ];

    /// Likelihood that a formation roll for this kind survives in `season`.
    pub fn seasonal_probability(self, season: SeasonType) -> f32 {
        let table: [f32; SeasonType::COUNT] = match self {
            WeatherKind::Clear => [0.6, 0.8, 0.6, 0.5],
            WeatherKind::Rain => [0.8, 0.4, 0.8, 0.4],
            WeatherKind::Storm => [0.5, 0.6, 0.5, 0.3],
            WeatherKind::Heatwave => [0.2, 0.9, 0.2, 0.0],
            WeatherKind::ColdSnap => [0.2, 0.0, 0.3, 0.9],
            WeatherKind::Fog => [0.5, 0.2, 0.7, 0.5],
            WeatherKind::Snow => [0.1, 0.0, 0.2, 0.9],
        };
        table[season.index()]
    }

    /// Full-intensity deltas for (temperature, humidity, precipitation).
    pub fn base_effects(self) -> (f32, f32, f32) {
        match self {
            WeatherKind::Clear => (1.0, -0.05, -0.1),
            WeatherKind::Rain => (-1.0, 0.15, 0.3),
            WeatherKind::Storm => (-2.0, 0.2, 0.4),
            WeatherKind::Heatwave => (8.0, -0.15, -0.2),
            WeatherKind::ColdSnap => (-8.0, 0.0, 0.0),
            WeatherKind::Fog => (-1.0, 0.1, 0.0),
            WeatherKind::Snow => (-5.0, 0.05, 0.2),
        }
    }
}

impl std::fmt::Display for WeatherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub const EFFECT_TEMPERATURE: &str = "temperature";
pub const EFFECT_HUMIDITY: &str = "humidity";
pub const EFFECT_PRECIPITATION: &str = "precipitation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPattern {
    pub id: u64,
    pub kind: WeatherKind,
    pub location: (f32, f32),
    pub radius: f32,
    pub intensity: f32,
    pub remaining_duration: f32,
    pub movement_vector: (f32, f32),
    pub local_effects: BTreeMap<String, f32>,
}

impl WeatherPattern {
    pub fn refresh_effects(&mut self) {
        let (t, h, p) = self.kind.base_effects();
        self.local_effects
            .insert(EFFECT_TEMPERATURE.to_string(), t * self.intensity);
        self.local_effects
            .insert(EFFECT_HUMIDITY.to_string(), h * self.intensity);
        self.local_effects
            .insert(EFFECT_PRECIPITATION.to_string(), p * self.intensity);
    }

    pub fn effect(&self, key: &str) -> f32 {
        self.local_effects.get(key).copied().unwrap_or(0.0)
    }

    /// Linear falloff from the pattern centre, 0 outside its radius.
    pub fn influence_at(&self, x: f32, y: f32) -> f32 {
        if self.radius <= 0.0 {
            return 0.0;
        }
        let dx = x - self.location.0;
        let dy = y - self.location.1;
        let d = (dx * dx + dy * dy).sqrt();
        (1.0 - d / self.radius).max(0.0)
    }
}

/// Conditions a single region experiences right now.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalConditions {
    pub temperature: f32,
    pub humidity: f32,
    pub precipitation: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateState {
    pub global_temperature: f32,
    pub sea_level: f32,
    pub atmospheric_co2: f32,
    pub ozone_level: f32,
    pub temperature_range: f32,
    pub humidity: f32,
    pub precipitation: f32,
    pub seasonal_temperature_offset: f32,
    pub catastrophe_temperature_delta: f32,
    pub stability: f32,
    pub season: SeasonType,
    pub season_progress: f32,
    pub active_weather: Vec<WeatherPattern>,
    #[serde(default = "first_weather_id")]
    pub(crate) next_weather_id: u64,
    /// Recent per-second temperature drift, oldest first.
    #[serde(default)]
    pub(crate) drift_history: VecDeque<f32>,
    /// Temperature and stability at the last `ClimateChanged` report.
    #[serde(default)]
    pub(crate) last_reported: Option<(f32, f32)>,
}

fn first_weather_id() -> u64 {
    1
}

impl Default for ClimateState {
    fn default() -> Self {
        let season = SeasonType::Spring;
        Self {
            global_temperature: 15.0,
            sea_level: 0.0,
            atmospheric_co2: 410.0,
            ozone_level: 300.0,
            temperature_range: 30.0,
            humidity: season.humidity(),
            precipitation: season.precipitation(),
            seasonal_temperature_offset: season.temperature_offset(),
            catastrophe_temperature_delta: 0.0,
            stability: 1.0,
            season,
            season_progress: 0.0,
            active_weather: Vec::new(),
            next_weather_id: first_weather_id(),
            drift_history: VecDeque::new(),
            last_reported: None,
        }
    }
}

impl ClimateState {
    pub fn local_conditions(&self, region: &Region) -> LocalConditions {
        let zone = region.climate_zone;
        let x = region.coordinates.x as f32;
        let y = region.coordinates.y as f32;
        let mut temperature = self.global_temperature
            + self.seasonal_temperature_offset
            + self.catastrophe_temperature_delta
            + zone.temperature_offset();
        let mut humidity = self.humidity + zone.humidity_offset();
        let mut precipitation = self.precipitation + zone.precipitation_offset();
        for pattern in &self.active_weather {
            let influence = pattern.influence_at(x, y);
            if influence <= 0.0 {
                continue;
            }
            temperature += pattern.effect(EFFECT_TEMPERATURE) * influence;
            humidity += pattern.effect(EFFECT_HUMIDITY) * influence;
            precipitation += pattern.effect(EFFECT_PRECIPITATION) * influence;
        }
        LocalConditions {
            temperature,
            humidity: humidity.clamp(0.0, 1.0),
            precipitation: precipitation.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::biome::BiomeType;
    use crate::spatial::{ClimateZone, Coord};

    fn region(x: i32, y: i32, zone: ClimateZone) -> Region {
        Region {
            coordinates: Coord::new(x, y),
            biome: BiomeType::Grassland,
            climate_zone: zone,
        }
    }

    #[test]
    fn seasons_cycle() {
        let mut season = SeasonType::Spring;
        for _ in 0..4 {
            season = season.next();
        }
        assert_eq!(season, SeasonType::Spring);
    }

    #[test]
    fn seasonal_blend_is_smooth() {
        let start = seasonal_blend(SeasonType::Spring, 0.0, SeasonType::temperature_offset);
        let mid = seasonal_blend(SeasonType::Spring, 0.5, SeasonType::temperature_offset);
        let end = seasonal_blend(SeasonType::Spring, 1.0, SeasonType::temperature_offset);
        assert_eq!(start, 0.0);
        assert!((mid - 4.0).abs() < 1e-5);
        assert_eq!(end, 8.0);
    }

    #[test]
    fn weather_only_affects_regions_in_radius() {
        let mut climate = ClimateState::default();
        let mut pattern = WeatherPattern {
            id: 1,
            kind: WeatherKind::Heatwave,
            location: (0.0, 0.0),
            radius: 4.0,
            intensity: 1.0,
            remaining_duration: 10.0,
            movement_vector: (0.0, 0.0),
            local_effects: BTreeMap::new(),
        };
        pattern.refresh_effects();
        climate.active_weather.push(pattern);

        let base = ClimateState::default();
        let near = region(0, 0, ClimateZone::Temperate);
        let far = region(10, 10, ClimateZone::Temperate);
        assert!(
            climate.local_conditions(&near).temperature
                > base.local_conditions(&near).temperature + 7.0
        );
        assert_eq!(
            climate.local_conditions(&far).temperature,
            base.local_conditions(&far).temperature
        );
    }

    #[test]
    fn zone_offsets_shape_conditions() {
        let climate = ClimateState::default();
        let polar = climate.local_conditions(&region(0, 0, ClimateZone::Polar));
        let tropical = climate.local_conditions(&region(0, 0, ClimateZone::Tropical));
        assert!(polar.temperature < tropical.temperature);
        assert!(polar.humidity < tropical.humidity);
    }
}
