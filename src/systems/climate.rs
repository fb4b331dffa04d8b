use std::collections::BTreeMap;

use anyhow::Result;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    components::climate::{seasonal_blend, SeasonType, WeatherKind, WeatherPattern},
    config::ClimateConfig,
    engine::{System, SystemContext},
    events::{EngineKind, SimEvent},
    rng::{RngExt, SystemRng},
    world::World,
};

const TEMPERATURE_BOUNDS: (f32, f32) = (-10.0, 40.0);
const CO2_BOUNDS: (f32, f32) = (180.0, 1200.0);
const SEA_LEVEL_BOUNDS: (f32, f32) = (-5.0, 10.0);
/// Per-second intensity decay of a pattern in a season where it is unlikely.
const OFF_SEASON_DECAY: f32 = 0.01;

fn drift_step<R: Rng + ?Sized>(rate: f32, dt: f32, jitter: f32, rng: &mut R) -> f32 {
    rate * dt * rng.uniform(1.0 - jitter, 1.0 + jitter)
}

/// Seasons, global drift and weather patterns.
pub struct ClimateSystem {
    config: ClimateConfig,
    interval: f64,
}

impl ClimateSystem {
    pub fn new(config: ClimateConfig, interval: f64) -> Self {
        Self { config, interval }
    }

    fn advance_season(&self, world: &mut World, dt: f32) {
        let climate = &mut world.climate;
        climate.season_progress += dt / self.config.season_length;
        while climate.season_progress >= 1.0 {
            climate.season_progress -= 1.0;
            let from = climate.season;
            climate.season = from.next();
            info!(from = %from, to = %climate.season, "season changed");
            world.events.push(SimEvent::SeasonChanged {
                from,
                to: climate.season,
            });
        }
    }

    /// Moves seasonal values part of the way to the blended target.
    fn approach_seasonal_targets(&self, world: &mut World, dt: f32) {
        let climate = &mut world.climate;
        let (season, progress) = (climate.season, climate.season_progress);
        let k = 1.0 - (1.0 - self.config.seasonal_approach_rate).powf(dt);
        let approach = |current: f32, target: f32| current + (target - current) * k;
        climate.seasonal_temperature_offset = approach(
            climate.seasonal_temperature_offset,
            seasonal_blend(season, progress, SeasonType::temperature_offset),
        );
        climate.humidity = approach(
            climate.humidity,
            seasonal_blend(season, progress, SeasonType::humidity),
        )
        .clamp(0.0, 1.0);
        climate.precipitation = approach(
            climate.precipitation,
            seasonal_blend(season, progress, SeasonType::precipitation),
        )
        .clamp(0.0, 1.0);
    }

    fn apply_drift(&self, world: &mut World, dt: f32, rng: &mut SystemRng<'_>) {
        let climate_override = world.overrides.climate();
        let climate = &mut world.climate;
        let mut drift = 0.0;
        if self.config.climate_change_enabled && dt > 0.0 {
            let jitter = self.config.drift_jitter;
            let d_temp = drift_step(self.config.temperature_drift, dt, jitter, rng);
            let d_co2 = drift_step(self.config.co2_drift, dt, jitter, rng);
            let d_sea = drift_step(self.config.sea_level_drift, dt, jitter, rng);
            let before = climate.global_temperature;
            climate.global_temperature =
                (before + d_temp).clamp(TEMPERATURE_BOUNDS.0, TEMPERATURE_BOUNDS.1);
            climate.atmospheric_co2 = (climate.atmospheric_co2 + d_co2).clamp(CO2_BOUNDS.0, CO2_BOUNDS.1);
            climate.sea_level = (climate.sea_level + d_sea).clamp(SEA_LEVEL_BOUNDS.0, SEA_LEVEL_BOUNDS.1);
            // Pinned at a bound means no movement.
            drift = (climate.global_temperature - before).abs() / dt;
        }
        climate.atmospheric_co2 = (climate.atmospheric_co2 + climate_override.co2_emission * dt.max(0.0))
            .clamp(CO2_BOUNDS.0, CO2_BOUNDS.1);
        climate.catastrophe_temperature_delta = climate_override.temperature_delta;

        while climate.drift_history.len() >= self.config.drift_window.max(1) {
            climate.drift_history.pop_front();
        }
        climate.drift_history.push_back(drift);
        let mean_drift = climate.drift_history.iter().sum::<f32>() / climate.drift_history.len() as f32;
        let base = 1.0 / (1.0 + self.config.stability_sensitivity * mean_drift);
        climate.stability = (base - climate_override.stability_penalty).clamp(0.0, 1.0);
    }

    pub(crate) fn update_weather(&self, world: &mut World, dt: f32, rng: &mut SystemRng<'_>) {
        let (width, height) = (world.grid.width() as f32, world.grid.height() as f32);
        let season = world.climate.season;
        let speed = self.config.weather_speed;
        let jitter = self.config.weather_intensity_jitter;
        let floor = self.config.weather_intensity_floor;

        let mut dissipated = Vec::new();
        world.climate.active_weather.retain_mut(|pattern| {
            pattern.remaining_duration -= dt;
            pattern.location.0 += pattern.movement_vector.0 * speed * dt;
            pattern.location.1 += pattern.movement_vector.1 * speed * dt;
            let decay = (1.0 - pattern.kind.seasonal_probability(season)) * OFF_SEASON_DECAY * dt;
            pattern.intensity += rng.uniform(-jitter, jitter) * dt.sqrt();
            pattern.intensity = (pattern.intensity * (1.0 - decay)).clamp(0.0, 1.0);
            pattern.refresh_effects();
            let (x, y) = pattern.location;
            let off_grid = x < 0.0 || y < 0.0 || x > width - 1.0 || y > height - 1.0;
            let keep = pattern.intensity >= floor && pattern.remaining_duration > 0.0 && !off_grid;
            if !keep {
                dissipated.push((pattern.id, pattern.kind));
            }
            keep
        });
        for (id, kind) in dissipated {
            debug!(id, kind = %kind, "weather dissipated");
            world.events.push(SimEvent::WeatherDissipated { id, kind });
        }

        if world.grid.is_empty() || world.climate.active_weather.len() >= self.config.max_weather_patterns {
            return;
        }
        if !rng.chance(self.config.weather_formation_rate * dt) {
            return;
        }
        let kind = WeatherKind::ALL[rng.gen_range(0..WeatherKind::COUNT)];
        if !rng.chance(kind.seasonal_probability(season)) {
            return;
        }
        let angle = rng.uniform(0.0, std::f32::consts::TAU);
        let mut pattern = WeatherPattern {
            id: world.climate.next_weather_id,
            kind,
            location: (rng.uniform(0.0, width - 1.0), rng.uniform(0.0, height - 1.0)),
            radius: rng.uniform(self.config.weather_min_radius, self.config.weather_max_radius),
            intensity: rng.uniform(0.3, 1.0),
            remaining_duration: rng.uniform(self.config.weather_min_duration, self.config.weather_max_duration),
            movement_vector: (angle.cos(), angle.sin()),
            local_effects: BTreeMap::new(),
        };
        pattern.refresh_effects();
        world.climate.next_weather_id += 1;
        debug!(id = pattern.id, kind = %kind, "weather formed");
        world.events.push(SimEvent::WeatherFormed {
            id: pattern.id,
            kind,
            location: pattern.location,
            intensity: pattern.intensity,
        });
        world.climate.active_weather.push(pattern);
    }

    fn report(&self, world: &mut World) {
        let climate = &mut world.climate;
        let temperature = climate.global_temperature + climate.catastrophe_temperature_delta;
        let stability = climate.stability;
        let Some((last_temperature, last_stability)) = climate.last_reported else {
            climate.last_reported = Some((temperature, stability));
            return;
        };
        if (temperature - last_temperature).abs() >= self.config.reporting_temperature_delta
            || (stability - last_stability).abs() >= self.config.reporting_stability_delta
        {
            climate.last_reported = Some((temperature, stability));
            let co2 = climate.atmospheric_co2;
            world.events.push(SimEvent::ClimateChanged {
                global_temperature: temperature,
                stability,
                atmospheric_co2: co2,
            });
        }
    }
}

impl System for ClimateSystem {
    fn kind(&self) -> EngineKind {
        EngineKind::Climate
    }

    fn interval(&self) -> f64 {
        self.interval
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World, rng: &mut SystemRng<'_>) -> Result<()> {
        let dt = ctx.dt;
        self.advance_season(world, dt);
        self.approach_seasonal_targets(world, dt);
        self.apply_drift(world, dt, rng);
        self.update_weather(world, dt, rng);
        self.report(world);
        Ok(())
    }
}
