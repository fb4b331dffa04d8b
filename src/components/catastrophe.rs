use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::resource::ResourceType;
use crate::spatial::{Coord, RegionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CatastropheKind {
    Wildfire,
    Flood,
    Drought,
    VolcanicEruption,
    Plague,
}

impl CatastropheKind {
    pub const COUNT: usize = 5;
    pub const ALL: [CatastropheKind; Self::COUNT] = [
        CatastropheKind::Wildfire,
        CatastropheKind::Flood,
        CatastropheKind::Drought,
        CatastropheKind::VolcanicEruption,
        CatastropheKind::Plague,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for CatastropheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CatastropheKind::Wildfire => "wildfire",
            CatastropheKind::Flood => "flood",
            CatastropheKind::Drought => "drought",
            CatastropheKind::VolcanicEruption => "volcanic eruption",
            CatastropheKind::Plague => "plague",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatastropheState {
    Dormant,
    Triggered,
    Active,
    Ending,
    Recovering,
    Resolved,
}

/// Effect magnitudes. Configured at full intensity, stored on an event
/// already scaled by its intensity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatastropheEffects {
    /// Fraction of availability lost per second, per resource.
    pub resource_loss: [f32; ResourceType::COUNT],
    /// Fraction removed from the regeneration multiplier.
    pub regen_penalty: f32,
    /// Fraction of population lost per second.
    pub mortality: f32,
    pub biome_stress: f32,
    pub temperature_delta: f32,
    pub stability_penalty: f32,
    /// CO2 ppm added per second.
    pub co2_emission: f32,
    /// Permanent ledger quality gain applied once the event resolves.
    pub soil_bonus: f32,
}

impl CatastropheEffects {
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            resource_loss: self.resource_loss.map(|v| v * factor),
            regen_penalty: self.regen_penalty * factor,
            mortality: self.mortality * factor,
            biome_stress: self.biome_stress * factor,
            temperature_delta: self.temperature_delta * factor,
            stability_penalty: self.stability_penalty * factor,
            co2_emission: self.co2_emission * factor,
            soil_bonus: self.soil_bonus * factor,
        }
    }
}

/// Linear distance attenuation: 1 at the epicenter, 0 at and beyond `radius`.
pub fn falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance < 0.0 {
        return 0.0;
    }
    (1.0 - distance / radius).max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatastropheEvent {
    pub id: u64,
    pub kind: CatastropheKind,
    pub epicenter: RegionId,
    pub epicenter_coord: Coord,
    pub radius: f32,
    pub intensity: f32,
    pub duration: f32,
    pub remaining: f32,
    pub effects: CatastropheEffects,
    pub state: CatastropheState,
    pub recovery_elapsed: f32,
    pub recovery_total: f32,
    pub started_at: f64,
    pub affected: Vec<(RegionId, f32)>,
    #[serde(default)]
    pub(crate) reported_quarters: u8,
}

impl CatastropheEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        kind: CatastropheKind,
        epicenter: RegionId,
        epicenter_coord: Coord,
        radius: f32,
        intensity: f32,
        duration: f32,
        base_effects: &CatastropheEffects,
        started_at: f64,
    ) -> Self {
        let intensity = intensity.clamp(0.0, 1.0);
        Self {
            id,
            kind,
            epicenter,
            epicenter_coord,
            radius: radius.max(0.0),
            intensity,
            duration: duration.max(0.0),
            remaining: duration.max(0.0),
            effects: base_effects.scaled(intensity),
            state: CatastropheState::Dormant,
            recovery_elapsed: 0.0,
            recovery_total: 0.0,
            started_at,
            affected: Vec::new(),
            reported_quarters: 0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state == CatastropheState::Resolved
    }

    /// Scale of the damaging effects (resource loss, mortality, biome
    /// stress, emissions). Zero once the event stops being active.
    pub fn damage_scale(&self) -> f32 {
        match self.state {
            CatastropheState::Triggered | CatastropheState::Active | CatastropheState::Ending => 1.0,
            CatastropheState::Recovering | CatastropheState::Dormant | CatastropheState::Resolved => 0.0,
        }
    }

    /// Scale of the offsets from baseline (regeneration penalty, climate
    /// offsets, severity): full while active, returning linearly to zero
    /// across recovery.
    pub fn effect_scale(&self) -> f32 {
        match self.state {
            CatastropheState::Triggered | CatastropheState::Active | CatastropheState::Ending => 1.0,
            CatastropheState::Recovering => 1.0 - self.recovery_progress(),
            CatastropheState::Dormant | CatastropheState::Resolved => 0.0,
        }
    }

    pub fn recovery_progress(&self) -> f32 {
        if self.recovery_total <= 0.0 {
            1.0
        } else {
            (self.recovery_elapsed / self.recovery_total).clamp(0.0, 1.0)
        }
    }

    pub fn covers(&self, region: RegionId) -> bool {
        self.epicenter == region || self.affected.iter().any(|(id, _)| *id == region)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOverride {
    pub resource_loss: [f32; ResourceType::COUNT],
    pub regen_multiplier: f32,
    pub mortality: f32,
    pub biome_stress: f32,
    /// Strongest falloff-weighted intensity touching the region.
    pub severity: f32,
}

impl Default for RegionOverride {
    fn default() -> Self {
        Self {
            resource_loss: [0.0; ResourceType::COUNT],
            regen_multiplier: 1.0,
            mortality: 0.0,
            biome_stress: 0.0,
            severity: 0.0,
        }
    }
}

impl RegionOverride {
    pub fn is_neutral(&self) -> bool {
        self.severity <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClimateOverride {
    pub temperature_delta: f32,
    pub stability_penalty: f32,
    pub co2_emission: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PermanentAdjustment {
    pub region: RegionId,
    pub quality_delta: f32,
}

/// Transient overrides published by the catastrophe engine and read by the
/// owning engines on their own ticks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatastropheOverrides {
    regions: Vec<RegionOverride>,
    climate: ClimateOverride,
    permanent: Vec<PermanentAdjustment>,
}

impl CatastropheOverrides {
    pub fn new(regions: usize) -> Self {
        Self {
            regions: vec![RegionOverride::default(); regions],
            ..Self::default()
        }
    }

    /// Overrides for a region; neutral when nothing applies.
    pub fn region(&self, id: RegionId) -> RegionOverride {
        self.regions.get(id.index()).copied().unwrap_or_default()
    }

    pub fn climate(&self) -> ClimateOverride {
        self.climate
    }

    /// Rebuilds the whole table from the given events in one pass.
    pub(crate) fn rebuild<'a>(&mut self, events: impl Iterator<Item = &'a CatastropheEvent>) {
        let count = self.regions.len();
        let mut regions = vec![RegionOverride::default(); count];
        let mut climate = ClimateOverride::default();
        for event in events {
            let scale = event.effect_scale();
            if scale <= 0.0 {
                continue;
            }
            let lingering = event.effects.scaled(scale);
            let damage = event.effects.scaled(event.damage_scale());
            climate.temperature_delta += lingering.temperature_delta;
            climate.stability_penalty += lingering.stability_penalty;
            climate.co2_emission += damage.co2_emission;
            for (region, weight) in &event.affected {
                let Some(slot) = regions.get_mut(region.index()) else {
                    continue;
                };
                for (loss, add) in slot.resource_loss.iter_mut().zip(damage.resource_loss) {
                    *loss = (*loss + add * weight).clamp(0.0, 1.0);
                }
                slot.regen_multiplier =
                    slot.regen_multiplier.min((1.0 - lingering.regen_penalty * weight).clamp(0.0, 1.0));
                slot.mortality = (slot.mortality + damage.mortality * weight).clamp(0.0, 1.0);
                slot.biome_stress = slot.biome_stress.max((damage.biome_stress * weight).clamp(0.0, 1.0));
                slot.severity = slot.severity.max((event.intensity * scale * weight).clamp(0.0, 1.0));
            }
        }
        climate.stability_penalty = climate.stability_penalty.clamp(0.0, 1.0);
        self.regions = regions;
        self.climate = climate;
    }

    pub(crate) fn push_permanent(&mut self, adjustment: PermanentAdjustment) {
        self.permanent.push(adjustment);
    }

    pub(crate) fn take_permanent(&mut self) -> Vec<PermanentAdjustment> {
        std::mem::take(&mut self.permanent)
    }

    pub fn affected_regions(&self) -> usize {
        self.regions.iter().filter(|r| !r.is_neutral()).count()
    }
}

/// Live events, the archive of resolved ones, and the trigger bookkeeping
/// that has to survive a save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatastropheLog {
    pub(crate) active: Vec<CatastropheEvent>,
    pub(crate) archive: Vec<CatastropheEvent>,
    /// Recent-occurrence memory per kind, decaying with the dampening
    /// half-life.
    #[serde(default)]
    pub(crate) memory: [f32; CatastropheKind::COUNT],
    /// Seconds accumulated toward the next trigger check.
    #[serde(default)]
    pub(crate) since_check: f32,
    /// Base probabilities set at runtime, replacing the configured ones.
    #[serde(default)]
    pub(crate) probability_overrides: BTreeMap<CatastropheKind, f32>,
}

impl CatastropheLog {
    pub fn memory(&self, kind: CatastropheKind) -> f32 {
        self.memory[kind.index()]
    }

    pub fn probability_override(&self, kind: CatastropheKind) -> Option<f32> {
        self.probability_overrides.get(&kind).copied()
    }

    pub fn active(&self) -> &[CatastropheEvent] {
        &self.active
    }

    pub fn archive(&self) -> &[CatastropheEvent] {
        &self.archive
    }

    /// True when an unresolved event is centred on or covers the region.
    pub fn is_region_affected(&self, region: RegionId) -> bool {
        self.active.iter().any(|e| e.covers(region))
    }

    pub fn occurrences(&self, kind: CatastropheKind) -> usize {
        self.active.iter().filter(|e| e.kind == kind).count()
            + self.archive.iter().filter(|e| e.kind == kind).count()
    }
}
