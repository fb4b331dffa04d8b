use serde::{Deserialize, Serialize};

use crate::components::biome::BiomeType;
use crate::components::climate::{seasonal_blend, SeasonType};
use crate::spatial::RegionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Water,
    Vegetation,
    Fruit,
    Prey,
    Minerals,
}

impl ResourceType {
    pub const COUNT: usize = 5;
    pub const ALL: [ResourceType; Self::COUNT] = [
        ResourceType::Water,
        ResourceType::Vegetation,
        ResourceType::Fruit,
        ResourceType::Prey,
        ResourceType::Minerals,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn renewable(self) -> bool {
        !matches!(self, ResourceType::Minerals)
    }

    pub fn base_capacity(self) -> f32 {
        match self {
            ResourceType::Water => 1000.0,
            ResourceType::Vegetation => 1000.0,
            ResourceType::Fruit => 500.0,
            ResourceType::Prey => 400.0,
            ResourceType::Minerals => 800.0,
        }
    }

    /// Units per game second at full capacity modifier.
    pub fn base_regen(self) -> f32 {
        match self {
            ResourceType::Water => 5.0,
            ResourceType::Vegetation => 4.0,
            ResourceType::Fruit => 2.0,
            ResourceType::Prey => 1.5,
            ResourceType::Minerals => 0.0,
        }
    }

    pub fn seasonal_multiplier(self, season: SeasonType) -> f32 {
        let table: [f32; SeasonType::COUNT] = match self {
            ResourceType::Water => [1.2, 0.8, 1.0, 1.0],
            ResourceType::Vegetation => [1.3, 1.1, 0.8, 0.4],
            ResourceType::Fruit => [0.6, 1.0, 1.6, 0.2],
            ResourceType::Prey => [1.2, 1.1, 1.0, 0.7],
            ResourceType::Minerals => [1.0, 1.0, 1.0, 1.0],
        };
        table[season.index()]
    }

    pub fn seasonal_modifier(self, season: SeasonType, progress: f32) -> f32 {
        seasonal_blend(season, progress, |s| self.seasonal_multiplier(s))
    }

    /// Capacity and regeneration scale for this resource in `biome`.
    pub fn biome_modifier(self, biome: BiomeType) -> f32 {
        const TABLE: [[f32; ResourceType::COUNT]; BiomeType::COUNT] = [
            [0.6, 0.3, 0.1, 0.5, 0.8],
            [0.8, 0.7, 0.3, 0.7, 0.7],
            [1.0, 1.2, 1.0, 1.0, 0.6],
            [0.8, 1.1, 0.5, 1.2, 0.5],
            [0.2, 0.2, 0.2, 0.4, 1.2],
            [0.5, 0.9, 0.5, 1.3, 0.6],
            [1.3, 1.5, 1.5, 1.0, 0.4],
            [1.5, 1.2, 0.7, 0.9, 0.3],
            [0.7, 0.4, 0.3, 0.5, 1.5],
            [1.2, 0.8, 0.6, 1.0, 0.6],
        ];
        TABLE[biome.index()][self.index()]
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerStatus {
    Normal,
    Critical,
    Depleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdCrossing {
    Critical,
    Depleted,
    Restored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLedger {
    pub availability: f32,
    pub capacity: f32,
    pub regen_rate: f32,
    pub seasonal_modifier: f32,
    pub quality: f32,
    pub renewable: bool,
    pub consumption_rate: f32,
    pub status: LedgerStatus,
    #[serde(default)]
    consumed_since_update: f32,
}

impl ResourceLedger {
    pub fn new(capacity: f32, regen_rate: f32, quality: f32, renewable: bool) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            availability: capacity,
            capacity,
            regen_rate: regen_rate.max(0.0),
            seasonal_modifier: 1.0,
            quality: quality.clamp(0.0, 1.0),
            renewable,
            consumption_rate: 0.0,
            status: LedgerStatus::Normal,
            consumed_since_update: 0.0,
        }
    }

    pub fn ratio(&self) -> f32 {
        if self.capacity <= 0.0 {
            0.0
        } else {
            (self.availability / self.capacity).clamp(0.0, 1.0)
        }
    }

    /// Takes up to `amount`, returning what was actually consumed.
    pub fn consume(&mut self, amount: f32) -> f32 {
        let taken = amount.max(0.0).min(self.availability);
        self.availability -= taken;
        self.consumed_since_update += taken;
        taken
    }

    pub fn regenerate(&mut self, multiplier: f32, dt: f32) {
        if !self.renewable {
            return;
        }
        let gain = self.regen_rate * multiplier.max(0.0) * self.seasonal_modifier * dt.max(0.0);
        self.availability = (self.availability + gain).min(self.capacity);
    }

    /// Removes a fraction of current availability (catastrophe damage).
    pub fn drain_fraction(&mut self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.availability = (self.availability * (1.0 - fraction)).max(0.0);
    }

    /// Folds consumption since the last call into the smoothed rate.
    pub fn settle_consumption(&mut self, dt: f32) {
        if dt > 0.0 {
            let instant = self.consumed_since_update / dt;
            self.consumption_rate = self.consumption_rate * 0.8 + instant * 0.2;
        }
        self.consumed_since_update = 0.0;
    }

    pub fn rescale(&mut self, capacity: f32, regen_rate: f32) {
        self.capacity = capacity.max(0.0);
        self.regen_rate = regen_rate.max(0.0);
        self.availability = self.availability.clamp(0.0, self.capacity);
    }

    /// Edge-triggered threshold check; returns a crossing only when the
    /// status actually changes.
    pub fn evaluate_threshold(&mut self, depletion_threshold: f32) -> Option<ThresholdCrossing> {
        let critical_level = self.capacity * depletion_threshold.clamp(0.0, 1.0);
        if self.availability <= 0.0 {
            if self.status != LedgerStatus::Depleted {
                self.status = LedgerStatus::Depleted;
                return Some(ThresholdCrossing::Depleted);
            }
            return None;
        }
        if self.availability <= critical_level {
            if self.status == LedgerStatus::Normal {
                self.status = LedgerStatus::Critical;
                return Some(ThresholdCrossing::Critical);
            }
            return None;
        }
        if self.status != LedgerStatus::Normal && self.availability > 2.0 * critical_level {
            self.status = LedgerStatus::Normal;
            if self.availability < 0.9 * self.capacity {
                return Some(ThresholdCrossing::Restored);
            }
        }
        None
    }
}

/// Every ledger for every region, stored as fixed arrays per region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLedgers {
    ledgers: Vec<[ResourceLedger; ResourceType::COUNT]>,
    scaled_for: Vec<BiomeType>,
    global_level: [f32; ResourceType::COUNT],
    /// Global ratio at the last `ResourceLevelChanged` report.
    #[serde(default)]
    pub(crate) reported: [Option<f32>; ResourceType::COUNT],
}

impl ResourceLedgers {
    pub fn new(biomes: impl Iterator<Item = BiomeType>, capacity_scale: f32, quality: f32) -> Self {
        let mut ledgers = Vec::new();
        let mut scaled_for = Vec::new();
        for biome in biomes {
            ledgers.push(ResourceType::ALL.map(|kind| {
                let modifier = kind.biome_modifier(biome);
                ResourceLedger::new(
                    kind.base_capacity() * modifier * capacity_scale,
                    kind.base_regen() * modifier,
                    quality,
                    kind.renewable(),
                )
            }));
            scaled_for.push(biome);
        }
        let mut store = Self {
            ledgers,
            scaled_for,
            global_level: [0.0; ResourceType::COUNT],
            reported: [None; ResourceType::COUNT],
        };
        store.recompute_global();
        store
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    pub fn get(&self, region: RegionId, kind: ResourceType) -> Option<&ResourceLedger> {
        self.ledgers.get(region.index()).map(|l| &l[kind.index()])
    }

    pub(crate) fn get_mut(&mut self, region: RegionId, kind: ResourceType) -> Option<&mut ResourceLedger> {
        self.ledgers.get_mut(region.index()).map(|l| &mut l[kind.index()])
    }

    pub(crate) fn region_mut(&mut self, region: RegionId) -> Option<&mut [ResourceLedger; ResourceType::COUNT]> {
        self.ledgers.get_mut(region.index())
    }

    pub fn region(&self, region: RegionId) -> Option<&[ResourceLedger; ResourceType::COUNT]> {
        self.ledgers.get(region.index())
    }

    /// Public consumption API: returns `min(amount, availability)`.
    pub fn consume(&mut self, region: RegionId, kind: ResourceType, amount: f32) -> f32 {
        self.get_mut(region, kind)
            .map(|ledger| ledger.consume(amount))
            .unwrap_or(0.0)
    }

    pub(crate) fn add_source(&mut self, region: RegionId, kind: ResourceType, amount: f32, quality: f32) -> bool {
        let Some(ledger) = self.get_mut(region, kind) else {
            return false;
        };
        let amount = amount.max(0.0);
        let total = ledger.capacity + amount;
        if total > 0.0 {
            ledger.quality = ((ledger.quality * ledger.capacity + quality.clamp(0.0, 1.0) * amount)
                / total)
                .clamp(0.0, 1.0);
        }
        ledger.capacity = total;
        ledger.availability = (ledger.availability + amount).min(ledger.capacity);
        true
    }

    pub fn scaled_for(&self, region: RegionId) -> Option<BiomeType> {
        self.scaled_for.get(region.index()).copied()
    }

    /// Rescales capacity and regeneration of a region after its biome changed.
    pub(crate) fn rescale_for_biome(&mut self, region: RegionId, biome: BiomeType, capacity_scale: f32) {
        let Some(ledgers) = self.ledgers.get_mut(region.index()) else {
            return;
        };
        for kind in ResourceType::ALL {
            let modifier = kind.biome_modifier(biome);
            let extra = (ledgers[kind.index()].capacity
                - kind.base_capacity() * kind.biome_modifier(self.scaled_for[region.index()]) * capacity_scale)
                .max(0.0);
            ledgers[kind.index()].rescale(
                kind.base_capacity() * modifier * capacity_scale + extra,
                kind.base_regen() * modifier,
            );
        }
        self.scaled_for[region.index()] = biome;
    }

    pub fn recompute_global(&mut self) {
        let mut sums = [0.0f32; ResourceType::COUNT];
        for ledgers in &self.ledgers {
            for kind in ResourceType::ALL {
                sums[kind.index()] += ledgers[kind.index()].availability;
            }
        }
        let n = self.ledgers.len().max(1) as f32;
        self.global_level = sums.map(|s| s / n);
    }

    /// Mean availability of `kind` over all regions.
    pub fn global_level(&self, kind: ResourceType) -> f32 {
        self.global_level[kind.index()]
    }

    pub fn global_levels(&self) -> [f32; ResourceType::COUNT] {
        self.global_level
    }

    /// Mean availability over mean capacity, in `[0, 1]`.
    pub fn global_ratio(&self, kind: ResourceType) -> f32 {
        if self.ledgers.is_empty() {
            return 1.0;
        }
        let capacity: f32 = self
            .ledgers
            .iter()
            .map(|l| l[kind.index()].capacity)
            .sum::<f32>()
            / self.ledgers.len() as f32;
        if capacity <= 0.0 {
            0.0
        } else {
            (self.global_level[kind.index()] / capacity).clamp(0.0, 1.0)
        }
    }

    pub fn region_ratio(&self, region: RegionId) -> f32 {
        self.region(region)
            .map(|ledgers| ledgers.iter().map(ResourceLedger::ratio).sum::<f32>() / ResourceType::COUNT as f32)
            .unwrap_or(0.0)
    }

    pub fn region_quality(&self, region: RegionId) -> f32 {
        self.region(region)
            .map(|ledgers| ledgers.iter().map(|l| l.quality).sum::<f32>() / ResourceType::COUNT as f32)
            .unwrap_or(0.5)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &[ResourceLedger; ResourceType::COUNT])> {
        self.ledgers
            .iter()
            .enumerate()
            .map(|(i, l)| (RegionId(i as u32), l))
    }
}
